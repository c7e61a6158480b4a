//! Connector layer that reports dialing to the request-trace hook bound to the dispatching task.

// std
use std::task::{Context, Poll};
// crates.io
use tower::{Layer, Service};
// self
use crate::{
	_prelude::*,
	error::BoxError,
	obs::{self, TraceEvent},
};

type ConnectFuture<T> = Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send>>;

/// Wraps the reqwest connector so every dial emits `ConnectStart`/`ConnectDone`.
///
/// reqwest dials TCP and runs the TLS handshake as one step, so both are covered by a single
/// pair of milestones. The hook is captured when the dial starts, on the task that needs the
/// connection.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingConnectLayer;
impl<S> Layer<S> for TracingConnectLayer {
	type Service = TracingConnect<S>;

	fn layer(&self, inner: S) -> Self::Service {
		TracingConnect { inner }
	}
}

/// Connector service produced by [`TracingConnectLayer`].
#[derive(Clone, Debug)]
pub struct TracingConnect<S> {
	inner: S,
}
impl<S, R> Service<R> for TracingConnect<S>
where
	S: Service<R>,
	S::Response: 'static + Send,
	S::Error: Into<BoxError>,
	S::Future: 'static + Send,
{
	type Error = BoxError;
	type Future = ConnectFuture<S::Response>;
	type Response = S::Response;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx).map_err(Into::into)
	}

	fn call(&mut self, request: R) -> Self::Future {
		let trace = obs::active();

		if let Some(trace) = &trace {
			trace.on_event(&TraceEvent::ConnectStart);
		}

		let dial = self.inner.call(request);

		Box::pin(async move {
			let result = dial.await.map_err(Into::into);

			if let Some(trace) = &trace {
				let error = result.as_ref().err().map(|e| &**e as &dyn StdError);

				trace.on_event(&TraceEvent::ConnectDone { error });
			}

			result
		})
	}
}
