// std
use std::{
	net::SocketAddr,
	sync::atomic::{AtomicBool, Ordering},
};
// crates.io
use reqwest::{Method, StatusCode, Version, header::HeaderMap};
use tracing::Level;
// self
use crate::_prelude::*;

tokio::task_local! {
	static ACTIVE_TRACE: Arc<dyn RequestTrace>;
}

/// Request lifecycle milestones reported to a [`RequestTrace`].
#[derive(Debug)]
pub enum TraceEvent<'a> {
	/// The client is about to acquire a connection for `host_port`.
	GetConn {
		/// Target `host:port`.
		host_port: &'a str,
	},
	/// A new connection needs a DNS lookup for `host`.
	DnsStart {
		/// Host being resolved.
		host: &'a str,
	},
	/// The DNS lookup finished.
	DnsDone {
		/// Resolved addresses (empty on failure).
		addrs: &'a [SocketAddr],
		/// Lookup failure, if any.
		error: Option<&'a dyn StdError>,
	},
	/// A new connection is being dialed.
	ConnectStart,
	/// Dialing finished: TCP connect and, for `https`, the TLS handshake with ALPN.
	ConnectDone {
		/// Connect or handshake failure, if any.
		error: Option<&'a dyn StdError>,
	},
	/// Request headers are final and about to be written.
	WroteHeaders {
		/// Request method.
		method: &'a Method,
		/// Request URL.
		url: &'a Url,
		/// Headers with the credential redacted.
		headers: &'a HeaderMap,
	},
	/// A connection carried the request.
	GotConn {
		/// Peer address, when the transport reports one.
		remote_addr: Option<SocketAddr>,
		/// Negotiated HTTP version; `HTTP/2` means ALPN selected `h2`.
		version: Version,
		/// `true` when no connection was dialed for this request.
		reused: bool,
	},
	/// Response headers arrived.
	GotFirstResponseByte {
		/// Response status.
		status: StatusCode,
	},
	/// The transport failed before producing a response.
	RequestFailed {
		/// Transport failure.
		error: &'a dyn StdError,
	},
}
impl TraceEvent<'_> {
	/// Returns the milestone name.
	pub const fn name(&self) -> &'static str {
		match self {
			Self::GetConn { .. } => "GetConn",
			Self::DnsStart { .. } => "DNSStart",
			Self::DnsDone { .. } => "DNSDone",
			Self::ConnectStart => "ConnectStart",
			Self::ConnectDone { .. } => "ConnectDone",
			Self::WroteHeaders { .. } => "WroteHeaders",
			Self::GotConn { .. } => "GotConn",
			Self::GotFirstResponseByte { .. } => "GotFirstResponseByte",
			Self::RequestFailed { .. } => "RequestFailed",
		}
	}
}

/// Observer of request lifecycle milestones.
///
/// Hooks are purely observational: the client ignores anything a hook does and a hook cannot
/// fail a request.
pub trait RequestTrace
where
	Self: Send + Sync,
{
	/// Receives one milestone.
	fn on_event(&self, event: &TraceEvent<'_>);
}
impl<F> RequestTrace for F
where
	F: Send + Sync + Fn(&TraceEvent<'_>),
{
	fn on_event(&self, event: &TraceEvent<'_>) {
		self(event)
	}
}

/// Trace hook that writes every milestone as a structured event on a logger.
#[derive(Clone, Debug)]
pub struct LoggingRequestTrace {
	logger: Dispatch,
	level: Level,
}
impl LoggingRequestTrace {
	/// Creates a hook emitting on `logger` at `level`.
	pub fn new(logger: Dispatch, level: Level) -> Self {
		Self { logger, level }
	}
}
impl RequestTrace for LoggingRequestTrace {
	fn on_event(&self, event: &TraceEvent<'_>) {
		macro_rules! emit {
			($level:expr, $($field:tt)+) => {
				match $level {
					Level::TRACE => tracing::event!(Level::TRACE, $($field)+),
					Level::DEBUG => tracing::event!(Level::DEBUG, $($field)+),
					Level::INFO => tracing::event!(Level::INFO, $($field)+),
					Level::WARN => tracing::event!(Level::WARN, $($field)+),
					_ => tracing::event!(Level::ERROR, $($field)+),
				}
			};
		}

		let name = event.name();
		let level = self.level;

		tracing::dispatcher::with_default(&self.logger, || match event {
			TraceEvent::GetConn { host_port } => emit!(level, host_port, "{name}"),
			TraceEvent::DnsStart { host } => emit!(level, host, "{name}"),
			TraceEvent::DnsDone { addrs, error } => {
				let error = error.map(ToString::to_string);

				emit!(level, ?addrs, ?error, "{name}")
			},
			TraceEvent::ConnectStart => emit!(level, "{name}"),
			TraceEvent::ConnectDone { error } => {
				let error = error.map(ToString::to_string);

				emit!(level, ?error, "{name}")
			},
			TraceEvent::WroteHeaders { method, url, headers } =>
				emit!(level, %method, %url, ?headers, "{name}"),
			TraceEvent::GotConn { remote_addr, version, reused } =>
				emit!(level, ?remote_addr, ?version, reused, "{name}"),
			TraceEvent::GotFirstResponseByte { status } =>
				emit!(level, status = status.as_u16(), "{name}"),
			TraceEvent::RequestFailed { error } => emit!(level, %error, "{name}"),
		});
	}
}

/// Per-request view of a hook that remembers whether a connection was dialed.
pub(crate) struct RequestScope {
	trace: Arc<dyn RequestTrace>,
	dialed: AtomicBool,
}
impl RequestScope {
	pub(crate) fn new(trace: Arc<dyn RequestTrace>) -> Arc<Self> {
		Arc::new(Self { trace, dialed: AtomicBool::new(false) })
	}

	/// Returns `true` once a `ConnectStart` went through this scope.
	pub(crate) fn dialed(&self) -> bool {
		self.dialed.load(Ordering::Relaxed)
	}
}
impl RequestTrace for RequestScope {
	fn on_event(&self, event: &TraceEvent<'_>) {
		if matches!(event, TraceEvent::ConnectStart) {
			self.dialed.store(true, Ordering::Relaxed);
		}

		self.trace.on_event(event);
	}
}

/// Runs `fut` with `trace` bound to the current task so transport internals (DNS resolution,
/// dialing) can report milestones.
pub(crate) async fn bind<F>(trace: Option<Arc<dyn RequestTrace>>, fut: F) -> F::Output
where
	F: Future,
{
	match trace {
		Some(trace) => ACTIVE_TRACE.scope(trace, fut).await,
		None => fut.await,
	}
}

/// Returns the hook bound to the current task, if any.
pub(crate) fn active() -> Option<Arc<dyn RequestTrace>> {
	ACTIVE_TRACE.try_with(Arc::clone).ok()
}
