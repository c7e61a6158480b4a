//! DNS resolution that reports lookups to the request-trace hook bound to the dispatching task.

// std
use std::net::SocketAddr;
// crates.io
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
// self
use crate::{
	_prelude::*,
	obs::{self, TraceEvent},
};

/// System resolver emitting `DnsStart`/`DnsDone` milestones.
///
/// The hook is looked up when the lookup future first runs, which is on the task that
/// dispatched the request. Lookups for connections established in the background report to no
/// one.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingResolver;
impl Resolve for TracingResolver {
	fn resolve(&self, name: Name) -> Resolving {
		Box::pin(async move {
			let trace = obs::active();
			let host = name.as_str();

			if let Some(trace) = &trace {
				trace.on_event(&TraceEvent::DnsStart { host });
			}

			let lookup = tokio::net::lookup_host((host, 0))
				.await
				.map(|addrs| addrs.collect::<Vec<SocketAddr>>());

			if let Some(trace) = &trace {
				match &lookup {
					Ok(addrs) => trace.on_event(&TraceEvent::DnsDone { addrs, error: None }),
					Err(e) => trace.on_event(&TraceEvent::DnsDone {
						addrs: &[],
						error: Some(e as &dyn StdError),
					}),
				}
			}

			let addrs: Addrs = Box::new(lookup?.into_iter());

			Ok(addrs)
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::obs::RequestTrace;

	#[tokio::test]
	async fn lookups_report_to_the_bound_trace() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();
		let trace: Arc<dyn RequestTrace> = Arc::new(move |event: &TraceEvent<'_>| {
			let line = match event {
				TraceEvent::DnsDone { addrs, error } =>
					format!("{} {} {}", event.name(), addrs.len(), error.is_some()),
				other => other.name().to_owned(),
			};

			sink.lock().push(line);
		});
		let name = "localhost".parse::<Name>().expect("Host name should parse.");
		let addrs = obs::bind(Some(trace), TracingResolver.resolve(name))
			.await
			.expect("Localhost should resolve.")
			.collect::<Vec<_>>();
		let seen = seen.lock().clone();

		assert!(!addrs.is_empty());
		assert_eq!(seen, vec!["DNSStart".to_owned(), format!("DNSDone {} false", addrs.len())]);
	}

	#[tokio::test]
	async fn lookups_without_a_trace_still_resolve() {
		let name = "localhost".parse::<Name>().expect("Host name should parse.");
		let addrs = TracingResolver.resolve(name).await.expect("Localhost should resolve.");

		assert!(addrs.count() > 0);
	}
}
