//! Per-host caps on concurrent requests.

// crates.io
use async_lock::SemaphoreGuardArc;
// self
use crate::_prelude::*;

/// Async semaphores keyed by `host:port`.
///
/// A permit is held from dispatch until response headers arrive, so at most `max` requests to
/// one host are waiting on the network at any time. This caps requests, not sockets: HTTP/2
/// streams multiplexed on one connection each take a permit. A cap of zero disables limiting.
///
/// A host's semaphore lives only while a permit for it is held or awaited, so the map is
/// bounded by the number of hosts with requests in flight.
#[derive(Debug, Default)]
pub struct HostLimits {
	max: usize,
	hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}
impl HostLimits {
	/// Creates limits allowing `max` concurrent requests per host (0 = unlimited).
	pub fn new(max: usize) -> Self {
		Self { max, hosts: Mutex::new(HashMap::new()) }
	}

	/// Returns the configured cap.
	pub fn max(&self) -> usize {
		self.max
	}

	/// Returns the number of hosts with a permit held or awaited.
	pub fn tracked_hosts(&self) -> usize {
		self.hosts.lock().len()
	}

	/// Waits for a permit for `host_port`; `None` when limiting is disabled.
	pub async fn acquire(&self, host_port: &str) -> Option<HostPermit<'_>> {
		if self.max == 0 {
			return None;
		}

		let semaphore = self
			.hosts
			.lock()
			.entry(host_port.to_owned())
			.or_insert_with(|| Arc::new(Semaphore::new(self.max)))
			.clone();
		// Prunes on drop even when this future is cancelled while waiting.
		let mut permit = HostPermit { limits: self, guard: None };

		permit.guard = Some(semaphore.acquire_arc().await);

		Some(permit)
	}

	fn prune(&self) {
		self.hosts.lock().retain(|_, semaphore| Arc::strong_count(semaphore) > 1);
	}
}

/// Permit for one in-flight request to a host; released on drop.
pub struct HostPermit<'a> {
	limits: &'a HostLimits,
	guard: Option<SemaphoreGuardArc>,
}
impl Debug for HostPermit<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HostPermit").field("held", &self.guard.is_some()).finish()
	}
}
impl Drop for HostPermit<'_> {
	fn drop(&mut self) {
		self.guard.take();
		self.limits.prune();
	}
}
