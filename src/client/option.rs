//! Ordered, two-pass client option pipeline.
//!
//! Options carry a rank and are applied in ascending rank order regardless of the order they
//! were registered in. Options marked dependent read settings written by other options (the
//! request trace reads the logger), so after the first pass every dependent option runs once
//! more against the final settings.

// std
use std::time::Duration;
// crates.io
use tracing::Level;
// self
use crate::{
	_prelude::*,
	obs::{LoggingRequestTrace, RequestTrace},
	transport::Transport,
};

type ApplyFn = dyn Fn(&mut ClientSettings) + Send + Sync;

/// Settings produced by the option pipeline.
#[derive(Clone)]
pub struct ClientSettings {
	/// Development mode flag.
	pub development: bool,
	/// Sink for client events; discards everything by default.
	pub logger: Dispatch,
	/// Transport overriding the one from the transport provider.
	pub transport: Option<Arc<dyn Transport>>,
	/// Deadline applied to requests that carry none (zero disables it).
	///
	/// `None` defers to the transport's [`http_timeout`](Transport::http_timeout).
	pub timeout: Option<Duration>,
	/// Hook receiving request milestones.
	pub request_trace: Option<Arc<dyn RequestTrace>>,
}
impl Default for ClientSettings {
	fn default() -> Self {
		Self {
			development: false,
			logger: Dispatch::none(),
			transport: None,
			timeout: None,
			request_trace: None,
		}
	}
}
impl Debug for ClientSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientSettings")
			.field("development", &self.development)
			.field("custom_transport", &self.transport.is_some())
			.field("timeout", &self.timeout)
			.field("request_trace", &self.request_trace.is_some())
			.finish()
	}
}

/// Application order of an option; lower ranks run first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OptionRank(u16);
impl OptionRank {
	/// Development mode.
	pub const DEVELOPMENT: Self = Self(100);
	/// Logger.
	pub const LOGGER: Self = Self(200);
	/// Custom transport.
	pub const TRANSPORT: Self = Self(300);
	/// Request deadline.
	pub const TIMEOUT: Self = Self(400);
	/// Request trace hook.
	pub const REQUEST_TRACE: Self = Self(500);

	/// Creates a caller-defined rank.
	pub const fn custom(rank: u16) -> Self {
		Self(rank)
	}

	/// Returns the numeric rank.
	pub const fn get(self) -> u16 {
		self.0
	}
}

/// One configuration step for an [`AuthenticatingClient`](crate::client::AuthenticatingClient).
#[derive(Clone)]
pub struct ClientOption {
	rank: OptionRank,
	dependent: bool,
	apply: Arc<ApplyFn>,
}
impl ClientOption {
	/// Creates an option from a settings mutator.
	///
	/// Set `dependent` when `apply` reads settings written by other options; it then runs again
	/// after every option has been applied once.
	pub fn custom(
		rank: OptionRank,
		dependent: bool,
		apply: impl 'static + Fn(&mut ClientSettings) + Send + Sync,
	) -> Self {
		Self { rank, dependent, apply: Arc::new(apply) }
	}

	/// Turns on development mode.
	pub fn development() -> Self {
		Self::custom(OptionRank::DEVELOPMENT, false, |s| s.development = true)
	}

	/// Routes client events to `logger`.
	pub fn logger(logger: Dispatch) -> Self {
		Self::custom(OptionRank::LOGGER, false, move |s| s.logger = logger.clone())
	}

	/// Dispatches through `transport` instead of the provider's transport.
	pub fn transport(transport: Arc<dyn Transport>) -> Self {
		Self::custom(OptionRank::TRANSPORT, false, move |s| s.transport = Some(transport.clone()))
	}

	/// Sets the deadline applied to requests that carry none.
	pub fn timeout(timeout: Duration) -> Self {
		Self::custom(OptionRank::TIMEOUT, false, move |s| s.timeout = Some(timeout))
	}

	/// Installs the hook returned by `factory`.
	///
	/// The factory sees the final settings, so a hook built from `settings.logger` always uses
	/// the configured logger whatever order the options were given in.
	pub fn request_trace(
		factory: impl 'static + Fn(&ClientSettings) -> Arc<dyn RequestTrace> + Send + Sync,
	) -> Self {
		Self::custom(OptionRank::REQUEST_TRACE, true, move |s| {
			s.request_trace = Some(factory(s));
		})
	}

	/// Installs a [`LoggingRequestTrace`] writing to the client logger at DEBUG.
	pub fn logging_request_trace() -> Self {
		Self::request_trace(|s| Arc::new(LoggingRequestTrace::new(s.logger.clone(), Level::DEBUG)))
	}

	/// Returns the option's rank.
	pub fn rank(&self) -> OptionRank {
		self.rank
	}

	/// Returns `true` if the option is re-applied after the first pass.
	pub fn is_dependent(&self) -> bool {
		self.dependent
	}
}
impl Debug for ClientOption {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientOption")
			.field("rank", &self.rank)
			.field("dependent", &self.dependent)
			.finish()
	}
}

/// Applies `options` to `settings` in rank order, then re-applies every dependent option.
///
/// Options sharing a rank run in registration order, so the last one wins.
pub fn apply_options(settings: &mut ClientSettings, options: &[ClientOption]) {
	let mut ordered = options.iter().collect::<Vec<_>>();

	ordered.sort_by_key(|option| option.rank);

	for option in &ordered {
		(option.apply)(settings);
	}
	for option in ordered.iter().filter(|option| option.dependent) {
		(option.apply)(settings);
	}
}
