//! Observability helpers: outcome labels, optional metrics, and the request-trace hook.
//!
//! # Feature Flags
//!
//! - Enable `metrics` to increment `es256_bearer_token_mint_total` for every mint attempt and
//!   `es256_bearer_request_total` for every dispatched request, both labeled by `outcome`.
//!
//! Structured events always go through [`tracing`] on the logger owned by the emitting
//! component, never the process-global subscriber unless the caller passed it in.

mod metrics;
mod trace;

pub use metrics::*;
pub use trace::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for every token mint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MintOutcome {
	/// A fresh token was signed and cached.
	Success,
	/// Signing or encoding failed; the cache was left unchanged.
	Failure,
}
impl MintOutcome {
	/// Returns a stable label suitable for metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			MintOutcome::Success => "success",
			MintOutcome::Failure => "failure",
		}
	}
}
impl Display for MintOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for every request passed to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
	/// The transport returned a response (any status).
	Response,
	/// The token provider failed; nothing was dispatched.
	TokenFailure,
	/// The transport failed.
	TransportFailure,
}
impl RequestOutcome {
	/// Returns a stable label suitable for metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestOutcome::Response => "response",
			RequestOutcome::TokenFailure => "token_failure",
			RequestOutcome::TransportFailure => "transport_failure",
		}
	}
}
impl Display for RequestOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
