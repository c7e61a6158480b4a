// self
use crate::obs::{MintOutcome, RequestOutcome};

/// Records a token mint outcome via the global metrics recorder (when enabled).
pub fn record_token_mint(outcome: MintOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("es256_bearer_token_mint_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records a request outcome via the global metrics recorder (when enabled).
pub fn record_request(outcome: RequestOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("es256_bearer_request_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}
