//! Crate-level error taxonomy shared by key loading, signing, transport construction, and
//! request dispatch.

// std
use std::path::PathBuf;
// self
use crate::{_prelude::*, token::Curve};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Every failure is returned to the immediate caller; nothing is retried or downgraded to a
/// log line.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Private key could not be loaded.
	#[error(transparent)]
	KeyLoad(#[from] KeyLoadError),
	/// Token signature could not be produced.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// Token header or payload could not be serialized.
	#[error(transparent)]
	Encoding(#[from] EncodingError),
	/// HTTP transport could not be constructed.
	#[error(transparent)]
	TransportConfig(#[from] TransportConfigError),
	/// Outbound request failed.
	#[error(transparent)]
	Request(#[from] RequestError),
}

/// Failures raised while loading a PKCS#8 private key.
#[derive(Debug, ThisError)]
pub enum KeyLoadError {
	/// Key file could not be read.
	#[error("Failed to read key file {path}.")]
	Io {
		/// Path that was read.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Input is not a PEM-encoded `PRIVATE KEY` block.
	#[error("Key input does not contain valid PKCS#8 PEM data.")]
	MalformedPem {
		/// Underlying PEM/DER failure, when one was reported.
		#[source]
		source: Option<pkcs8::der::Error>,
	},
	/// PKCS#8 block holds a non elliptic-curve key.
	#[error("Private key is not an elliptic-curve key (algorithm {algorithm}).")]
	NotEcKey {
		/// Dotted OID of the key algorithm that was found.
		algorithm: String,
	},
	/// Elliptic-curve key uses a curve other than P-256.
	#[error("Private key uses unsupported curve {curve}; expected P-256.")]
	UnsupportedCurve {
		/// Curve label or dotted OID that was found.
		curve: String,
	},
	/// Key body failed to decode.
	#[error("Private key body is invalid.")]
	InvalidKey {
		/// Underlying PKCS#8 failure.
		#[source]
		source: pkcs8::Error,
	},
}

/// Failures raised while producing a token signature.
#[derive(Debug, ThisError)]
pub enum SigningError {
	/// Signer holds no key material.
	#[error("Signer is missing its private key.")]
	MissingKey,
	/// Key curve is not the 256-bit named curve.
	#[error("Unsupported curve {curve}: expected P-256, got {bits} bits.")]
	UnsupportedCurve {
		/// Curve carried by the key.
		curve: Curve,
		/// Bit size of that curve.
		bits: usize,
	},
	/// Elliptic-curve signing failed.
	#[error("ECDSA signing failed.")]
	Crypto {
		/// Underlying signature failure.
		#[source]
		source: p256::ecdsa::Error,
	},
	/// Caller-supplied signer failed.
	#[error("Signer failed: {message}.")]
	Other {
		/// Signer-supplied message.
		message: String,
	},
}

/// Failures raised while serializing compact-token segments.
#[derive(Debug, ThisError)]
pub enum EncodingError {
	/// Header could not be serialized to JSON.
	#[error("Failed to serialize the token header to JSON.")]
	Header(#[source] serde_json::Error),
	/// Payload could not be serialized to JSON.
	#[error("Failed to serialize the token payload to JSON.")]
	Payload(#[source] serde_json::Error),
}

/// Failures raised while constructing the HTTP transport.
#[derive(Debug, ThisError)]
pub enum TransportConfigError {
	/// Idle cap exceeds the total connection cap.
	#[error(
		"Idle connection cap {max_idle} exceeds the per-host connection cap {max_conns}."
	)]
	InvalidPoolLimits {
		/// Configured idle cap.
		max_idle: usize,
		/// Configured total cap.
		max_conns: usize,
	},
	/// HTTP/2 liveness settings cannot drive ping frames.
	#[error("HTTP/2 {field} must be greater than zero.")]
	InvalidHttp2Liveness {
		/// Offending configuration field.
		field: &'static str,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying builder failure.
		#[source]
		source: BoxError,
	},
	/// Shared transport failed its one-time build; every caller observes the same failure.
	#[error("Shared transport failed to build.")]
	Shared(#[source] Arc<TransportConfigError>),
}
impl TransportConfigError {
	/// Wraps a transport builder failure.
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised while dispatching a request.
#[derive(Debug, ThisError)]
pub enum RequestError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while dispatching the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request path could not be joined onto the client base URL.
	#[error("Request URL is invalid.")]
	InvalidUrl(#[from] url::ParseError),
	/// Token could not be encoded into an `Authorization` header value.
	#[error("Token cannot be used as an HTTP header value.")]
	InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}
impl RequestError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for RequestError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
