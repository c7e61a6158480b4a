//! Three-segment compact token encoding (`header.payload.signature`).

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{
	_prelude::*,
	error::EncodingError,
	token::Signer,
};

/// Algorithm identifier for ECDSA over P-256 with SHA-256.
pub const ES256: &str = "ES256";

/// Compact-token header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
	/// Signing algorithm.
	pub alg: String,
	/// Identifier of the signing key.
	pub kid: String,
}
impl Header {
	/// Builds an [`ES256`] header for `kid`.
	pub fn es256(kid: impl Into<String>) -> Self {
		Self { alg: ES256.into(), kid: kid.into() }
	}
}

/// Compact-token claims.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
	/// Issuer identifier.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub iss: String,
	/// Issued-at, seconds since the Unix epoch.
	#[serde(default, skip_serializing_if = "is_zero")]
	pub iat: i64,
}

/// Segments of a compact token after base64url decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedSegments {
	/// Header JSON bytes.
	pub header: Vec<u8>,
	/// Payload JSON bytes.
	pub payload: Vec<u8>,
	/// Raw signature bytes.
	pub signature: Vec<u8>,
}
impl DecodedSegments {
	/// Deserializes the header segment.
	pub fn header<H>(&self) -> Result<H, serde_json::Error>
	where
		H: for<'de> Deserialize<'de>,
	{
		serde_json::from_slice(&self.header)
	}

	/// Deserializes the payload segment.
	pub fn payload<P>(&self) -> Result<P, serde_json::Error>
	where
		P: for<'de> Deserialize<'de>,
	{
		serde_json::from_slice(&self.payload)
	}
}

/// Serializes `header` and `payload`, signs `b64(header).b64(payload)` with `signer`, and
/// returns the three-segment compact token.
pub fn encode<H, P>(header: &H, payload: &P, signer: &dyn Signer) -> Result<String>
where
	H: ?Sized + Serialize,
	P: ?Sized + Serialize,
{
	let header = serde_json::to_vec(header).map_err(EncodingError::Header)?;
	let payload = serde_json::to_vec(payload).map_err(EncodingError::Payload)?;
	let mut token = URL_SAFE_NO_PAD.encode(header);

	token.push('.');
	URL_SAFE_NO_PAD.encode_string(payload, &mut token);

	let signature = signer.sign(token.as_bytes())?;

	token.push('.');
	URL_SAFE_NO_PAD.encode_string(signature, &mut token);

	Ok(token)
}

/// Splits a compact token into its decoded segments.
///
/// Returns `None` unless the token has exactly three valid base64url segments. No signature
/// check is performed.
pub fn decode_segments(token: &str) -> Option<DecodedSegments> {
	let mut parts = token.split('.');
	let header = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;
	let payload = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;
	let signature = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;

	if parts.next().is_some() {
		return None;
	}

	Some(DecodedSegments { header, payload, signature })
}

fn is_zero(value: &i64) -> bool {
	*value == 0
}
