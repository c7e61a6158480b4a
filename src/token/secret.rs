//! Redacting wrapper for minted compact tokens.

// self
use crate::_prelude::*;

/// Compact token string that stays out of logs.
///
/// Clones share the same allocation, so handing the cached token to many concurrent requests
/// never copies it.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(Arc<str>);
impl TokenSecret {
	/// Wraps a token string.
	pub fn new(value: impl Into<Arc<str>>) -> Self {
		Self(value.into())
	}

	/// Returns the raw token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("header.payload.signature");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(secret.expose(), "header.payload.signature");
	}
}
