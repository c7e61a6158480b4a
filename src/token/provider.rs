//! Cached ES256 token provider.
//!
//! [`CachingTokenProvider`] owns a single [`CachedToken`] slot. Readers take the shared lock and
//! return the cached secret while `now < expires_at`; the first caller past expiry takes the
//! exclusive lock, re-checks the slot (another caller may have minted while it waited), and
//! only then signs a fresh token. A failed mint leaves the slot untouched so the next call
//! starts over.

// self
use crate::{
	_prelude::*,
	obs::{self, MintOutcome},
	token::{EcdsaSigner, Header, KeyMaterial, Payload, Signer, TokenSecret, jwt},
};

/// Default lifetime of a minted token.
pub const TOKEN_TTL: Duration = Duration::minutes(30);

/// Source of bearer tokens for outbound requests.
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Returns a token valid at `now`, minting one when the cached token is missing or expired.
	fn token(&self, now: OffsetDateTime) -> Result<TokenSecret>;
}

/// Immutable minted token plus the instants that bound its validity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedToken {
	/// Compact token string.
	pub token: TokenSecret,
	/// Instant encoded as `iat` (truncated to whole seconds in the token itself).
	pub issued_at: OffsetDateTime,
	/// Instant from which the token is no longer served.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Returns `true` while `instant` precedes the expiry.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}

/// Token provider that signs ES256 tokens for one key and caches them for a fixed TTL.
pub struct CachingTokenProvider {
	slot: RwLock<Option<CachedToken>>,
	signer: Box<dyn Signer>,
	key_id: String,
	issuer: String,
	ttl: Duration,
	logger: Dispatch,
}
impl CachingTokenProvider {
	/// Creates a provider signing with `key` under key identifier `key_id` and issuer `issuer`.
	///
	/// Events are discarded until a logger is attached with
	/// [`with_logger`](Self::with_logger).
	pub fn new(key_id: impl Into<String>, issuer: impl Into<String>, key: KeyMaterial) -> Self {
		Self {
			slot: RwLock::new(None),
			signer: Box::new(EcdsaSigner::new(key)),
			key_id: key_id.into(),
			issuer: issuer.into(),
			ttl: TOKEN_TTL,
			logger: Dispatch::none(),
		}
	}

	/// Overrides the token lifetime (defaults to [`TOKEN_TTL`]).
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;

		self
	}

	/// Replaces the signer, e.g. to change the prehash function.
	pub fn with_signer(mut self, signer: impl 'static + Signer) -> Self {
		self.signer = Box::new(signer);

		self
	}

	/// Routes provider events to `logger`.
	pub fn with_logger(mut self, logger: Dispatch) -> Self {
		self.logger = logger;

		self
	}

	/// Returns the configured token lifetime.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Returns the currently cached token, if any, regardless of expiry.
	pub fn cached(&self) -> Option<CachedToken> {
		self.slot.read().clone()
	}

	fn mint(&self, now: OffsetDateTime) -> Result<CachedToken> {
		let header = Header::es256(&self.key_id);
		let payload = Payload { iss: self.issuer.clone(), iat: now.unix_timestamp() };
		let token = jwt::encode(&header, &payload, self.signer.as_ref())?;

		Ok(CachedToken {
			token: TokenSecret::new(token),
			issued_at: now,
			expires_at: now + self.ttl,
		})
	}
}
impl TokenProvider for CachingTokenProvider {
	fn token(&self, now: OffsetDateTime) -> Result<TokenSecret> {
		if let Some(cached) = self.slot.read().as_ref().filter(|c| c.is_valid_at(now)) {
			return Ok(cached.token.clone());
		}

		let mut slot = self.slot.write();

		if let Some(cached) = slot.as_ref().filter(|c| c.is_valid_at(now)) {
			return Ok(cached.token.clone());
		}

		let minted = match self.mint(now) {
			Ok(minted) => minted,
			Err(e) => {
				drop(slot);
				obs::record_token_mint(MintOutcome::Failure);
				tracing::dispatcher::with_default(&self.logger, || {
					tracing::warn!(key_id = %self.key_id, error = %e, "Token signing failed.");
				});

				return Err(e);
			},
		};
		let token = minted.token.clone();
		let expires_at = minted.expires_at;

		*slot = Some(minted);

		drop(slot);
		obs::record_token_mint(MintOutcome::Success);
		tracing::dispatcher::with_default(&self.logger, || {
			tracing::info!(key_id = %self.key_id, %expires_at, "Token generated successfully.");
		});

		Ok(token)
	}
}
impl Debug for CachingTokenProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachingTokenProvider")
			.field("key_id", &self.key_id)
			.field("issuer", &self.issuer)
			.field("ttl", &self.ttl)
			.field("cached", &self.slot.read().is_some())
			.finish()
	}
}
