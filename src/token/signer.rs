//! Raw fixed-width ECDSA signatures over arbitrary signing input.

// crates.io
use p256::ecdsa::{Signature, SigningKey, signature::hazmat::RandomizedPrehashSigner};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256, Sha384, Sha512};
// self
use crate::{
	_prelude::*,
	error::SigningError,
	token::{Curve, KeyMaterial},
};

/// Produces a raw signature over the provided signing input.
///
/// Implementations receive the full signing input (not a digest) and hash it themselves.
pub trait Signer
where
	Self: Send + Sync,
{
	/// Signs `input`, returning the raw signature bytes.
	fn sign(&self, input: &[u8]) -> Result<Vec<u8>, SigningError>;
}

/// Hash applied to the signing input before the ECDSA operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignatureHash {
	/// SHA-256, the ES256 hash.
	#[default]
	Sha256,
	/// SHA-384.
	Sha384,
	/// SHA-512.
	Sha512,
}
impl SignatureHash {
	/// Hashes `input` with the selected function.
	pub fn digest(self, input: &[u8]) -> Vec<u8> {
		match self {
			SignatureHash::Sha256 => Sha256::digest(input).to_vec(),
			SignatureHash::Sha384 => Sha384::digest(input).to_vec(),
			SignatureHash::Sha512 => Sha512::digest(input).to_vec(),
		}
	}
}

/// ECDSA signer emitting `r || s`, each left-padded to the curve's byte width.
///
/// Nonces are hedged with the operating-system RNG. Only P-256 keys are accepted, so the output
/// is always 64 bytes.
#[derive(Clone, Debug, Default)]
pub struct EcdsaSigner {
	key: Option<KeyMaterial>,
	hash: SignatureHash,
}
impl EcdsaSigner {
	/// Creates a SHA-256 signer over `key`.
	pub fn new(key: KeyMaterial) -> Self {
		Self { key: Some(key), hash: SignatureHash::default() }
	}

	/// Overrides the hash applied to the signing input.
	pub fn with_hash(mut self, hash: SignatureHash) -> Self {
		self.hash = hash;

		self
	}

	/// Returns the configured hash.
	pub fn hash(&self) -> SignatureHash {
		self.hash
	}
}
impl Signer for EcdsaSigner {
	fn sign(&self, input: &[u8]) -> Result<Vec<u8>, SigningError> {
		let key = self.key.as_ref().ok_or(SigningError::MissingKey)?;
		let secret = match key {
			KeyMaterial::P256(secret) => secret,
			other => {
				let curve = other.curve();

				return Err(SigningError::UnsupportedCurve { curve, bits: curve.bits() });
			},
		};
		let digest = self.hash.digest(input);
		let signature: Signature = SigningKey::from(secret)
			.sign_prehash_with_rng(&mut OsRng, &digest)
			.map_err(|source| SigningError::Crypto { source })?;
		let width = Curve::P256.bits().div_ceil(8);
		let (r, s) = signature.split_bytes();
		let mut out = vec![0; 2 * width];

		out[width - r.len()..width].copy_from_slice(&r);
		out[2 * width - s.len()..].copy_from_slice(&s);

		Ok(out)
	}
}
