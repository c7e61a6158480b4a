//! Key material, ES256 signing, compact-token encoding, and the cached token provider.

pub mod jwt;
pub mod key;
pub mod provider;
pub mod secret;
pub mod signer;

pub use jwt::*;
pub use key::*;
pub use provider::*;
pub use secret::*;
pub use signer::*;
