//! ES256 compact-token minting, concurrency-safe token caching, and an HTTP/1.1 + HTTP/2
//! client that attaches the cached token as a bearer credential on every request.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod error;
pub mod obs;
pub mod token;
pub mod transport;
pub mod unix_millis;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Semaphore;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tracing::Dispatch;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, http as _, httpmock as _};
