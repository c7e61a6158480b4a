//! Strategies for handing transports to clients.
//!
//! [`FreshTransportProvider`] builds an independent transport (and connection pool) on every
//! call. [`SharedTransportProvider`] builds once and hands every caller the same transport, so
//! all clients created from it share one pool.

// std
use std::sync::OnceLock;
// self
use crate::{
	_prelude::*,
	error::TransportConfigError,
	transport::{ReqwestTransport, Transport, TransportBuilder, TransportConfig},
};

/// Source of the transport a client dispatches through.
pub trait TransportProvider
where
	Self: Send + Sync,
{
	/// Returns a transport ready for use.
	fn transport(&self) -> Result<Arc<dyn Transport>>;
}

/// Builds a new transport for every call.
#[derive(Clone, Debug, Default)]
pub struct FreshTransportProvider {
	config: TransportConfig,
	builder: TransportBuilder,
}
impl FreshTransportProvider {
	/// Creates a provider building from `config`.
	pub fn new(config: TransportConfig) -> Self {
		Self { config, builder: TransportBuilder::new() }
	}

	/// Replaces the builder, e.g. to attach a logger.
	pub fn with_builder(mut self, builder: TransportBuilder) -> Self {
		self.builder = builder;

		self
	}

	/// Returns the configuration transports are built from.
	pub fn config(&self) -> &TransportConfig {
		&self.config
	}
}
impl TransportProvider for FreshTransportProvider {
	fn transport(&self) -> Result<Arc<dyn Transport>> {
		Ok(self.builder.build(&self.config)?.transport)
	}
}

/// Builds one transport on first use and returns it to every caller.
///
/// The first build's outcome is final: a failure is returned to every later caller as
/// [`TransportConfigError::Shared`].
#[derive(Debug, Default)]
pub struct SharedTransportProvider {
	config: TransportConfig,
	builder: TransportBuilder,
	cell: OnceLock<Result<Arc<ReqwestTransport>, Arc<TransportConfigError>>>,
}
impl SharedTransportProvider {
	/// Creates a provider that will build from `config` on first use.
	pub fn new(config: TransportConfig) -> Self {
		Self { config, builder: TransportBuilder::new(), cell: OnceLock::new() }
	}

	/// Replaces the builder, e.g. to attach a logger.
	pub fn with_builder(mut self, builder: TransportBuilder) -> Self {
		self.builder = builder;

		self
	}

	/// Returns the configuration the shared transport is built from.
	pub fn config(&self) -> &TransportConfig {
		&self.config
	}

	/// Returns `true` once the one-time build has run.
	pub fn is_initialized(&self) -> bool {
		self.cell.get().is_some()
	}
}
impl TransportProvider for SharedTransportProvider {
	fn transport(&self) -> Result<Arc<dyn Transport>> {
		let built = self.cell.get_or_init(|| {
			self.builder.build(&self.config).map(|built| built.transport).map_err(Arc::new)
		});

		match built {
			Ok(transport) => Ok(transport.clone()),
			Err(e) => Err(TransportConfigError::Shared(e.clone()).into()),
		}
	}
}
