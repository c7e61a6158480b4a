//! HTTP/1.1 + HTTP/2 transport construction.
//!
//! [`TransportBuilder`] turns a [`TransportConfig`] into a [`BuiltTransport`] whose layers are
//! exposed as plain structs, plus the [`ReqwestTransport`] that actually dispatches requests.
//! HTTP/2 is negotiated through ALPN on TLS connections; plain-text connections stay on
//! HTTP/1.1.

pub mod connect;
pub mod limit;
pub mod provider;
pub mod resolve;

pub use provider::*;

// std
use std::time::Duration;
// crates.io
use reqwest::{Certificate, Request, Response, tls::Version};
// self
use crate::{
	_prelude::*,
	error::{RequestError, TransportConfigError},
	transport::{connect::TracingConnectLayer, limit::HostLimits, resolve::TracingResolver},
};

/// Default TCP connect deadline.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(30);
/// Default TCP keep-alive probe interval.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
/// Default lifetime of an idle pooled connection.
pub const DEFAULT_IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(90);
/// Default cap on concurrent requests per `host:port`.
pub const DEFAULT_MAX_CONNS_PER_HOST: usize = 30;
/// Default cap on idle pooled connections per `host:port`.
pub const DEFAULT_MAX_IDLE_CONNS_PER_HOST: usize = 30;
/// Default HTTP/2 keep-alive ping interval.
pub const DEFAULT_READ_IDLE_TIMEOUT: Duration = Duration::from_secs(15);
/// Default deadline for an HTTP/2 ping acknowledgement.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(15);
/// Default end-to-end request deadline.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Boxed future returned by [`Transport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Response, RequestError>> + 'a + Send>>;

/// Dispatches fully prepared requests.
pub trait Transport
where
	Self: Send + Sync,
{
	/// Sends `request` and resolves once response headers arrive.
	fn execute(&self, request: Request) -> TransportFuture<'_>;

	/// Deadline for requests that carry none of their own; zero disables it.
	fn http_timeout(&self) -> Duration {
		DEFAULT_HTTP_TIMEOUT
	}

	/// Drops idle pooled connections. In-flight requests are not interrupted.
	fn close_idle_connections(&self) {}
}

/// Minimum TLS protocol version accepted during the handshake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsVersion {
	/// TLS 1.2.
	Tls1_2,
	/// TLS 1.3.
	#[default]
	Tls1_3,
}
impl TlsVersion {
	fn to_reqwest(self) -> Version {
		match self {
			TlsVersion::Tls1_2 => Version::TLS_1_2,
			TlsVersion::Tls1_3 => Version::TLS_1_3,
		}
	}
}

/// TLS settings applied to every connection.
#[derive(Clone, Debug)]
pub struct TlsPolicy {
	/// Lowest protocol version the client will negotiate.
	pub min_version: TlsVersion,
	/// Additional trust anchors.
	pub root_certificates: Vec<Certificate>,
	/// Whether the bundled web PKI roots are trusted.
	pub built_in_roots: bool,
	/// Skips certificate verification. Only meant for local development servers.
	pub accept_invalid_certs: bool,
}
impl Default for TlsPolicy {
	fn default() -> Self {
		Self {
			min_version: TlsVersion::default(),
			root_certificates: Vec::new(),
			built_in_roots: true,
			accept_invalid_certs: false,
		}
	}
}

/// Complete transport configuration.
///
/// `max_conns_per_host` caps concurrent in-flight requests per `host:port`, counting every
/// HTTP/2 stream, since reqwest does not expose a cap on sockets. Zero disables it.
#[derive(Clone, Debug)]
pub struct TransportConfig {
	/// TCP connect deadline.
	pub dial_timeout: Duration,
	/// TCP keep-alive probe interval.
	pub keep_alive: Duration,
	/// Lifetime of an idle pooled connection.
	pub idle_conn_timeout: Duration,
	/// Cap on concurrent in-flight requests per `host:port` (0 = unlimited).
	pub max_conns_per_host: usize,
	/// Cap on idle pooled connections per `host:port`.
	pub max_idle_conns_per_host: usize,
	/// HTTP/2 keep-alive ping interval on otherwise idle connections.
	pub read_idle_timeout: Duration,
	/// Deadline for a ping acknowledgement before the connection is recycled.
	pub ping_timeout: Duration,
	/// End-to-end deadline for requests that carry none of their own.
	pub http_timeout: Duration,
	/// TLS settings.
	pub tls: TlsPolicy,
	/// Whether HTTP/2 may be negotiated.
	pub http2: bool,
}
impl TransportConfig {
	/// Overrides the TCP connect deadline.
	pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
		self.dial_timeout = timeout;

		self
	}

	/// Overrides the TCP keep-alive interval.
	pub fn with_keep_alive(mut self, interval: Duration) -> Self {
		self.keep_alive = interval;

		self
	}

	/// Overrides the idle connection lifetime.
	pub fn with_idle_conn_timeout(mut self, timeout: Duration) -> Self {
		self.idle_conn_timeout = timeout;

		self
	}

	/// Overrides the per-host caps on in-flight requests and idle connections.
	pub fn with_pool_limits(mut self, max_conns: usize, max_idle: usize) -> Self {
		self.max_conns_per_host = max_conns;
		self.max_idle_conns_per_host = max_idle;

		self
	}

	/// Overrides the HTTP/2 ping interval and acknowledgement deadline.
	pub fn with_http2_liveness(mut self, read_idle: Duration, ping: Duration) -> Self {
		self.read_idle_timeout = read_idle;
		self.ping_timeout = ping;

		self
	}

	/// Overrides the default request deadline.
	pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
		self.http_timeout = timeout;

		self
	}

	/// Replaces the TLS policy.
	pub fn with_tls(mut self, tls: TlsPolicy) -> Self {
		self.tls = tls;

		self
	}

	/// Enables or disables HTTP/2 negotiation.
	pub fn with_http2(mut self, enabled: bool) -> Self {
		self.http2 = enabled;

		self
	}

	fn validate(&self) -> Result<(), TransportConfigError> {
		if self.max_conns_per_host != 0 && self.max_idle_conns_per_host > self.max_conns_per_host {
			return Err(TransportConfigError::InvalidPoolLimits {
				max_idle: self.max_idle_conns_per_host,
				max_conns: self.max_conns_per_host,
			});
		}
		if self.http2 {
			if self.read_idle_timeout.is_zero() {
				return Err(TransportConfigError::InvalidHttp2Liveness {
					field: "read_idle_timeout",
				});
			}
			if self.ping_timeout.is_zero() {
				return Err(TransportConfigError::InvalidHttp2Liveness { field: "ping_timeout" });
			}
		}

		Ok(())
	}

	fn http1_layer(&self) -> Http1Layer {
		Http1Layer {
			dial_timeout: self.dial_timeout,
			keep_alive: self.keep_alive,
			idle_conn_timeout: self.idle_conn_timeout,
			max_conns_per_host: self.max_conns_per_host,
			max_idle_conns_per_host: self.max_idle_conns_per_host,
		}
	}

	fn http2_layer(&self) -> Option<Http2Layer> {
		self.http2.then_some(Http2Layer {
			read_idle_timeout: self.read_idle_timeout,
			ping_timeout: self.ping_timeout,
		})
	}

	fn client(&self) -> Result<ReqwestClient, TransportConfigError> {
		let mut builder = ReqwestClient::builder()
			.use_rustls_tls()
			.connect_timeout(self.dial_timeout)
			.tcp_keepalive(self.keep_alive)
			.pool_idle_timeout(self.idle_conn_timeout)
			.pool_max_idle_per_host(self.max_idle_conns_per_host)
			.min_tls_version(self.tls.min_version.to_reqwest())
			.tls_built_in_root_certs(self.tls.built_in_roots)
			.danger_accept_invalid_certs(self.tls.accept_invalid_certs)
			.dns_resolver(Arc::new(TracingResolver))
			.connector_layer(TracingConnectLayer);

		for certificate in &self.tls.root_certificates {
			builder = builder.add_root_certificate(certificate.clone());
		}

		if !self.http_timeout.is_zero() {
			builder = builder.timeout(self.http_timeout);
		}

		builder = if self.http2 {
			builder
				.http2_keep_alive_interval(self.read_idle_timeout)
				.http2_keep_alive_timeout(self.ping_timeout)
				.http2_keep_alive_while_idle(true)
		} else {
			builder.http1_only()
		};

		Ok(builder.build()?)
	}
}
impl Default for TransportConfig {
	fn default() -> Self {
		Self {
			dial_timeout: DEFAULT_DIAL_TIMEOUT,
			keep_alive: DEFAULT_KEEP_ALIVE,
			idle_conn_timeout: DEFAULT_IDLE_CONN_TIMEOUT,
			max_conns_per_host: DEFAULT_MAX_CONNS_PER_HOST,
			max_idle_conns_per_host: DEFAULT_MAX_IDLE_CONNS_PER_HOST,
			read_idle_timeout: DEFAULT_READ_IDLE_TIMEOUT,
			ping_timeout: DEFAULT_PING_TIMEOUT,
			http_timeout: DEFAULT_HTTP_TIMEOUT,
			tls: TlsPolicy::default(),
			http2: true,
		}
	}
}

/// HTTP/1.1 connection settings as applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Http1Layer {
	/// TCP connect deadline.
	pub dial_timeout: Duration,
	/// TCP keep-alive interval.
	pub keep_alive: Duration,
	/// Idle connection lifetime.
	pub idle_conn_timeout: Duration,
	/// Per-host request cap (0 = unlimited).
	pub max_conns_per_host: usize,
	/// Per-host idle connection cap.
	pub max_idle_conns_per_host: usize,
}

/// HTTP/2 liveness settings as applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Http2Layer {
	/// Ping interval while idle.
	pub read_idle_timeout: Duration,
	/// Ping acknowledgement deadline.
	pub ping_timeout: Duration,
}

/// Result of [`TransportBuilder::build`].
#[derive(Clone, Debug)]
pub struct BuiltTransport {
	/// HTTP/1.1 layer.
	pub http1: Http1Layer,
	/// HTTP/2 layer; `None` when HTTP/2 was disabled.
	pub http2: Option<Http2Layer>,
	/// TLS policy in effect.
	pub tls: TlsPolicy,
	/// Dispatching transport.
	pub transport: Arc<ReqwestTransport>,
}

/// Builds [`ReqwestTransport`]s from configuration.
#[derive(Clone, Debug)]
pub struct TransportBuilder {
	logger: Dispatch,
}
impl TransportBuilder {
	/// Creates a builder whose transports discard their events.
	pub fn new() -> Self {
		Self { logger: Dispatch::none() }
	}

	/// Routes events of built transports to `logger`.
	pub fn with_logger(mut self, logger: Dispatch) -> Self {
		self.logger = logger;

		self
	}

	/// Validates `config` and builds a transport that owns a copy of it.
	pub fn build(&self, config: &TransportConfig) -> Result<BuiltTransport, TransportConfigError> {
		let config = config.clone();

		config.validate()?;

		let client = config.client()?;

		Ok(BuiltTransport {
			http1: config.http1_layer(),
			http2: config.http2_layer(),
			tls: config.tls.clone(),
			transport: Arc::new(ReqwestTransport {
				client: RwLock::new(client),
				limits: HostLimits::new(config.max_conns_per_host),
				logger: self.logger.clone(),
				config,
			}),
		})
	}
}
impl Default for TransportBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// [`Transport`] backed by a pooled reqwest client.
pub struct ReqwestTransport {
	config: TransportConfig,
	client: RwLock<ReqwestClient>,
	limits: HostLimits,
	logger: Dispatch,
}
impl ReqwestTransport {
	/// Returns the configuration this transport was built from.
	pub fn config(&self) -> &TransportConfig {
		&self.config
	}
}
impl Transport for ReqwestTransport {
	fn execute(&self, request: Request) -> TransportFuture<'_> {
		Box::pin(async move {
			let _permit = self.limits.acquire(&host_port(request.url())).await;
			let client = self.client.read().clone();

			Ok(client.execute(request).await?)
		})
	}

	fn http_timeout(&self) -> Duration {
		self.config.http_timeout
	}

	fn close_idle_connections(&self) {
		match self.config.client() {
			Ok(client) => {
				*self.client.write() = client;

				tracing::dispatcher::with_default(&self.logger, || {
					tracing::debug!("Idle connections closed.");
				});
			},
			Err(e) => tracing::dispatcher::with_default(&self.logger, || {
				tracing::warn!(
					error = %e,
					"Failed to rebuild the connection pool; keeping the old one."
				);
			}),
		}
	}
}
impl Debug for ReqwestTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReqwestTransport").field("config", &self.config).finish()
	}
}

/// Returns the `host:port` key of `url`, using the scheme's default port when none is given.
pub(crate) fn host_port(url: &Url) -> String {
	let host = url.host_str().unwrap_or_default();

	match url.port_or_known_default() {
		Some(port) => format!("{host}:{port}"),
		None => host.to_owned(),
	}
}
