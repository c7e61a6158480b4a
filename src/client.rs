//! Bearer-authenticated HTTP client.
//!
//! [`AuthenticatingClient`] fetches a token from its [`TokenProvider`] before every request,
//! attaches it as `Authorization: Bearer <token>`, and hands the request to its [`Transport`].
//! A token failure aborts the request before anything reaches the network.

pub mod option;

pub use option::*;

// std
use std::time::{Duration, Instant};
// crates.io
use reqwest::{
	Method, Request, Response,
	header::{AUTHORIZATION, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	error::RequestError,
	obs::{self, RequestOutcome, RequestScope, RequestTrace, TraceEvent},
	token::TokenProvider,
	transport::{self, Transport, TransportProvider},
};

macro_rules! bearer_scheme {
	() => {
		"Bearer"
	};
}

/// Authorization scheme placed before the token.
pub const BEARER_SCHEME: &str = bearer_scheme!();

const REDACTED_CREDENTIAL: &str = concat!(bearer_scheme!(), " <redacted>");

/// Collects the inputs of an [`AuthenticatingClient`].
pub struct AuthenticatingClientBuilder {
	base_url: Url,
	token_provider: Arc<dyn TokenProvider>,
	transport_provider: Arc<dyn TransportProvider>,
	options: Vec<ClientOption>,
}
impl AuthenticatingClientBuilder {
	/// Registers one option.
	pub fn option(mut self, option: ClientOption) -> Self {
		self.options.push(option);

		self
	}

	/// Registers several options.
	pub fn options(mut self, options: impl IntoIterator<Item = ClientOption>) -> Self {
		self.options.extend(options);

		self
	}

	/// Applies the options and resolves the transport.
	///
	/// The transport provider is consulted only when no option supplied a transport. Without a
	/// timeout option the client adopts the transport's
	/// [`http_timeout`](Transport::http_timeout).
	pub fn build(self) -> Result<AuthenticatingClient> {
		let mut settings = ClientSettings::default();

		apply_options(&mut settings, &self.options);

		let transport = match settings.transport.clone() {
			Some(transport) => transport,
			None => self.transport_provider.transport()?,
		};
		let timeout = settings.timeout.unwrap_or_else(|| transport.http_timeout());

		tracing::dispatcher::with_default(&settings.logger, || {
			tracing::debug!(
				base_url = %self.base_url,
				development = settings.development,
				?timeout,
				"Client constructed."
			);
		});

		Ok(AuthenticatingClient {
			base_url: self.base_url,
			token_provider: self.token_provider,
			transport,
			timeout,
			settings,
		})
	}
}
impl Debug for AuthenticatingClientBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatingClientBuilder")
			.field("base_url", &self.base_url.as_str())
			.field("options", &self.options)
			.finish()
	}
}

/// HTTP client that authenticates every request with a cached bearer token.
pub struct AuthenticatingClient {
	base_url: Url,
	token_provider: Arc<dyn TokenProvider>,
	transport: Arc<dyn Transport>,
	timeout: Duration,
	settings: ClientSettings,
}
impl AuthenticatingClient {
	/// Starts a builder for a client rooted at `base_url`.
	pub fn builder(
		base_url: Url,
		token_provider: Arc<dyn TokenProvider>,
		transport_provider: Arc<dyn TransportProvider>,
	) -> AuthenticatingClientBuilder {
		AuthenticatingClientBuilder {
			base_url,
			token_provider,
			transport_provider,
			options: Vec::new(),
		}
	}

	/// Builds a request for `path` resolved against the base URL.
	pub fn request(&self, method: Method, path: &str) -> Result<Request> {
		let url = self.base_url.join(path).map_err(RequestError::from)?;

		Ok(Request::new(method, url))
	}

	/// Authenticates and dispatches `request`.
	///
	/// Responses are returned as-is whatever their status. The request's own timeout wins over
	/// the client timeout; otherwise the client timeout covers token fetch and dispatch together.
	pub async fn execute(&self, mut request: Request) -> Result<Response> {
		let started = Instant::now();
		let token = match self.token_provider.token(OffsetDateTime::now_utc()) {
			Ok(token) => token,
			Err(e) => {
				obs::record_request(RequestOutcome::TokenFailure);
				tracing::dispatcher::with_default(&self.settings.logger, || {
					tracing::warn!(
						url = %request.url(),
						error = %e,
						"Token unavailable; request not sent."
					);
				});

				return Err(e);
			},
		};
		let mut credential = HeaderValue::from_str(&format!("{BEARER_SCHEME} {}", token.expose()))
			.map_err(RequestError::from)?;

		credential.set_sensitive(true);
		request.headers_mut().insert(AUTHORIZATION, credential);

		if request.timeout().is_none() && !self.timeout.is_zero() {
			let remaining = self.timeout.saturating_sub(started.elapsed());

			*request.timeout_mut() = Some(remaining);
		}

		let scope = self.settings.request_trace.clone().map(RequestScope::new);

		if let Some(trace) = &scope {
			let mut headers = request.headers().clone();

			headers.insert(AUTHORIZATION, HeaderValue::from_static(REDACTED_CREDENTIAL));

			let host_port = transport::host_port(request.url());

			trace.on_event(&TraceEvent::GetConn { host_port: &host_port });
			trace.on_event(&TraceEvent::WroteHeaders {
				method: request.method(),
				url: request.url(),
				headers: &headers,
			});
		}

		let method = request.method().clone();
		let url = request.url().clone();

		tracing::dispatcher::with_default(&self.settings.logger, || {
			tracing::debug!(%method, %url, "Dispatching request.");
		});

		let bound = scope.clone().map(|scope| scope as Arc<dyn RequestTrace>);

		match obs::bind(bound, self.transport.execute(request)).await {
			Ok(response) => {
				if let Some(trace) = &scope {
					trace.on_event(&TraceEvent::GotConn {
						remote_addr: response.remote_addr(),
						version: response.version(),
						reused: !trace.dialed(),
					});
					trace
						.on_event(&TraceEvent::GotFirstResponseByte { status: response.status() });
				}

				obs::record_request(RequestOutcome::Response);
				tracing::dispatcher::with_default(&self.settings.logger, || {
					tracing::debug!(
						%method,
						%url,
						status = response.status().as_u16(),
						"Response received."
					);
				});

				Ok(response)
			},
			Err(e) => {
				if let Some(trace) = &scope {
					trace.on_event(&TraceEvent::RequestFailed { error: &e });
				}

				obs::record_request(RequestOutcome::TransportFailure);
				tracing::dispatcher::with_default(&self.settings.logger, || {
					tracing::warn!(%method, %url, error = %e, "Request failed.");
				});

				Err(e.into())
			},
		}
	}

	/// Drops the transport's idle connections.
	pub fn close_idle_connections(&self) {
		self.transport.close_idle_connections();
	}

	/// Returns the base URL requests are resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Returns `true` when development mode is on.
	pub fn is_development(&self) -> bool {
		self.settings.development
	}

	/// Returns the deadline applied to requests without one (zero when disabled).
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Returns the client logger.
	pub fn logger(&self) -> &Dispatch {
		&self.settings.logger
	}

	/// Returns `true` when a request trace hook is installed.
	pub fn has_request_trace(&self) -> bool {
		self.settings.request_trace.is_some()
	}
}
impl Debug for AuthenticatingClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatingClient")
			.field("base_url", &self.base_url.as_str())
			.field("timeout", &self.timeout)
			.field("settings", &self.settings)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{io, time::Duration};
	// self
	use super::*;
	use crate::{
		_preludet::*,
		error::SigningError,
		token::{CachingTokenProvider, TokenSecret, decode_segments},
	};

	#[derive(Clone, Debug, PartialEq, Eq)]
	struct Seen {
		authorization: Option<String>,
		timeout: Option<Duration>,
	}

	#[derive(Default)]
	struct FakeTransport {
		seen: Mutex<Vec<Seen>>,
		fail: bool,
		closed: Mutex<usize>,
		http_timeout: Option<Duration>,
	}
	impl Transport for FakeTransport {
		fn execute(&self, request: Request) -> transport::TransportFuture<'_> {
			self.seen.lock().push(Seen {
				authorization: request
					.headers()
					.get(AUTHORIZATION)
					.and_then(|v| v.to_str().ok())
					.map(str::to_owned),
				timeout: request.timeout().copied(),
			});

			let fail = self.fail;

			Box::pin(async move {
				if fail {
					return Err(RequestError::network(io::Error::other("connection reset")));
				}

				let response = http::Response::builder()
					.status(503)
					.body("unavailable")
					.expect("Fixture response should build.");

				Ok(Response::from(response))
			})
		}

		fn http_timeout(&self) -> Duration {
			self.http_timeout.unwrap_or(transport::DEFAULT_HTTP_TIMEOUT)
		}

		fn close_idle_connections(&self) {
			*self.closed.lock() += 1;
		}
	}

	struct StaticProvider(Arc<FakeTransport>);
	impl TransportProvider for StaticProvider {
		fn transport(&self) -> Result<Arc<dyn Transport>> {
			Ok(self.0.clone())
		}
	}

	struct BrokenProvider;
	impl TransportProvider for BrokenProvider {
		fn transport(&self) -> Result<Arc<dyn Transport>> {
			Err(crate::error::TransportConfigError::InvalidPoolLimits { max_idle: 2, max_conns: 1 }
				.into())
		}
	}

	struct NoKeyProvider;
	impl TokenProvider for NoKeyProvider {
		fn token(&self, _: OffsetDateTime) -> Result<TokenSecret> {
			Err(SigningError::MissingKey.into())
		}
	}

	fn base_url() -> Url {
		Url::parse("https://api.example.com/v1/").expect("Fixture URL should parse.")
	}

	fn client_with(
		token_provider: Arc<dyn TokenProvider>,
		transport: Arc<FakeTransport>,
		options: Vec<ClientOption>,
	) -> AuthenticatingClient {
		let transport_provider = Arc::new(StaticProvider(transport));

		AuthenticatingClient::builder(base_url(), token_provider, transport_provider)
			.options(options)
			.build()
			.expect("Client should build.")
	}

	#[tokio::test]
	async fn token_failure_dispatches_nothing() {
		let transport = Arc::new(FakeTransport::default());
		let client = client_with(Arc::new(NoKeyProvider), transport.clone(), Vec::new());
		let request = client.request(Method::GET, "apps").expect("Request should build.");
		let err = client.execute(request).await.expect_err("Token failure should surface.");

		assert!(matches!(err, Error::Signing(SigningError::MissingKey)));
		assert!(transport.seen.lock().is_empty());
	}

	#[tokio::test]
	async fn bearer_credential_and_default_timeout_are_attached() {
		let transport = Arc::new(FakeTransport::default());
		let provider = Arc::new(CachingTokenProvider::new("ABC123", "TEAM1", p256_key()));
		let client = client_with(provider, transport.clone(), Vec::new());
		let request = client.request(Method::GET, "apps").expect("Request should build.");

		assert_eq!(request.url().as_str(), "https://api.example.com/v1/apps");

		let response = client.execute(request).await.expect("Fake transport should respond.");

		assert_eq!(response.status(), 503);

		let seen = transport.seen.lock().clone();
		let authorization =
			seen[0].authorization.as_deref().expect("Authorization header should be set.");
		let token = authorization.strip_prefix("Bearer ").expect("Scheme should be Bearer.");
		let timeout = seen[0].timeout.expect("Client timeout should be applied.");

		assert!(decode_segments(token).is_some());
		assert!(timeout <= Duration::from_secs(60) && timeout > Duration::from_secs(59));
	}

	#[tokio::test]
	async fn request_timeout_wins_over_client_timeout() {
		let transport = Arc::new(FakeTransport::default());
		let provider = Arc::new(CachingTokenProvider::new("kid", "iss", p256_key()));
		let client = client_with(
			provider,
			transport.clone(),
			vec![ClientOption::timeout(Duration::from_secs(5))],
		);
		let mut with_own = client.request(Method::GET, "a").expect("Request should build.");

		*with_own.timeout_mut() = Some(Duration::from_secs(1));
		client.execute(with_own).await.expect("Fake transport should respond.");
		client
			.execute(client.request(Method::GET, "b").expect("Request should build."))
			.await
			.expect("Fake transport should respond.");

		let timeouts = transport.seen.lock().iter().map(|s| s.timeout).collect::<Vec<_>>();

		assert_eq!(timeouts[0], Some(Duration::from_secs(1)));
		assert!(
			timeouts[1].is_some_and(|t| t <= Duration::from_secs(5) && t > Duration::from_secs(4))
		);
		assert_eq!(client.timeout(), Duration::from_secs(5));
	}

	#[tokio::test]
	async fn transport_deadline_applies_without_a_timeout_option() {
		let transport = Arc::new(FakeTransport {
			http_timeout: Some(Duration::from_secs(90)),
			..Default::default()
		});
		let provider = Arc::new(CachingTokenProvider::new("kid", "iss", p256_key()));
		let client = client_with(provider.clone(), transport.clone(), Vec::new());

		assert_eq!(client.timeout(), Duration::from_secs(90));

		client
			.execute(client.request(Method::GET, "apps").expect("Request should build."))
			.await
			.expect("Fake transport should respond.");

		let timeout = transport.seen.lock()[0].timeout.expect("Transport deadline should apply.");

		assert!(timeout <= Duration::from_secs(90) && timeout > Duration::from_secs(89));

		let unbounded =
			Arc::new(FakeTransport { http_timeout: Some(Duration::ZERO), ..Default::default() });
		let client = client_with(provider, unbounded.clone(), Vec::new());

		client
			.execute(client.request(Method::GET, "apps").expect("Request should build."))
			.await
			.expect("Fake transport should respond.");

		assert_eq!(unbounded.seen.lock()[0].timeout, None);
	}

	#[test]
	fn redacted_credential_keeps_the_scheme() {
		assert_eq!(REDACTED_CREDENTIAL, format!("{BEARER_SCHEME} <redacted>"));
	}

	#[tokio::test]
	async fn trace_sees_milestones_with_the_credential_redacted() {
		let events = Arc::new(Mutex::new(Vec::new()));
		let sink = events.clone();
		let transport = Arc::new(FakeTransport::default());
		let provider = Arc::new(CachingTokenProvider::new("kid", "iss", p256_key()));
		let client = client_with(
			provider,
			transport,
			vec![ClientOption::request_trace(move |_| {
				let sink = sink.clone();

				Arc::new(move |event: &TraceEvent<'_>| {
					let line = match event {
						TraceEvent::WroteHeaders { headers, .. } => format!(
							"WroteHeaders {}",
							headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).unwrap_or("")
						),
						TraceEvent::GetConn { host_port } => format!("GetConn {host_port}"),
						TraceEvent::GotConn { reused, .. } => format!("GotConn reused={reused}"),
						other => other.name().to_owned(),
					};

					sink.lock().push(line);
				})
			})],
		);

		assert!(client.has_request_trace());

		client
			.execute(client.request(Method::POST, "apps").expect("Request should build."))
			.await
			.expect("Fake transport should respond.");

		assert_eq!(
			*events.lock(),
			vec![
				"GetConn api.example.com:443".to_owned(),
				"WroteHeaders Bearer <redacted>".to_owned(),
				"GotConn reused=true".to_owned(),
				"GotFirstResponseByte".to_owned(),
			]
		);
	}

	#[tokio::test]
	async fn transport_failure_is_reported_and_returned() {
		let events = Arc::new(Mutex::new(Vec::new()));
		let sink = events.clone();
		let transport = Arc::new(FakeTransport { fail: true, ..Default::default() });
		let provider = Arc::new(CachingTokenProvider::new("kid", "iss", p256_key()));
		let client = client_with(
			provider,
			transport,
			vec![ClientOption::request_trace(move |_| {
				let sink = sink.clone();

				Arc::new(move |event: &TraceEvent<'_>| sink.lock().push(event.name()))
			})],
		);
		let err = client
			.execute(client.request(Method::GET, "apps").expect("Request should build."))
			.await
			.expect_err("Transport failure should surface.");

		assert!(matches!(err, Error::Request(RequestError::Network { .. })));
		assert_eq!(events.lock().last(), Some(&"RequestFailed"));
	}

	#[test]
	fn transport_option_bypasses_the_provider() {
		let provider = Arc::new(CachingTokenProvider::new("kid", "iss", p256_key()));
		let err =
			AuthenticatingClient::builder(base_url(), provider.clone(), Arc::new(BrokenProvider))
				.build()
				.err()
				.expect("Broken provider should fail the build.");

		assert!(matches!(err, Error::TransportConfig(_)));

		let transport = Arc::new(FakeTransport::default());
		let client = AuthenticatingClient::builder(base_url(), provider, Arc::new(BrokenProvider))
			.option(ClientOption::transport(transport.clone()))
			.option(ClientOption::development())
			.build()
			.expect("Custom transport should bypass the provider.");

		client.close_idle_connections();

		assert!(client.is_development());
		assert_eq!(*transport.closed.lock(), 1);
		assert_eq!(client.base_url(), &base_url());
	}

	#[test]
	fn client_events_reach_the_configured_logger() {
		let recorder = RecordingSubscriber::default();
		let provider = Arc::new(CachingTokenProvider::new("kid", "iss", p256_key()));
		let client = client_with(
			provider,
			Arc::new(FakeTransport::default()),
			vec![ClientOption::logger(Dispatch::new(recorder.clone()))],
		);

		assert!(recorder.contains("Client constructed."));
		assert!(client.logger().is::<RecordingSubscriber>());
		assert!(client.request(Method::GET, "http://[::1").is_err());
	}
}
