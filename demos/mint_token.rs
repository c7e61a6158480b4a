//! Demonstrates minting a cached ES256 token from a PKCS#8 key file and calling a bearer-secured
//! endpoint through a shared HTTP/2-capable transport while printing request milestones.

// std
use std::{env, fs, sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use pkcs8::{EncodePrivateKey, LineEnding};
use rand::rngs::OsRng;
// self
use es256_bearer::{
	client::{AuthenticatingClient, ClientOption},
	obs::{RequestTrace, TraceEvent},
	reqwest::Method,
	token::{CachingTokenProvider, KeyMaterial},
	transport::{SharedTransportProvider, TransportConfig},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let key_path = env::temp_dir().join(format!("es256-bearer-demo-{}.p8", std::process::id()));
	let pem = p256::SecretKey::random(&mut OsRng).to_pkcs8_pem(LineEnding::LF)?;

	fs::write(&key_path, pem.as_bytes())?;

	let key = KeyMaterial::load_pkcs8_file(&key_path)?;

	fs::remove_file(&key_path)?;

	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/apps").header_exists("authorization");
			then.status(200).header("content-type", "application/json").body("{\"data\":[]}");
		})
		.await;
	let tokens = Arc::new(CachingTokenProvider::new("ABC123DEFG", "TEAM123456", key));
	let transports = Arc::new(SharedTransportProvider::new(TransportConfig::default()));
	let base_url = Url::parse(&format!("http://{}/v1/", server.address()))?;
	let client = AuthenticatingClient::builder(base_url, tokens, transports)
		.options([
			ClientOption::request_trace(|_| {
				Arc::new(|event: &TraceEvent<'_>| println!("{}: {event:?}", event.name()))
					as Arc<dyn RequestTrace>
			}),
			ClientOption::timeout(Duration::from_secs(10)),
		])
		.build()?;
	let response = client.execute(client.request(Method::GET, "apps")?).await?;

	println!("Status {}: {}.", response.status(), response.text().await?);

	mock.assert_async().await;

	Ok(())
}
