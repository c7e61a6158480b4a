#![allow(dead_code)]

// std
use std::{
	env, fs,
	path::PathBuf,
	sync::Arc,
	time::{SystemTime, UNIX_EPOCH},
};
// crates.io
use es256_bearer::{
	obs::{RequestTrace, TraceEvent},
	token::KeyMaterial,
};
use parking_lot::Mutex;
use pkcs8::{EncodePrivateKey, LineEnding};
use rand::rngs::OsRng;

/// Writes a fresh P-256 PKCS#8 PEM to a unique temp file and returns its path.
pub fn write_p256_pem(tag: &str) -> PathBuf {
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System clock should be after the Unix epoch.")
		.as_nanos();
	let path =
		env::temp_dir().join(format!("es256-bearer-it-{tag}-{}-{nanos}.p8", std::process::id()));
	let pem = p256::SecretKey::random(&mut OsRng)
		.to_pkcs8_pem(LineEnding::LF)
		.expect("Fresh key should encode as PKCS#8 PEM.");

	fs::write(&path, pem.as_bytes()).expect("Temp key file should be writable.");

	path
}

/// Loads a freshly generated P-256 key through the PEM file path.
pub fn p256_key(tag: &str) -> KeyMaterial {
	let path = write_p256_pem(tag);
	let key = KeyMaterial::load_pkcs8_file(&path).expect("Generated key file should load.");

	fs::remove_file(&path).ok();

	key
}

/// Trace hook that records milestone names, plus the `Authorization` value it was shown.
#[derive(Clone, Debug, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);
impl EventLog {
	pub fn trace(&self) -> Arc<dyn RequestTrace> {
		let sink = self.0.clone();

		Arc::new(move |event: &TraceEvent<'_>| {
			let line = match event {
				TraceEvent::WroteHeaders { headers, .. } => format!(
					"WroteHeaders {}",
					headers
						.get("authorization")
						.and_then(|value| value.to_str().ok())
						.unwrap_or_default()
				),
				TraceEvent::GotConn { version, reused, .. } =>
					format!("GotConn {version:?} reused={reused}"),
				TraceEvent::GotFirstResponseByte { status } =>
					format!("GotFirstResponseByte {}", status.as_u16()),
				other => other.name().to_owned(),
			};

			sink.lock().push(line);
		})
	}

	pub fn names(&self) -> Vec<String> {
		self.0.lock().clone()
	}

	pub fn contains(&self, prefix: &str) -> bool {
		self.0.lock().iter().any(|line| line.starts_with(prefix))
	}
}
