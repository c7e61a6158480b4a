//! Timestamps carried on the wire as integer milliseconds since the Unix epoch.

// crates.io
use serde::{Deserializer, Serializer, de::Error as _};
use time::format_description::well_known::Rfc3339;
// self
use crate::_prelude::*;

const NANOS_PER_MILLI: i128 = 1_000_000;

/// UTC instant that serializes as milliseconds since the Unix epoch.
///
/// Sub-millisecond precision is dropped on serialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixMillis(OffsetDateTime);
impl UnixMillis {
	/// Wraps `instant`, normalized to UTC.
	pub fn new(instant: OffsetDateTime) -> Self {
		Self(instant.to_offset(time::UtcOffset::UTC))
	}

	/// Builds an instant from a millisecond count.
	pub fn from_millis(millis: i64) -> Result<Self, time::error::ComponentRange> {
		OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * NANOS_PER_MILLI).map(Self)
	}

	/// Returns the millisecond count, rounding toward negative infinity.
	pub fn millis(self) -> i64 {
		self.0.unix_timestamp_nanos().div_euclid(NANOS_PER_MILLI) as i64
	}

	/// Returns the wrapped instant.
	pub fn get(self) -> OffsetDateTime {
		self.0
	}
}
impl From<OffsetDateTime> for UnixMillis {
	fn from(instant: OffsetDateTime) -> Self {
		Self::new(instant)
	}
}
impl From<UnixMillis> for OffsetDateTime {
	fn from(value: UnixMillis) -> Self {
		value.0
	}
}
impl Display for UnixMillis {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0.format(&Rfc3339).map_err(|_| std::fmt::Error)?)
	}
}
impl Serialize for UnixMillis {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(self.millis())
	}
}
impl<'de> Deserialize<'de> for UnixMillis {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let millis = i64::deserialize(deserializer)?;

		Self::from_millis(millis).map_err(D::Error::custom)
	}
}
