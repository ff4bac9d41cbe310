use chrono::{DateTime, Utc};
use profsnap_pprof::PayloadFormat;

/// A single captured profile, handed to a sink and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSnapshot {
	/// The configured kind name.
	pub kind: String,
	/// The tick that produced this snapshot, starting at 1.
	pub tick: u64,
	/// When the capture started.
	pub captured_at: DateTime<Utc>,
	pub format: PayloadFormat,
	/// Opaque profile data, encoded as described by `format`.
	pub payload: Vec<u8>,
}

impl ProfileSnapshot {
	/// A file name unique per kind and tick, e.g.
	/// `heap-000003-20240101T120000.000Z.json`.
	pub fn file_name(&self) -> String {
		format!(
			"{}-{:06}-{}.{}",
			sanitize(&self.kind),
			self.tick,
			self.captured_at.format("%Y%m%dT%H%M%S%.3fZ"),
			self.format.extension()
		)
	}
}

pub(crate) fn sanitize(kind: &str) -> String {
	kind.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
		.collect()
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use chrono::{TimeZone, Utc};
	use profsnap_pprof::PayloadFormat;

	use super::ProfileSnapshot;

	#[test]
	fn file_name() {
		let snapshot = ProfileSnapshot {
			kind: "heap".into(),
			tick: 3,
			captured_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
			format: PayloadFormat::Json,
			payload: Vec::new(),
		};
		assert_eq!(snapshot.file_name(), "heap-000003-20240101T120000.000Z.json");

		let snapshot = ProfileSnapshot {
			kind: "../cpu".into(),
			format: PayloadFormat::PprofGzip,
			..snapshot
		};
		assert_eq!(snapshot.file_name(), "___cpu-000003-20240101T120000.000Z.pb.gz");
	}
}
