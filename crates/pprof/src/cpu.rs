use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use pprof::protos::Message;

use crate::PprofError;

/// A CPU profiler.
///
/// Call [`Cpu::capture`] to capture a pprof profile for the given duration.
#[derive(Clone)]
pub struct Cpu(pprof::ProfilerGuardBuilder);

impl Default for Cpu {
	fn default() -> Self {
		Self::new::<&str>(Cpu::DEFAULT_FREQUENCY, &[])
	}
}

impl Cpu {
	/// Sampling frequency used by [`Cpu::default`], in Hz.
	pub const DEFAULT_FREQUENCY: i32 = 100;

	/// Create a new CPU profiler.
	///
	/// - `frequency` is the sampling frequency in Hz.
	/// - `blocklist` is a list of libraries to exclude from the profile.
	pub fn new<S: AsRef<str>>(frequency: i32, blocklist: &[S]) -> Self {
		Self(
			pprof::ProfilerGuardBuilder::default()
				.frequency(frequency)
				.blocklist(blocklist),
		)
	}

	/// Capture a pprof profile for the given duration.
	///
	/// The profile is compressed using gzip and can be analyzed using the
	/// `pprof` tool.
	///
	/// <div class="warning">
	/// Warning: This method is blocking for the whole duration.
	///
	/// Only one CPU capture can run per process; a second concurrent call
	/// fails with a [`PprofError::Pprof`] error.
	/// </div>
	pub fn capture(&self, duration: std::time::Duration) -> Result<Vec<u8>, PprofError> {
		let profiler = self.0.clone().build()?;

		std::thread::sleep(duration);

		let report = profiler.report().build()?;

		let pprof = report.pprof()?;

		let mut gz = GzEncoder::new(Vec::new(), Compression::default());
		gz.write_all(&pprof.encode_to_vec())?;
		Ok(gz.finish()?)
	}
}
