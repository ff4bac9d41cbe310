use std::time::Duration;

use crate::heap::{self, HeapProfile};
use crate::{Cpu, PprofError, ProfileKind, TaskProfile, ThreadProfile};

/// The encoding of a captured payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadFormat {
	/// Gzip compressed pprof protobuf.
	PprofGzip,
	/// A JSON document.
	Json,
}

impl PayloadFormat {
	/// The file extension conventionally used for the format.
	pub const fn extension(self) -> &'static str {
		match self {
			PayloadFormat::PprofGzip => "pb.gz",
			PayloadFormat::Json => "json",
		}
	}
}

/// The raw result of a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
	pub format: PayloadFormat,
	pub payload: Vec<u8>,
}

impl Captured {
	fn json<T: serde::Serialize>(value: &T) -> Result<Self, PprofError> {
		Ok(Self {
			format: PayloadFormat::Json,
			payload: serde_json::to_vec(value)?,
		})
	}
}

/// Captures any [`ProfileKind`] supported by this host.
#[derive(Clone, Default)]
pub struct Profiler {
	cpu: Cpu,
	runtime: Option<tokio::runtime::Handle>,
}

impl Profiler {
	pub fn new(cpu: Cpu) -> Self {
		Self { cpu, runtime: None }
	}

	/// Use the given runtime for `goroutine` captures instead of the runtime
	/// of the calling thread.
	pub fn with_runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
		self.runtime = Some(runtime);
		self
	}

	/// Capture a profile of the named kind.
	pub fn capture_named(&self, kind: &str, duration: Duration) -> Result<Captured, PprofError> {
		self.capture(kind.parse()?, duration)
	}

	/// Capture a profile of the given kind.
	///
	/// Sampled kinds block for `duration`, the others return immediately and
	/// ignore it.
	pub fn capture(&self, kind: ProfileKind, duration: Duration) -> Result<Captured, PprofError> {
		match kind {
			ProfileKind::Cpu => Ok(Captured {
				format: PayloadFormat::PprofGzip,
				payload: self.cpu.capture(duration)?,
			}),
			ProfileKind::Goroutine => {
				let profile = match &self.runtime {
					Some(handle) => TaskProfile::capture(handle),
					None => TaskProfile::capture_current()?,
				};
				Captured::json(&profile)
			}
			ProfileKind::Heap => match heap::jemalloc_pprof()? {
				Some(payload) => Ok(Captured {
					format: PayloadFormat::PprofGzip,
					payload,
				}),
				None => Captured::json(&HeapProfile::snapshot()),
			},
			ProfileKind::ThreadCreate => Captured::json(&ThreadProfile::capture()?),
			ProfileKind::Block | ProfileKind::Mutex => Err(PprofError::Unsupported(kind)),
		}
	}
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::{PayloadFormat, Profiler};
	use crate::{PprofError, ProfileKind};

	#[test]
	fn heap_falls_back_to_counters() {
		let captured = Profiler::default().capture(ProfileKind::Heap, Duration::ZERO).unwrap();
		assert_eq!(captured.format, PayloadFormat::Json);

		let value: serde_json::Value = serde_json::from_slice(&captured.payload).unwrap();
		assert!(value.get("inuse_space").is_some());
	}

	#[test]
	fn unsupported_and_unknown() {
		let profiler = Profiler::default();

		assert!(matches!(
			profiler.capture(ProfileKind::Mutex, Duration::ZERO),
			Err(PprofError::Unsupported(ProfileKind::Mutex))
		));
		assert!(matches!(
			profiler.capture_named("block", Duration::ZERO),
			Err(PprofError::Unsupported(ProfileKind::Block))
		));
		assert!(matches!(
			profiler.capture_named("nope", Duration::ZERO),
			Err(PprofError::UnknownKind(_))
		));
	}

	#[test]
	fn goroutine_with_explicit_runtime() {
		let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
		let profiler = Profiler::default().with_runtime(runtime.handle().clone());

		let captured = profiler.capture(ProfileKind::Goroutine, Duration::ZERO).unwrap();
		let value: serde_json::Value = serde_json::from_slice(&captured.payload).unwrap();
		assert_eq!(value["flavor"], "CurrentThread");
		assert_eq!(value["workers"], 1);
	}

	#[test]
	fn extensions() {
		assert_eq!(PayloadFormat::PprofGzip.extension(), "pb.gz");
		assert_eq!(PayloadFormat::Json.extension(), "json");
	}
}
