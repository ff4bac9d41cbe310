use std::fmt;
use std::str::FromStr;

use crate::PprofError;

/// A named category of runtime diagnostic sample.
///
/// The names follow the well known pprof profile names so existing tooling and
/// configuration carry over unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
	/// Sampled call stacks, captured over a duration.
	Cpu,
	/// Async runtime tasks (the tokio counterpart of goroutines).
	Goroutine,
	/// Heap allocation counters.
	Heap,
	/// Live OS threads of the process.
	ThreadCreate,
	/// Blocking on synchronization primitives.
	Block,
	/// Mutex contention.
	Mutex,
}

impl ProfileKind {
	pub const ALL: [ProfileKind; 6] = [
		ProfileKind::Cpu,
		ProfileKind::Goroutine,
		ProfileKind::Heap,
		ProfileKind::ThreadCreate,
		ProfileKind::Block,
		ProfileKind::Mutex,
	];

	/// The canonical name of the kind.
	pub const fn name(self) -> &'static str {
		match self {
			ProfileKind::Cpu => "cpu",
			ProfileKind::Goroutine => "goroutine",
			ProfileKind::Heap => "heap",
			ProfileKind::ThreadCreate => "threadcreate",
			ProfileKind::Block => "block",
			ProfileKind::Mutex => "mutex",
		}
	}

	/// Returns true if the capture samples over a duration instead of
	/// returning a point in time snapshot.
	pub const fn is_sampled(self) -> bool {
		matches!(self, ProfileKind::Cpu)
	}

	/// Returns true if this host can capture the kind.
	///
	/// Rust has no runtime hooks for block or mutex contention, so those kinds
	/// are recognized but never captured.
	pub const fn is_supported(self) -> bool {
		!matches!(self, ProfileKind::Block | ProfileKind::Mutex)
	}
}

impl fmt::Display for ProfileKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for ProfileKind {
	type Err = PprofError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let name = s.trim();
		ProfileKind::ALL
			.into_iter()
			.find(|kind| kind.name().eq_ignore_ascii_case(name))
			.ok_or_else(|| PprofError::UnknownKind(name.to_owned()))
	}
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use super::ProfileKind;
	use crate::PprofError;

	#[test]
	fn parse_names() {
		for kind in ProfileKind::ALL {
			assert_eq!(kind.name().parse::<ProfileKind>().unwrap(), kind);
		}

		assert_eq!(" Heap ".parse::<ProfileKind>().unwrap(), ProfileKind::Heap);
		assert!(matches!(
			"allocs".parse::<ProfileKind>(),
			Err(PprofError::UnknownKind(name)) if name == "allocs"
		));
	}

	#[test]
	fn supported() {
		assert!(ProfileKind::Cpu.is_supported());
		assert!(ProfileKind::Goroutine.is_supported());
		assert!(!ProfileKind::Block.is_supported());
		assert!(!ProfileKind::Mutex.is_supported());
		assert!(ProfileKind::Cpu.is_sampled());
		assert!(!ProfileKind::Heap.is_sampled());
	}
}
