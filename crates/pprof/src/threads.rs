use serde::Serialize;

use crate::PprofError;

/// One OS thread of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadInfo {
	pub tid: u64,
	pub name: String,
}

/// The live OS threads of the process, the counterpart of a `threadcreate`
/// profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadProfile {
	pub count: usize,
	pub threads: Vec<ThreadInfo>,
}

impl ThreadProfile {
	#[cfg(target_os = "linux")]
	pub fn capture() -> Result<Self, PprofError> {
		let mut threads = Vec::new();

		for entry in std::fs::read_dir("/proc/self/task")? {
			let entry = entry?;
			let Some(tid) = entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()) else {
				continue;
			};

			// A thread can exit between listing the directory and reading its name.
			let name = match std::fs::read_to_string(entry.path().join("comm")) {
				Ok(name) => name.trim_end().to_owned(),
				Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
				Err(err) => return Err(err.into()),
			};

			threads.push(ThreadInfo { tid, name });
		}

		threads.sort_by_key(|t| t.tid);

		Ok(Self {
			count: threads.len(),
			threads,
		})
	}

	#[cfg(not(target_os = "linux"))]
	pub fn capture() -> Result<Self, PprofError> {
		Err(PprofError::Unsupported(crate::ProfileKind::ThreadCreate))
	}
}
