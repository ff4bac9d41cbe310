use serde::Serialize;

use crate::PprofError;

/// A snapshot of the async runtime driving the process.
///
/// This is the closest analogue of a goroutine profile: the number of live
/// tasks and the workers polling them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskProfile {
	pub flavor: String,
	pub workers: usize,
	pub alive_tasks: usize,
}

impl TaskProfile {
	/// Capture the runtime metrics of the given runtime.
	pub fn capture(handle: &tokio::runtime::Handle) -> Self {
		let metrics = handle.metrics();

		Self {
			flavor: format!("{:?}", handle.runtime_flavor()),
			workers: metrics.num_workers(),
			alive_tasks: metrics.num_alive_tasks(),
		}
	}

	/// Capture the runtime metrics of the runtime the caller is running in.
	pub fn capture_current() -> Result<Self, PprofError> {
		let handle = tokio::runtime::Handle::try_current().map_err(|_| PprofError::NoRuntime)?;
		Ok(Self::capture(&handle))
	}
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use super::TaskProfile;
	use crate::PprofError;

	#[test]
	fn no_runtime() {
		assert!(matches!(TaskProfile::capture_current(), Err(PprofError::NoRuntime)));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn counts_tasks() {
		let (tx, rx) = tokio::sync::oneshot::channel::<()>();
		let task = tokio::spawn(async move {
			let _ = rx.await;
		});

		let profile = TaskProfile::capture_current().unwrap();
		assert_eq!(profile.workers, 2);
		assert!(profile.alive_tasks >= 1);
		assert_eq!(profile.flavor, "MultiThread");

		tx.send(()).unwrap();
		task.await.unwrap();
	}
}
