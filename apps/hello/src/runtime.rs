use std::future::Future;
use std::time::Duration;

/// Run `future` to completion, then shut the runtime down, waiting at most
/// `timeout` for blocking tasks that are still running.
pub fn run<F: Future>(runtime: tokio::runtime::Runtime, future: F, timeout: Duration) -> F::Output {
	let output = runtime.block_on(future);
	runtime.shutdown_timeout(timeout);
	output
}

/// Tokio runtime settings read from `TOKIO_*` environment variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeSettings {
	/// `TOKIO_WORKER_THREADS`, all processing units when unset.
	pub worker_threads: Option<usize>,
	/// `TOKIO_MAX_BLOCKING_THREADS`
	pub max_blocking_threads: Option<usize>,
	/// `TOKIO_THREAD_STACK_SIZE`
	pub thread_stack_size: Option<usize>,
}

impl RuntimeSettings {
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let parse = |key: &str| lookup(key).and_then(|value| value.trim().parse::<usize>().ok());

		Self {
			worker_threads: parse("TOKIO_WORKER_THREADS")
				.or_else(|| std::thread::available_parallelism().ok().map(|p| p.get())),
			max_blocking_threads: parse("TOKIO_MAX_BLOCKING_THREADS"),
			thread_stack_size: parse("TOKIO_THREAD_STACK_SIZE"),
		}
	}

	/// A current thread runtime for a single worker, multi thread otherwise.
	pub fn builder(&self) -> tokio::runtime::Builder {
		let mut builder = if let Some(1) = self.worker_threads {
			tokio::runtime::Builder::new_current_thread()
		} else {
			tokio::runtime::Builder::new_multi_thread()
		};

		if let Some(worker_threads) = self.worker_threads {
			builder.worker_threads(worker_threads);
		}

		if let Some(max_blocking_threads) = self.max_blocking_threads {
			builder.max_blocking_threads(max_blocking_threads);
		}

		if let Some(thread_stack_size) = self.thread_stack_size {
			builder.thread_stack_size(thread_stack_size);
		}

		builder.enable_all();
		builder
	}
}
