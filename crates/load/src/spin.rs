use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How long a generation of busy-spin workers runs.
pub const BUSY_SPIN_WINDOW: Duration = Duration::from_secs(20);

/// Allows at most one generation of busy-spin workers.
///
/// Use [`SpinGuard::global`] for the process wide guard.
#[derive(Debug, Default)]
pub struct SpinGuard {
	generation: OnceLock<SpinGeneration>,
}

impl SpinGuard {
	pub const fn new() -> Self {
		Self {
			generation: OnceLock::new(),
		}
	}

	/// The process wide guard.
	pub fn global() -> &'static SpinGuard {
		static GLOBAL: SpinGuard = SpinGuard::new();
		&GLOBAL
	}

	pub fn is_started(&self) -> bool {
		self.generation.get().is_some()
	}

	/// The generation started through this guard, if any.
	pub fn generation(&self) -> Option<&SpinGeneration> {
		self.generation.get()
	}

	/// Start spinning for [`BUSY_SPIN_WINDOW`], unless a generation was
	/// already started.
	///
	/// Returns true if this call started the workers.
	pub fn start(&self) -> bool {
		self.start_with(async {
			tokio::time::sleep(BUSY_SPIN_WINDOW).await;
		})
	}

	/// Like [`SpinGuard::start`], but the workers stop once `window`
	/// completes.
	///
	/// Needs a tokio runtime to drive `window`. Without one nothing is started
	/// and false is returned.
	pub fn start_with<W>(&self, window: W) -> bool
	where
		W: Future<Output = ()> + Send + 'static,
	{
		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			tracing::debug!("no tokio runtime, not starting busy-spin workers");
			return false;
		};

		let mut started = false;
		self.generation.get_or_init(|| {
			started = true;
			SpinGeneration::spawn(available_workers(), window, &runtime)
		});

		started
	}
}

fn available_workers() -> usize {
	std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// One set of busy-spin worker threads.
#[derive(Debug)]
pub struct SpinGeneration {
	workers: usize,
	token: CancellationToken,
	active: Arc<AtomicUsize>,
	threads: Mutex<Vec<std::thread::JoinHandle<()>>>,
}

impl SpinGeneration {
	fn spawn<W>(workers: usize, window: W, runtime: &tokio::runtime::Handle) -> Self
	where
		W: Future<Output = ()> + Send + 'static,
	{
		let token = CancellationToken::new();
		let active = Arc::new(AtomicUsize::new(0));
		let mut threads = Vec::with_capacity(workers);

		for idx in 0..workers {
			let token = token.clone();
			let worker_active = active.clone();
			active.fetch_add(1, Ordering::SeqCst);

			let spawned = std::thread::Builder::new()
				.name(format!("busy-spin-{idx}"))
				.spawn(move || {
					while !token.is_cancelled() {
						std::hint::spin_loop();
					}
					worker_active.fetch_sub(1, Ordering::SeqCst);
				});

			match spawned {
				Ok(thread) => threads.push(thread),
				Err(err) => {
					active.fetch_sub(1, Ordering::SeqCst);
					tracing::warn!(error = %err, "failed to spawn busy-spin worker");
				}
			}
		}

		// Cancels the workers even if the runtime drops this task before the window closes.
		let guard = token.clone().drop_guard();
		runtime.spawn(async move {
			window.await;
			drop(guard);
			tracing::debug!("busy-spin window closed");
		});

		tracing::info!(workers = threads.len(), "started busy-spin workers");

		Self {
			workers: threads.len(),
			token,
			active,
			threads: Mutex::new(threads),
		}
	}

	/// Number of worker threads spawned.
	pub fn workers(&self) -> usize {
		self.workers
	}

	/// Number of workers still spinning.
	pub fn active(&self) -> usize {
		self.active.load(Ordering::SeqCst)
	}

	/// Returns true until the window closes or the generation is cancelled.
	pub fn is_running(&self) -> bool {
		!self.token.is_cancelled()
	}

	/// Close the window early.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Block until every worker has exited.
	///
	/// Only returns once the window has closed.
	pub fn join(&self) {
		let threads = match self.threads.lock() {
			Ok(mut threads) => std::mem::take(&mut *threads),
			Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
		};

		for thread in threads {
			if thread.join().is_err() {
				tracing::warn!("busy-spin worker panicked");
			}
		}
	}
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use std::sync::{Arc, Barrier};
	use std::time::Duration;

	use tokio_util::sync::CancellationToken;

	use super::{available_workers, SpinGuard, BUSY_SPIN_WINDOW};

	#[test]
	fn needs_runtime() {
		let guard = SpinGuard::new();
		assert!(!guard.start());
		assert!(!guard.is_started());
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn concurrent_starts_spawn_one_generation() {
		const CALLERS: usize = 8;

		let guard = Arc::new(SpinGuard::new());
		let window = CancellationToken::new();
		let barrier = Arc::new(Barrier::new(CALLERS));

		let callers = (0..CALLERS)
			.map(|_| {
				let guard = guard.clone();
				let window = window.clone();
				let barrier = barrier.clone();
				tokio::task::spawn_blocking(move || {
					barrier.wait();
					guard.start_with(window.cancelled_owned())
				})
			})
			.collect::<Vec<_>>();

		let mut started = 0;
		for caller in callers {
			if caller.await.unwrap() {
				started += 1;
			}
		}
		assert_eq!(started, 1);

		let generation = guard.generation().unwrap();
		assert_eq!(generation.workers(), available_workers());
		assert!(generation.is_running());

		// A later trigger does not add workers either.
		assert!(!guard.start());

		window.cancel();

		let generation_guard = guard.clone();
		tokio::task::spawn_blocking(move || generation_guard.generation().unwrap().join())
			.await
			.unwrap();

		let generation = guard.generation().unwrap();
		assert!(!generation.is_running());
		assert_eq!(generation.active(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn window_closes_after_twenty_seconds() {
		let guard = SpinGuard::new();
		assert!(guard.start());

		let generation = guard.generation().unwrap();
		assert_eq!(generation.active(), generation.workers());

		tokio::time::sleep(BUSY_SPIN_WINDOW - Duration::from_secs(1)).await;
		assert!(generation.is_running());

		tokio::time::sleep(Duration::from_secs(2)).await;
		assert!(!generation.is_running());

		generation.join();
		assert_eq!(generation.active(), 0);
	}
}
