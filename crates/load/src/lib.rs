//! # profsnap-load
//!
//! Throwaway load generators that give scheduled profiles something to show.
//!
//! - [`SpinGuard`]: one busy-spin thread per processing unit for
//!   [`BUSY_SPIN_WINDOW`], at most once per process.
//! - [`grow_allocations`]: a slow, bursty growing list of strings.
//! - [`burn_cpu`]: a short burst of pseudorandom number generation.
//!
//! None of them can fail. They only consume CPU and memory.
//!
//! ## License
//!
//! This project is licensed under the MIT or Apache-2.0 license. You can
//! choose between one of them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]

mod burn;
mod grow;
mod spin;

pub use burn::{burn_cpu, burn_cpu_with, BurnReport, BURN_ITERATIONS};
pub use grow::{grow_allocations, GROWTH_ITEM, GROWTH_ITERATIONS, GROWTH_PAUSE, GROWTH_PAUSE_EVERY};
pub use spin::{SpinGeneration, SpinGuard, BUSY_SPIN_WINDOW};

/// What a call to [`generate_artificial_load`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
	/// True if this call started the process wide busy-spin workers.
	pub busy_spin_started: bool,
	/// True if an allocation run was spawned.
	pub growth_spawned: bool,
	pub burn: BurnReport,
}

/// Produce some CPU, thread and allocation activity for the profiler.
///
/// The busy-spin workers start on the first call only, the allocation run is
/// spawned on every call and the CPU burn runs on the caller's thread.
/// Without a tokio runtime only the CPU burn runs.
pub fn generate_artificial_load() -> LoadReport {
	generate_with(SpinGuard::global())
}

fn generate_with(spin: &SpinGuard) -> LoadReport {
	let (busy_spin_started, growth_spawned) = match tokio::runtime::Handle::try_current() {
		Ok(runtime) => {
			let started = spin.start();
			runtime.spawn(async {
				grow_allocations().await;
			});
			(started, true)
		}
		Err(_) => {
			tracing::warn!("no tokio runtime, only generating cpu load");
			(false, false)
		}
	};

	LoadReport {
		busy_spin_started,
		growth_spawned,
		burn: burn_cpu(),
	}
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use super::{generate_with, SpinGuard, BURN_ITERATIONS};

	#[test]
	fn without_runtime() {
		let spin = SpinGuard::new();
		let report = generate_with(&spin);

		assert!(!report.busy_spin_started);
		assert!(!report.growth_spawned);
		assert_eq!(report.burn.iterations, BURN_ITERATIONS);
		assert!(!spin.is_started());
	}

	#[tokio::test(start_paused = true)]
	async fn repeated_triggers() {
		let spin = SpinGuard::new();

		let first = generate_with(&spin);
		assert!(first.busy_spin_started);
		assert!(first.growth_spawned);

		for _ in 0..4 {
			let report = generate_with(&spin);
			assert!(!report.busy_spin_started);
			assert!(report.growth_spawned);
		}

		let generation = spin.generation().unwrap();
		generation.cancel();
		generation.join();
		assert_eq!(generation.active(), 0);
	}
}
