use std::time::Duration;

/// The value appended on every iteration.
pub const GROWTH_ITEM: &str = "magical pandas";
/// Number of appends per run.
pub const GROWTH_ITERATIONS: usize = 128;
/// Pause every this many iterations, starting with the first.
pub const GROWTH_PAUSE_EVERY: usize = 32;
pub const GROWTH_PAUSE: Duration = Duration::from_millis(100);

const GROWTH_SEED_LEN: usize = 3;

/// Slowly grow a list of strings, pausing briefly now and then, to leave a
/// bursty allocation pattern in heap profiles.
///
/// Returns the final length of the list.
pub async fn grow_allocations() -> usize {
	let mut items = vec![String::new(); GROWTH_SEED_LEN];

	for idx in 0..GROWTH_ITERATIONS {
		items.push(GROWTH_ITEM.to_owned());

		if idx % GROWTH_PAUSE_EVERY == 0 {
			tokio::time::sleep(GROWTH_PAUSE).await;
		}
	}

	std::hint::black_box(&items).len()
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use super::{grow_allocations, GROWTH_PAUSE};

	#[tokio::test(start_paused = true)]
	async fn grows_in_bursts() {
		let start = tokio::time::Instant::now();

		assert_eq!(grow_allocations().await, 131);

		// Paused at iterations 0, 32, 64 and 96.
		let elapsed = start.elapsed();
		assert!(elapsed >= GROWTH_PAUSE * 4 && elapsed < GROWTH_PAUSE * 5, "{elapsed:?}");
	}
}
