use std::time::Duration;

use tokio::time::Instant;

/// Tick deadlines on the fixed grid `start + n * period`, for `n >= 1`.
///
/// A grid point that has already passed when the previous tick finished is
/// skipped, never queued.
#[derive(Debug, Clone)]
pub(crate) struct Schedule {
	start: Instant,
	period: Duration,
	slot: u64,
}

/// The next deadline and the number of grid points skipped to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NextTick {
	pub deadline: Instant,
	pub skipped: u64,
}

impl Schedule {
	pub(crate) fn new(start: Instant, period: Duration) -> Self {
		Self { start, period, slot: 0 }
	}

	/// Advance to the first grid point strictly after `now`.
	pub(crate) fn next_after(&mut self, now: Instant) -> NextTick {
		let elapsed = now.saturating_duration_since(self.start).as_nanos();
		let period = self.period.as_nanos().max(1);
		let elapsed_slots = u64::try_from(elapsed / period).unwrap_or(u64::MAX);

		let following = self.slot.saturating_add(1);
		let next = following.max(elapsed_slots.saturating_add(1));

		self.slot = next;

		NextTick {
			deadline: self.deadline(next),
			skipped: next - following,
		}
	}

	fn deadline(&self, slot: u64) -> Instant {
		let nanos = self.period.as_nanos().saturating_mul(u128::from(slot));
		self.start + Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
	}
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tokio::time::Instant;

	use super::{NextTick, Schedule};

	const PERIOD: Duration = Duration::from_secs(5);

	#[test]
	fn first_tick_after_one_period() {
		let start = Instant::now();
		let mut schedule = Schedule::new(start, PERIOD);

		assert_eq!(
			schedule.next_after(start),
			NextTick {
				deadline: start + PERIOD,
				skipped: 0
			}
		);
	}

	#[test]
	fn fast_ticks_stay_on_grid() {
		let start = Instant::now();
		let mut schedule = Schedule::new(start, PERIOD);
		schedule.next_after(start);

		// Tick 1 fired at 5s and finished 1ms later.
		let next = schedule.next_after(start + Duration::from_millis(5_001));
		assert_eq!(next.deadline, start + Duration::from_secs(10));
		assert_eq!(next.skipped, 0);

		// A late wakeup does not shift the grid.
		let next = schedule.next_after(start + Duration::from_millis(10_250));
		assert_eq!(next.deadline, start + Duration::from_secs(15));
		assert_eq!(next.skipped, 0);
	}

	#[test]
	fn slow_tick_skips_missed_points() {
		let start = Instant::now();
		let mut schedule = Schedule::new(start, PERIOD);
		schedule.next_after(start);

		// Tick 1 fired at 5s and ran for 12s, the points at 10s and 15s passed.
		let next = schedule.next_after(start + Duration::from_secs(17));
		assert_eq!(next.deadline, start + Duration::from_secs(20));
		assert_eq!(next.skipped, 2);

		// Finishing exactly on a grid point skips that point too.
		let next = schedule.next_after(start + Duration::from_secs(25));
		assert_eq!(next.deadline, start + Duration::from_secs(30));
		assert_eq!(next.skipped, 1);
	}
}
