use std::sync::atomic::{AtomicU64, Ordering};

use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::KeyValue;

use crate::SchedulerStats;

/// Instrumentation scope of the scheduler's metrics.
pub const METER_NAME: &str = "profsnap-scheduler";

/// A monotonic count kept both locally, for [`SchedulerStats`], and as an
/// opentelemetry counter.
struct Count {
	total: AtomicU64,
	counter: Counter<u64>,
}

impl Count {
	fn new(meter: &Meter, name: &'static str, description: &'static str) -> Self {
		Self {
			total: AtomicU64::new(0),
			counter: meter.u64_counter(name).with_description(description).build(),
		}
	}

	fn add(&self, value: u64, attributes: &[KeyValue]) -> u64 {
		self.counter.add(value, attributes);
		self.total.fetch_add(value, Ordering::Relaxed) + value
	}

	fn get(&self) -> u64 {
		self.total.load(Ordering::Relaxed)
	}
}

pub(crate) struct Metrics {
	ticks: Count,
	skipped_ticks: Count,
	captures: Count,
	capture_errors: Count,
	sink_writes: Count,
	sink_errors: Count,
}

impl Metrics {
	pub(crate) fn new(meter: &Meter) -> Self {
		Self {
			ticks: Count::new(meter, "profsnap.scheduler.ticks", "Ticks that ran."),
			skipped_ticks: Count::new(
				meter,
				"profsnap.scheduler.skipped_ticks",
				"Ticks dropped because the previous tick was still running.",
			),
			captures: Count::new(meter, "profsnap.scheduler.captures", "Successful profile captures."),
			capture_errors: Count::new(
				meter,
				"profsnap.scheduler.capture_errors",
				"Profile captures that failed or were abandoned.",
			),
			sink_writes: Count::new(meter, "profsnap.scheduler.sink_writes", "Snapshots accepted by the sink."),
			sink_errors: Count::new(
				meter,
				"profsnap.scheduler.sink_errors",
				"Snapshots the sink failed to accept, or that were abandoned.",
			),
		}
	}

	/// Returns the number of this tick, starting at 1.
	pub(crate) fn tick(&self) -> u64 {
		self.ticks.add(1, &[])
	}

	pub(crate) fn skipped(&self, skipped: u64) {
		self.skipped_ticks.add(skipped, &[]);
	}

	pub(crate) fn captured(&self, kind: &str) {
		self.captures.add(1, &[kind_attr(kind)]);
	}

	pub(crate) fn capture_failed(&self, kind: &str) {
		self.capture_errors.add(1, &[kind_attr(kind)]);
	}

	pub(crate) fn written(&self, kind: &str) {
		self.sink_writes.add(1, &[kind_attr(kind)]);
	}

	pub(crate) fn write_failed(&self, kind: &str) {
		self.sink_errors.add(1, &[kind_attr(kind)]);
	}

	pub(crate) fn snapshot(&self) -> SchedulerStats {
		SchedulerStats {
			ticks: self.ticks.get(),
			skipped_ticks: self.skipped_ticks.get(),
			captures: self.captures.get(),
			capture_errors: self.capture_errors.get(),
			sink_writes: self.sink_writes.get(),
			sink_errors: self.sink_errors.get(),
		}
	}
}

impl std::fmt::Debug for Metrics {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.snapshot().fmt(f)
	}
}

fn kind_attr(kind: &str) -> KeyValue {
	KeyValue::new("kind", kind.to_owned())
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use super::{Metrics, METER_NAME};

	#[test]
	fn local_counts() {
		let metrics = Metrics::new(&opentelemetry::global::meter(METER_NAME));

		assert_eq!(metrics.tick(), 1);
		assert_eq!(metrics.tick(), 2);
		metrics.skipped(3);
		metrics.captured("heap");
		metrics.capture_failed("mutex");
		metrics.written("heap");
		metrics.write_failed("heap");
		metrics.write_failed("cpu");

		let stats = metrics.snapshot();
		assert_eq!(stats.ticks, 2);
		assert_eq!(stats.skipped_ticks, 3);
		assert_eq!(stats.captures, 1);
		assert_eq!(stats.capture_errors, 1);
		assert_eq!(stats.sink_writes, 1);
		assert_eq!(stats.sink_errors, 2);
	}
}
