use std::sync::{Arc, OnceLock};

use opentelemetry::metrics::Meter;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::metrics::{Metrics, METER_NAME};
use crate::schedule::Schedule;
use crate::state::StateCell;
use crate::{CaptureProvider, ConfigError, ProfileSnapshot, ScheduleConfig, SchedulerState, SnapshotSink};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
	#[error("invalid schedule: {0}")]
	Config(#[from] ConfigError),
	#[error("the scheduler must be started from within a tokio runtime")]
	NoRuntime,
}

/// Counters describing what a scheduler has done so far.
///
/// The same counts are recorded as opentelemetry counters under the
/// `profsnap-scheduler` meter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
	/// Ticks that ran.
	pub ticks: u64,
	/// Ticks dropped because the previous tick was still running.
	pub skipped_ticks: u64,
	/// Successful captures.
	pub captures: u64,
	pub capture_errors: u64,
	/// Snapshots accepted by the sink.
	pub sink_writes: u64,
	pub sink_errors: u64,
}

#[derive(Debug)]
struct Shared {
	state: StateCell,
	metrics: Metrics,
}

/// Periodically captures the configured profile kinds and writes them to a
/// sink.
///
/// # Example
///
/// ```rust
/// # tokio_test::block_on(async {
/// use std::time::Duration;
///
/// use profsnap_scheduler::{ChannelSink, HostCapture, ScheduleConfig, Scheduler};
///
/// let config = ScheduleConfig::new(Duration::from_secs(5), Duration::from_secs(30), ["goroutine", "heap"]);
/// let (sink, _snapshots) = ChannelSink::new(16);
///
/// let handle = Scheduler::start(config, HostCapture::default(), sink).unwrap();
///
/// // Cancel future ticks and wait for the current one to finish.
/// handle.stop().await;
/// # });
/// ```
pub struct Scheduler<P, S> {
	config: ScheduleConfig,
	provider: P,
	sink: S,
	shared: Arc<Shared>,
	token: CancellationToken,
	drain_deadline: OnceLock<Instant>,
}

impl<P, S> Scheduler<P, S>
where
	P: CaptureProvider,
	S: SnapshotSink,
{
	/// Validate the config and start ticking in the background.
	///
	/// The first tick fires one `tick_interval` after this call. This never
	/// blocks, but must be called from within a tokio runtime. Metrics are
	/// recorded with the global meter provider.
	pub fn start(config: ScheduleConfig, provider: P, sink: S) -> Result<SchedulerHandle, SchedulerError> {
		Self::start_with_meter(config, provider, sink, &opentelemetry::global::meter(METER_NAME))
	}

	/// Like [`Scheduler::start`], recording metrics with the given meter.
	pub fn start_with_meter(
		config: ScheduleConfig,
		provider: P,
		sink: S,
		meter: &Meter,
	) -> Result<SchedulerHandle, SchedulerError> {
		config.validate()?;
		let runtime = tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

		for kind in config.unsupported_kinds() {
			tracing::warn!(kind = %kind, "profile kind cannot be captured on this host, it will be skipped on every tick");
		}

		let shared = Arc::new(Shared {
			state: StateCell::default(),
			metrics: Metrics::new(meter),
		});
		let token = CancellationToken::new();

		let scheduler = Self {
			config,
			provider,
			sink,
			shared: shared.clone(),
			token: token.clone(),
			drain_deadline: OnceLock::new(),
		};

		// The background task is the only writer from here on.
		let _ = shared.state.transition(SchedulerState::Scheduled);
		let task = runtime.spawn(scheduler.run());

		Ok(SchedulerHandle {
			token,
			shared,
			task: Some(task),
		})
	}

	async fn run(self) {
		tracing::info!(
			interval = ?self.config.tick_interval,
			sample_duration = ?self.config.sample_duration,
			kinds = ?self.config.profile_kinds,
			"profile scheduler started"
		);

		let mut schedule = Schedule::new(Instant::now(), self.config.tick_interval);
		let mut next = schedule.next_after(Instant::now());

		loop {
			tokio::select! {
				biased;
				_ = self.token.cancelled() => break,
				_ = tokio::time::sleep_until(next.deadline) => {}
			}

			if let Err(err) = self.shared.state.transition(SchedulerState::Capturing) {
				tracing::error!(error = %err, "profile scheduler in unexpected state");
				break;
			}

			let tick = self.shared.metrics.tick();
			self.tick(tick).await;

			if self.token.is_cancelled() {
				break;
			}

			if let Err(err) = self.shared.state.transition(SchedulerState::Scheduled) {
				tracing::error!(error = %err, "profile scheduler in unexpected state");
				break;
			}

			next = schedule.next_after(Instant::now());
			if next.skipped > 0 {
				self.shared.metrics.skipped(next.skipped);
				tracing::warn!(tick, skipped = next.skipped, "tick outran the interval, skipping missed ticks");
			}
		}

		let _ = self.shared.state.transition(SchedulerState::Stopped);
		tracing::info!(stats = ?self.shared.metrics, "profile scheduler stopped");
	}

	/// Completes `drain_timeout` after the scheduler was cancelled.
	async fn drain_elapsed(&self) {
		self.token.cancelled().await;
		let deadline = *self
			.drain_deadline
			.get_or_init(|| Instant::now() + self.config.drain_timeout);
		tokio::time::sleep_until(deadline).await;
	}

	/// Capture every configured kind once, in order.
	async fn tick(&self, tick: u64) {
		tracing::debug!(tick, "profile tick");

		for kind in &self.config.profile_kinds {
			// Stopping lets the capture in flight finish but starts no new one.
			if self.token.is_cancelled() {
				tracing::debug!(tick, kind = %kind, "scheduler stopped, not capturing remaining kinds");
				break;
			}

			let captured_at = chrono::Utc::now();
			let result = tokio::select! {
				biased;
				result = self.provider.capture(kind, self.config.sample_duration) => Some(result),
				_ = self.drain_elapsed() => None,
			};

			let captured = match result {
				Some(Ok(captured)) => captured,
				Some(Err(err)) => {
					self.shared.metrics.capture_failed(kind);
					tracing::warn!(tick, kind = %kind, error = %err, "failed to capture profile");
					continue;
				}
				None => {
					self.shared.metrics.capture_failed(kind);
					tracing::warn!(tick, kind = %kind, timeout = ?self.config.drain_timeout, "capture did not finish before the drain timeout, abandoning it");
					break;
				}
			};
			self.shared.metrics.captured(kind);

			let snapshot = ProfileSnapshot {
				kind: kind.clone(),
				tick,
				captured_at,
				format: captured.format,
				payload: captured.payload,
			};

			let result = tokio::select! {
				biased;
				result = self.sink.write(snapshot) => Some(result),
				_ = self.drain_elapsed() => None,
			};

			match result {
				Some(Ok(())) => self.shared.metrics.written(kind),
				Some(Err(err)) => {
					self.shared.metrics.write_failed(kind);
					tracing::warn!(tick, kind = %kind, error = %err, "failed to write profile snapshot, dropping it");
				}
				None => {
					self.shared.metrics.write_failed(kind);
					tracing::warn!(tick, kind = %kind, timeout = ?self.config.drain_timeout, "sink did not accept the snapshot before the drain timeout, dropping it");
					break;
				}
			}
		}
	}
}

/// Controls a running [`Scheduler`].
///
/// Dropping the handle cancels the scheduler without waiting for it.
#[must_use = "dropping the handle stops the scheduler"]
#[derive(Debug)]
pub struct SchedulerHandle {
	token: CancellationToken,
	shared: Arc<Shared>,
	task: Option<tokio::task::JoinHandle<()>>,
}

impl SchedulerHandle {
	/// Cancel future ticks without waiting.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Cancel future ticks and wait for the background task to exit.
	///
	/// A capture or sink write that is already running gets up to
	/// `drain_timeout` to complete before it is abandoned.
	pub async fn stop(mut self) -> SchedulerStats {
		self.token.cancel();

		if let Some(task) = self.task.take() {
			if let Err(err) = task.await {
				tracing::error!(error = %err, "profile scheduler task failed");
			}
		}

		self.stats()
	}

	pub fn state(&self) -> SchedulerState {
		self.shared.state.get()
	}

	pub fn stats(&self) -> SchedulerStats {
		self.shared.metrics.snapshot()
	}

	/// Returns true once the background task has exited.
	pub fn is_finished(&self) -> bool {
		self.task.as_ref().map_or(true, tokio::task::JoinHandle::is_finished)
	}
}

impl Drop for SchedulerHandle {
	fn drop(&mut self) {
		self.token.cancel();
	}
}
