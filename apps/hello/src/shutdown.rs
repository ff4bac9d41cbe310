use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use profsnap_scheduler::SchedulerHandle;
use tokio::signal::unix::{Signal, SignalKind};

/// Waits for any of a set of Unix signals.
///
/// Polling again after a signal waits for the next one.
#[derive(Debug)]
#[must_use = "signal handlers must be used to wait for signals"]
pub struct SignalHandler {
	signals: Vec<(SignalKind, Signal)>,
}

impl SignalHandler {
	pub const fn new() -> Self {
		Self { signals: Vec::new() }
	}

	/// SIGINT and SIGTERM.
	pub fn shutdown() -> std::io::Result<Self> {
		Self::new()
			.with_signal(SignalKind::interrupt())?
			.with_signal(SignalKind::terminate())
	}

	/// Add a signal, unless it is already registered.
	pub fn with_signal(mut self, kind: SignalKind) -> std::io::Result<Self> {
		if self.signals.iter().any(|(k, _)| k == &kind) {
			return Ok(self);
		}

		let signal = tokio::signal::unix::signal(kind)?;
		self.signals.push((kind, signal));

		Ok(self)
	}

	pub async fn recv(&mut self) -> SignalKind {
		self.await
	}

	pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<SignalKind> {
		for (kind, signal) in self.signals.iter_mut() {
			if signal.poll_recv(cx).is_ready() {
				return Poll::Ready(*kind);
			}
		}

		Poll::Pending
	}
}

impl Future for SignalHandler {
	type Output = SignalKind;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		self.poll_recv(cx)
	}
}

/// Stop the scheduler, giving its current tick at most `timeout` to finish.
///
/// Returns false if the tick was abandoned.
pub async fn stop_scheduler(handle: SchedulerHandle, timeout: Duration) -> bool {
	match tokio::time::timeout(timeout, handle.stop()).await {
		Ok(stats) => {
			tracing::info!(?stats, "profile scheduler drained");
			true
		}
		Err(_) => {
			tracing::warn!(?timeout, "profile scheduler did not drain in time, abandoning the current tick");
			false
		}
	}
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use std::time::Duration;

	use profsnap_scheduler::{ChannelSink, HostCapture, ScheduleConfig, Scheduler, SchedulerState};
	use tokio::signal::unix::SignalKind;

	use super::{stop_scheduler, SignalHandler};

	fn raise_signal(kind: SignalKind) {
		// Safety: This is a test, and we control the process.
		unsafe {
			libc::raise(kind.as_raw_value());
		}
	}

	#[tokio::test]
	async fn signal_handler() {
		let mut handler = SignalHandler::new()
			.with_signal(SignalKind::user_defined1())
			.unwrap()
			.with_signal(SignalKind::user_defined1())
			.unwrap();
		assert_eq!(handler.signals.len(), 1);

		raise_signal(SignalKind::user_defined1());

		let recv = tokio::time::timeout(Duration::from_secs(1), handler.recv()).await.unwrap();
		assert_eq!(recv, SignalKind::user_defined1());

		let recv = tokio::time::timeout(Duration::from_millis(5), handler.recv()).await;
		assert!(recv.is_err(), "expected timeout");
	}

	#[tokio::test(start_paused = true)]
	async fn stops_idle_scheduler() {
		let config = ScheduleConfig::new(Duration::from_secs(5), Duration::from_secs(1), ["goroutine"]);
		let (sink, _snapshots) = ChannelSink::new(4);
		let handle = Scheduler::start(config, HostCapture::default(), sink).unwrap();
		assert_eq!(handle.state(), SchedulerState::Scheduled);

		assert!(stop_scheduler(handle, Duration::from_secs(1)).await);
	}
}
