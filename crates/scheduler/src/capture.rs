use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use profsnap_pprof::{Captured, PprofError, ProfileKind, Profiler};

/// The host's profiling facility, as seen by the scheduler.
pub trait CaptureProvider: Send + Sync + 'static {
	type Error: std::error::Error + Send + Sync + 'static;

	/// Capture a profile of the named kind, sampling for up to `duration`.
	fn capture(&self, kind: &str, duration: Duration) -> impl Future<Output = Result<Captured, Self::Error>> + Send;
}

impl<P: CaptureProvider> CaptureProvider for Arc<P> {
	type Error = P::Error;

	fn capture(&self, kind: &str, duration: Duration) -> impl Future<Output = Result<Captured, Self::Error>> + Send {
		(**self).capture(kind, duration)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
	#[error(transparent)]
	Pprof(#[from] PprofError),
	#[error("capture task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}

/// Captures profiles of the current process using [`Profiler`].
///
/// Sampled kinds block a thread for the whole duration, so they run on the
/// tokio blocking pool. Point in time kinds are captured inline.
#[derive(Clone, Default)]
pub struct HostCapture {
	profiler: Profiler,
}

impl HostCapture {
	pub fn new(profiler: Profiler) -> Self {
		Self { profiler }
	}
}

impl CaptureProvider for HostCapture {
	type Error = CaptureError;

	async fn capture(&self, kind: &str, duration: Duration) -> Result<Captured, Self::Error> {
		let kind: ProfileKind = kind.parse()?;

		if !kind.is_sampled() {
			return Ok(self.profiler.capture(kind, duration)?);
		}

		let profiler = self.profiler.clone();
		Ok(tokio::task::spawn_blocking(move || profiler.capture(kind, duration)).await??)
	}
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use std::time::{Duration, Instant};

	use profsnap_pprof::{PayloadFormat, PprofError, ProfileKind};

	use super::{CaptureError, CaptureProvider, HostCapture};

	#[tokio::test]
	async fn point_in_time_kinds() {
		let host = HostCapture::default();

		let captured = host.capture("goroutine", Duration::from_secs(30)).await.unwrap();
		assert_eq!(captured.format, PayloadFormat::Json);

		let captured = host.capture("heap", Duration::from_secs(30)).await.unwrap();
		assert_eq!(captured.format, PayloadFormat::Json);
	}

	#[tokio::test]
	async fn errors() {
		let host = HostCapture::default();

		assert!(matches!(
			host.capture("mutex", Duration::from_secs(1)).await,
			Err(CaptureError::Pprof(PprofError::Unsupported(ProfileKind::Mutex)))
		));
		assert!(matches!(
			host.capture("bogus", Duration::from_secs(1)).await,
			Err(CaptureError::Pprof(PprofError::UnknownKind(_)))
		));
	}

	#[tokio::test]
	async fn cpu_leaves_the_runtime_free() {
		let host = HostCapture::default();

		// On a current thread runtime the timer only fires during the capture
		// if the capture is off the runtime thread.
		let (captured, ticked) = tokio::join!(
			async {
				let captured = host.capture("cpu", Duration::from_millis(200)).await;
				(captured, Instant::now())
			},
			async {
				tokio::time::sleep(Duration::from_millis(10)).await;
				Instant::now()
			}
		);
		let (captured, done) = captured;
		let captured = captured.unwrap();

		assert_eq!(captured.format, PayloadFormat::PprofGzip);
		assert_eq!(captured.payload[..2], [0x1f, 0x8b]);
		assert!(ticked < done);
	}
}
