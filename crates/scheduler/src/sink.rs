use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use profsnap_pprof::PayloadFormat;
use tokio::sync::mpsc;

use crate::ProfileSnapshot;

/// Destination for captured snapshots.
///
/// Retries are up to the sink, the scheduler reports a failed write and moves
/// on.
pub trait SnapshotSink: Send + Sync + 'static {
	type Error: std::error::Error + Send + Sync + 'static;

	fn write(&self, snapshot: ProfileSnapshot) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

impl<S: SnapshotSink> SnapshotSink for Arc<S> {
	type Error = S::Error;

	fn write(&self, snapshot: ProfileSnapshot) -> impl Future<Output = Result<(), Self::Error>> + Send {
		(**self).write(snapshot)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("sink receiver was dropped")]
	Closed,
	#[error(transparent)]
	Http(#[from] reqwest::Error),
}

/// Writes every snapshot to its own file in a directory.
///
/// Files are written under a temporary name and renamed into place, so a
/// reader never observes a partial profile.
#[derive(Debug, Clone)]
pub struct FileSink {
	dir: PathBuf,
}

impl FileSink {
	/// The directory is created on first write if it does not exist.
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}
}

impl SnapshotSink for FileSink {
	type Error = SinkError;

	async fn write(&self, snapshot: ProfileSnapshot) -> Result<(), Self::Error> {
		tokio::fs::create_dir_all(&self.dir).await?;

		let name = snapshot.file_name();
		let path = self.dir.join(&name);
		let tmp = self.dir.join(format!(".{name}.tmp"));

		tokio::fs::write(&tmp, &snapshot.payload).await?;
		tokio::fs::rename(&tmp, &path).await?;

		tracing::debug!(path = %path.display(), bytes = snapshot.payload.len(), "wrote profile snapshot");

		Ok(())
	}
}

/// Forwards snapshots over a bounded channel.
///
/// A full channel applies backpressure to the scheduler, a dropped receiver
/// fails every write with [`SinkError::Closed`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
	tx: mpsc::Sender<ProfileSnapshot>,
}

impl ChannelSink {
	pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProfileSnapshot>) {
		let (tx, rx) = mpsc::channel(capacity.max(1));
		(Self { tx }, rx)
	}
}

impl SnapshotSink for ChannelSink {
	type Error = SinkError;

	async fn write(&self, snapshot: ProfileSnapshot) -> Result<(), Self::Error> {
		self.tx.send(snapshot).await.map_err(|_| SinkError::Closed)
	}
}

/// Publishes every snapshot to a remote ingestion endpoint with one `POST`
/// per snapshot.
///
/// The body is the raw payload. The snapshot's metadata travels in headers:
///
/// | Header                   | Value                                    |
/// |--------------------------|------------------------------------------|
/// | `content-type`           | `application/octet-stream` for pprof, `application/json` otherwise |
/// | `x-profile-kind`         | the configured kind name                 |
/// | `x-profile-tick`         | the tick number                          |
/// | `x-profile-captured-at`  | RFC 3339 capture time                    |
/// | `x-profile-file-name`    | [`ProfileSnapshot::file_name`]           |
///
/// Any non-success status fails the write.
#[derive(Debug, Clone)]
pub struct HttpSink {
	client: reqwest::Client,
	endpoint: reqwest::Url,
}

impl HttpSink {
	pub fn new(endpoint: reqwest::Url, timeout: Duration) -> Result<Self, SinkError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self::with_client(client, endpoint))
	}

	pub fn with_client(client: reqwest::Client, endpoint: reqwest::Url) -> Self {
		Self { client, endpoint }
	}

	pub fn endpoint(&self) -> &reqwest::Url {
		&self.endpoint
	}
}

impl SnapshotSink for HttpSink {
	type Error = SinkError;

	async fn write(&self, snapshot: ProfileSnapshot) -> Result<(), Self::Error> {
		let content_type = match snapshot.format {
			PayloadFormat::PprofGzip => "application/octet-stream",
			PayloadFormat::Json => "application/json",
		};
		let bytes = snapshot.payload.len();

		let response = self
			.client
			.post(self.endpoint.clone())
			.header(reqwest::header::CONTENT_TYPE, content_type)
			.header("x-profile-kind", snapshot.kind.as_str())
			.header("x-profile-tick", snapshot.tick.to_string())
			.header("x-profile-captured-at", snapshot.captured_at.to_rfc3339())
			.header("x-profile-file-name", snapshot.file_name())
			.body(snapshot.payload)
			.send()
			.await?;

		let status = response.status();
		response.error_for_status()?;

		tracing::debug!(endpoint = %self.endpoint, %status, bytes, "published profile snapshot");

		Ok(())
	}
}
