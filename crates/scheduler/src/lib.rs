//! # profsnap-scheduler
//!
//! A background scheduler that captures runtime profiles on a fixed interval
//! and hands every capture to a sink.
//!
//! ## Why do we need this?
//!
//! Short lived, request driven processes rarely live long enough for someone
//! to attach a profiler. Capturing on a timer, independently of the request
//! path, leaves a trail of profiles behind that can be inspected later.
//!
//! ## Ticks
//!
//! Ticks fire on the grid `start + n * tick_interval`. On each tick every
//! configured kind is captured in order and written to the sink. Ticks never
//! overlap: grid points that pass while a tick is still capturing are skipped
//! and counted in [`SchedulerStats::skipped_ticks`].
//!
//! Capture and sink failures are logged and counted, the scheduler keeps
//! running. Only an invalid [`ScheduleConfig`] stops it from starting.
//!
//! ## Sinks
//!
//! [`FileSink`] writes one file per snapshot, [`HttpSink`] posts each
//! snapshot to an ingestion endpoint and [`ChannelSink`] hands snapshots to
//! in-process code.
//!
//! ## Metrics
//!
//! Ticks, skipped ticks, captures, sink writes and their failures are
//! recorded as opentelemetry counters under the [`METER_NAME`] meter, with
//! a `kind` attribute where one applies.
//!
//! ## Stopping
//!
//! [`SchedulerHandle::stop`] starts no new capture. The capture or sink write
//! in flight gets [`ScheduleConfig::drain_timeout`] to finish, after which it
//! is abandoned and counted as a failure.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # tokio_test::block_on(async {
//! use profsnap_scheduler::{FileSink, HostCapture, ScheduleConfig, Scheduler};
//!
//! let handle = Scheduler::start(ScheduleConfig::default(), HostCapture::default(), FileSink::new("profiles")).unwrap();
//!
//! // ... serve requests ...
//!
//! handle.stop().await;
//! # });
//! ```
//!
//! ## License
//!
//! This project is licensed under the MIT or Apache-2.0 license. You can
//! choose between one of them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]

mod capture;
mod config;
mod metrics;
mod schedule;
mod scheduler;
mod sink;
mod snapshot;
mod state;

pub use capture::{CaptureError, CaptureProvider, HostCapture};
pub use config::{ConfigError, ScheduleConfig};
pub use metrics::METER_NAME;
pub use scheduler::{Scheduler, SchedulerError, SchedulerHandle, SchedulerStats};
pub use sink::{ChannelSink, FileSink, HttpSink, SinkError, SnapshotSink};
pub use snapshot::ProfileSnapshot;
pub use state::{InvalidTransition, SchedulerState};
