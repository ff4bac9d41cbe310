//! # profsnap-pprof
//!
//! Capture named runtime profiles from the current process.
//!
//! | kind           | source                                   | payload            |
//! |----------------|------------------------------------------|--------------------|
//! | `cpu`          | `pprof` signal based sampling            | gzip pprof proto   |
//! | `goroutine`    | tokio runtime metrics                    | JSON               |
//! | `heap`         | jemalloc sampling profiler, see below    | gzip pprof proto   |
//! |                | [`TrackingAllocator`] counters otherwise | JSON               |
//! | `threadcreate` | `/proc/self/task` (Linux only)           | JSON               |
//! | `block`        | not available, [`PprofError::Unsupported`] |                  |
//! | `mutex`        | not available, [`PprofError::Unsupported`] |                  |
//!
//! ## Heap profiles
//!
//! With the `jemalloc` feature on Linux, and a process whose global
//! allocator is jemalloc with profiling active, `heap` captures a pprof heap
//! profile of sampled live allocations. Anywhere else it falls back to the
//! [`TrackingAllocator`] counters.
//!
//! ```rust,ignore
//! #[global_allocator]
//! static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;
//!
//! #[allow(non_upper_case_globals)]
//! #[export_name = "malloc_conf"]
//! pub static malloc_conf: &[u8] = b"prof:true,prof_active:true,lg_prof_sample:19\0";
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! let profiler = profsnap_pprof::Profiler::default();
//! let captured = profiler.capture_named("cpu", Duration::from_secs(10)).unwrap();
//! std::fs::write(format!("capture.{}", captured.format.extension()), captured.payload).unwrap();
//! ```
//!
//! ## License
//!
//! This project is licensed under the MIT or Apache-2.0 license. You can
//! choose between one of them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]

mod cpu;
mod heap;
mod kind;
mod profiler;
mod tasks;
mod threads;

#[derive(Debug, thiserror::Error)]
pub enum PprofError {
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Pprof(#[from] pprof::Error),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error("unknown profile kind: {0}")]
	UnknownKind(String),
	#[error("profile kind is not supported on this host: {0}")]
	Unsupported(ProfileKind),
	#[error("no tokio runtime available")]
	NoRuntime,
	#[error("jemalloc heap profile: {0}")]
	Jemalloc(String),
}

pub use cpu::Cpu;
pub use heap::{HeapProfile, TrackingAllocator};
pub use kind::ProfileKind;
pub use profiler::{Captured, PayloadFormat, Profiler};
pub use tasks::TaskProfile;
pub use threads::{ThreadInfo, ThreadProfile};
