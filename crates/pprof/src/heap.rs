use std::alloc::{GlobalAlloc, Layout};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

static INSTALLED: AtomicBool = AtomicBool::new(false);
static ALLOC_OBJECTS: AtomicU64 = AtomicU64::new(0);
static ALLOC_BYTES: AtomicU64 = AtomicU64::new(0);
static FREE_OBJECTS: AtomicU64 = AtomicU64::new(0);
static FREE_BYTES: AtomicU64 = AtomicU64::new(0);

/// A global allocator wrapper that counts allocations for the `heap` profile.
///
/// Without it the `heap` profile still captures, but every counter reads zero
/// and [`HeapProfile::tracking`] is `false`.
///
/// ```rust,no_run
/// use std::alloc::System;
///
/// #[global_allocator]
/// static ALLOC: profsnap_pprof::TrackingAllocator<System> = profsnap_pprof::TrackingAllocator::new(System);
/// ```
#[derive(Debug, Default)]
pub struct TrackingAllocator<A>(A);

impl<A> TrackingAllocator<A> {
	pub const fn new(inner: A) -> Self {
		Self(inner)
	}

	#[inline(always)]
	fn record_alloc(size: usize) {
		INSTALLED.store(true, Ordering::Relaxed);
		ALLOC_OBJECTS.fetch_add(1, Ordering::Relaxed);
		ALLOC_BYTES.fetch_add(size as u64, Ordering::Relaxed);
	}

	#[inline(always)]
	fn record_free(size: usize) {
		FREE_OBJECTS.fetch_add(1, Ordering::Relaxed);
		FREE_BYTES.fetch_add(size as u64, Ordering::Relaxed);
	}
}

// Safety: every call is forwarded to the wrapped allocator unchanged, the
// wrapper only updates atomic counters and never allocates itself.
unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
	unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
		let ptr = self.0.alloc(layout);
		if !ptr.is_null() {
			Self::record_alloc(layout.size());
		}
		ptr
	}

	unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
		let ptr = self.0.alloc_zeroed(layout);
		if !ptr.is_null() {
			Self::record_alloc(layout.size());
		}
		ptr
	}

	unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
		self.0.dealloc(ptr, layout);
		Self::record_free(layout.size());
	}

	unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
		let new_ptr = self.0.realloc(ptr, layout, new_size);
		if !new_ptr.is_null() {
			Self::record_free(layout.size());
			Self::record_alloc(new_size);
		}
		new_ptr
	}
}

/// Point in time heap counters, in the shape of the pprof heap sample types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeapProfile {
	/// Whether a [`TrackingAllocator`] is recording allocations.
	pub tracking: bool,
	pub alloc_objects: u64,
	pub alloc_space: u64,
	pub inuse_objects: u64,
	pub inuse_space: u64,
}

impl HeapProfile {
	/// Read the current counters.
	pub fn snapshot() -> Self {
		let alloc_objects = ALLOC_OBJECTS.load(Ordering::Relaxed);
		let alloc_space = ALLOC_BYTES.load(Ordering::Relaxed);
		let free_objects = FREE_OBJECTS.load(Ordering::Relaxed);
		let free_space = FREE_BYTES.load(Ordering::Relaxed);

		Self {
			tracking: INSTALLED.load(Ordering::Relaxed),
			alloc_objects,
			alloc_space,
			// The counters are read independently, a free can land between the loads.
			inuse_objects: alloc_objects.saturating_sub(free_objects),
			inuse_space: alloc_space.saturating_sub(free_space),
		}
	}
}

/// Dump jemalloc's heap profile as gzip compressed pprof.
///
/// Returns `None` if jemalloc profiling is not active in this process.
#[cfg(all(feature = "jemalloc", target_os = "linux"))]
pub(crate) fn jemalloc_pprof() -> Result<Option<Vec<u8>>, crate::PprofError> {
	let Some(ctl) = jemalloc_pprof::PROF_CTL.as_ref() else {
		return Ok(None);
	};

	let mut ctl = ctl
		.try_lock()
		.map_err(|_| crate::PprofError::Jemalloc("profiling control is busy".into()))?;
	if !ctl.activated() {
		return Ok(None);
	}

	ctl.dump_pprof()
		.map(Some)
		.map_err(|err| crate::PprofError::Jemalloc(format!("{err:#}")))
}

#[cfg(not(all(feature = "jemalloc", target_os = "linux")))]
pub(crate) fn jemalloc_pprof() -> Result<Option<Vec<u8>>, crate::PprofError> {
	Ok(None)
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use std::alloc::{GlobalAlloc, Layout, System};

	use super::{HeapProfile, TrackingAllocator};

	#[test]
	fn counts_allocations() {
		let alloc = TrackingAllocator::new(System);
		let layout = Layout::from_size_align(4096, 8).unwrap();

		let before = HeapProfile::snapshot();

		// Safety: the layout is non-zero sized and the pointer is freed with the same layout.
		unsafe {
			let ptr = alloc.alloc(layout);
			assert!(!ptr.is_null());

			let during = HeapProfile::snapshot();
			assert!(during.tracking);
			assert!(during.alloc_objects > before.alloc_objects);
			assert!(during.alloc_space >= before.alloc_space + 4096);

			alloc.dealloc(ptr, layout);
		}

		let after = HeapProfile::snapshot();
		assert!(after.alloc_objects >= after.inuse_objects);
		assert!(after.alloc_space >= after.inuse_space);
	}

	#[test]
	fn jemalloc_inactive() {
		// Test binaries never enable jemalloc profiling through `malloc_conf`.
		assert_eq!(super::jemalloc_pprof().unwrap(), None);
	}
}
