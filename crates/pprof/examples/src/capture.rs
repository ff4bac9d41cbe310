use std::alloc::System;
use std::io::Write;
use std::time::Duration;

use profsnap_pprof::{PprofError, ProfileKind, Profiler, TrackingAllocator};
use rand::Rng;

#[global_allocator]
static ALLOC: TrackingAllocator<System> = TrackingAllocator::new(System);

fn work() {
	let mut rnd = rand::thread_rng();

	let mut buf = vec![0u8; 1024 * 1024];
	rnd.fill(buf.as_mut_slice());

	loop {
		let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
		encoder.write_all(buf.as_slice()).unwrap();
		buf = encoder.finish().unwrap();
	}
}

fn main() {
	let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
	let profiler = Profiler::default().with_runtime(runtime.handle().clone());

	std::thread::spawn(work);

	for kind in ProfileKind::ALL {
		match profiler.capture(kind, Duration::from_secs(5)) {
			Ok(captured) => {
				let path = format!("capture-{kind}.{}", captured.format.extension());
				std::fs::write(&path, captured.payload).unwrap();
				println!("wrote {path}");
			}
			Err(PprofError::Unsupported(kind)) => println!("skipped {kind}: not supported"),
			Err(err) => panic!("failed to capture {kind}: {err}"),
		}
	}
}
