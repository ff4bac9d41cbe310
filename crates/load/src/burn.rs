use rand::Rng;

/// Pseudorandom draws per burn.
pub const BURN_ITERATIONS: u32 = 1 << 7;

/// What a CPU burn did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnReport {
	pub iterations: u32,
	/// Xor of every drawn value.
	pub checksum: u64,
}

/// A short, pure CPU burst on the calling thread.
pub fn burn_cpu() -> BurnReport {
	burn_cpu_with(&mut rand::thread_rng())
}

/// [`burn_cpu`] with a caller supplied generator.
pub fn burn_cpu_with<R: Rng + ?Sized>(rng: &mut R) -> BurnReport {
	let mut checksum = 0u64;
	let mut iterations = 0;

	for _ in 0..BURN_ITERATIONS {
		checksum ^= std::hint::black_box(rng.gen::<u64>());
		iterations += 1;
	}

	BurnReport { iterations, checksum }
}
