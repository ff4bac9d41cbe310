use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a scheduler.
///
/// ```text
/// Idle -> Scheduled <-> Capturing
///   \         |             |
///    +----> Stopped <-------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SchedulerState {
	/// Created but not yet started.
	#[default]
	Idle = 0,
	/// Waiting for the next tick.
	Scheduled = 1,
	/// Running a tick.
	Capturing = 2,
	/// No further ticks will run. Terminal.
	Stopped = 3,
}

impl SchedulerState {
	pub const fn can_transition_to(self, next: SchedulerState) -> bool {
		use SchedulerState::*;

		matches!(
			(self, next),
			(Idle, Scheduled) | (Idle, Stopped) | (Scheduled, Capturing) | (Capturing, Scheduled) | (Scheduled, Stopped) | (Capturing, Stopped)
		)
	}

	const fn from_u8(value: u8) -> Self {
		match value {
			0 => SchedulerState::Idle,
			1 => SchedulerState::Scheduled,
			2 => SchedulerState::Capturing,
			_ => SchedulerState::Stopped,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid scheduler transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
	pub from: SchedulerState,
	pub to: SchedulerState,
}

/// Shared, lock free holder of a [`SchedulerState`].
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
	pub(crate) fn get(&self) -> SchedulerState {
		SchedulerState::from_u8(self.0.load(Ordering::Acquire))
	}

	/// Move to `to` if that is a valid transition from the current state.
	pub(crate) fn transition(&self, to: SchedulerState) -> Result<SchedulerState, InvalidTransition> {
		self.0
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
				SchedulerState::from_u8(current)
					.can_transition_to(to)
					.then_some(to as u8)
			})
			.map(SchedulerState::from_u8)
			.map_err(|current| InvalidTransition {
				from: SchedulerState::from_u8(current),
				to,
			})
	}
}
