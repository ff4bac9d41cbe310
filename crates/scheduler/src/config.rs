use std::collections::HashSet;
use std::time::Duration;

use profsnap_pprof::ProfileKind;

use crate::snapshot::sanitize;

/// An invalid [`ScheduleConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
	#[error("tick interval must be greater than zero")]
	ZeroTickInterval,
	#[error("sample duration must be greater than zero")]
	ZeroSampleDuration,
	#[error("at least one profile kind must be configured")]
	NoProfileKinds,
	#[error("profile kind {0:?} is configured more than once")]
	DuplicateKind(String),
}

/// How often to capture and what to capture.
///
/// Durations are (de)serialized in humantime format, e.g. `"5s"` or `"1m 30s"`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
	/// Time between two ticks.
	#[serde(with = "humantime_serde")]
	pub tick_interval: Duration,
	/// The longest a single capture may sample for.
	#[serde(with = "humantime_serde")]
	pub sample_duration: Duration,
	/// Profile kinds captured on each tick, in order.
	pub profile_kinds: Vec<String>,
	/// How long a stopped scheduler waits for the capture or write in flight
	/// before abandoning it.
	#[serde(with = "humantime_serde")]
	pub drain_timeout: Duration,
}

impl Default for ScheduleConfig {
	fn default() -> Self {
		Self {
			tick_interval: Duration::from_secs(5),
			sample_duration: Duration::from_secs(30),
			profile_kinds: ["goroutine", "heap", "threadcreate", "block", "mutex"]
				.into_iter()
				.map(str::to_owned)
				.collect(),
			drain_timeout: Duration::from_secs(30),
		}
	}
}

impl ScheduleConfig {
	pub fn new<I, S>(tick_interval: Duration, sample_duration: Duration, profile_kinds: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			tick_interval,
			sample_duration,
			profile_kinds: profile_kinds.into_iter().map(Into::into).collect(),
			..Default::default()
		}
	}

	/// Check the invariants the scheduler relies on.
	///
	/// Unknown or unsupported kind names are not rejected here, they are
	/// reported each time they fail to capture. Names that would share a
	/// snapshot file name are rejected.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.tick_interval.is_zero() {
			return Err(ConfigError::ZeroTickInterval);
		}

		if self.sample_duration.is_zero() {
			return Err(ConfigError::ZeroSampleDuration);
		}

		if self.profile_kinds.is_empty() {
			return Err(ConfigError::NoProfileKinds);
		}

		let mut seen = HashSet::with_capacity(self.profile_kinds.len());
		for kind in &self.profile_kinds {
			if !seen.insert(sanitize(kind).to_ascii_lowercase()) {
				return Err(ConfigError::DuplicateKind(kind.clone()));
			}
		}

		Ok(())
	}

	/// Configured kinds this host cannot capture.
	pub fn unsupported_kinds(&self) -> impl Iterator<Item = &str> {
		self.profile_kinds.iter().map(String::as_str).filter(|name| {
			!name
				.parse::<ProfileKind>()
				.map(ProfileKind::is_supported)
				.unwrap_or(false)
		})
	}
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::{ConfigError, ScheduleConfig};

	#[test]
	fn defaults() {
		let config = ScheduleConfig::default();
		assert_eq!(config.tick_interval, Duration::from_secs(5));
		assert_eq!(config.sample_duration, Duration::from_secs(30));
		assert_eq!(config.drain_timeout, Duration::from_secs(30));
		assert_eq!(
			config.profile_kinds,
			vec!["goroutine", "heap", "threadcreate", "block", "mutex"]
		);
		assert_eq!(config.validate(), Ok(()));
	}

	#[test]
	fn validate() {
		let secs = Duration::from_secs(1);

		assert_eq!(
			ScheduleConfig::new(Duration::ZERO, secs, ["heap"]).validate(),
			Err(ConfigError::ZeroTickInterval)
		);
		assert_eq!(
			ScheduleConfig::new(secs, Duration::ZERO, ["heap"]).validate(),
			Err(ConfigError::ZeroSampleDuration)
		);
		assert_eq!(
			ScheduleConfig::new(secs, secs, Vec::<String>::new()).validate(),
			Err(ConfigError::NoProfileKinds)
		);
	}

	#[test]
	fn duplicate_kinds() {
		let secs = Duration::from_secs(1);

		assert_eq!(
			ScheduleConfig::new(secs, secs, ["heap", "goroutine", "heap"]).validate(),
			Err(ConfigError::DuplicateKind("heap".into()))
		);
		// Same snapshot file name on a case insensitive filesystem.
		assert_eq!(
			ScheduleConfig::new(secs, secs, ["heap", "HEAP"]).validate(),
			Err(ConfigError::DuplicateKind("HEAP".into()))
		);
		assert_eq!(ScheduleConfig::new(secs, secs, ["heap", "cpu"]).validate(), Ok(()));
	}

	#[test]
	fn unsupported() {
		let config = ScheduleConfig::new(Duration::from_secs(1), Duration::from_secs(1), ["heap", "mutex", "bogus"]);
		assert_eq!(config.unsupported_kinds().collect::<Vec<_>>(), vec!["mutex", "bogus"]);
	}

	#[test]
	fn deserialize() {
		let config: ScheduleConfig = serde_json::from_str(
			r#"{ "tick_interval": "2s", "sample_duration": "1m", "profile_kinds": ["cpu"] }"#,
		)
		.unwrap();

		assert_eq!(config.tick_interval, Duration::from_secs(2));
		assert_eq!(config.sample_duration, Duration::from_secs(60));
		assert_eq!(config.profile_kinds, vec!["cpu"]);

		let partial: ScheduleConfig =
			serde_json::from_str(r#"{ "tick_interval": "10s", "drain_timeout": "500ms" }"#).unwrap();
		assert_eq!(partial.drain_timeout, Duration::from_millis(500));
		assert_eq!(partial.sample_duration, Duration::from_secs(30));
		assert_eq!(partial.profile_kinds.len(), 5);
	}
}
