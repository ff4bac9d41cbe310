use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use profsnap_scheduler::ScheduleConfig;
use smart_default::SmartDefault;

/// Set by the Lambda runtime in every function execution environment.
pub const LAMBDA_FUNCTION_NAME_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";

#[derive(Debug, Clone, SmartDefault, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
	#[default(SocketAddr::from(([0, 0, 0, 0], 8080)))]
	pub bind: SocketAddr,
	/// Appended to every invoke response.
	#[default("profsnap".into())]
	pub greeting: String,
	pub profiler: ProfilerConfig,
	pub logging: LoggingConfig,
	/// How long shutdown waits for the scheduler to finish its current tick.
	#[default(Duration::from_secs(35))]
	#[serde(with = "humantime_serde")]
	pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone, SmartDefault, serde::Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
	#[default(true)]
	pub enabled: bool,
	/// Only install the scheduler when running inside a Lambda execution
	/// environment.
	#[default(false)]
	pub lambda_only: bool,
	pub schedule: ScheduleConfig,
	/// Where snapshots are written when no `ingest` endpoint is configured.
	#[default(PathBuf::from("profiles"))]
	pub output_dir: PathBuf,
	/// Publish snapshots to a remote endpoint instead of `output_dir`.
	pub ingest: Option<IngestConfig>,
	/// CPU sampling frequency in Hz.
	#[default(100)]
	pub cpu_frequency: i32,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct IngestConfig {
	pub endpoint: url::Url,
	/// Per snapshot request timeout.
	#[serde(with = "humantime_serde", default = "IngestConfig::default_timeout")]
	pub timeout: Duration,
}

impl IngestConfig {
	fn default_timeout() -> Duration {
		Duration::from_secs(10)
	}
}

impl ProfilerConfig {
	/// Whether the scheduler should be installed, given the value of
	/// [`LAMBDA_FUNCTION_NAME_ENV`].
	pub fn should_install(&self, lambda_function_name: Option<&str>) -> bool {
		self.enabled && (!self.lambda_only || lambda_function_name.is_some_and(|name| !name.is_empty()))
	}
}

#[derive(Debug, Clone, SmartDefault, serde::Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
	/// An `EnvFilter` directive, `RUST_LOG` takes precedence when set.
	#[default("info".into())]
	pub level: String,
	#[default(false)]
	pub json: bool,
}

/// How [`parse_config`] finds its sources.
#[derive(Debug, Clone)]
pub struct Options {
	pub argv: Vec<String>,
	/// Loaded if no `--config` file is given. Missing is not an error.
	pub default_config_file: Option<&'static str>,
	pub env_prefix: Option<&'static str>,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			argv: std::env::args().collect(),
			default_config_file: Some("config"),
			env_prefix: Some("PROFSNAP"),
		}
	}
}

fn command() -> clap::Command {
	clap::Command::new(env!("CARGO_PKG_NAME"))
		.version(env!("CARGO_PKG_VERSION"))
		.about(env!("CARGO_PKG_DESCRIPTION"))
		.author(env!("CARGO_PKG_AUTHORS"))
		.arg(
			clap::Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.help("Path to configuration file(s)")
				.action(clap::ArgAction::Append),
		)
		.arg(
			clap::Arg::new("overrides")
				.long("override")
				.short('o')
				.alias("set")
				.help("Provide an override for a configuration value, in the format KEY=VALUE")
				.action(clap::ArgAction::Append),
		)
}

/// Build the config from files, `KEY=VALUE` overrides and the environment,
/// later sources winning.
///
/// Environment variables use `__` between nested keys, e.g.
/// `PROFSNAP_PROFILER__SCHEDULE__TICK_INTERVAL=10s`. Profile kinds can be
/// given as a comma separated list.
pub fn parse_config<T: serde::de::DeserializeOwned>(options: Options) -> Result<T, ConfigError> {
	let matches = command().try_get_matches_from(options.argv)?;

	let mut config = config::Config::builder();
	let mut added_files = false;

	if let Some(config_files) = matches.get_many::<String>("config") {
		for path in config_files {
			config = config.add_source(config::File::with_name(path));
			added_files = true;
		}
	}

	if !added_files {
		if let Some(default_config_file) = options.default_config_file {
			config = config.add_source(config::File::with_name(default_config_file).required(false));
		}
	}

	if let Some(env_prefix) = options.env_prefix {
		config = config.add_source(
			config::Environment::with_prefix(env_prefix)
				.prefix_separator("_")
				.separator("__")
				.try_parsing(true)
				.list_separator(",")
				.with_list_parse_key("profiler.schedule.profile_kinds"),
		);
	}

	if let Some(overrides) = matches.get_many::<String>("overrides") {
		for ov in overrides {
			let (key, value) = ov.split_once('=').ok_or_else(|| {
				clap::Error::raw(
					clap::error::ErrorKind::InvalidValue,
					"Override must be in the format KEY=VALUE",
				)
			})?;

			config = config.set_override(key, value)?;
		}
	}

	Ok(config.build()?.try_deserialize()?)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error(transparent)]
	Config(#[from] config::ConfigError),
	#[error(transparent)]
	Clap(#[from] clap::Error),
}
