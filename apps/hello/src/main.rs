//! Demo function for the profile scheduler.
//!
//! Serves `/invoke`, which generates artificial CPU, thread and allocation
//! load, while the scheduler writes profile snapshots to disk, or publishes
//! them to an ingestion endpoint, in the background. Scheduler counters are
//! served on `/metrics`.
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]

use std::sync::Arc;

use anyhow::Context;
use profsnap_pprof::{Cpu, Profiler, TrackingAllocator};
use profsnap_scheduler::{FileSink, HostCapture, HttpSink, Scheduler, SchedulerHandle};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod runtime;
mod server;
mod shutdown;
mod telemetry;

use config::{AppConfig, LoggingConfig};
use telemetry::Telemetry;

#[cfg(target_os = "linux")]
#[global_allocator]
static ALLOC: TrackingAllocator<tikv_jemallocator::Jemalloc> = TrackingAllocator::new(tikv_jemallocator::Jemalloc);

#[cfg(not(target_os = "linux"))]
#[global_allocator]
static ALLOC: TrackingAllocator<std::alloc::System> = TrackingAllocator::new(std::alloc::System);

/// Turns on jemalloc's sampling heap profiler, one sample per 512 KiB on
/// average.
#[cfg(target_os = "linux")]
#[allow(non_upper_case_globals)]
#[export_name = "malloc_conf"]
pub static malloc_conf: &[u8] = b"prof:true,prof_active:true,lg_prof_sample:19\0";

fn main() -> anyhow::Result<()> {
	let config: AppConfig = match config::parse_config(config::Options::default()) {
		Ok(config) => config,
		Err(config::ConfigError::Clap(err)) => err.exit(),
		Err(err) => return Err(err).context("failed to load config"),
	};

	init_tracing(&config.logging)?;

	let settings = runtime::RuntimeSettings::from_env();
	tracing::debug!(?settings, "building tokio runtime");
	let runtime = settings.builder().build().context("failed to build tokio runtime")?;

	let telemetry = Telemetry::new()?;
	telemetry.install_global();

	let shutdown_timeout = config.shutdown_timeout;
	let result = runtime::run(runtime, run(config, telemetry.clone()), shutdown_timeout);

	if let Err(err) = telemetry.shutdown() {
		tracing::warn!("{err:#}");
	}

	result
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
		.context("invalid log filter")?;

	let registry = tracing_subscriber::registry().with(filter);

	if logging.json {
		registry
			.with(tracing_subscriber::fmt::layer().json())
			.try_init()
			.context("set_global_default")?;
	} else {
		registry
			.with(tracing_subscriber::fmt::layer())
			.try_init()
			.context("set_global_default")?;
	}

	Ok(())
}

fn start_scheduler(config: &AppConfig) -> anyhow::Result<Option<SchedulerHandle>> {
	let lambda_function_name = std::env::var(config::LAMBDA_FUNCTION_NAME_ENV).ok();
	if !config.profiler.should_install(lambda_function_name.as_deref()) {
		tracing::info!(
			enabled = config.profiler.enabled,
			lambda_only = config.profiler.lambda_only,
			"profile scheduler not installed"
		);
		return Ok(None);
	}

	let cpu = Cpu::new::<&str>(config.profiler.cpu_frequency, &[]);
	let provider = HostCapture::new(Profiler::new(cpu).with_runtime(tokio::runtime::Handle::current()));
	let schedule = config.profiler.schedule.clone();

	let handle = match &config.profiler.ingest {
		Some(ingest) => {
			let sink = HttpSink::new(ingest.endpoint.clone(), ingest.timeout).context("failed to build ingest client")?;
			let handle = Scheduler::start(schedule, provider, sink).context("failed to start profile scheduler")?;
			tracing::info!(endpoint = %ingest.endpoint, "profile scheduler installed");
			handle
		}
		None => {
			let sink = FileSink::new(&config.profiler.output_dir);
			let handle = Scheduler::start(schedule, provider, sink).context("failed to start profile scheduler")?;
			tracing::info!(output_dir = %config.profiler.output_dir.display(), "profile scheduler installed");
			handle
		}
	};

	Ok(Some(handle))
}

async fn run(config: AppConfig, telemetry: Telemetry) -> anyhow::Result<()> {
	let scheduler = start_scheduler(&config)?;

	let mut signals = shutdown::SignalHandler::shutdown().context("failed to install signal handlers")?;

	let listener = tokio::net::TcpListener::bind(config.bind)
		.await
		.with_context(|| format!("failed to bind {}", config.bind))?;
	tracing::info!(bind = %config.bind, "listening");

	let state = Arc::new(server::AppState {
		greeting: config.greeting.clone(),
		telemetry,
	});

	axum::serve(listener, server::router(state))
		.with_graceful_shutdown(async move {
			let signal = signals.recv().await;
			tracing::info!(signal = signal.as_raw_value(), "received signal, shutting down");
		})
		.await
		.context("http server failed")?;

	if let Some(handle) = scheduler {
		shutdown::stop_scheduler(handle, config.shutdown_timeout).await;
	}

	tracing::info!(heap = ?profsnap_pprof::HeapProfile::snapshot(), "shutdown complete");

	Ok(())
}
