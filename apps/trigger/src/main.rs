//! Invokes a deployed demo function a fixed number of times so the profile
//! scheduler has something to capture.
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone, Parser)]
#[command(version, about)]
struct Args {
	/// Invoke endpoint of the function, e.g. `http://localhost:8080/invoke`.
	target: url::Url,
	/// Number of invocations.
	#[arg(short = 'n', long, default_value_t = 60)]
	requests: u32,
	/// Pause after each invocation.
	#[arg(short, long, default_value = "10ms", value_parser = humantime::parse_duration)]
	interval: Duration,
	/// Per request timeout.
	#[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
	timeout: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Summary {
	succeeded: u32,
	failed: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with(tracing_subscriber::fmt::layer())
		.try_init()
		.context("set_global_default")?;

	let client = reqwest::Client::builder()
		.timeout(args.timeout)
		.build()
		.context("failed to build http client")?;

	let summary = invoke_all(&client, &args).await;
	tracing::info!(succeeded = summary.succeeded, failed = summary.failed, "done");

	Ok(())
}

/// One invocation after another, no retries. Failures are logged and counted.
async fn invoke_all(client: &reqwest::Client, args: &Args) -> Summary {
	let mut summary = Summary::default();

	for i in 1..=args.requests {
		match invoke(client, &args.target).await {
			Ok(body) => {
				summary.succeeded += 1;
				tracing::info!("Response ({i} of {}): {body}", args.requests);
			}
			Err(err) => {
				summary.failed += 1;
				tracing::warn!("Failed to invoke function: {err:#}");
			}
		}

		tokio::time::sleep(args.interval).await;
	}

	summary
}

async fn invoke(client: &reqwest::Client, target: &url::Url) -> anyhow::Result<String> {
	let response = client
		.post(target.clone())
		.send()
		.await
		.context("request failed")?
		.error_for_status()?;

	response.text().await.context("failed to read response body")
}
