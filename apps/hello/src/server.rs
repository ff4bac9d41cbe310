use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::telemetry::Telemetry;

#[derive(Debug)]
pub struct AppState {
	pub greeting: String,
	pub telemetry: Telemetry,
}

pub fn router(state: Arc<AppState>) -> Router {
	Router::new()
		.route("/invoke", get(invoke).post(invoke))
		.route("/health", get(health))
		.route("/metrics", get(metrics))
		.with_state(state)
}

/// Runs the load generators, then greets.
async fn invoke(State(state): State<Arc<AppState>>) -> String {
	let report = profsnap_load::generate_artificial_load();
	tracing::debug!(
		busy_spin_started = report.busy_spin_started,
		growth_spawned = report.growth_spawned,
		checksum = report.burn.checksum,
		"generated artificial load"
	);

	greet(&state.greeting)
}

async fn health() -> &'static str {
	"ok"
}

/// Prometheus scrape endpoint.
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
	match state.telemetry.encode() {
		Ok(text) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], text).into_response(),
		Err(err) => {
			tracing::error!(%err, "metrics encode failed");
			(StatusCode::INTERNAL_SERVER_ERROR, "metrics encode failed").into_response()
		}
	}
}

fn greet(greeting: &str) -> String {
	format!("Hi there: {greeting} 🌍")
}
