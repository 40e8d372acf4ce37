//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! generator health statistics and tick liveness.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// A tick older than this many intervals marks the generator as stalled.
const STALLED_TICK_FACTOR: f64 = 3.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/cansp-dev/herakles-synthetic-generator - More info: https://www.herakles.now - Support: exporter@herakles.now";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let interval = state.settings.tick_interval.as_secs_f64();
    let since_last_tick = state.stats.seconds_since_last_tick();
    let since_start = state.start_time.elapsed().as_secs_f64();

    // Before the first tick, allow the same grace period measured from start.
    let stalled = since_last_tick.unwrap_or(since_start) > interval * STALLED_TICK_FACTOR;

    let (status, message) = if stalled {
        (StatusCode::SERVICE_UNAVAILABLE, "Tick loop stalled")
    } else if since_last_tick.is_none() {
        (StatusCode::OK, "OK - Waiting for first tick")
    } else {
        (StatusCode::OK, "OK")
    };

    let uptime_seconds = state.stats.get_uptime_seconds();
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    // Fleet size is fixed at startup, so no population lock is needed here.
    let hosts = state.settings.host_count;
    let processes = state.settings.total_processes();

    let table = state.stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nUptime: {uptime_str}\nFleet: {hosts} hosts, {processes} processes\n\n{table}\n{FOOTER_TEXT}"
        ),
    )
}
