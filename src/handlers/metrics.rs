//! Metrics endpoint handler for Prometheus scraping.
//!
//! Counters are already up to date from the last tick; gauge collectors sample
//! the fleet inside `gather()` under the registry's read lock.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 512 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    // Gauge collectors take the population's read lock, which waits out a running tick.
    let families = tokio::task::block_in_place(|| state.registry.gather());

    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        return Err(MetricsError::EncodingFailed);
    }

    let time_series_count: usize = families.iter().map(|f| f.get_metric().len()).sum();
    let request_duration = start.elapsed();
    state
        .metrics
        .scrape_duration_seconds
        .set(request_duration.as_secs_f64());
    state
        .stats
        .record_scrape(request_duration.as_secs_f64() * 1000.0);

    debug!(
        "Metrics request completed: {} series, {} bytes, {:.3}ms",
        time_series_count,
        buffer.len(),
        request_duration.as_secs_f64() * 1000.0
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}
