//! Configuration display endpoint handler.
//!
//! This module provides the `/config` endpoint handler that displays
//! the effective generator configuration.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use herakles_synthetic_generator::config::{DEFAULT_BIND_ADDR, DEFAULT_PORT};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");

    let cfg = &state.config;
    let sim = &state.settings;

    let mut out = String::new();

    writeln!(out, "HERAKLES SYNTHETIC GENERATOR - CONFIGURATION").ok();
    writeln!(out, "============================================").ok();
    writeln!(out).ok();

    writeln!(out, "SERVER CONFIGURATION").ok();
    writeln!(out, "--------------------").ok();
    writeln!(
        out,
        "bind:                         {}",
        cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    )
    .ok();
    writeln!(
        out,
        "port:                         {}",
        cfg.port.unwrap_or(DEFAULT_PORT)
    )
    .ok();
    writeln!(
        out,
        "enable_health:                {}",
        cfg.enable_health.unwrap_or(true)
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "TLS/SSL CONFIGURATION").ok();
    writeln!(out, "---------------------").ok();
    writeln!(
        out,
        "enable_tls:                   {}",
        cfg.enable_tls.unwrap_or(false)
    )
    .ok();
    writeln!(
        out,
        "tls_cert_path:                {}",
        cfg.tls_cert_path.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(
        out,
        "tls_key_path:                 {}",
        cfg.tls_key_path.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(out).ok();

    // Effective values, after defaults and fallbacks.
    writeln!(out, "SIMULATION").ok();
    writeln!(out, "----------").ok();
    writeln!(out, "host_count:                   {}", sim.host_count).ok();
    writeln!(
        out,
        "process_count_per_host:       {}",
        sim.process_count_per_host
    )
    .ok();
    writeln!(
        out,
        "tick_interval_seconds:        {}",
        sim.tick_interval.as_secs()
    )
    .ok();
    writeln!(
        out,
        "seed:                         {}",
        sim.seed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "entropy".to_string())
    )
    .ok();
    writeln!(
        out,
        "restart_probability:          {}",
        sim.churn.restart_probability
    )
    .ok();
    writeln!(
        out,
        "rename_probability:           {}",
        sim.churn.rename_probability
    )
    .ok();
    writeln!(
        out,
        "diagnostics_interval_seconds: {}",
        sim.diagnostics_interval
            .map(|d| d.as_secs().to_string())
            .unwrap_or_else(|| "disabled".to_string())
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "CONSTANT LABELS").ok();
    writeln!(out, "---------------").ok();
    writeln!(
        out,
        "benchmark_id:                 {}",
        cfg.benchmark_id.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(
        out,
        "deployment_environment:       {}",
        cfg.deployment_environment.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "LOGGING").ok();
    writeln!(out, "-------").ok();
    writeln!(
        out,
        "log_level:                    {}",
        cfg.log_level.as_deref().unwrap_or("info")
    )
    .ok();
    writeln!(out).ok();
    writeln!(out, "{FOOTER_TEXT}").ok();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        out,
    )
}
