//! Application state management for the generator.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background tick and diagnostics tasks.

use herakles_synthetic_generator::config::{Config, SimulationSettings};
use herakles_synthetic_generator::{GeneratorMetrics, ProcessRegistry, SimulationStats};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    /// Prometheus registry holding process counters, gauge collectors and self metrics.
    pub registry: Registry,
    pub metrics: GeneratorMetrics,
    /// Simulated fleet.
    pub processes: Arc<ProcessRegistry>,
    pub stats: Arc<SimulationStats>,
    pub config: Arc<Config>,
    pub settings: SimulationSettings,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
