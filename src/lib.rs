//! Herakles Synthetic Generator Library
//!
//! Simulates a fleet of hosts running long-lived processes and reports their
//! resource usage as per-process metrics. The library is independent of the
//! HTTP server in the binary, so the simulation can be driven directly from
//! tests or embedded in other tools.
//!
//! # Features
//!
//! - **Deterministic fleets**: all randomness comes from an injected generator
//! - **Push counters**: per-tick CPU and disk deltas delivered to a `CounterSink`
//! - **Pull gauges**: memory, threads and descriptors sampled on demand
//! - **Process churn**: rare in-place restarts with new pids and attributes
//!
//! # Usage
//!
//! ```rust
//! use herakles_synthetic_generator::{
//!     samplers, ChurnConfig, CounterSink, PopulationBuilder, ProcessCounter, ProcessRegistry,
//!     ResourceAttributes, AttributeBundle, TickEngine,
//! };
//! use rand::{rngs::StdRng, SeedableRng};
//! use std::sync::Arc;
//!
//! struct Discard;
//! impl CounterSink for Discard {
//!     fn add(&self, _: ProcessCounter, _: f64, _: &ResourceAttributes, _: &AttributeBundle) {}
//! }
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let population = PopulationBuilder::new(2, 10).build(&mut rng);
//! let registry = Arc::new(ProcessRegistry::new(population));
//!
//! let mut engine =
//!     TickEngine::new(registry.clone(), Arc::new(Discard), ChurnConfig::default(), rng);
//! let summary = engine.tick();
//! assert_eq!(summary.points_emitted, 60);
//!
//! let [memory, _, _] = samplers(&registry);
//! assert_eq!(memory.snapshot().len(), 20);
//! ```

pub mod attributes;
pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod metrics;
pub mod population;
pub mod process;
pub mod registry;
pub mod sampler;
pub mod stats;
pub mod tick;

// Re-export main types for convenience
pub use attributes::{derive_attributes, AttributeBundle, ServiceTier};
pub use config::{Config, ConfigError, ConfigFormat, SimulationSettings};
pub use metrics::{
    register_gauges, CounterSink, GaugeCollector, GeneratorMetrics, ProcessCounter, ProcessGauge,
    PrometheusCounters, RetiredSeries,
};
pub use population::PopulationBuilder;
pub use process::{ProcessIdentity, ProcessState, ResourceAttributes, ResourceMetrics};
pub use registry::{Population, ProcessRegistry};
pub use sampler::{samplers, GaugeSample, GaugeSampler, OwnedGaugeSample};
pub use stats::SimulationStats;
pub use tick::{ChurnConfig, TickEngine, TickSummary};
