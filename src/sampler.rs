//! Read-only gauge sampling.
//!
//! Each sampler reports one gauge (memory, threads or descriptors) for every
//! process. It holds the registry's read lock for the whole pass, so any
//! number of samplers can run together but never alongside a tick.

use serde::Serialize;
use std::sync::Arc;

use crate::attributes::AttributeBundle;
use crate::metrics::ProcessGauge;
use crate::process::ResourceAttributes;
use crate::registry::ProcessRegistry;

/// One borrowed (value, attributes) pair, valid for the duration of the read lock.
#[derive(Debug, Clone, Copy)]
pub struct GaugeSample<'a> {
    pub value: f64,
    pub resource: &'a ResourceAttributes,
    pub attributes: &'a AttributeBundle,
}

/// Owned copy of a sample, detached from the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnedGaugeSample {
    pub value: f64,
    pub resource: ResourceAttributes,
    pub attributes: AttributeBundle,
}

impl From<GaugeSample<'_>> for OwnedGaugeSample {
    fn from(s: GaugeSample<'_>) -> Self {
        Self {
            value: s.value,
            resource: s.resource.clone(),
            attributes: s.attributes.clone(),
        }
    }
}

/// Pull-side reader for a single gauge.
#[derive(Debug, Clone)]
pub struct GaugeSampler {
    registry: Arc<ProcessRegistry>,
    gauge: ProcessGauge,
}

impl GaugeSampler {
    pub fn new(registry: Arc<ProcessRegistry>, gauge: ProcessGauge) -> Self {
        Self { registry, gauge }
    }

    pub fn gauge(&self) -> ProcessGauge {
        self.gauge
    }

    /// Calls `f` once per process under a single read lock. Returns the
    /// number of samples produced.
    pub fn observe<F>(&self, mut f: F) -> usize
    where
        F: FnMut(GaugeSample<'_>),
    {
        let population = self.registry.read();
        let mut count = 0;
        for process in population.processes() {
            f(GaugeSample {
                value: self.gauge.value(&process.metrics),
                resource: process.resource(),
                attributes: process.attributes(),
            });
            count += 1;
        }
        count
    }

    /// Full owned snapshot of the current values.
    pub fn snapshot(&self) -> Vec<OwnedGaugeSample> {
        let mut samples = Vec::new();
        self.observe(|s| samples.push(s.into()));
        samples
    }
}

/// One sampler per gauge, all sharing the same registry.
pub fn samplers(registry: &Arc<ProcessRegistry>) -> [GaugeSampler; 3] {
    ProcessGauge::ALL.map(|gauge| GaugeSampler::new(Arc::clone(registry), gauge))
}
