//! Simulated process records.
//!
//! A `ProcessState` is pure data: it has no counterpart on the host. Identity
//! and the simulation profile are private so that every change goes through a
//! method that regenerates the attribute bundle.

use serde::Serialize;

use crate::attributes::{derive_attributes, AttributeBundle};
use crate::catalog::MIB;

/// Lower bound for resident memory.
pub const MEMORY_MIN_BYTES: f64 = 10.0 * MIB;
/// Upper bound for resident memory.
pub const MEMORY_MAX_BYTES: f64 = 1800.0 * MIB;
pub const THREADS_MIN: f64 = 2.0;
pub const THREADS_MAX: f64 = 200.0;
pub const OPEN_FDS_MIN: f64 = 5.0;
pub const OPEN_FDS_MAX: f64 = 900.0;

/// Identity fields that feed the attribute bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub exec_name: String,
    pub owner: String,
    pub command_line: String,
    pub container_id: Option<String>,
}

/// Deployment context, fixed when the process is created and kept across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceAttributes {
    pub host_name: String,
    pub service_name: String,
    pub service_instance_id: String,
    pub k8s_namespace: String,
    pub k8s_pod: String,
    pub k8s_node: String,
    pub k8s_container: String,
}

impl ResourceAttributes {
    /// Builds the context for a process placed on `host_name`/`node_name`.
    /// The service name is the pod name up to its first dash.
    pub fn new(
        host_name: &str,
        namespace: &str,
        pod_name: &str,
        node_name: &str,
        container_name: &str,
    ) -> Self {
        let service_name = pod_name.split('-').next().unwrap_or(pod_name).to_string();
        Self {
            host_name: host_name.to_string(),
            service_name,
            service_instance_id: pod_name.to_string(),
            k8s_namespace: namespace.to_string(),
            k8s_pod: pod_name.to_string(),
            k8s_node: node_name.to_string(),
            k8s_container: container_name.to_string(),
        }
    }
}

/// Resource usage values evolved by the tick engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceMetrics {
    pub memory_bytes: f64,
    pub cpu_time_seconds: f64,
    pub threads: f64,
    pub open_fds: f64,
    pub disk_read_bytes: f64,
    pub disk_write_bytes: f64,
}

impl ResourceMetrics {
    /// Clamps memory, threads and descriptors into their allowed ranges.
    pub fn clamp_gauges(&mut self) {
        self.memory_bytes = self.memory_bytes.clamp(MEMORY_MIN_BYTES, MEMORY_MAX_BYTES);
        self.threads = self.threads.clamp(THREADS_MIN, THREADS_MAX);
        self.open_fds = self.open_fds.clamp(OPEN_FDS_MIN, OPEN_FDS_MAX);
    }

    pub fn gauges_within_bounds(&self) -> bool {
        (MEMORY_MIN_BYTES..=MEMORY_MAX_BYTES).contains(&self.memory_bytes)
            && (THREADS_MIN..=THREADS_MAX).contains(&self.threads)
            && (OPEN_FDS_MIN..=OPEN_FDS_MAX).contains(&self.open_fds)
    }
}

/// Per-process simulation knobs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SimulationProfile {
    /// Amplifies CPU, disk, memory and thread deltas.
    pub heavy_hitter: bool,
    pub mem_leak_bytes_per_tick: f64,
    pub fd_leak_per_tick: f64,
}

/// One simulated process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessState {
    identity: ProcessIdentity,
    resource: ResourceAttributes,
    pub metrics: ResourceMetrics,
    profile: SimulationProfile,
    attributes: AttributeBundle,
    /// Number of the last tick that advanced this process.
    last_tick: u64,
}

impl ProcessState {
    pub fn new(
        identity: ProcessIdentity,
        resource: ResourceAttributes,
        metrics: ResourceMetrics,
        profile: SimulationProfile,
    ) -> Self {
        let attributes = derive_attributes(&identity, profile.heavy_hitter);
        Self {
            identity,
            resource,
            metrics,
            profile,
            attributes,
            last_tick: 0,
        }
    }

    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    pub fn pid(&self) -> u32 {
        self.identity.pid
    }

    pub fn exec_name(&self) -> &str {
        &self.identity.exec_name
    }

    pub fn resource(&self) -> &ResourceAttributes {
        &self.resource
    }

    pub fn profile(&self) -> &SimulationProfile {
        &self.profile
    }

    pub fn attributes(&self) -> &AttributeBundle {
        &self.attributes
    }

    pub fn last_tick(&self) -> u64 {
        self.last_tick
    }

    pub(crate) fn mark_ticked(&mut self, tick: u64) {
        self.last_tick = tick;
    }

    /// Replaces identity and profile together and regenerates the bundle.
    /// Resource attributes are left untouched.
    pub fn reidentify(&mut self, identity: ProcessIdentity, profile: SimulationProfile) {
        self.identity = identity;
        self.profile = profile;
        self.attributes = derive_attributes(&self.identity, self.profile.heavy_hitter);
    }
}
