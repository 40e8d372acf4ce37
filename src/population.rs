//! Initial population construction.
//!
//! Builds every host and process once at startup. All randomness comes from the
//! caller's generator, so a seeded generator yields the same fleet every run.

use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::catalog::{
    pick, ContainerIdPool, BASE_HOSTNAMES, EXEC_NAMES, MIB, NAMESPACES, NODE_SUFFIXES, OWNERS,
    POD_PREFIXES,
};
use crate::process::{
    ProcessIdentity, ProcessState, ResourceAttributes, ResourceMetrics, SimulationProfile,
};
use crate::registry::Population;

/// Pid of the first process built; the rest follow sequentially.
pub const FIRST_PID: u32 = 1001;

pub const CONTAINER_PROBABILITY: f64 = 0.70;
pub const HEAVY_HITTER_PROBABILITY: f64 = 0.08;
pub const MEM_LEAK_PROBABILITY: f64 = 0.02;
pub const MEM_LEAK_MAX_BYTES: f64 = 5.0 * MIB;
pub const FD_LEAK_PROBABILITY: f64 = 0.01;
pub const FD_LEAK_MAX: f64 = 3.0;

/// Maximum length of the executable-derived part of a pod name.
const POD_BASE_MAX_LEN: usize = 12;

/// Builds a `Population` of `host_count * processes_per_host` processes.
#[derive(Debug, Clone, Copy)]
pub struct PopulationBuilder {
    host_count: usize,
    processes_per_host: usize,
}

impl PopulationBuilder {
    pub fn new(host_count: usize, processes_per_host: usize) -> Self {
        Self {
            host_count,
            processes_per_host,
        }
    }

    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Population {
        info!(
            "Initializing {} hosts, each with {} processes",
            self.host_count, self.processes_per_host
        );

        let containers = ContainerIdPool::generate(rng);
        let mut hosts: BTreeMap<String, Vec<ProcessState>> = BTreeMap::new();
        let mut next_pid = FIRST_PID;

        for h in 0..self.host_count {
            let node_name = host_identity(h);
            let namespace = pick(rng, NAMESPACES);
            let mut procs = Vec::with_capacity(self.processes_per_host);

            for slot in 0..self.processes_per_host {
                let process =
                    build_process(rng, &containers, &node_name, namespace, slot, next_pid);
                next_pid += 1;
                procs.push(process);
            }

            hosts.insert(node_name, procs);
        }

        let population = Population::new(hosts);
        info!(
            "Initialized {} hosts, {} total processes",
            population.host_count(),
            population.process_count()
        );
        population
    }
}

/// Host (and node) name for a host index.
///
/// Names cycle through every stem/suffix combination; later cycles carry a
/// numeric suffix so that no two hosts share a name.
pub fn host_identity(index: usize) -> String {
    let base = BASE_HOSTNAMES[index % BASE_HOSTNAMES.len()];
    let suffix = NODE_SUFFIXES[index % NODE_SUFFIXES.len()];
    let cycle = index / (BASE_HOSTNAMES.len() * NODE_SUFFIXES.len());
    if cycle == 0 {
        format!("{base}-{suffix}")
    } else {
        format!("{base}-{suffix}-{cycle}")
    }
}

/// `<prefix>-<exec stem>-<hex>`: the stem is the executable name up to the
/// first underscore, dashes removed, truncated to 12 characters.
pub fn pod_name<R: Rng + ?Sized>(rng: &mut R, exec_name: &str) -> String {
    let stem: String = exec_name
        .split('_')
        .next()
        .unwrap_or(exec_name)
        .chars()
        .filter(|c| *c != '-')
        .take(POD_BASE_MAX_LEN)
        .collect();
    let prefix = pick(rng, POD_PREFIXES);
    let suffix: u32 = rng.gen_range(0..0xfff);
    format!("{prefix}-{stem}-{suffix:x}")
}

/// Command line for a freshly built process. Java executables get a JVM-style
/// invocation with a randomized heap size and a slot-derived port.
pub fn command_line<R: Rng + ?Sized>(
    rng: &mut R,
    exec_name: &str,
    slot: usize,
    pod: &str,
    namespace: &str,
) -> String {
    if exec_name.contains("java") {
        let heap_mb = 128 + rng.gen_range(0..8) * 32;
        let app_name = exec_name.replace("java_", "").replace('_', "-");
        format!(
            "/usr/bin/java -Dapp.name={app} -Dspring.profiles.active={ns} -Xms{xms}m -Xmx{xmx}m -jar /opt/apps/{app}.jar --server.port={port}",
            app = app_name,
            ns = namespace,
            xms = heap_mb / 2,
            xmx = heap_mb,
            port = 8000 + slot % 100,
        )
    } else {
        format!(
            "/opt/app/{exec_name} --config /etc/app/config.yaml --instance {} --pod {pod} --namespace {namespace}",
            slot % 20
        )
    }
}

/// Rolls heavy-hitter flag and leak rates.
pub fn draw_profile<R: Rng + ?Sized>(rng: &mut R) -> SimulationProfile {
    let heavy_hitter = rng.gen_bool(HEAVY_HITTER_PROBABILITY);
    let mem_leak_bytes_per_tick = if rng.gen_bool(MEM_LEAK_PROBABILITY) {
        rng.gen::<f64>() * MEM_LEAK_MAX_BYTES
    } else {
        0.0
    };
    let fd_leak_per_tick = if rng.gen_bool(FD_LEAK_PROBABILITY) {
        rng.gen::<f64>() * FD_LEAK_MAX
    } else {
        0.0
    };
    SimulationProfile {
        heavy_hitter,
        mem_leak_bytes_per_tick,
        fd_leak_per_tick,
    }
}

fn baseline_metrics<R: Rng + ?Sized>(rng: &mut R) -> ResourceMetrics {
    let memory_bytes = rng.gen::<f64>() * f64::from(64 + rng.gen_range(0..1024u32)) * MIB;
    let cpu_time_seconds = rng.gen::<f64>() * f64::from(100 + rng.gen_range(0..3900u32));
    let threads = f64::from(5 + rng.gen_range(0..80u32));
    let open_fds = f64::from(10 + rng.gen_range(0..300u32));
    let disk_read_bytes = rng.gen::<f64>() * MIB * f64::from(20 + rng.gen_range(0..180u32));
    let disk_write_bytes = rng.gen::<f64>() * MIB * f64::from(10 + rng.gen_range(0..90u32));

    let mut metrics = ResourceMetrics {
        memory_bytes,
        cpu_time_seconds,
        threads,
        open_fds,
        disk_read_bytes,
        disk_write_bytes,
    };
    metrics.clamp_gauges();
    metrics
}

fn build_process<R: Rng + ?Sized>(
    rng: &mut R,
    containers: &ContainerIdPool,
    node_name: &str,
    namespace: &str,
    slot: usize,
    pid: u32,
) -> ProcessState {
    let exec_name = pick(rng, EXEC_NAMES);
    let owner = pick(rng, OWNERS);
    let container_id = if rng.gen_bool(CONTAINER_PROBABILITY) {
        Some(containers.pick(rng).to_string())
    } else {
        None
    };

    let pod = pod_name(rng, exec_name);
    let cmd = command_line(rng, exec_name, slot, &pod, namespace);
    let metrics = baseline_metrics(rng);
    let profile = draw_profile(rng);

    if profile.mem_leak_bytes_per_tick > 0.0 {
        debug!(
            "Simulating memory leak for {} (PID {}) on {} at {:.2} MB/tick",
            exec_name,
            pid,
            node_name,
            profile.mem_leak_bytes_per_tick / MIB
        );
    }
    if profile.fd_leak_per_tick > 0.0 {
        debug!(
            "Simulating FD leak for {} (PID {}) on {} at {:.2} FDs/tick",
            exec_name, pid, node_name, profile.fd_leak_per_tick
        );
    }

    ProcessState::new(
        ProcessIdentity {
            pid,
            exec_name: exec_name.to_string(),
            owner: owner.to_string(),
            command_line: cmd,
            container_id,
        },
        ResourceAttributes::new(node_name, namespace, &pod, node_name, exec_name),
        metrics,
        profile,
    )
}
