//! Periodic mutation pass over the whole population.
//!
//! One tick takes the registry's write lock for the full batch, advances every
//! process, pushes three counter deltas per process to the sink and, rarely,
//! restarts a process in place.
//!
//! Counter deltas are pushed before the restart roll, so a process restarted
//! in tick N reports that tick's deltas under its pre-restart attributes; the
//! reset baselines only ever show up in gauges and in later deltas. The
//! pre-restart series are handed to `CounterSink::retire` at the end of the tick.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::catalog::MIB;
use crate::metrics::{CounterSink, ProcessCounter, RetiredSeries};
use crate::population::draw_profile;
use crate::process::{ProcessState, SimulationProfile};
use crate::registry::ProcessRegistry;

pub const DEFAULT_RESTART_PROBABILITY: f64 = 0.0005;
pub const DEFAULT_RENAME_PROBABILITY: f64 = 0.05;

/// Range new pids are drawn from on restart.
pub const RESTART_PID_RANGE: std::ops::Range<u32> = 70_000..100_000;

/// Counter points pushed per process per tick.
pub const POINTS_PER_PROCESS: u64 = 3;

/// Process churn knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChurnConfig {
    /// Chance per process per tick of an in-place restart.
    pub restart_probability: f64,
    /// Chance that a restart also renames the executable.
    pub rename_probability: f64,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            restart_probability: DEFAULT_RESTART_PROBABILITY,
            rename_probability: DEFAULT_RENAME_PROBABILITY,
        }
    }
}

impl ChurnConfig {
    /// No restarts at all.
    pub fn disabled() -> Self {
        Self {
            restart_probability: 0.0,
            rename_probability: 0.0,
        }
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSummary {
    pub tick: u64,
    pub processes: usize,
    pub points_emitted: u64,
    pub restarts: usize,
    pub duration: Duration,
}

/// Drives ticks against a shared registry.
pub struct TickEngine {
    registry: Arc<ProcessRegistry>,
    sink: Arc<dyn CounterSink>,
    churn: ChurnConfig,
    rng: StdRng,
}

impl TickEngine {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        sink: Arc<dyn CounterSink>,
        churn: ChurnConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            registry,
            sink,
            churn,
            rng,
        }
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// Advances every process by one step while holding the write lock.
    pub fn tick(&mut self) -> TickSummary {
        let start = Instant::now();

        let mut population = self.registry.write();
        let tick = population.begin_tick();
        let mut processes = 0usize;
        let mut retired = Vec::new();

        for process in population.processes_mut() {
            processes += 1;
            if let Some(series) =
                advance_process(process, tick, &mut self.rng, self.sink.as_ref(), &self.churn)
            {
                retired.push(series);
            }
        }
        drop(population);

        let restarts = retired.len();
        self.sink.retire(retired);

        let summary = TickSummary {
            tick,
            processes,
            points_emitted: processes as u64 * POINTS_PER_PROCESS,
            restarts,
            duration: start.elapsed(),
        };

        info!(
            "Tick {} completed. Emitted {} counter data points, {} restarts, {:.2}ms",
            summary.tick,
            summary.points_emitted,
            summary.restarts,
            summary.duration.as_secs_f64() * 1000.0
        );
        summary
    }
}

/// CPU seconds consumed in one tick.
pub fn cpu_delta<R: Rng + ?Sized>(rng: &mut R, exec_name: &str, heavy_hitter: bool) -> f64 {
    let mut delta = rng.gen::<f64>() * 0.7 + 0.001;
    if heavy_hitter || exec_name.contains("critical") {
        delta *= rng.gen_range(2.0..5.0);
    }
    if exec_name.starts_with("sidecar") {
        delta *= 0.15;
    }
    delta
}

/// Bytes read and written in one tick.
pub fn disk_deltas<R: Rng + ?Sized>(
    rng: &mut R,
    exec_name: &str,
    heavy_hitter: bool,
) -> (f64, f64) {
    let mut read = rng.gen::<f64>() * 1024.0 * f64::from(rng.gen_range(5..155u32));
    let mut write = rng.gen::<f64>() * 1024.0 * f64::from(rng.gen_range(2..77u32));
    if heavy_hitter || exec_name.contains("postgres") || exec_name.contains("data_pipeline") {
        read *= 3.0;
        write *= 3.0;
    }
    (read, write)
}

/// Strips any earlier restart or version suffix and appends a new one.
pub fn restarted_name(exec_name: &str, version: f64) -> String {
    let base = exec_name.split("_v").next().unwrap_or(exec_name);
    let base = base.split("_restarted").next().unwrap_or(base);
    format!("{base}_restarted_v{version:.1}")
}

/// Advances one process. Returns the series it reported under when it was
/// restarted.
fn advance_process<R: Rng + ?Sized>(
    process: &mut ProcessState,
    tick: u64,
    rng: &mut R,
    sink: &dyn CounterSink,
    churn: &ChurnConfig,
) -> Option<RetiredSeries> {
    let SimulationProfile {
        heavy_hitter,
        mem_leak_bytes_per_tick,
        fd_leak_per_tick,
    } = *process.profile();

    let cpu = cpu_delta(rng, process.exec_name(), heavy_hitter);
    process.metrics.cpu_time_seconds += cpu;
    sink.add(ProcessCounter::CpuTime, cpu, process.resource(), process.attributes());

    let (read, write) = disk_deltas(rng, process.exec_name(), heavy_hitter);
    process.metrics.disk_read_bytes += read;
    process.metrics.disk_write_bytes += write;
    sink.add(ProcessCounter::DiskRead, read, process.resource(), process.attributes());
    sink.add(ProcessCounter::DiskWrite, write, process.resource(), process.attributes());

    let mut mem_change = (rng.gen::<f64>() - 0.49) * f64::from(rng.gen_range(10..40u32)) * MIB;
    if heavy_hitter {
        mem_change *= 1.2;
    }
    process.metrics.memory_bytes += mem_change + mem_leak_bytes_per_tick;

    let mut thread_change = (rng.gen::<f64>() - 0.48) * 4.0;
    if heavy_hitter {
        thread_change += f64::from(rng.gen_range(0..8u32));
    }
    process.metrics.threads += thread_change;

    process.metrics.open_fds += (rng.gen::<f64>() - 0.47) * 10.0 + fd_leak_per_tick;
    process.metrics.clamp_gauges();
    process.mark_ticked(tick);

    if rng.gen::<f64>() < churn.restart_probability {
        let retired = RetiredSeries {
            resource: process.resource().clone(),
            attributes: process.attributes().clone(),
        };
        restart_process(process, rng, churn);
        return Some(retired);
    }
    None
}

/// Simulates the process exiting and a replacement starting in the same slot.
fn restart_process<R: Rng + ?Sized>(process: &mut ProcessState, rng: &mut R, churn: &ChurnConfig) {
    let old_pid = process.pid();
    let old_name = process.exec_name().to_string();

    let mut identity = process.identity().clone();
    identity.pid = rng.gen_range(RESTART_PID_RANGE);
    if rng.gen::<f64>() < churn.rename_probability {
        identity.exec_name = restarted_name(&identity.exec_name, rng.gen_range(1.0..3.0));
    }
    identity.command_line = format!(
        "/opt/bin/{} --reconfig --new-instance-{}",
        identity.exec_name, identity.pid
    );

    let metrics = &mut process.metrics;
    metrics.cpu_time_seconds = rng.gen::<f64>() * 100.0;
    metrics.memory_bytes = rng.gen::<f64>() * f64::from(64 + rng.gen_range(0..256u32)) * MIB;
    metrics.threads = f64::from(5 + rng.gen_range(0..20u32));
    metrics.open_fds = f64::from(10 + rng.gen_range(0..50u32));
    metrics.clamp_gauges();

    let profile = draw_profile(rng);
    process.reidentify(identity, profile);

    debug!(
        "Host {}: process {} (old PID {}) restarted as {} PID {}",
        process.resource().host_name,
        old_name,
        old_pid,
        process.exec_name(),
        process.pid()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeBundle;
    use crate::population::PopulationBuilder;
    use crate::process::ResourceAttributes;
    use rand::SeedableRng;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSink {
        points: Mutex<Vec<(ProcessCounter, u32, f64)>>,
        retired: Mutex<Vec<Vec<u32>>>,
    }

    impl CounterSink for CountingSink {
        fn add(
            &self,
            counter: ProcessCounter,
            delta: f64,
            _resource: &ResourceAttributes,
            attributes: &AttributeBundle,
        ) {
            self.points
                .lock()
                .expect("points lock")
                .push((counter, attributes.pid, delta));
        }

        fn retire(&self, retired: Vec<RetiredSeries>) {
            self.retired
                .lock()
                .expect("retired lock")
                .push(retired.iter().map(|r| r.attributes.pid).collect());
        }
    }

    fn engine(
        hosts: usize,
        per_host: usize,
        churn: ChurnConfig,
        seed: u64,
    ) -> (TickEngine, Arc<CountingSink>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let population = PopulationBuilder::new(hosts, per_host).build(&mut rng);
        let sink = Arc::new(CountingSink::default());
        let engine = TickEngine::new(
            Arc::new(ProcessRegistry::new(population)),
            sink.clone(),
            churn,
            rng,
        );
        (engine, sink)
    }

    #[test]
    fn test_restarted_name_strips_previous_suffix() {
        assert_eq!(restarted_name("node_gateway", 1.26), "node_gateway_restarted_v1.3");
        assert_eq!(
            restarted_name("node_gateway_restarted_v1.3", 2.0),
            "node_gateway_restarted_v2.0"
        );
    }

    #[test]
    fn test_sidecar_cpu_is_damped() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let d = cpu_delta(&mut rng, "sidecar_envoy_proxy", false);
            assert!(d > 0.0 && d <= 0.701 * 0.15 + 1e-12);
        }
    }

    #[test]
    fn test_three_points_per_process_in_order() {
        let (mut engine, sink) = engine(2, 7, ChurnConfig::disabled(), 12);
        let summary = engine.tick();

        assert_eq!(summary.tick, 1);
        assert_eq!(summary.processes, 14);
        assert_eq!(summary.points_emitted, 42);
        assert_eq!(summary.restarts, 0);

        let points = sink.points.lock().expect("points lock");
        assert_eq!(points.len(), 42);
        for chunk in points.chunks(3) {
            assert_eq!(chunk[0].0, ProcessCounter::CpuTime);
            assert_eq!(chunk[1].0, ProcessCounter::DiskRead);
            assert_eq!(chunk[2].0, ProcessCounter::DiskWrite);
            assert!(chunk.iter().all(|(_, pid, delta)| *pid == chunk[0].1 && *delta >= 0.0));
        }
    }

    #[test]
    fn test_retire_receives_pre_restart_series() {
        let churn = ChurnConfig {
            restart_probability: 1.0,
            rename_probability: 0.0,
        };
        let (mut engine, sink) = engine(1, 3, churn, 15);
        let old_pids: Vec<u32> = engine
            .registry()
            .read()
            .processes()
            .map(|p| p.pid())
            .collect();
        engine.tick();

        let (mut quiet, quiet_sink) = self::engine(1, 3, ChurnConfig::disabled(), 16);
        quiet.tick();

        let retired = sink.retired.lock().expect("retired lock");
        assert_eq!(retired.as_slice(), &[old_pids]);
        assert_eq!(
            quiet_sink.retired.lock().expect("retired lock").as_slice(),
            &[Vec::<u32>::new()]
        );
    }

    #[test]
    fn test_every_process_marked_with_tick() {
        let (mut engine, _) = engine(1, 5, ChurnConfig::disabled(), 13);
        engine.tick();
        engine.tick();
        let population = engine.registry().read();
        assert_eq!(population.ticks(), 2);
        assert!(population.processes().all(|p| p.last_tick() == 2));
    }

    #[test]
    fn test_forced_restart_keeps_resource_context() {
        let churn = ChurnConfig {
            restart_probability: 1.0,
            rename_probability: 1.0,
        };
        let (mut engine, _) = engine(1, 4, churn, 14);
        let before: Vec<ProcessState> = engine.registry().read().processes().cloned().collect();
        let summary = engine.tick();
        assert_eq!(summary.restarts, 4);

        let population = engine.registry().read();
        for (old, new) in before.iter().zip(population.processes()) {
            assert!(RESTART_PID_RANGE.contains(&new.pid()));
            assert!(new.exec_name().contains("_restarted_v"));
            assert!(new.identity().command_line.starts_with("/opt/bin/"));
            assert_eq!(old.resource(), new.resource());
            assert!(new.metrics.gauges_within_bounds());
            assert!(new.metrics.cpu_time_seconds < 100.0);
        }
    }
}
