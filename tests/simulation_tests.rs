//! Integration tests for the simulation core.
//!
//! These tests drive the library API directly with seeded generators and a
//! recording counter sink.

use herakles_synthetic_generator::attributes::ServiceTier;
use herakles_synthetic_generator::catalog::MIB;
use herakles_synthetic_generator::population::FIRST_PID;
use herakles_synthetic_generator::process::{
    ProcessIdentity, ProcessState, ResourceAttributes, ResourceMetrics, SimulationProfile,
    MEMORY_MAX_BYTES, MEMORY_MIN_BYTES, OPEN_FDS_MAX, OPEN_FDS_MIN, THREADS_MAX, THREADS_MIN,
};
use herakles_synthetic_generator::tick::RESTART_PID_RANGE;
use herakles_synthetic_generator::{
    samplers, AttributeBundle, ChurnConfig, CounterSink, Population, PopulationBuilder,
    ProcessCounter, ProcessRegistry, TickEngine,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One pushed counter point.
#[derive(Debug, Clone, PartialEq)]
struct Point {
    counter: ProcessCounter,
    delta: f64,
    attributes: AttributeBundle,
}

#[derive(Default)]
struct RecordingSink {
    points: Mutex<Vec<Point>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<Point> {
        std::mem::take(&mut *self.points.lock().expect("sink lock"))
    }
}

impl CounterSink for RecordingSink {
    fn add(
        &self,
        counter: ProcessCounter,
        delta: f64,
        _resource: &ResourceAttributes,
        attributes: &AttributeBundle,
    ) {
        self.points.lock().expect("sink lock").push(Point {
            counter,
            delta,
            attributes: attributes.clone(),
        });
    }
}

fn setup(
    hosts: usize,
    per_host: usize,
    churn: ChurnConfig,
    seed: u64,
) -> (TickEngine, Arc<ProcessRegistry>, Arc<RecordingSink>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let population = PopulationBuilder::new(hosts, per_host).build(&mut rng);
    let registry = Arc::new(ProcessRegistry::new(population));
    let sink = Arc::new(RecordingSink::default());
    let engine = TickEngine::new(registry.clone(), sink.clone(), churn, rng);
    (engine, registry, sink)
}

fn assert_gauges_within_bounds(p: &ProcessState) {
    let m = &p.metrics;
    assert!(
        (MEMORY_MIN_BYTES..=MEMORY_MAX_BYTES).contains(&m.memory_bytes),
        "memory out of bounds for pid {}: {}",
        p.pid(),
        m.memory_bytes
    );
    assert!(
        (THREADS_MIN..=THREADS_MAX).contains(&m.threads),
        "threads out of bounds for pid {}: {}",
        p.pid(),
        m.threads
    );
    assert!(
        (OPEN_FDS_MIN..=OPEN_FDS_MAX).contains(&m.open_fds),
        "fds out of bounds for pid {}: {}",
        p.pid(),
        m.open_fds
    );
}

#[test]
fn test_default_fleet_shape() {
    let population = PopulationBuilder::new(3, 150).build(&mut StdRng::seed_from_u64(2024));
    assert_eq!(population.host_count(), 3);
    assert_eq!(population.process_count(), 450);

    let mut pids: Vec<u32> = population.processes().map(ProcessState::pid).collect();
    pids.sort_unstable();
    let expected: Vec<u32> = (FIRST_PID..=1450).collect();
    assert_eq!(pids, expected);

    for p in population.processes() {
        if let Some(cid) = &p.attributes().container_id {
            assert!(cid.starts_with("cid-"), "unexpected container id {cid}");
        }
    }
}

#[test]
fn test_container_fraction_near_seventy_percent() {
    let mut with_container = 0usize;
    let mut total = 0usize;
    for seed in 0..10u64 {
        let population = PopulationBuilder::new(3, 150).build(&mut StdRng::seed_from_u64(seed));
        total += population.process_count();
        with_container += population
            .processes()
            .filter(|p| p.attributes().container_id.is_some())
            .count();
    }
    let fraction = with_container as f64 / total as f64;
    assert!(
        (0.65..=0.75).contains(&fraction),
        "container fraction {fraction:.3} outside 70% +/- 5%"
    );
}

#[test]
fn test_same_seed_is_byte_identical() {
    let run = |seed: u64| {
        let (mut engine, registry, sink) = setup(1, 1, ChurnConfig::default(), seed);
        engine.tick();
        let state = format!("{:?}", *registry.read());
        let points = format!("{:?}", sink.take());
        (state, points)
    };

    let (state_a, points_a) = run(42);
    let (state_b, points_b) = run(42);
    assert_eq!(state_a, state_b);
    assert_eq!(points_a, points_b);

    let (state_c, _) = run(43);
    assert_ne!(state_a, state_c);
}

#[test]
fn test_gauges_stay_within_bounds() {
    let churn = ChurnConfig {
        restart_probability: 0.05,
        rename_probability: 0.5,
    };
    let (mut engine, registry, _) = setup(3, 40, churn, 7);

    for p in registry.read().processes() {
        assert_gauges_within_bounds(p);
    }
    for _ in 0..300 {
        engine.tick();
        for p in registry.read().processes() {
            assert_gauges_within_bounds(p);
        }
    }
}

#[test]
fn test_counters_are_non_decreasing() {
    let (mut engine, registry, sink) = setup(2, 30, ChurnConfig::disabled(), 8);

    let snapshot = |registry: &ProcessRegistry| -> HashMap<u32, (f64, f64, f64)> {
        registry
            .read()
            .processes()
            .map(|p| {
                let m = &p.metrics;
                (
                    p.pid(),
                    (m.cpu_time_seconds, m.disk_read_bytes, m.disk_write_bytes),
                )
            })
            .collect()
    };

    let mut previous = snapshot(&registry);
    for _ in 0..200 {
        engine.tick();
        let current = snapshot(&registry);
        for (pid, (cpu, read, write)) in &current {
            let (p_cpu, p_read, p_write) = previous[pid];
            assert!(*cpu >= p_cpu, "cpu decreased for pid {pid}");
            assert!(*read >= p_read, "disk read decreased for pid {pid}");
            assert!(*write >= p_write, "disk write decreased for pid {pid}");
        }
        previous = current;
    }
    assert!(sink.take().iter().all(|pt| pt.delta >= 0.0));
}

#[test]
fn test_reported_totals_are_non_decreasing_with_churn() {
    let churn = ChurnConfig {
        restart_probability: 0.1,
        rename_probability: 0.2,
    };
    let (mut engine, _, sink) = setup(2, 25, churn, 9);

    let mut totals: BTreeMap<(u32, &'static str), f64> = BTreeMap::new();
    for _ in 0..100 {
        engine.tick();
        for pt in sink.take() {
            assert!(pt.delta >= 0.0, "negative delta {pt:?}");
            let entry = totals
                .entry((pt.attributes.pid, pt.counter.name()))
                .or_insert(0.0);
            let before = *entry;
            *entry += pt.delta;
            assert!(*entry >= before);
        }
    }
}

#[test]
fn test_restart_starts_new_cpu_series_and_keeps_disk_totals() {
    let churn = ChurnConfig {
        restart_probability: 1.0,
        rename_probability: 0.0,
    };
    let (mut engine, registry, _) = setup(1, 20, churn, 10);
    let before: Vec<ResourceMetrics> = registry.read().processes().map(|p| p.metrics).collect();

    engine.tick();

    let population = registry.read();
    for (old, p) in before.iter().zip(population.processes()) {
        // The slot now holds a new process with its own CPU baseline.
        assert!(p.metrics.cpu_time_seconds < 100.0);
        assert!(p.metrics.disk_read_bytes >= old.disk_read_bytes);
        assert!(p.metrics.disk_write_bytes >= old.disk_write_bytes);
        assert_eq!(p.attributes().pid, p.pid());
        assert!(RESTART_PID_RANGE.contains(&p.pid()));
    }
}

#[test]
fn test_restart_regenerates_identity() {
    let churn = ChurnConfig {
        restart_probability: 1.0,
        rename_probability: 0.0,
    };
    let (mut engine, registry, _) = setup(2, 20, churn, 10);
    let before: Vec<ProcessState> = registry.read().processes().cloned().collect();

    let summary = engine.tick();
    assert_eq!(summary.restarts, 40);

    let population = registry.read();
    for (old, new) in before.iter().zip(population.processes()) {
        assert!(RESTART_PID_RANGE.contains(&new.pid()), "pid {}", new.pid());
        assert_ne!(old.identity().command_line, new.identity().command_line);
        assert_eq!(old.exec_name(), new.exec_name());
        assert_eq!(old.attributes().tier, new.attributes().tier);
        assert_eq!(old.resource(), new.resource());

        let attrs = new.attributes();
        assert_eq!(attrs.pid, new.pid());
        assert_eq!(attrs.pid_label, new.pid().to_string());
        assert_eq!(attrs.command_line, new.identity().command_line);
        assert_eq!(attrs.heavy_hitter, new.profile().heavy_hitter);
        assert_gauges_within_bounds(new);
    }
}

#[test]
fn test_restart_with_rename_reclassifies() {
    let churn = ChurnConfig {
        restart_probability: 1.0,
        rename_probability: 1.0,
    };
    let (mut engine, registry, _) = setup(1, 30, churn, 11);
    let before: Vec<ProcessState> = registry.read().processes().cloned().collect();
    engine.tick();

    let population = registry.read();
    for (old, new) in before.iter().zip(population.processes()) {
        assert_ne!(old.exec_name(), new.exec_name());
        assert!(new.exec_name().contains("_restarted_v"));
        assert_eq!(
            new.attributes().tier,
            ServiceTier::classify(new.exec_name())
        );
        assert_eq!(new.attributes().executable_name, new.exec_name());
        assert_eq!(
            new.identity().command_line,
            format!("/opt/bin/{} --reconfig --new-instance-{}", new.exec_name(), new.pid())
        );
    }
}

#[test]
fn test_restart_tick_reports_pre_restart_attributes() {
    let churn = ChurnConfig {
        restart_probability: 1.0,
        rename_probability: 0.0,
    };
    let (mut engine, registry, sink) = setup(1, 5, churn, 12);
    let old_pids: Vec<u32> = registry.read().processes().map(ProcessState::pid).collect();

    engine.tick();
    let points = sink.take();
    assert_eq!(points.len(), 15);
    let reported: Vec<u32> = points.chunks(3).map(|c| c[0].attributes.pid).collect();
    assert_eq!(reported, old_pids);

    // The following tick reports the new identity.
    let new_pids: Vec<u32> = registry.read().processes().map(ProcessState::pid).collect();
    engine.tick();
    let reported: Vec<u32> = sink.take().chunks(3).map(|c| c[0].attributes.pid).collect();
    assert_eq!(reported, new_pids);
}

fn process_with(pid: u32, exec_name: &str, profile: SimulationProfile) -> ProcessState {
    ProcessState::new(
        ProcessIdentity {
            pid,
            exec_name: exec_name.to_string(),
            owner: "app_user".to_string(),
            command_line: format!("/opt/app/{exec_name}"),
            container_id: None,
        },
        ResourceAttributes::new(
            "web-az1-node",
            "prod-apps",
            "backend-custom-1",
            "web-az1-node",
            exec_name,
        ),
        ResourceMetrics {
            memory_bytes: 256.0 * MIB,
            cpu_time_seconds: 0.0,
            threads: 20.0,
            open_fds: 50.0,
            disk_read_bytes: 0.0,
            disk_write_bytes: 0.0,
        },
        profile,
    )
}

fn custom_process(pid: u32, heavy_hitter: bool) -> ProcessState {
    process_with(
        pid,
        "custom_app_alpha",
        SimulationProfile {
            heavy_hitter,
            ..SimulationProfile::default()
        },
    )
}

fn single_host_engine(
    processes: Vec<ProcessState>,
    seed: u64,
) -> (TickEngine, Arc<ProcessRegistry>, Arc<RecordingSink>) {
    let mut hosts = BTreeMap::new();
    hosts.insert("web-az1-node".to_string(), processes);
    let registry = Arc::new(ProcessRegistry::new(Population::new(hosts)));
    let sink = Arc::new(RecordingSink::default());
    let engine = TickEngine::new(
        registry.clone(),
        sink.clone(),
        ChurnConfig::disabled(),
        StdRng::seed_from_u64(seed),
    );
    (engine, registry, sink)
}

#[test]
fn test_heavy_hitters_consume_more_cpu() {
    let (mut engine, _, sink) =
        single_host_engine(vec![custom_process(1, false), custom_process(2, true)], 13);

    let ticks = 10_000;
    let mut sums = [0.0f64; 2];
    for _ in 0..ticks {
        engine.tick();
        for pt in sink.take() {
            if pt.counter == ProcessCounter::CpuTime {
                sums[(pt.attributes.pid - 1) as usize] += pt.delta;
            }
        }
    }

    let normal_mean = sums[0] / ticks as f64;
    let heavy_mean = sums[1] / ticks as f64;
    // Expected means are roughly 0.35 and 1.23 CPU seconds per tick.
    assert!(
        heavy_mean > normal_mean * 2.0,
        "heavy mean {heavy_mean:.3} not clearly above normal mean {normal_mean:.3}"
    );
    assert!((0.30..0.40).contains(&normal_mean), "normal mean {normal_mean:.3}");
}

#[test]
fn test_leaking_process_drifts_upward() {
    let leaking = process_with(
        1,
        "custom_app_alpha",
        SimulationProfile {
            heavy_hitter: false,
            mem_leak_bytes_per_tick: 5.0 * MIB,
            fd_leak_per_tick: 3.0,
        },
    );
    let (mut engine, registry, _) =
        single_host_engine(vec![leaking, custom_process(2, false)], 17);

    for _ in 0..150 {
        engine.tick();
    }

    let population = registry.read();
    let procs = population.host("web-az1-node").expect("host exists");
    let (leaking, steady) = (&procs[0].metrics, &procs[1].metrics);
    // Expected: about 1040 MiB and 545 descriptors for the leaking process.
    assert!(leaking.memory_bytes > 650.0 * MIB, "memory {}", leaking.memory_bytes / MIB);
    assert!(leaking.memory_bytes > steady.memory_bytes + 300.0 * MIB);
    assert!(leaking.open_fds > 400.0, "fds {}", leaking.open_fds);
    assert!(steady.open_fds < 300.0, "fds {}", steady.open_fds);
    assert!(leaking.gauges_within_bounds());
}

#[test]
fn test_disk_amplified_for_postgres_and_heavy_hitters() {
    let processes = vec![
        custom_process(1, false),
        process_with(2, "postgres_primary", SimulationProfile::default()),
        process_with(3, "data_pipeline_worker", SimulationProfile::default()),
        custom_process(4, true),
    ];
    let (mut engine, _, sink) = single_host_engine(processes, 18);

    let ticks = 5_000;
    let mut reads = [0.0f64; 4];
    let mut writes = [0.0f64; 4];
    for _ in 0..ticks {
        engine.tick();
        for pt in sink.take() {
            let slot = (pt.attributes.pid - 1) as usize;
            match pt.counter {
                ProcessCounter::DiskRead => reads[slot] += pt.delta,
                ProcessCounter::DiskWrite => writes[slot] += pt.delta,
                ProcessCounter::CpuTime => {}
            }
        }
    }

    // Plain processes read about 40 KiB and write about 20 KiB per tick.
    let plain_read = reads[0] / ticks as f64;
    assert!((35_000.0..46_000.0).contains(&plain_read), "read {plain_read:.0}");
    for slot in 1..4 {
        let read_ratio = reads[slot] / reads[0];
        let write_ratio = writes[slot] / writes[0];
        assert!((2.6..3.4).contains(&read_ratio), "slot {slot} read ratio {read_ratio:.2}");
        assert!((2.6..3.4).contains(&write_ratio), "slot {slot} write ratio {write_ratio:.2}");
    }
}

#[test]
fn test_slow_reader_blocks_tick() {
    let (mut engine, registry, _) = setup(2, 50, ChurnConfig::default(), 14);
    let tick_done = Arc::new(AtomicBool::new(false));

    let guard = registry.read();
    let before: Vec<(u32, ResourceMetrics)> =
        guard.processes().map(|p| (p.pid(), p.metrics)).collect();

    let done = tick_done.clone();
    let handle = thread::spawn(move || {
        let summary = engine.tick();
        done.store(true, Ordering::SeqCst);
        summary
    });

    // Hold the read side long enough for the tick thread to be waiting.
    thread::sleep(Duration::from_millis(150));
    assert!(!tick_done.load(Ordering::SeqCst));
    let during: Vec<(u32, ResourceMetrics)> =
        guard.processes().map(|p| (p.pid(), p.metrics)).collect();
    assert_eq!(before, during);
    assert_eq!(guard.ticks(), 0);
    drop(guard);

    let summary = handle.join().expect("tick thread panicked");
    assert!(tick_done.load(Ordering::SeqCst));
    assert_eq!(summary.tick, 1);
    assert_eq!(registry.ticks(), 1);
}

#[test]
fn test_concurrent_sampling_sees_whole_ticks() {
    let (mut engine, registry, _) = setup(3, 60, ChurnConfig::default(), 15);
    let stop = Arc::new(AtomicBool::new(false));

    let ticker = {
        let stop = stop.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                engine.tick();
            }
            stop.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let registry = registry.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let [memory, threads, fds] = samplers(&registry);
                let mut checks = 0u64;
                while !stop.load(Ordering::SeqCst) {
                    {
                        let population = registry.read();
                        let tick = population.ticks();
                        assert!(population.processes().all(|p| p.last_tick() == tick));
                    }
                    let counts = [
                        memory.observe(|s| assert!(s.value >= MEMORY_MIN_BYTES)),
                        threads.observe(|s| assert!(s.value >= THREADS_MIN)),
                        fds.observe(|s| assert!(s.value >= OPEN_FDS_MIN)),
                    ];
                    assert!(counts.iter().all(|c| *c == 180));
                    checks += 1;
                }
                checks
            })
        })
        .collect();

    ticker.join().expect("ticker panicked");
    for reader in readers {
        reader.join().expect("reader panicked");
    }
    assert_eq!(registry.ticks(), 200);
}
