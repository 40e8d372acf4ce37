//! Simulate command implementation.
//!
//! Builds the configured fleet, runs a number of ticks against an in-memory
//! sink and prints a summary. No server is started.

use ahash::AHashMap as HashMap;
use anyhow::Context;
use herakles_synthetic_generator::config::SimulationSettings;
use herakles_synthetic_generator::{
    samplers, AttributeBundle, CounterSink, PopulationBuilder, ProcessCounter, ProcessRegistry,
    ResourceAttributes, TickEngine,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::cli::ReportFormat;

/// Counter sink that keeps running totals per counter.
#[derive(Default)]
pub struct AccumulatingSink {
    totals: Mutex<HashMap<ProcessCounter, f64>>,
    points: AtomicU64,
}

impl AccumulatingSink {
    pub fn total(&self, counter: ProcessCounter) -> f64 {
        self.totals
            .lock()
            .expect("accumulating sink lock poisoned")
            .get(&counter)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn points(&self) -> u64 {
        self.points.load(Ordering::Relaxed)
    }
}

impl CounterSink for AccumulatingSink {
    fn add(
        &self,
        counter: ProcessCounter,
        delta: f64,
        _resource: &ResourceAttributes,
        _attributes: &AttributeBundle,
    ) {
        *self
            .totals
            .lock()
            .expect("accumulating sink lock poisoned")
            .entry(counter)
            .or_insert(0.0) += delta;
        self.points.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Serialize)]
pub struct HostSummary {
    pub host_name: String,
    pub namespace: String,
    pub processes: usize,
}

#[derive(Debug, Serialize)]
pub struct GaugeRange {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
}

/// Outcome of an offline run. Contains no timings, so equal seeds render
/// identical reports.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub ticks: u64,
    pub hosts: Vec<HostSummary>,
    pub tiers: BTreeMap<&'static str, usize>,
    pub heavy_hitters: usize,
    pub containerized: usize,
    pub restarts: usize,
    pub points_emitted: u64,
    pub counter_totals: BTreeMap<&'static str, f64>,
    pub gauges: Vec<GaugeRange>,
}

/// Runs `ticks` ticks of the configured fleet seeded with `seed`.
pub fn run_simulation(settings: &SimulationSettings, ticks: u64, seed: u64) -> SimulationReport {
    let mut rng = StdRng::seed_from_u64(seed);
    let population = PopulationBuilder::new(settings.host_count, settings.process_count_per_host)
        .build(&mut rng);
    let registry = Arc::new(ProcessRegistry::new(population));
    let sink = Arc::new(AccumulatingSink::default());

    let mut engine = TickEngine::new(registry.clone(), sink.clone(), settings.churn, rng);
    let mut restarts = 0usize;
    for _ in 0..ticks {
        restarts += engine.tick().restarts;
    }

    let population = registry.read();
    let hosts = population
        .hosts()
        .map(|(host_name, procs)| HostSummary {
            host_name: host_name.to_string(),
            namespace: procs
                .first()
                .map(|p| p.resource().k8s_namespace.clone())
                .unwrap_or_default(),
            processes: procs.len(),
        })
        .collect();

    let mut tier_counts: HashMap<&'static str, usize> = HashMap::new();
    let mut heavy_hitters = 0;
    let mut containerized = 0;
    for p in population.processes() {
        let attrs = p.attributes();
        *tier_counts.entry(attrs.tier.as_str()).or_insert(0) += 1;
        heavy_hitters += usize::from(attrs.heavy_hitter);
        containerized += usize::from(attrs.container_id.is_some());
    }
    drop(population);

    let counter_totals = ProcessCounter::ALL
        .iter()
        .map(|c| (c.name(), sink.total(*c)))
        .collect();

    let gauges = samplers(&registry)
        .iter()
        .map(|sampler| {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            let count = sampler.observe(|s| {
                min = min.min(s.value);
                max = max.max(s.value);
            });
            if count == 0 {
                min = 0.0;
                max = 0.0;
            }
            GaugeRange {
                name: sampler.gauge().name(),
                min,
                max,
            }
        })
        .collect();

    SimulationReport {
        seed,
        ticks,
        hosts,
        tiers: tier_counts.into_iter().collect(),
        heavy_hitters,
        containerized,
        restarts,
        points_emitted: sink.points(),
        counter_totals,
        gauges,
    }
}

/// Renders the report as a plain-text table.
pub fn render_table(report: &SimulationReport) -> anyhow::Result<String> {
    let mut out = String::new();
    let left = 36usize;

    writeln!(out, "SIMULATION REPORT")?;
    writeln!(out, "=================")?;
    writeln!(out, "{:left$} {}", "seed:", report.seed)?;
    writeln!(out, "{:left$} {}", "ticks:", report.ticks)?;
    writeln!(out)?;

    writeln!(out, "HOSTS")?;
    writeln!(out, "-----")?;
    for host in &report.hosts {
        writeln!(
            out,
            "{:24} {:20} {:>6} processes",
            host.host_name, host.namespace, host.processes
        )?;
    }
    writeln!(out)?;

    writeln!(out, "SERVICE TIERS")?;
    writeln!(out, "-------------")?;
    for (tier, count) in &report.tiers {
        writeln!(out, "{:left$} {}", tier, count)?;
    }
    writeln!(out, "{:left$} {}", "heavy hitters", report.heavy_hitters)?;
    writeln!(out, "{:left$} {}", "containerized", report.containerized)?;
    writeln!(out)?;

    writeln!(out, "ACTIVITY")?;
    writeln!(out, "--------")?;
    writeln!(out, "{:left$} {}", "restarts", report.restarts)?;
    writeln!(out, "{:left$} {}", "counter points emitted", report.points_emitted)?;
    for (name, total) in &report.counter_totals {
        writeln!(out, "{:left$} {:.3}", name, total)?;
    }
    writeln!(out)?;

    writeln!(out, "GAUGES")?;
    writeln!(out, "------")?;
    writeln!(out, "{:left$} {:>16} {:>16}", "", "min", "max")?;
    for g in &report.gauges {
        writeln!(out, "{:left$} {:>16.1} {:>16.1}", g.name, g.min, g.max)?;
    }
    Ok(out)
}

/// Runs the simulation and prints the report.
pub fn command_simulate(
    ticks: u64,
    seed: Option<u64>,
    format: ReportFormat,
    settings: &SimulationSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    // Without an explicit seed, draw one so the run can be repeated.
    let seed = seed
        .or(settings.seed)
        .unwrap_or_else(rand::random::<u64>);

    println!(
        "🧪 Simulating {} hosts x {} processes for {} ticks (seed {})",
        settings.host_count, settings.process_count_per_host, ticks, seed
    );

    let start = Instant::now();
    let report = run_simulation(settings, ticks, seed);
    let output = match format {
        ReportFormat::Table => render_table(&report)?,
        ReportFormat::Json => {
            serde_json::to_string_pretty(&report).context("failed to serialize simulation report")?
        }
    };

    println!("{output}");
    println!(
        "✅ Simulation completed in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}
