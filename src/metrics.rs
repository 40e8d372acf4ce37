//! Metric boundary between the simulation and Prometheus.
//!
//! Counters are pushed by the tick engine through `CounterSink`; gauges are
//! pulled at scrape time by `GaugeCollector`, which runs a `GaugeSampler`
//! inside `Registry::gather`.
//!
//! Counter series belong to one attribute bundle. When a process restarts its
//! old series are retired: they stay exported for one more tick so the last
//! deltas can be scraped, then they are removed.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Counter, CounterVec, Gauge, GaugeVec, Opts, Registry};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

use crate::attributes::AttributeBundle;
use crate::process::{ResourceAttributes, ResourceMetrics};
use crate::registry::ProcessRegistry;
use crate::sampler::{samplers, GaugeSampler};
use crate::tick::TickSummary;

/// Label names on every per-process series: resource labels, then attributes.
pub const SERIES_LABELS: [&str; 14] = [
    "host_name",
    "service_name",
    "service_instance_id",
    "k8s_namespace_name",
    "k8s_pod_name",
    "k8s_node_name",
    "k8s_container_name",
    "process_executable_name",
    "process_owner",
    "process_pid",
    "process_command_line",
    "container_id",
    "service_tier",
    "heavy_hitter",
];

/// Label values matching `SERIES_LABELS`. Absent attributes map to "".
pub fn series_label_values<'a>(
    resource: &'a ResourceAttributes,
    attributes: &'a AttributeBundle,
) -> [&'a str; 14] {
    [
        resource.host_name.as_str(),
        resource.service_name.as_str(),
        resource.service_instance_id.as_str(),
        resource.k8s_namespace.as_str(),
        resource.k8s_pod.as_str(),
        resource.k8s_node.as_str(),
        resource.k8s_container.as_str(),
        attributes.executable_name.as_str(),
        attributes.owner.as_str(),
        attributes.pid_label.as_str(),
        attributes.command_line.as_str(),
        attributes.container_id.as_deref().unwrap_or(""),
        attributes.tier.as_str(),
        if attributes.heavy_hitter { "true" } else { "" },
    ]
}

/// Cumulative per-process quantities reported as per-tick deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessCounter {
    CpuTime,
    DiskRead,
    DiskWrite,
}

impl ProcessCounter {
    pub const ALL: [ProcessCounter; 3] = [
        ProcessCounter::CpuTime,
        ProcessCounter::DiskRead,
        ProcessCounter::DiskWrite,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProcessCounter::CpuTime => "process_cpu_time_seconds_total",
            ProcessCounter::DiskRead => "process_disk_io_read_bytes_total",
            ProcessCounter::DiskWrite => "process_disk_io_write_bytes_total",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            ProcessCounter::CpuTime => {
                "Cumulative CPU time consumed by the simulated process in seconds"
            }
            ProcessCounter::DiskRead => "Cumulative bytes read from disk by the simulated process",
            ProcessCounter::DiskWrite => {
                "Cumulative bytes written to disk by the simulated process"
            }
        }
    }
}

/// Point-in-time per-process values sampled on the reporter's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessGauge {
    MemoryUsage,
    Threads,
    OpenFileDescriptors,
}

impl ProcessGauge {
    pub const ALL: [ProcessGauge; 3] = [
        ProcessGauge::MemoryUsage,
        ProcessGauge::Threads,
        ProcessGauge::OpenFileDescriptors,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProcessGauge::MemoryUsage => "process_memory_usage_bytes",
            ProcessGauge::Threads => "process_threads",
            ProcessGauge::OpenFileDescriptors => "process_open_file_descriptors",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            ProcessGauge::MemoryUsage => "Resident set size of the simulated process in bytes",
            ProcessGauge::Threads => "Number of threads in the simulated process",
            ProcessGauge::OpenFileDescriptors => {
                "Number of open file descriptors of the simulated process"
            }
        }
    }

    pub fn value(&self, metrics: &ResourceMetrics) -> f64 {
        match self {
            ProcessGauge::MemoryUsage => metrics.memory_bytes,
            ProcessGauge::Threads => metrics.threads,
            ProcessGauge::OpenFileDescriptors => metrics.open_fds,
        }
    }
}

/// Labels a process reported under before it was restarted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetiredSeries {
    pub resource: ResourceAttributes,
    pub attributes: AttributeBundle,
}

/// Push interface for counter deltas. Implementations must not block.
pub trait CounterSink: Send + Sync {
    fn add(
        &self,
        counter: ProcessCounter,
        delta: f64,
        resource: &ResourceAttributes,
        attributes: &AttributeBundle,
    );

    /// Called once at the end of every tick with the series of the processes
    /// restarted in that tick, possibly none.
    fn retire(&self, _retired: Vec<RetiredSeries>) {}
}

/// `CounterSink` backed by Prometheus counter vectors.
#[derive(Clone)]
pub struct PrometheusCounters {
    cpu_time: CounterVec,
    disk_read: CounterVec,
    disk_write: CounterVec,
    /// Series retired by the previous tick, removed on the next `retire`.
    pending_removal: Arc<Mutex<Vec<RetiredSeries>>>,
}

impl PrometheusCounters {
    /// Creates and registers the three process counters.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let make = |counter: ProcessCounter| -> Result<CounterVec, prometheus::Error> {
            let vec = CounterVec::new(Opts::new(counter.name(), counter.help()), &SERIES_LABELS)?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };

        Ok(Self {
            cpu_time: make(ProcessCounter::CpuTime)?,
            disk_read: make(ProcessCounter::DiskRead)?,
            disk_write: make(ProcessCounter::DiskWrite)?,
            pending_removal: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn vec(&self, counter: ProcessCounter) -> &CounterVec {
        match counter {
            ProcessCounter::CpuTime => &self.cpu_time,
            ProcessCounter::DiskRead => &self.disk_read,
            ProcessCounter::DiskWrite => &self.disk_write,
        }
    }
}

impl CounterSink for PrometheusCounters {
    fn add(
        &self,
        counter: ProcessCounter,
        delta: f64,
        resource: &ResourceAttributes,
        attributes: &AttributeBundle,
    ) {
        let labels = series_label_values(resource, attributes);
        self.vec(counter).with_label_values(&labels).inc_by(delta);
    }

    fn retire(&self, retired: Vec<RetiredSeries>) {
        let expired = std::mem::replace(
            &mut *self
                .pending_removal
                .lock()
                .expect("pending removal lock poisoned"),
            retired,
        );

        for series in &expired {
            let labels = series_label_values(&series.resource, &series.attributes);
            for counter in ProcessCounter::ALL {
                if let Err(e) = self.vec(counter).remove_label_values(&labels) {
                    debug!(
                        "Series for PID {} already gone from {}: {}",
                        series.attributes.pid,
                        counter.name(),
                        e
                    );
                }
            }
        }
        if !expired.is_empty() {
            debug!("Removed counter series of {} restarted processes", expired.len());
        }
    }
}

/// Prometheus collector that samples one gauge at scrape time.
pub struct GaugeCollector {
    sampler: GaugeSampler,
    template: GaugeVec,
}

impl GaugeCollector {
    pub fn new(sampler: GaugeSampler) -> Result<Self, prometheus::Error> {
        let gauge = sampler.gauge();
        let template = GaugeVec::new(Opts::new(gauge.name(), gauge.help()), &SERIES_LABELS)?;
        Ok(Self { sampler, template })
    }
}

impl Collector for GaugeCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.template.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let gauge = self.sampler.gauge();
        // Fresh vector per scrape so series of restarted pids do not linger.
        let vec = match GaugeVec::new(Opts::new(gauge.name(), gauge.help()), &SERIES_LABELS) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to build gauge vector {}: {}", gauge.name(), e);
                return Vec::new();
            }
        };

        let count = self.sampler.observe(|s| {
            vec.with_label_values(&series_label_values(s.resource, s.attributes))
                .set(s.value);
        });
        debug!("Sampled {} values for {}", count, gauge.name());

        vec.collect()
    }
}

/// Registers one `GaugeCollector` per process gauge.
pub fn register_gauges(
    registry: &Registry,
    processes: &Arc<ProcessRegistry>,
) -> Result<(), prometheus::Error> {
    for sampler in samplers(processes) {
        registry.register(Box::new(GaugeCollector::new(sampler)?))?;
    }
    Ok(())
}

/// Self-telemetry of the generator.
#[derive(Clone)]
pub struct GeneratorMetrics {
    pub ticks_total: Counter,
    pub restarts_total: Counter,
    pub counter_points_total: Counter,
    pub tick_duration_seconds: Gauge,
    pub simulated_processes: Gauge,
    pub simulated_hosts: Gauge,
    pub scrape_duration_seconds: Gauge,
}

impl GeneratorMetrics {
    /// Creates and registers all self-telemetry metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let ticks_total = Counter::new(
            "synthetic_generator_ticks_total",
            "Number of completed simulation ticks",
        )?;
        let restarts_total = Counter::new(
            "synthetic_generator_restarts_total",
            "Number of simulated process restarts",
        )?;
        let counter_points_total = Counter::new(
            "synthetic_generator_counter_points_total",
            "Number of counter data points pushed by the tick engine",
        )?;
        let tick_duration_seconds = Gauge::new(
            "synthetic_generator_tick_duration_seconds",
            "Time spent in the last simulation tick",
        )?;
        let simulated_processes = Gauge::new(
            "synthetic_generator_simulated_processes",
            "Number of simulated processes in the registry",
        )?;
        let simulated_hosts = Gauge::new(
            "synthetic_generator_simulated_hosts",
            "Number of simulated hosts in the registry",
        )?;
        let scrape_duration_seconds = Gauge::new(
            "synthetic_generator_scrape_duration_seconds",
            "Time spent serving the last /metrics request",
        )?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(restarts_total.clone()))?;
        registry.register(Box::new(counter_points_total.clone()))?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;
        registry.register(Box::new(simulated_processes.clone()))?;
        registry.register(Box::new(simulated_hosts.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;

        Ok(Self {
            ticks_total,
            restarts_total,
            counter_points_total,
            tick_duration_seconds,
            simulated_processes,
            simulated_hosts,
            scrape_duration_seconds,
        })
    }

    pub fn record_tick(&self, summary: &TickSummary) {
        self.ticks_total.inc();
        self.restarts_total.inc_by(summary.restarts as f64);
        self.counter_points_total.inc_by(summary.points_emitted as f64);
        self.tick_duration_seconds.set(summary.duration.as_secs_f64());
        self.simulated_processes.set(summary.processes as f64);
    }
}
