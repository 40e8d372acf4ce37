//! Periodic self-diagnostics of the generator process.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::registry::ProcessRegistry;
use crate::stats::SimulationStats;

/// Resident memory above which a warning is logged.
pub const HIGH_MEMORY_THRESHOLD_MB: f64 = 400.0;

/// Reads the generator's RSS memory usage from /proc/self/status.
pub fn read_self_memory_mb() -> Option<f64> {
    let content = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss_mb(&content)
}

fn parse_vm_rss_mb(status: &str) -> Option<f64> {
    for line in status.lines() {
        if let Some(value) = line.strip_prefix("VmRSS:") {
            let kb: u64 = value.split_whitespace().next()?.parse().ok()?;
            return Some(kb as f64 / 1024.0);
        }
    }
    None
}

/// One diagnostics reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticsSample {
    pub memory_mb: Option<f64>,
    pub active_processes: usize,
    pub ticks: u64,
}

impl DiagnosticsSample {
    pub fn is_high_memory(&self) -> bool {
        self.memory_mb
            .is_some_and(|mb| mb > HIGH_MEMORY_THRESHOLD_MB)
    }
}

/// Takes one reading and logs it.
pub fn sample(registry: &ProcessRegistry, stats: &SimulationStats) -> DiagnosticsSample {
    let (active_processes, ticks) = {
        let population = registry.read();
        (population.process_count(), population.ticks())
    };
    let memory_mb = read_self_memory_mb();
    if let Some(mb) = memory_mb {
        stats.record_generator_memory_mb(mb);
    }

    let reading = DiagnosticsSample {
        memory_mb,
        active_processes,
        ticks,
    };

    match reading.memory_mb {
        Some(mb) => info!(
            "Resource usage - RSS: {:.2} MB, active processes: {}, ticks: {}",
            mb, reading.active_processes, reading.ticks
        ),
        None => info!(
            "Resource usage - RSS: n/a, active processes: {}, ticks: {}",
            reading.active_processes, reading.ticks
        ),
    }
    if reading.is_high_memory() {
        warn!(
            "High memory usage detected: {:.2} MB exceeds {:.0} MB",
            reading.memory_mb.unwrap_or_default(),
            HIGH_MEMORY_THRESHOLD_MB
        );
    }
    reading
}

/// Logs a diagnostics reading every `interval` until shutdown is signalled.
pub async fn run_diagnostics(
    registry: Arc<ProcessRegistry>,
    stats: Arc<SimulationStats>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sample(&registry, &stats);
            }
            _ = shutdown.changed() => {
                debug!("Diagnostics task stopping");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::PopulationBuilder;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\tgen\nVmPeak:\t  9000 kB\nVmRSS:\t  51200 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss_mb(status), Some(50.0));
        assert_eq!(parse_vm_rss_mb("Name:\tgen\n"), None);
    }

    #[test]
    fn test_high_memory_threshold() {
        let mut reading = DiagnosticsSample {
            memory_mb: Some(HIGH_MEMORY_THRESHOLD_MB),
            active_processes: 0,
            ticks: 0,
        };
        assert!(!reading.is_high_memory());
        reading.memory_mb = Some(HIGH_MEMORY_THRESHOLD_MB + 1.0);
        assert!(reading.is_high_memory());
        reading.memory_mb = None;
        assert!(!reading.is_high_memory());
    }

    #[test]
    fn test_sample_counts_processes() {
        let population = PopulationBuilder::new(2, 3).build(&mut StdRng::seed_from_u64(41));
        let registry = ProcessRegistry::new(population);
        let stats = SimulationStats::new();

        let reading = sample(&registry, &stats);
        assert_eq!(reading.active_processes, 6);
        assert_eq!(reading.ticks, 0);
    }

    #[tokio::test]
    async fn test_run_diagnostics_stops_on_shutdown() {
        let registry = Arc::new(ProcessRegistry::default());
        let stats = Arc::new(SimulationStats::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_diagnostics(
            registry,
            stats,
            Duration::from_secs(3600),
            rx,
        ));
        tx.send(true).expect("send shutdown");
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("diagnostics task did not stop")
            .expect("diagnostics task panicked");
    }
}
