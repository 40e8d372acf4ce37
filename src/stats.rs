//! Runtime statistics for the generator.
//!
//! Tracks tick performance, churn, scrape activity and the generator's own
//! resource usage, and renders them as a plain-text table for `/health`.

use chrono::{DateTime, Local};
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::Instant;

use crate::tick::TickSummary;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// (last, avg, max, min, count)
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Statistics shared by the tick loop, diagnostics task and HTTP handlers.
pub struct SimulationStats {
    pub tick_duration_ms: Stat,
    pub ticks_total: AtomicU64,
    pub restarts_total: AtomicU64,
    pub counter_points_total: AtomicU64,
    pub scrape_duration_ms: Stat,
    pub scrapes_total: AtomicU64,
    pub generator_memory_mb: Stat,
    pub start_time: Instant,
    pub started_at: DateTime<Local>,
    pub last_tick_time: StdRwLock<Option<Instant>>,
    pub last_tick_at: StdRwLock<Option<DateTime<Local>>>,
}

impl Default for SimulationStats {
    fn default() -> Self {
        Self {
            tick_duration_ms: Stat::default(),
            ticks_total: AtomicU64::new(0),
            restarts_total: AtomicU64::new(0),
            counter_points_total: AtomicU64::new(0),
            scrape_duration_ms: Stat::default(),
            scrapes_total: AtomicU64::new(0),
            generator_memory_mb: Stat::default(),
            start_time: Instant::now(),
            started_at: Local::now(),
            last_tick_time: StdRwLock::new(None),
            last_tick_at: StdRwLock::new(None),
        }
    }
}

impl SimulationStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_tick(&self, summary: &TickSummary) {
        self.tick_duration_ms
            .add_sample(summary.duration.as_secs_f64() * 1000.0);
        self.ticks_total.fetch_add(1, Ordering::Relaxed);
        self.restarts_total
            .fetch_add(summary.restarts as u64, Ordering::Relaxed);
        self.counter_points_total
            .fetch_add(summary.points_emitted, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_tick_time.write() {
            *guard = Some(Instant::now());
        }
        if let Ok(mut guard) = self.last_tick_at.write() {
            *guard = Some(Local::now());
        }
    }

    pub fn record_scrape(&self, duration_ms: f64) {
        self.scrape_duration_ms.add_sample(duration_ms);
        self.scrapes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_generator_memory_mb(&self, memory_mb: f64) {
        self.generator_memory_mb.add_sample(memory_mb);
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Seconds since the last completed tick, if any.
    pub fn seconds_since_last_tick(&self) -> Option<f64> {
        self.last_tick_time
            .read()
            .ok()
            .and_then(|guard| guard.map(|t| t.elapsed().as_secs_f64()))
    }

    /// Wall-clock time of the last completed tick, or "N/A".
    pub fn get_last_tick_time_str(&self) -> String {
        self.last_tick_at
            .read()
            .ok()
            .and_then(|guard| *guard)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn render_table(&self) -> String {
        let (td_cur, td_avg, td_max, td_min, _) = self.tick_duration_ms.snapshot();
        let (sd_cur, sd_avg, sd_max, sd_min, _) = self.scrape_duration_ms.snapshot();
        let (gm_cur, gm_avg, gm_max, gm_min, _) = self.generator_memory_mb.snapshot();

        let ticks = self.ticks_total.load(Ordering::Relaxed);
        let restarts = self.restarts_total.load(Ordering::Relaxed);
        let points = self.counter_points_total.load(Ordering::Relaxed);
        let scrapes = self.scrapes_total.load(Ordering::Relaxed);
        let last_tick = self
            .seconds_since_last_tick()
            .map(|s| format!("{s:.1}s ago"))
            .unwrap_or_else(|| "N/A".to_string());

        let left_col = 26usize;
        let col_w = 12usize;
        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - GENERATOR INTERNAL STATS").ok();
        writeln!(out, "===========================================").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        let rows = [
            ("tick_duration (ms)", td_cur, td_avg, td_max, td_min),
            ("scrape_duration (ms)", sd_cur, sd_avg, sd_max, sd_min),
            ("generator_memory (MB)", gm_cur, gm_avg, gm_max, gm_min),
        ];
        for (name, cur, avg, max, min) in rows {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                name,
                format!("{:.3}", cur),
                format!("{:.3}", avg),
                format!("{:.3}", max),
                format!("{:.3}", min),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "SIMULATION").ok();
        writeln!(out, "----------").ok();
        writeln!(out, "{:left$} | {}", "ticks_total", ticks, left = left_col).ok();
        writeln!(out, "{:left$} | {}", "restarts_total", restarts, left = left_col).ok();
        writeln!(out, "{:left$} | {}", "counter_points_total", points, left = left_col).ok();
        writeln!(out, "{:left$} | {}", "scrapes_total", scrapes, left = left_col).ok();
        writeln!(out, "{:left$} | {}", "last_tick", last_tick, left = left_col).ok();
        writeln!(
            out,
            "{:left$} | {}",
            "last_tick_at",
            self.get_last_tick_time_str(),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {}",
            "started_at",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            left = left_col
        )
        .ok();
        out
    }
}
