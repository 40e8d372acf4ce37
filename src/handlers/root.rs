//! Root endpoint handler: a small HTML index with fleet counters and links.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use std::fmt::Write as FmtWrite;
use std::sync::atomic::Ordering;
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::{AppState, SharedState};

const STYLE: &str = "body { font-family: monospace; margin: 2em; } \
                     td { padding: 0 1.5em 0 0; }";

fn render_index(state: &AppState) -> String {
    let (hosts, processes, ticks) = {
        let population = state.processes.read();
        (
            population.host_count(),
            population.process_count(),
            population.ticks(),
        )
    };

    let rows = [
        ("hosts", hosts.to_string()),
        ("processes", processes.to_string()),
        ("ticks", ticks.to_string()),
        (
            "tick interval",
            format!("{}s", state.settings.tick_interval.as_secs()),
        ),
        ("last tick", state.stats.get_last_tick_time_str()),
        (
            "restarts",
            state.stats.restarts_total.load(Ordering::Relaxed).to_string(),
        ),
        ("uptime", format!("{}s", state.stats.get_uptime_seconds())),
    ];

    let mut html = String::new();
    write!(
        html,
        "<!DOCTYPE html>\n<html><head><meta charset=\"UTF-8\">\
         <title>Herakles Synthetic Generator</title><style>{STYLE}</style></head><body>\n\
         <h1>herakles-synthetic-generator {}</h1>\n<table>\n",
        env!("CARGO_PKG_VERSION")
    )
    .ok();
    for (name, value) in rows {
        writeln!(html, "<tr><td>{name}</td><td>{value}</td></tr>").ok();
    }
    html.push_str("</table>\n<ul>\n");
    for path in ["/metrics", "/health", "/config"] {
        writeln!(html, "<li><a href=\"{path}\">{path}</a></li>").ok();
    }
    write!(html, "</ul>\n<p>{FOOTER_TEXT}</p>\n</body></html>\n").ok();
    html
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    Html(tokio::task::block_in_place(|| render_index(&state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_synthetic_generator::config::{Config, SimulationSettings};
    use herakles_synthetic_generator::{
        GeneratorMetrics, PopulationBuilder, ProcessRegistry, SimulationStats,
    };
    use prometheus::Registry;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_index_shows_fleet_counters() {
        let population = PopulationBuilder::new(2, 6).build(&mut StdRng::seed_from_u64(42));
        let registry = Registry::new();
        let state = AppState {
            metrics: GeneratorMetrics::new(&registry).expect("register self metrics"),
            registry,
            processes: Arc::new(ProcessRegistry::new(population)),
            stats: Arc::new(SimulationStats::new()),
            config: Arc::new(Config::default()),
            settings: SimulationSettings::default(),
            start_time: Instant::now(),
        };

        let html = render_index(&state);
        assert!(html.contains("<tr><td>hosts</td><td>2</td></tr>"));
        assert!(html.contains("<tr><td>processes</td><td>12</td></tr>"));
        assert!(html.contains("<tr><td>ticks</td><td>0</td></tr>"));
        assert!(html.contains("<tr><td>tick interval</td><td>15s</td></tr>"));
        assert!(html.contains("<a href=\"/metrics\">/metrics</a>"));
    }
}
