//! herakles-synthetic-generator - version 0.1.0
//!
//! Synthetic per-process telemetry generator with tracing logging.
//! This is the main entry point that builds the simulated fleet, starts the
//! tick loop and the HTTP server, and handles subcommands.

mod cli;
mod commands;
mod handlers;
mod state;

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use herakles_synthetic_generator::config::{
    show_config, validate_effective_config, validate_tls_config, Config, SimulationSettings,
    DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use herakles_synthetic_generator::diagnostics::run_diagnostics;
use herakles_synthetic_generator::{
    register_gauges, GeneratorMetrics, PopulationBuilder, ProcessRegistry, PrometheusCounters,
    SimulationStats, TickEngine,
};
use prometheus::Registry;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{
    net::TcpListener,
    signal,
    sync::watch,
    time::{interval, MissedTickBehavior},
};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};

use cli::{resolve_config, Args, Commands, LogLevel};
use commands::{command_config, command_simulate};
use handlers::{config_handler, health_handler, metrics_handler, root_handler};
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    debug!("Logging initialized with level: {:?}", args.log_level);
}

/// Creates the Prometheus registry, with `benchmark_id` and
/// `deployment_environment` as constant labels when configured.
fn build_registry(config: &Config) -> Result<Registry, prometheus::Error> {
    let mut labels = HashMap::new();
    if let Some(id) = config.benchmark_id.as_deref().filter(|s| !s.is_empty()) {
        labels.insert("benchmark_id".to_string(), id.to_string());
    }
    if let Some(env) = config
        .deployment_environment
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        labels.insert("deployment_environment".to_string(), env.to_string());
    }

    if labels.is_empty() {
        Ok(Registry::new())
    } else {
        Registry::new_custom(None, Some(labels))
    }
}

/// Runs one tick per interval until shutdown is signalled. A tick in progress
/// always completes; shutdown is only observed between ticks.
async fn run_tick_loop(
    mut engine: TickEngine,
    period: Duration,
    metrics: GeneratorMetrics,
    stats: Arc<SimulationStats>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // The tick holds the registry's write lock; keep it off the async workers.
                let summary = tokio::task::block_in_place(|| engine.tick());
                metrics.record_tick(&summary);
                stats.record_tick(&summary);
            }
            _ = shutdown.changed() => {
                info!(
                    "Tick loop stopping after {} ticks",
                    engine.registry().ticks()
                );
                return;
            }
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_logging(&args);

    // Early config resolution for show/check modes
    if args.show_config || args.show_user_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        if args.show_config {
            return Ok(show_config(&config, args.config_format, false)?);
        }

        if args.show_user_config {
            return Ok(show_config(&config, args.config_format, true)?);
        }
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), *format, *commented),

            Commands::Simulate {
                ticks,
                seed,
                format,
            } => {
                let config = resolve_config(&args)?;
                let settings = SimulationSettings::from_config(&config);
                command_simulate(*ticks, *seed, *format, &settings)
            }
        };
    }

    // Load configuration for main server mode
    let config = resolve_config(&args)?;

    if let Err(e) = validate_tls_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    let settings = SimulationSettings::from_config(&config);

    info!("Starting herakles-synthetic-generator");
    info!(
        "Configuration - processes per host: {}, hosts: {}, tick interval: {}s",
        settings.process_count_per_host,
        settings.host_count,
        settings.tick_interval.as_secs()
    );

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR).to_string();
    let port = config.port.unwrap_or(DEFAULT_PORT);

    let mut rng = match settings.seed {
        Some(seed) => {
            info!("Using fixed seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let population = PopulationBuilder::new(settings.host_count, settings.process_count_per_host)
        .build(&mut rng);
    let processes = Arc::new(ProcessRegistry::new(population));

    // Initialize Prometheus metrics registry
    let registry = build_registry(&config)?;
    let counters = Arc::new(PrometheusCounters::new(&registry)?);
    register_gauges(&registry, &processes)?;
    let metrics = GeneratorMetrics::new(&registry)?;
    {
        let population = processes.read();
        metrics.simulated_hosts.set(population.host_count() as f64);
        metrics
            .simulated_processes
            .set(population.process_count() as f64);
    }
    debug!("All metrics registered successfully");

    let stats = Arc::new(SimulationStats::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = TickEngine::new(processes.clone(), counters, settings.churn, rng);
    let tick_task = tokio::spawn(run_tick_loop(
        engine,
        settings.tick_interval,
        metrics.clone(),
        stats.clone(),
        shutdown_rx.clone(),
    ));

    let diagnostics_task = settings.diagnostics_interval.map(|period| {
        tokio::spawn(run_diagnostics(
            processes.clone(),
            stats.clone(),
            period,
            shutdown_rx.clone(),
        ))
    });

    let state: SharedState = Arc::new(AppState {
        registry,
        metrics,
        processes,
        stats,
        config: Arc::new(config.clone()),
        settings,
        start_time: Instant::now(),
    });

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/config", get(config_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state.clone());

    let server_result: Result<(), Box<dyn std::error::Error>> =
        if config.enable_tls.unwrap_or(false) {
            let (cert_path, key_path) =
                match (config.tls_cert_path.as_deref(), config.tls_key_path.as_deref()) {
                    (Some(cert), Some(key)) => (cert, key),
                    _ => return Err("TLS is enabled but certificate or key path is not set".into()),
                };

            info!("Loading TLS certificate from: {}", cert_path);
            info!("Loading TLS private key from: {}", key_path);

            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .map_err(|e| {
                    error!("Failed to load TLS configuration: {}", e);
                    e
                })?;

            info!(
                "herakles-synthetic-generator listening on https://{}:{}",
                bind_ip_str, port
            );

            let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

            tokio::select! {
                result = server => result.map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
                _ = shutdown_signal => {
                    info!("Shutdown signal received, exiting...");
                    Ok(())
                }
            }
        } else {
            let listener = TcpListener::bind(addr).await?;
            info!(
                "herakles-synthetic-generator listening on http://{}:{}",
                bind_ip_str, port
            );

            let server = axum::serve(listener, app);

            tokio::select! {
                result = server => result.map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
                _ = shutdown_signal => {
                    info!("Shutdown signal received, exiting...");
                    Ok(())
                }
            }
        };

    if let Err(e) = &server_result {
        error!("Server error: {}", e);
    }

    // Stop background tasks; an in-flight tick finishes first.
    let _ = shutdown_tx.send(true);
    if let Err(e) = tick_task.await {
        error!("Tick task failed: {}", e);
    }
    if let Some(task) = diagnostics_task {
        if let Err(e) = task.await {
            error!("Diagnostics task failed: {}", e);
        }
    }

    info!(
        "Final state: {} ticks over {} processes",
        state.processes.ticks(),
        state.processes.process_count()
    );
    drop(state);

    info!("herakles-synthetic-generator stopped gracefully");
    server_result
}
