//! CLI arguments and subcommands for herakles-synthetic-generator.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands, and merges the CLI overrides
//! into the loaded configuration.

use clap::{Parser, Subcommand, ValueEnum};
use herakles_synthetic_generator::config::{apply_env_overrides, load_config, Config, ConfigFormat};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Output format of the `simulate` report
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    Table,
    Json,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-synthetic-generator",
    about = "Synthetic per-process telemetry generator with a Prometheus endpoint",
    long_about = "Synthetic per-process telemetry generator with a Prometheus endpoint.\n\n\
                  Simulates a fleet of hosts running long-lived processes and exports their \
                  CPU, disk, memory, thread and file-descriptor metrics with realistic \
                  deployment labels, heavy hitters, leaks and process restarts.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-synthetic-generator - More info: https://www.herakles.now - Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Print only the loaded user config file + full path and exit
    #[arg(long)]
    pub show_user_config: bool,

    /// Output format for --show-config*
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Number of simulated hosts
    #[arg(long, allow_negative_numbers = true)]
    pub hosts: Option<i64>,

    /// Number of simulated processes per host
    #[arg(long, allow_negative_numbers = true)]
    pub processes_per_host: Option<i64>,

    /// Seconds between simulation ticks
    #[arg(long, allow_negative_numbers = true)]
    pub interval: Option<i64>,

    /// Seed for reproducible fleets (default: OS entropy)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Per-process, per-tick restart probability
    #[arg(long)]
    pub restart_probability: Option<f64>,

    /// Seconds between self-diagnostics log lines (0 = disabled)
    #[arg(long)]
    pub diagnostics_interval: Option<u64>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run the simulation offline and print a report
    Simulate {
        /// Number of ticks to run
        #[arg(short = 'n', long, default_value_t = 10)]
        ticks: u64,

        /// Seed for a reproducible run (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: ReportFormat,
    },
}

/// Resolves configuration from CLI args, environment, config file, and defaults.
/// This enforces precedence: CLI (if provided) > environment > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    // Simulation
    if args.hosts.is_some() {
        config.host_count = args.hosts;
    }
    if args.processes_per_host.is_some() {
        config.process_count_per_host = args.processes_per_host;
    }
    if args.interval.is_some() {
        config.tick_interval_seconds = args.interval;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.restart_probability.is_some() {
        config.restart_probability = args.restart_probability;
    }
    if args.diagnostics_interval.is_some() {
        config.diagnostics_interval_seconds = args.diagnostics_interval;
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}
