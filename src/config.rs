//! Configuration management for herakles-synthetic-generator.
//!
//! This module handles loading, merging, and validating configuration from files
//! and the environment. It supports YAML, JSON, and TOML formats. CLI overrides
//! are applied on top by the binary.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::tick::{ChurnConfig, DEFAULT_RENAME_PROBABILITY, DEFAULT_RESTART_PROBABILITY};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_PROCESS_COUNT_PER_HOST: usize = 150;
pub const DEFAULT_HOST_COUNT: usize = 3;
pub const DEFAULT_TICK_INTERVAL_SECONDS: u64 = 15;
pub const DEFAULT_DIAGNOSTICS_INTERVAL_SECONDS: u64 = 60;

// Environment variables
pub const ENV_PROCESS_COUNT_PER_HOST: &str = "SYNTHETIC_PROCESS_COUNT_PER_HOST";
pub const ENV_HOST_COUNT: &str = "SYNTHETIC_HOST_COUNT";
pub const ENV_TICK_INTERVAL: &str = "SYNTHETIC_METRIC_EMIT_INTERVAL_S";
pub const ENV_SEED: &str = "SYNTHETIC_SEED";
pub const ENV_BENCHMARK_ID: &str = "BENCHMARK_ID";
pub const ENV_DEPLOYMENT_ENV: &str = "DEPLOYMENT_ENV";

const DEFAULT_CONFIG_LOCATIONS: [&str; 6] = [
    "/etc/herakles/synthetic-generator.yaml",
    "/etc/herakles/synthetic-generator.yml",
    "/etc/herakles/synthetic-generator.json",
    "./herakles-synthetic-generator.yaml",
    "./herakles-synthetic-generator.yml",
    "./herakles-synthetic-generator.json",
];

/// Configuration format options for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Errors raised while loading, rendering or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML configuration: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to render TOML configuration: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("{name} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    #[error("TLS is enabled but neither tls_cert_path nor tls_key_path are set")]
    TlsPathsMissing,

    #[error("TLS is enabled but tls_key_path is not set")]
    TlsKeyMissing,

    #[error("TLS is enabled but tls_cert_path is not set")]
    TlsCertMissing,

    #[error("TLS {kind} file not found: {path}")]
    TlsFileNotFound { kind: &'static str, path: String },

    #[error("TLS {kind} file is empty: {path}")]
    TlsFileEmpty { kind: &'static str, path: String },

    #[error("TLS {kind} file is not readable: {path} ({source})")]
    TlsFileUnreadable {
        kind: &'static str,
        path: String,
        source: std::io::Error,
    },
}

/// Generator configuration. Every field is optional; absent values take the
/// defaults below.
///
/// Sizes and intervals are signed so that non-positive values from a file or
/// the environment can be reported and replaced instead of rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Logging
    pub log_level: Option<String>,

    // Simulation
    #[serde(alias = "process-count-per-host")]
    pub process_count_per_host: Option<i64>,
    #[serde(alias = "host-count")]
    pub host_count: Option<i64>,
    #[serde(alias = "tick-interval-seconds")]
    pub tick_interval_seconds: Option<i64>,
    pub seed: Option<u64>,
    #[serde(alias = "restart-probability")]
    pub restart_probability: Option<f64>,
    #[serde(alias = "rename-probability")]
    pub rename_probability: Option<f64>,

    // Diagnostics and health
    #[serde(alias = "diagnostics-interval-seconds")]
    pub diagnostics_interval_seconds: Option<u64>,
    pub enable_health: Option<bool>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    // Registry-wide constant labels
    #[serde(alias = "benchmark-id")]
    pub benchmark_id: Option<String>,
    #[serde(alias = "deployment-environment")]
    pub deployment_environment: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            log_level: Some("info".into()),
            process_count_per_host: Some(DEFAULT_PROCESS_COUNT_PER_HOST as i64),
            host_count: Some(DEFAULT_HOST_COUNT as i64),
            tick_interval_seconds: Some(DEFAULT_TICK_INTERVAL_SECONDS as i64),
            seed: None,
            restart_probability: Some(DEFAULT_RESTART_PROBABILITY),
            rename_probability: Some(DEFAULT_RENAME_PROBABILITY),
            diagnostics_interval_seconds: Some(DEFAULT_DIAGNOSTICS_INTERVAL_SECONDS),
            enable_health: Some(true),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            benchmark_id: None,
            deployment_environment: None,
        }
    }
}

/// Effective simulation parameters after defaults and fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    pub process_count_per_host: usize,
    pub host_count: usize,
    pub tick_interval: Duration,
    pub seed: Option<u64>,
    pub churn: ChurnConfig,
    /// `None` disables the diagnostics task.
    pub diagnostics_interval: Option<Duration>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SimulationSettings {
    /// Resolves the settings, replacing invalid values with their defaults.
    pub fn from_config(cfg: &Config) -> Self {
        let process_count_per_host = positive_or_default(
            "process_count_per_host",
            cfg.process_count_per_host,
            DEFAULT_PROCESS_COUNT_PER_HOST,
        );
        let host_count = positive_or_default("host_count", cfg.host_count, DEFAULT_HOST_COUNT);
        let tick_interval_seconds = positive_or_default(
            "tick_interval_seconds",
            cfg.tick_interval_seconds,
            DEFAULT_TICK_INTERVAL_SECONDS as usize,
        );

        let churn = ChurnConfig {
            restart_probability: probability_or_default(
                "restart_probability",
                cfg.restart_probability,
                DEFAULT_RESTART_PROBABILITY,
            ),
            rename_probability: probability_or_default(
                "rename_probability",
                cfg.rename_probability,
                DEFAULT_RENAME_PROBABILITY,
            ),
        };

        let diagnostics_interval = match cfg
            .diagnostics_interval_seconds
            .unwrap_or(DEFAULT_DIAGNOSTICS_INTERVAL_SECONDS)
        {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            process_count_per_host,
            host_count,
            tick_interval: Duration::from_secs(tick_interval_seconds as u64),
            seed: cfg.seed,
            churn,
            diagnostics_interval,
        }
    }

    pub fn total_processes(&self) -> usize {
        self.process_count_per_host * self.host_count
    }
}

fn positive_or_default(name: &str, value: Option<i64>, default: usize) -> usize {
    match value {
        None => default,
        Some(v) if v > 0 => v as usize,
        Some(v) => {
            warn!("Invalid {} value '{}', using default: {}", name, v, default);
            default
        }
    }
}

fn probability_or_default(name: &str, value: Option<f64>, default: f64) -> f64 {
    match value {
        None => default,
        Some(p) if (0.0..=1.0).contains(&p) => p,
        Some(p) => {
            warn!("Invalid {} value '{}', using default: {}", name, p, default);
            default
        }
    }
}

/// Applies environment overrides on top of file values.
///
/// `lookup` is usually `|k| std::env::var(k).ok()`. Values that do not parse
/// are reported and replaced by the default; empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(raw) = value(ENV_PROCESS_COUNT_PER_HOST) {
        config.process_count_per_host = Some(parse_env_or_default(
            ENV_PROCESS_COUNT_PER_HOST,
            &raw,
            DEFAULT_PROCESS_COUNT_PER_HOST as i64,
        ));
    }
    if let Some(raw) = value(ENV_HOST_COUNT) {
        config.host_count = Some(parse_env_or_default(
            ENV_HOST_COUNT,
            &raw,
            DEFAULT_HOST_COUNT as i64,
        ));
    }
    if let Some(raw) = value(ENV_TICK_INTERVAL) {
        config.tick_interval_seconds = Some(parse_env_or_default(
            ENV_TICK_INTERVAL,
            &raw,
            DEFAULT_TICK_INTERVAL_SECONDS as i64,
        ));
    }
    if let Some(raw) = value(ENV_SEED) {
        match raw.trim().parse::<u64>() {
            Ok(seed) => config.seed = Some(seed),
            Err(_) => warn!("Invalid {} value '{}', ignoring", ENV_SEED, raw),
        }
    }
    if let Some(id) = value(ENV_BENCHMARK_ID) {
        config.benchmark_id = Some(id);
    }
    if let Some(env) = value(ENV_DEPLOYMENT_ENV) {
        config.deployment_environment = Some(env);
    }
}

fn parse_env_or_default(key: &str, raw: &str, default: i64) -> i64 {
    match raw.trim().parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            warn!("Invalid {} value '{}', using default: {}", key, raw, default);
            default
        }
    }
}

/// Validate effective config (used by --check-config).
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(p) = cfg.restart_probability {
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::ProbabilityOutOfRange {
                name: "restart_probability",
                value: p,
            });
        }
    }
    if let Some(p) = cfg.rename_probability {
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::ProbabilityOutOfRange {
                name: "rename_probability",
                value: p,
            });
        }
    }

    validate_tls_config(cfg)
}

/// TLS checks. These are fatal at startup.
pub fn validate_tls_config(cfg: &Config) -> Result<(), ConfigError> {
    if !cfg.enable_tls.unwrap_or(false) {
        return Ok(());
    }

    match (cfg.tls_cert_path.as_deref(), cfg.tls_key_path.as_deref()) {
        (None, None) => Err(ConfigError::TlsPathsMissing),
        (Some(_), None) => Err(ConfigError::TlsKeyMissing),
        (None, Some(_)) => Err(ConfigError::TlsCertMissing),
        (Some(cert), Some(key)) => {
            check_tls_file("certificate", cert)?;
            check_tls_file("private key", key)
        }
    }
}

fn check_tls_file(kind: &'static str, path: &str) -> Result<(), ConfigError> {
    let p = Path::new(path);
    if !p.exists() {
        return Err(ConfigError::TlsFileNotFound {
            kind,
            path: path.to_string(),
        });
    }
    match fs::metadata(p) {
        Ok(meta) if meta.len() == 0 => Err(ConfigError::TlsFileEmpty {
            kind,
            path: path.to_string(),
        }),
        Err(source) => Err(ConfigError::TlsFileUnreadable {
            kind,
            path: path.to_string(),
            source,
        }),
        Ok(_) => Ok(()),
    }
}

/// First existing file among the default locations.
pub fn find_default_config() -> Option<PathBuf> {
    DEFAULT_CONFIG_LOCATIONS
        .iter()
        .find(|p| Path::new(p).exists())
        .map(PathBuf::from)
}

/// Loads configuration from `path`, or from the first default location found.
/// Returns the defaults when no file exists.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path.map(Path::to_path_buf).or_else(find_default_config) {
        Some(p) if p.exists() => p,
        _ => return Ok(Config::default()),
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        // Default to YAML
        _ => serde_yaml::from_str(&content)?,
    };
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Serializes configuration in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, ConfigError> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(
    config: &Config,
    format: ConfigFormat,
    user_config: bool,
) -> Result<(), ConfigError> {
    let output = render_config(config, format)?;
    if user_config {
        println!("User configuration (effective values):");
    }
    println!("{output}");
    Ok(())
}
