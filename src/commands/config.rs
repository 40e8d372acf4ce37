//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use herakles_synthetic_generator::config::{render_config, Config, ConfigFormat};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("herakles-synthetic-generator.yaml"),
    };

    let mut content = render_config(&config, format)?;
    if commented && format == ConfigFormat::Yaml {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Synthetic Generator Configuration
# ==========================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                    # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                         # HTTP port
# enable_health: true                # Enable /health endpoint
#
# Logging
# -------
# log_level: "info"                  # off, error, warn, info, debug, trace
#
# Simulation
# ----------
# process_count_per_host: 150        # env: SYNTHETIC_PROCESS_COUNT_PER_HOST
# host_count: 3                      # env: SYNTHETIC_HOST_COUNT
# tick_interval_seconds: 15          # env: SYNTHETIC_METRIC_EMIT_INTERVAL_S
# seed: null                         # env: SYNTHETIC_SEED (null = OS entropy)
# restart_probability: 0.0005        # Per process, per tick
# rename_probability: 0.05           # Chance a restart renames the executable
# diagnostics_interval_seconds: 60   # Self-diagnostics log interval (0 = off)
#
# Invalid or non-positive sizes and intervals fall back to the defaults above.
#
# Constant Labels
# ---------------
# benchmark_id: null                 # env: BENCHMARK_ID
# deployment_environment: null       # env: DEPLOYMENT_ENV
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false                  # Enable HTTPS (default: false)
# tls_cert_path: null                # Path to TLS certificate (PEM format)
# tls_key_path: null                 # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}
