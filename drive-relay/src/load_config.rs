/// `load_config` module: loads the static YAML config — including
/// environment secret injection — into the core [`RelayConfig`].
///
/// This module is the only place where untrusted YAML is parsed and mapped
/// to the strongly-typed core config.
///
/// # Responsibilities
/// - Parse the user-supplied YAML configuration file into type-safe structs
/// - Inject secret fields (the cloud-source credential pair) from the
///   environment; secrets never live in the YAML file
/// - Ensure robust error messages for CLI and tests: any failure in loading
///   must result in clear diagnostics
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich
/// diagnostics, surfaced at the CLI boundary.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{error, info};

use drive_relay_core::config::{CloudCredentials, RelayConfig};

#[derive(Debug, Deserialize)]
struct RawConfig {
    relay: RelaySection,
}

#[derive(Debug, Deserialize)]
struct RelaySection {
    download_dir: PathBuf,
    credentials_dir: PathBuf,
    drive_folder_name: String,
    #[serde(default = "default_fallback_enabled")]
    fallback_enabled: bool,
}

fn default_fallback_enabled() -> bool {
    true
}

/// Loads a static YAML config file (no secrets) and injects required env
/// vars for secrets. Returns the core config consumed by the pipeline.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RelayConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).with_context(|| {
        error!(config_path = ?path_ref, "Failed to read config file");
        format!("Failed to read config file {path_ref:?}")
    })?;

    let raw: RawConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow::anyhow!("Failed to parse config YAML: {e}")
    })?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    // Secrets come from the environment, never from the config file.
    let email = std::env::var("MEGA_EMAIL").context("MEGA_EMAIL missing in environment")?;
    let password = std::env::var("MEGA_PASSWORD").context("MEGA_PASSWORD missing in environment")?;

    let config = RelayConfig {
        download_dir: raw.relay.download_dir,
        credentials_dir: raw.relay.credentials_dir,
        drive_folder_name: raw.relay.drive_folder_name,
        fallback_enabled: raw.relay.fallback_enabled,
        cloud_source: CloudCredentials { email, password },
    };
    config.trace_loaded();
    Ok(config)
}
