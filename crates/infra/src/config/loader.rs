//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `TRACKLANE_DB_PATH`: Database file path
//! - `TRACKLANE_DB_POOL_SIZE`: Connection pool size
//! - `TRACKLANE_TRACKER_BASE_URL`: Tracker API root
//! - `TRACKLANE_TRACKER_ORG_ID`: Organisation id header value
//! - `TRACKLANE_TRACKER_TOKEN`: Static OAuth token
//! - `TRACKLANE_TRACKER_TOKEN_ENDPOINT`: Token-issuance endpoint
//! - `TRACKLANE_TRACKER_SA_KEY_ID`: Service-account key id
//! - `TRACKLANE_TRACKER_SA_ACCOUNT_ID`: Service-account id
//! - `TRACKLANE_TRACKER_SA_KEY_FILE`: Path to the PEM private key
//! - `TRACKLANE_TRACKER_PAGE_SIZE`: Page size for bulk fetches
//! - `TRACKLANE_TRACKER_SCROLL_TTL_MS`: Scroll cursor TTL
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.toml` or `./config.json` (current working directory)
//! 2. `./tracklane.toml` or `./tracklane.json` (current working directory)
//! 3. `../config.toml` or `../config.json` (parent directory)

use std::path::PathBuf;

use tracklane_domain::constants::{DEFAULT_PAGE_SIZE, DEFAULT_SCROLL_TTL_MS};
use tracklane_domain::{
    Config, DatabaseConfig, Result, ServiceAccountConfig, TrackerConfig, TracklaneError,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `TracklaneError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    dotenvy::dotenv().ok();

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `TracklaneError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("TRACKLANE_DB_PATH")?;
    let pool_size = env_parse("TRACKLANE_DB_POOL_SIZE", 4)?;

    let base_url = env_var("TRACKLANE_TRACKER_BASE_URL")?;
    let org_id = std::env::var("TRACKLANE_TRACKER_ORG_ID").ok();
    let static_token = std::env::var("TRACKLANE_TRACKER_TOKEN").ok();
    let token_endpoint = std::env::var("TRACKLANE_TRACKER_TOKEN_ENDPOINT").ok();
    let service_account = service_account_from_env()?;
    let page_size = env_parse("TRACKLANE_TRACKER_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
    let scroll_ttl_ms = env_parse("TRACKLANE_TRACKER_SCROLL_TTL_MS", DEFAULT_SCROLL_TTL_MS)?;

    Ok(Config {
        database: DatabaseConfig { path: db_path, pool_size },
        tracker: TrackerConfig {
            base_url,
            org_id,
            static_token,
            service_account,
            token_endpoint,
            page_size,
            scroll_ttl_ms,
        },
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `TracklaneError::Config` if the file is missing, unreadable, or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TracklaneError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TracklaneError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TracklaneError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Probe the standard config file locations, nearest first.
pub fn probe_config_paths() -> Option<PathBuf> {
    let candidates = [
        "config.toml",
        "config.json",
        "tracklane.toml",
        "tracklane.json",
        "../config.toml",
        "../config.json",
    ];

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}

fn parse_config(contents: &str, path: &std::path::Path) -> Result<Config> {
    let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(contents)
            .map_err(|e| TracklaneError::Config(format!("Invalid JSON config: {e}")))
    } else {
        toml::from_str(contents)
            .map_err(|e| TracklaneError::Config(format!("Invalid TOML config: {e}")))
    }
}

/// All three service-account variables, or none of them.
fn service_account_from_env() -> Result<Option<ServiceAccountConfig>> {
    let key_id = std::env::var("TRACKLANE_TRACKER_SA_KEY_ID").ok();
    let account_id = std::env::var("TRACKLANE_TRACKER_SA_ACCOUNT_ID").ok();
    let key_file = std::env::var("TRACKLANE_TRACKER_SA_KEY_FILE").ok();

    match (key_id, account_id, key_file) {
        (None, None, None) => Ok(None),
        (Some(key_id), Some(account_id), Some(key_file)) => {
            let private_key_pem = std::fs::read_to_string(&key_file).map_err(|e| {
                TracklaneError::Config(format!(
                    "Failed to read service-account key {key_file}: {e}"
                ))
            })?;
            Ok(Some(ServiceAccountConfig { key_id, account_id, private_key_pem }))
        }
        _ => Err(TracklaneError::Config(
            "TRACKLANE_TRACKER_SA_KEY_ID, TRACKLANE_TRACKER_SA_ACCOUNT_ID and \
             TRACKLANE_TRACKER_SA_KEY_FILE must be set together"
                .into(),
        )),
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| TracklaneError::Config(format!("Missing environment variable: {name}")))
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| TracklaneError::Config(format!("Invalid value for {name}: {e}"))),
        Err(_) => Ok(default),
    }
}
