//! Configuration structures
//!
//! Loaded by the infra layer from environment variables or a TOML file.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, DEFAULT_SCROLL_TTL_MS};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub tracker: TrackerConfig,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Remote tracker API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub base_url: String,
    /// Organisation id sent as `X-Org-Id` on every request when set.
    #[serde(default)]
    pub org_id: Option<String>,
    /// Long-lived token, used verbatim (`Authorization: OAuth ...`). Also the
    /// fallback when minting a derived token fails.
    #[serde(default)]
    pub static_token: Option<String>,
    /// Service-account credential for minting short-lived bearer tokens.
    #[serde(default)]
    pub service_account: Option<ServiceAccountConfig>,
    /// Token-issuance endpoint for the service-account exchange.
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_scroll_ttl_ms")]
    pub scroll_ttl_ms: u64,
}

/// Key material for the signed-JWT token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountConfig {
    pub key_id: String,
    pub account_id: String,
    pub private_key_pem: String,
}

fn default_pool_size() -> u32 {
    4
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_scroll_ttl_ms() -> u64 {
    DEFAULT_SCROLL_TTL_MS
}
