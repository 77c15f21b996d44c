pub mod plugin;
pub use plugin::{
    ApiLimits, PluginConfig, RunBudget, TestSettings, DEFAULT_MAX_ELAPSED_MSECS,
    DEFAULT_MAX_PAYLOAD_SIZE,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// How the host drives a plugin's import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Run ticks back to back until the import completes, then exit
    #[default]
    Once,
    /// Run one tick per interval until shut down
    Schedule,
    /// Check the plugin config (`testConfig`) and exit
    Test,
}

/// Complete plugin host configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// Registered plugin name (e.g. "example")
    pub plugin: String,

    /// Identifies this plugin instance's cursor in the cursor store
    #[serde(default = "default_config_id")]
    pub config_id: String,

    #[serde(default)]
    pub mode: RunMode,

    /// Seconds between scheduled ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,

    /// SQLite file holding persisted paging contexts
    #[serde(default = "default_cursor_db")]
    pub cursor_db: String,

    /// Base URL payloads are published to in schedule mode
    #[serde(default)]
    pub ingest_url: Option<String>,

    /// Upper bound on ticks in once mode
    #[serde(default = "default_max_ticks")]
    pub max_ticks: usize,

    /// Extra plugin config properties hidden from logs
    #[serde(default)]
    pub redact_properties: Vec<String>,

    #[serde(default)]
    pub plugin_config: PluginConfig,
}

fn default_config_id() -> String {
    "default".to_string()
}

fn default_tick_interval() -> u64 {
    300
}

fn default_cursor_db() -> String {
    "cursors.db".to_string()
}

fn default_max_ticks() -> usize {
    1000
}

impl HostConfig {
    /// Applies `PLUGIN_HOST_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("PLUGIN_HOST_CURSOR_DB") {
            self.cursor_db = v;
        }
        if let Ok(v) = std::env::var("PLUGIN_HOST_INGEST_URL") {
            self.ingest_url = Some(v);
        }
        if let Ok(v) = std::env::var("PLUGIN_HOST_TICK_INTERVAL_SECONDS") {
            if let Ok(n) = v.parse::<u64>() {
                self.tick_interval_seconds = n;
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<HostConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read host config at {}", path))?;
    let config: HostConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse host config at {}", path))?;
    debug!(path = %path, plugin = %config.plugin, "Host config loaded");
    Ok(config)
}
