use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Default wall-clock budget for one import tick (10 minutes).
pub const DEFAULT_MAX_ELAPSED_MSECS: u64 = 10 * 60 * 1000;

/// Default ceiling for the serialized size of one tick's payload (2 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 2 * 1024 * 1024;

/// Configuration of one plugin instance.
///
/// Everything except `testSettings` is plugin-defined (server URLs, keys,
/// ...) and kept as raw JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(rename = "testSettings")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_settings: Option<TestSettings>,

    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl PluginConfig {
    /// Builds a config from an arbitrary JSON object.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Time and size budget for one tick, falling back to the defaults.
    pub fn budget(&self) -> RunBudget {
        RunBudget::from_settings(self.test_settings.as_ref())
    }

    /// Per-entity page size overrides from `testSettings.apiLimits`.
    pub fn api_limit_overrides(&self) -> Option<&BTreeMap<String, u64>> {
        self.test_settings.as_ref().and_then(|s| s.api_limits.as_ref())
    }
}

/// Optional knobs read from `pluginConfig.testSettings`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSettings {
    #[serde(rename = "apiLimits")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_limits: Option<BTreeMap<String, u64>>,

    #[serde(rename = "maxElapsedTimeMSecs")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_elapsed_time_msecs: Option<u64>,

    #[serde(rename = "maxPayloadSize")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload_size: Option<usize>,
}

/// Per-tick thresholds for the import loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunBudget {
    /// Wall-clock budget for one tick
    pub max_elapsed: Duration,
    /// Ceiling for the serialized `{vertices, edges, pagingContext}`
    pub max_payload_bytes: usize,
}

impl RunBudget {
    pub fn new(max_elapsed: Duration, max_payload_bytes: usize) -> Self {
        Self {
            max_elapsed,
            max_payload_bytes,
        }
    }

    pub fn from_settings(settings: Option<&TestSettings>) -> Self {
        let max_elapsed_msecs = settings
            .and_then(|s| s.max_elapsed_time_msecs)
            .unwrap_or(DEFAULT_MAX_ELAPSED_MSECS);
        let max_payload_bytes = settings
            .and_then(|s| s.max_payload_size)
            .unwrap_or(DEFAULT_MAX_PAYLOAD_SIZE);
        Self::new(Duration::from_millis(max_elapsed_msecs), max_payload_bytes)
    }
}

impl Default for RunBudget {
    fn default() -> Self {
        Self::from_settings(None)
    }
}

/// Page sizes per entity type (e.g. `apps = 10`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiLimits(BTreeMap<String, u64>);

impl ApiLimits {
    pub fn from_pairs(pairs: &[(&str, u64)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(name, limit)| (name.to_string(), *limit))
                .collect(),
        )
    }

    /// Overlays configured overrides onto these defaults.
    pub fn with_overrides(mut self, overrides: Option<&BTreeMap<String, u64>>) -> Self {
        if let Some(overrides) = overrides {
            for (name, limit) in overrides {
                self.0.insert(name.clone(), *limit);
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.0.get(name).copied()
    }

    pub fn get_or(&self, name: &str, default: u64) -> u64 {
        self.get(name).unwrap_or(default)
    }
}

impl fmt::Display for ApiLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, limit) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, limit)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_budget_defaults() {
        let budget = PluginConfig::default().budget();
        assert_eq!(budget.max_elapsed, Duration::from_secs(600));
        assert_eq!(budget.max_payload_bytes, 2_097_152);
        assert_eq!(budget, RunBudget::default());
    }

    #[test]
    fn test_budget_from_test_settings() {
        let config = PluginConfig::from_value(json!({
            "serverUrl": "https://example.com",
            "testSettings": {
                "maxElapsedTimeMSecs": 1500,
                "maxPayloadSize": 4096
            }
        }))
        .unwrap();

        let budget = config.budget();
        assert_eq!(budget.max_elapsed, Duration::from_millis(1500));
        assert_eq!(budget.max_payload_bytes, 4096);
        assert_eq!(config.get_str("serverUrl"), Some("https://example.com"));
    }

    #[test]
    fn test_partial_test_settings_keep_defaults() {
        let config = PluginConfig::from_value(json!({
            "testSettings": { "maxPayloadSize": 100 }
        }))
        .unwrap();

        let budget = config.budget();
        assert_eq!(budget.max_elapsed, Duration::from_millis(DEFAULT_MAX_ELAPSED_MSECS));
        assert_eq!(budget.max_payload_bytes, 100);
    }

    #[test]
    fn test_api_limit_overrides() {
        let config = PluginConfig::from_value(json!({
            "testSettings": { "apiLimits": { "apps": 2, "hosts": 50 } }
        }))
        .unwrap();

        let limits = ApiLimits::from_pairs(&[("apps", 10), ("buildings", 3)])
            .with_overrides(config.api_limit_overrides());

        assert_eq!(limits.get("apps"), Some(2));
        assert_eq!(limits.get("buildings"), Some(3));
        assert_eq!(limits.get("hosts"), Some(50));
        assert_eq!(limits.get_or("missing", 7), 7);
        assert_eq!(limits.to_string(), "apps=2, buildings=3, hosts=50");
    }

    #[test]
    fn test_config_round_trip_keeps_properties() {
        let value = json!({
            "serverUrl": "https://example.com",
            "nested": { "a": [1, 2] },
            "testSettings": { "maxElapsedTimeMSecs": 10 }
        });
        let config = PluginConfig::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&config).unwrap(), value);
    }
}
