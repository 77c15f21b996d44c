//! Synthetic data source: applications, buildings, and which apps monitor
//! which buildings. Useful for exercising paging without a real backend.

pub mod apps;
pub mod buildings;

use crate::config_check::TestConfigResult;
use crate::host::HostApi;
use crate::plugin::Plugin;
use crate::stage::Stage;
use anyhow::Result;
use async_trait::async_trait;
use pluginkit::{ApiLimits, PluginConfig};
use serde_json::{json, Map, Value};

use self::apps::AppsStage;
use self::buildings::BuildingsStage;

pub const APPS_LIMIT: &str = "apps";
pub const BUILDINGS_LIMIT: &str = "buildings";
pub const DEFAULT_APPS_LIMIT: u64 = 10;
pub const DEFAULT_BUILDINGS_LIMIT: u64 = 3;

pub const APP_INDEX_KEY: &str = "appIndex";
pub const BUILDING_INDEX_KEY: &str = "buildingIndex";

/// `sourceName` shared by every vertex of one plugin instance.
fn source_name(config: &PluginConfig) -> String {
    format!("example:{}", config.get_str("serverUrl").unwrap_or_default())
}

#[derive(Debug, Default)]
pub struct ExamplePlugin;

impl ExamplePlugin {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for ExamplePlugin {
    fn name(&self) -> &str {
        "example"
    }

    fn import_stages(&self) -> Vec<Box<dyn Stage>> {
        vec![Box::new(AppsStage), Box::new(BuildingsStage)]
    }

    fn default_api_limits(&self) -> ApiLimits {
        ApiLimits::from_pairs(&[
            (APPS_LIMIT, DEFAULT_APPS_LIMIT),
            (BUILDINGS_LIMIT, DEFAULT_BUILDINGS_LIMIT),
        ])
    }

    fn initial_paging_context(&self) -> Map<String, Value> {
        let mut initial = Map::new();
        initial.insert(APP_INDEX_KEY.to_string(), json!(0));
        initial.insert(BUILDING_INDEX_KEY.to_string(), json!(0));
        initial
    }

    /// Nothing to connect to; only the shape of `serverUrl` is checked.
    async fn test_config(
        &self,
        config: &PluginConfig,
        _host: &dyn HostApi,
    ) -> Result<TestConfigResult> {
        let result = match config.get_str("serverUrl") {
            Some(url) if url.starts_with("https:") => {
                TestConfigResult::passed("Testing passed").with_link(url)
            }
            _ => TestConfigResult::new()
                .warning("serverUrl is invalid")
                .error("serverUrl must be an https: URL"),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::apps::TOTAL_APPS;
    use super::buildings::TOTAL_BUILDINGS;
    use super::*;
    use crate::driver::{ImportDriver, TickEnd};
    use crate::host::LoggingHost;
    use crate::page::ImportCursor;

    fn config() -> PluginConfig {
        PluginConfig::from_value(json!({ "serverUrl": "https://demo" })).unwrap()
    }

    #[tokio::test]
    async fn test_single_tick_imports_everything() {
        let driver = ImportDriver::for_plugin(&ExamplePlugin::new());
        let outcome = driver
            .run_tick(&config(), ImportCursor::new(), &LoggingHost::new())
            .await
            .unwrap();

        assert_eq!(outcome.summary.end, TickEnd::Complete);
        // 4 app pages + 4 building pages
        assert_eq!(outcome.summary.invocations, 8);

        let result = outcome.result;
        assert!(result.is_complete());
        assert_eq!(result.vertices.len() as u64, TOTAL_APPS + TOTAL_BUILDINGS);
        assert_eq!(result.edges.len() as u64, TOTAL_BUILDINGS * 3);
        assert_eq!(result.vertices[0].source_name, "example:https://demo");
        assert_eq!(result.vertices[0].properties["appType"], "Hybrid");
    }

    #[tokio::test]
    async fn test_zero_elapsed_budget_yields_one_page_per_tick() {
        let config = PluginConfig::from_value(json!({
            "serverUrl": "https://demo",
            "testSettings": { "maxElapsedTimeMSecs": 0 }
        }))
        .unwrap();
        let driver = ImportDriver::for_plugin(&ExamplePlugin::new());
        let outcome = driver
            .run_tick(&config, ImportCursor::new(), &LoggingHost::new())
            .await
            .unwrap();

        assert_eq!(outcome.summary.end, TickEnd::ElapsedBudget);
        assert_eq!(outcome.result.vertices.len(), 10);
        let cursor = &outcome.result.paging_context;
        assert_eq!(cursor.get_as::<u64>(APP_INDEX_KEY), Some(10));
        assert_eq!(cursor.get_as::<u64>(BUILDING_INDEX_KEY), Some(0));
        assert_eq!(cursor.stage_index(), Some(0));
    }

    #[tokio::test]
    async fn test_config_accepts_https_url() {
        let result = ExamplePlugin::new()
            .test_config(&config(), &LoggingHost::new())
            .await
            .unwrap();
        assert!(!result.has_errors());
        assert_eq!(result.link.as_deref(), Some("https://demo"));
        assert_eq!(result.messages[0].message, "Testing passed");
    }

    #[tokio::test]
    async fn test_config_rejects_other_urls() {
        use crate::config_check::TestStatus;

        for value in [json!({ "serverUrl": "http://demo" }), json!({ "serverUrl": 443 }), json!({})] {
            let config = PluginConfig::from_value(value).unwrap();
            let result = ExamplePlugin::new()
                .test_config(&config, &LoggingHost::new())
                .await
                .unwrap();
            let statuses: Vec<TestStatus> = result.messages.iter().map(|m| m.status).collect();
            assert_eq!(statuses, vec![TestStatus::Warning, TestStatus::Error]);
            assert_eq!(result.messages[0].message, "serverUrl is invalid");
        }
    }

    #[test]
    fn test_source_name_without_server_url() {
        assert_eq!(source_name(&PluginConfig::default()), "example:");
    }
}
