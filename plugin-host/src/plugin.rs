use crate::config_check::TestConfigResult;
use crate::driver::{FailurePolicy, ImportDriver, ImportResult};
use crate::host::HostApi;
use crate::page::ImportCursor;
use crate::problem::ProblemTable;
use crate::stage::Stage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use pluginkit::redact::redacted_json;
use pluginkit::{ApiLimits, PluginConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Plugin interface for data-source integrations.
///
/// A plugin declares its import stages and the defaults they page with;
/// the [`ImportDriver`] does the rest. Plugins are stateless - all import
/// progress lives in the paging context the caller persists.
///
/// # Lifecycle
/// 1. Host builds a driver from `import_stages()` and the defaults
/// 2. Host runs one tick with the previous paging context
/// 3. Stages fetch pages, append vertices/edges, update the cursor
/// 4. Host persists the returned paging context and publishes the payload
/// 5. Repeat until the paging context comes back empty
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique identifier (e.g. "example").
    ///
    /// Used for registry lookups, cursor storage, and logging.
    fn name(&self) -> &str;

    /// Ordered stages making up one full import.
    ///
    /// May be empty for plugins without import capability.
    fn import_stages(&self) -> Vec<Box<dyn Stage>>;

    /// Page sizes per entity type, before `testSettings.apiLimits`.
    fn default_api_limits(&self) -> ApiLimits {
        ApiLimits::default()
    }

    /// Values seeded into the paging context on the first tick.
    fn initial_paging_context(&self) -> Map<String, Value> {
        Map::new()
    }

    /// How stage failures are classified.
    fn problem_table(&self) -> ProblemTable {
        ProblemTable::default()
    }

    /// Whether a failed stage keeps or gives up its position.
    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Stay
    }

    /// Config properties holding secrets. Never logged.
    fn sensitive_properties(&self) -> &[&str] {
        &[]
    }

    /// Checks a configuration before it is used for imports.
    ///
    /// Problems with the config are returned as messages; `Err` is for
    /// failures of the check itself.
    async fn test_config(
        &self,
        _config: &PluginConfig,
        _host: &dyn HostApi,
    ) -> Result<TestConfigResult> {
        Ok(TestConfigResult::passed("Testing passed"))
    }
}

/// Renders `config` for logs without the plugin's sensitive properties or
/// any of `extra`.
pub fn redacted_plugin_config(
    plugin: &dyn Plugin,
    config: &PluginConfig,
    extra: &[String],
) -> Result<String> {
    let value = serde_json::to_value(config).context("Failed to serialize plugin config")?;
    let omit: Vec<String> = plugin
        .sensitive_properties()
        .iter()
        .map(|p| p.to_string())
        .chain(extra.iter().cloned())
        .collect();
    Ok(redacted_json(&value, &omit))
}

impl ImportDriver {
    /// Builds a driver from a plugin's declared stages and defaults.
    pub fn for_plugin(plugin: &dyn Plugin) -> Self {
        ImportDriver::new(plugin.name(), plugin.import_stages())
            .with_initial_values(plugin.initial_paging_context())
            .with_api_limits(plugin.default_api_limits())
            .with_problem_table(plugin.problem_table())
            .with_failure_policy(plugin.failure_policy())
    }
}

/// Input of one `importObjects` invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportEvent {
    #[serde(rename = "pluginConfig")]
    pub plugin_config: PluginConfig,

    /// Paging context from the previous tick; `{}` starts a fresh import
    #[serde(rename = "pagingContext", default)]
    pub paging_context: ImportCursor,
}

impl ImportEvent {
    pub fn new(plugin_config: PluginConfig, paging_context: ImportCursor) -> Self {
        Self {
            plugin_config,
            paging_context,
        }
    }
}

/// Runs one import tick for `plugin`.
///
/// Returns the tick's vertices and edges plus the paging context to pass to
/// the next call. An empty paging context means the import is complete.
pub async fn import_objects(
    plugin: &dyn Plugin,
    event: ImportEvent,
    host: &dyn HostApi,
) -> Result<ImportResult> {
    let driver = ImportDriver::for_plugin(plugin);
    let outcome = driver
        .run_tick(&event.plugin_config, event.paging_context, host)
        .await?;
    Ok(outcome.result)
}
