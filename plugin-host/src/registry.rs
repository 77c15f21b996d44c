//! Plugin registry - the built-in plugins, looked up by name.

use crate::config_check::TestConfigResult;
use crate::host::HostApi;
use crate::plugins::{ExamplePlugin, InventoryPlugin};
use crate::Plugin;
use anyhow::{anyhow, Result};
use pluginkit::PluginConfig;
use std::sync::Arc;

/// Returns all available plugins.
pub fn get_all_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(ExamplePlugin::new()),
        Arc::new(InventoryPlugin::new()),
    ]
}

/// Looks up a built-in plugin by its name.
pub fn find_plugin(name: &str) -> Option<Arc<dyn Plugin>> {
    get_all_plugins().into_iter().find(|p| p.name() == name)
}

/// Runs `testConfig` of the plugin called `name`.
pub async fn test_plugin_config(
    name: &str,
    config: &PluginConfig,
    host: &dyn HostApi,
) -> Result<TestConfigResult> {
    let plugin = find_plugin(name).ok_or_else(|| anyhow!("Unknown plugin '{}'", name))?;
    plugin.test_config(config, host).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LoggingHost;
    use serde_json::json;

    #[test]
    fn test_get_all_plugins() {
        let plugins = get_all_plugins();
        let names: Vec<&str> = plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["example", "inventory"]);
    }

    #[test]
    fn test_find_plugin() {
        let plugin = find_plugin("example").unwrap();
        assert_eq!(plugin.import_stages().len(), 2);
        assert_eq!(plugin.default_api_limits().get("apps"), Some(10));
        assert!(find_plugin("missing").is_none());
    }

    #[tokio::test]
    async fn test_plugin_config_by_name() {
        let config = PluginConfig::from_value(json!({ "serverUrl": "http://demo" })).unwrap();
        let result = test_plugin_config("example", &config, &LoggingHost::new())
            .await
            .unwrap();
        assert!(result.has_errors());

        let err = test_plugin_config("missing", &config, &LoggingHost::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown plugin 'missing'"));
    }
}
