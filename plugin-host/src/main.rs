use anyhow::{bail, Context, Result};
use plugin_host::registry::{find_plugin, get_all_plugins};
use plugin_host::{
    redacted_plugin_config, run_to_completion, CursorStore, HostApi, ImportScheduler, LoggingHost,
};
use pluginkit::config::{load_config, RunMode};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plugin_host=info".into()),
        )
        .init();

    info!("Plugin host starting...");

    let config_path =
        std::env::var("PLUGIN_HOST_CONFIG").unwrap_or_else(|_| "plugin-host.toml".to_string());
    let mut config = load_config(&config_path)?;
    config.apply_env();

    let Some(plugin) = find_plugin(&config.plugin) else {
        let known: Vec<String> = get_all_plugins()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        bail!(
            "Unknown plugin '{}' (available: {})",
            config.plugin,
            known.join(", ")
        );
    };

    let plugin_config = redacted_plugin_config(
        plugin.as_ref(),
        &config.plugin_config,
        &config.redact_properties,
    )?;
    info!(
        plugin = %config.plugin,
        config_id = %config.config_id,
        mode = ?config.mode,
        cursor_db = %config.cursor_db,
        plugin_config = %plugin_config,
        "Configuration loaded"
    );

    let host = Arc::new(LoggingHost::new());

    match config.mode {
        RunMode::Once => {
            let completed = run_to_completion(
                plugin.as_ref(),
                &config.plugin_config,
                host.as_ref(),
                config.max_ticks,
            )
            .await?;
            info!(
                ticks = completed.ticks.len(),
                vertices = completed.payload.vertices.len(),
                edges = completed.payload.edges.len(),
                "Import complete"
            );
            let output = serde_json::to_string_pretty(&completed.payload)
                .context("Failed to serialize import payload")?;
            println!("{}", output);
        }
        RunMode::Test => {
            let result = plugin
                .test_config(&config.plugin_config, host.as_ref())
                .await
                .context("Failed to test plugin config")?;
            for message in &result.messages {
                info!(status = %message.status, "{}", message.message);
            }
            let output = serde_json::to_string_pretty(&result)
                .context("Failed to serialize test result")?;
            println!("{}", output);
            if result.has_errors() {
                bail!("Plugin config of '{}' failed testing", config.plugin);
            }
        }
        RunMode::Schedule => {
            let store = Arc::new(
                CursorStore::new(&config.cursor_db)
                    .context("Failed to initialize cursor store")?,
            );
            info!(stored_cursors = store.list()?.len(), "Cursor store initialized");

            let host: Arc<dyn HostApi> = host;
            let scheduler = ImportScheduler::new(
                plugin.as_ref(),
                config.config_id.clone(),
                config.plugin_config.clone(),
                store,
                host,
            )
            .with_tick_interval(Duration::from_secs(config.tick_interval_seconds.max(1)))
            .with_ingest_url(config.ingest_url.clone());
            let handle = scheduler.start();

            // Wait for shutdown signal
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for ctrl_c signal")?;
            info!("Shutdown signal received");

            handle.abort();
            info!("Plugin host stopped");
        }
    }

    Ok(())
}
