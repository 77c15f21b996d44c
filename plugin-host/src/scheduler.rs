//! Per-import tick scheduler.
//!
//! Each configured plugin instance gets its own scheduler that runs one
//! import tick per interval, publishes the tick's payload, and persists
//! the cursor so the next tick (or the next process) resumes where this
//! one stopped.

use crate::cursor_store::CursorStore;
use crate::driver::{ImportDriver, TickEnd, TickSummary};
use crate::host::HostApi;
use crate::plugin::Plugin;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pluginkit::{ImportPayload, PluginConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Header carrying the unique id of the tick that produced a payload.
pub const TICK_ID_HEADER: &str = "X-Import-Tick";

/// Status information for one scheduled import.
#[derive(Clone, Debug, Default)]
pub struct ImportStatus {
    /// Last successful tick timestamp
    pub last_tick: Option<DateTime<Utc>>,
    /// How the last successful tick ended
    pub last_end: Option<TickEnd>,
    /// Last error message (if any)
    pub last_error: Option<String>,
    /// Total number of successful ticks
    pub tick_count: u64,
    /// Total number of failed ticks
    pub error_count: u64,
    /// Imports run to completion
    pub completed_imports: u64,
}

/// Per-import tick scheduler.
///
/// Manages the tick lifecycle for a single plugin instance:
/// - Loads the cursor from the store
/// - Runs one tick of the import
/// - Publishes the payload to the ingest API (if configured)
/// - Saves the cursor once the payload is safely published
/// - Tracks status (last tick, errors, completed imports)
///
/// A failed tick leaves the stored cursor untouched, so the next tick
/// redoes the same pages.
pub struct ImportScheduler {
    /// Plugin name
    plugin: String,
    /// Identifies this plugin instance in the cursor store
    config_id: String,
    driver: ImportDriver,
    plugin_config: PluginConfig,
    tick_interval: Duration,
    /// Ingest API base URL (e.g. "http://localhost:3000"); `None` only logs
    ingest_url: Option<String>,
    http_client: reqwest::Client,
    store: Arc<CursorStore>,
    host: Arc<dyn HostApi>,
    status: Arc<tokio::sync::Mutex<ImportStatus>>,
}

impl ImportScheduler {
    pub fn new(
        plugin: &dyn Plugin,
        config_id: String,
        plugin_config: PluginConfig,
        store: Arc<CursorStore>,
        host: Arc<dyn HostApi>,
    ) -> Self {
        Self {
            plugin: plugin.name().to_string(),
            config_id,
            driver: ImportDriver::for_plugin(plugin),
            plugin_config,
            tick_interval: Duration::from_secs(300),
            ingest_url: None,
            http_client: reqwest::Client::new(),
            store,
            host,
            status: Arc::new(tokio::sync::Mutex::new(ImportStatus::default())),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_ingest_url(mut self, ingest_url: Option<String>) -> Self {
        self.ingest_url = ingest_url.map(|url| url.trim_end_matches('/').to_string());
        self
    }

    /// Returns a clone of the status tracker for external monitoring.
    pub fn status(&self) -> Arc<tokio::sync::Mutex<ImportStatus>> {
        Arc::clone(&self.status)
    }

    /// Starts the tick loop (non-blocking).
    ///
    /// Spawns a background task that ticks on schedule. Ticks never overlap:
    /// a tick that outlasts the interval delays the next one.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                plugin = %self.plugin,
                config_id = %self.config_id,
                interval_secs = self.tick_interval.as_secs(),
                "Starting import scheduler"
            );

            let mut interval = interval(self.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                // Errors are already logged and recorded in the status
                let _ = self.tick().await;
            }
        })
    }

    /// Runs one tick and records the outcome in the status.
    pub async fn tick(&self) -> Result<TickSummary> {
        debug!(plugin = %self.plugin, config_id = %self.config_id, "Running import tick");

        match self.run_tick().await {
            Ok(summary) => {
                let mut status = self.status.lock().await;
                status.last_tick = Some(Utc::now());
                status.last_end = Some(summary.end);
                status.last_error = None;
                status.tick_count += 1;
                if summary.end == TickEnd::Complete {
                    status.completed_imports += 1;
                }
                Ok(summary)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(
                    plugin = %self.plugin,
                    config_id = %self.config_id,
                    error = %message,
                    "Import tick failed"
                );
                let mut status = self.status.lock().await;
                status.last_error = Some(message);
                status.error_count += 1;
                Err(e)
            }
        }
    }

    async fn run_tick(&self) -> Result<TickSummary> {
        let cursor = self
            .store
            .load(&self.plugin, &self.config_id)
            .context("Failed to load cursor")?;

        let outcome = self
            .driver
            .run_tick(&self.plugin_config, cursor, self.host.as_ref())
            .await?;

        let (payload, cursor) = outcome.result.into_payload();
        self.publish(&payload).await?;

        self.store
            .save(&self.plugin, &self.config_id, &cursor)
            .context("Failed to save cursor")?;

        if outcome.summary.end == TickEnd::Complete {
            info!(plugin = %self.plugin, config_id = %self.config_id, "Import complete");
        }
        Ok(outcome.summary)
    }

    /// Publishes one tick's payload to the ingest API via HTTP POST.
    async fn publish(&self, payload: &ImportPayload) -> Result<()> {
        if payload.is_empty() {
            debug!(plugin = %self.plugin, "No objects to publish");
            return Ok(());
        }
        let Some(ingest_url) = &self.ingest_url else {
            info!(
                plugin = %self.plugin,
                vertices = payload.vertices.len(),
                edges = payload.edges.len(),
                "No ingest URL configured, dropping payload"
            );
            return Ok(());
        };

        let url = format!("{}/api/imports/{}", ingest_url, self.plugin);
        let tick_id = Uuid::now_v7();
        let response = self
            .http_client
            .post(&url)
            .header(TICK_ID_HEADER, tick_id.to_string())
            .header("X-Config-Id", &self.config_id)
            .json(payload)
            .send()
            .await
            .context("Failed to send HTTP request to ingest API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            anyhow::bail!("Ingest API returned error status {}: {}", status, body);
        }

        info!(
            plugin = %self.plugin,
            tick_id = %tick_id,
            vertices = payload.vertices.len(),
            edges = payload.edges.len(),
            "Published import payload"
        );
        Ok(())
    }
}
