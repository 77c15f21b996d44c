//! Drives an import across ticks until it completes.
//!
//! Behaves like the platform would: the cursor goes through its JSON text
//! between ticks, and every tick's payload is checked against the
//! platform's hard size limit and the payload contract.

use crate::driver::{ImportDriver, TickSummary};
use crate::host::HostApi;
use crate::page::ImportCursor;
use crate::plugin::Plugin;
use anyhow::{bail, Context, Result};
use pluginkit::{ImportPayload, PluginConfig};
use tracing::debug;

/// Largest serialized tick payload the platform accepts, in bytes.
///
/// Independent of `testSettings.maxPayloadSize`, which only tells the
/// driver when to stop paging; a tick may overshoot that by one page.
pub const MAX_IMPORT_PAYLOAD_SIZE: usize = 2 * 1024 * 1024;

/// Everything an import produced, across all of its ticks.
#[derive(Debug, Clone, Default)]
pub struct CompletedImport {
    pub payload: ImportPayload,
    pub ticks: Vec<TickSummary>,
}

/// Runs ticks of `plugin` from a fresh cursor until the cursor comes back
/// empty.
///
/// # Errors
/// Fails when a tick fails, when a tick's payload exceeds
/// [`MAX_IMPORT_PAYLOAD_SIZE`] or breaks the payload contract, or when the
/// import is still incomplete after `max_ticks` ticks.
pub async fn run_to_completion(
    plugin: &dyn Plugin,
    config: &PluginConfig,
    host: &dyn HostApi,
    max_ticks: usize,
) -> Result<CompletedImport> {
    let driver = ImportDriver::for_plugin(plugin);
    let mut completed = CompletedImport::default();
    let mut cursor_json = ImportCursor::new().to_json()?;

    for tick in 1..=max_ticks {
        let cursor = ImportCursor::from_json(&cursor_json)
            .with_context(|| format!("Tick {}: paging context did not round-trip", tick))?;
        let outcome = driver
            .run_tick(config, cursor, host)
            .await
            .with_context(|| format!("Tick {} of plugin '{}' failed", tick, plugin.name()))?;

        let payload_bytes = outcome.result.serialized_len()?;
        if payload_bytes > MAX_IMPORT_PAYLOAD_SIZE {
            bail!(
                "Tick {} payload of {} bytes exceeds maximum of {} bytes",
                tick,
                payload_bytes,
                MAX_IMPORT_PAYLOAD_SIZE
            );
        }

        let done = outcome.result.is_complete();
        let (payload, cursor) = outcome.result.into_payload();
        payload
            .validate()
            .with_context(|| format!("Tick {} produced an invalid payload", tick))?;

        debug!(
            plugin = %plugin.name(),
            tick = tick,
            vertices = payload.vertices.len(),
            edges = payload.edges.len(),
            "Tick accepted"
        );

        completed.payload.extend(payload);
        completed.ticks.push(outcome.summary);
        if done {
            return Ok(completed);
        }
        cursor_json = cursor.to_json()?;
    }

    bail!(
        "Import of plugin '{}' did not complete within {} ticks",
        plugin.name(),
        max_ticks
    )
}
