//! Host-side API handed to plugins during an import.
//!
//! Mirrors what the platform runtime provides: a report channel for
//! user-visible warnings and errors, config patching, and an opaque
//! runtime context. Logging itself goes through `tracing`.

use anyhow::{anyhow, Result};
use serde_json::{Map, Value};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

/// Services the host exposes to a running import.
pub trait HostApi: Send + Sync {
    /// Surfaces a warning to the user; the import carries on.
    fn report_warning(&self, text: &str);

    /// Surfaces an error to the user.
    ///
    /// Returns an error that the caller propagates, which ends the tick.
    fn report_error(&self, text: &str) -> Result<()>;

    /// Persists a change to one plugin config property (e.g. a refreshed
    /// token). Encrypted values are never logged.
    fn patch_config(&self, property: &str, value: Value, encrypted: bool) -> Result<()>;

    /// Opaque data the runtime passes through to the plugin.
    fn runtime_context(&self) -> Value {
        Value::Null
    }
}

/// A report raised through [`HostApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Warning(String),
    Error(String),
}

/// [`HostApi`] that logs everything and keeps reports and patches in
/// memory for inspection.
#[derive(Debug, Default)]
pub struct LoggingHost {
    reports: Mutex<Vec<Report>>,
    patches: Mutex<Map<String, Value>>,
    runtime_context: Value,
}

impl LoggingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runtime_context(runtime_context: Value) -> Self {
        Self {
            runtime_context,
            ..Self::default()
        }
    }

    /// All reports raised so far, oldest first.
    pub fn reports(&self) -> Vec<Report> {
        lock(&self.reports).clone()
    }

    /// Config properties patched so far.
    pub fn patches(&self) -> Map<String, Value> {
        lock(&self.patches).clone()
    }
}

impl HostApi for LoggingHost {
    fn report_warning(&self, text: &str) {
        warn!(report = %text, "Plugin reports warning");
        lock(&self.reports).push(Report::Warning(text.to_string()));
    }

    fn report_error(&self, text: &str) -> Result<()> {
        error!(report = %text, "Plugin reports error");
        lock(&self.reports).push(Report::Error(text.to_string()));
        Err(anyhow!("Plugin reported error: {}", text))
    }

    fn patch_config(&self, property: &str, value: Value, encrypted: bool) -> Result<()> {
        if encrypted {
            debug!(property = %property, "patchConfig: encrypted");
        } else {
            debug!(property = %property, value = %value, "patchConfig");
        }
        lock(&self.patches).insert(property.to_string(), value);
        Ok(())
    }

    fn runtime_context(&self) -> Value {
        self.runtime_context.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
