//! Paging context carried between import ticks.
//!
//! The cursor is an opaque JSON object owned by the caller between ticks.
//! The driver only reads and writes the two keys below; every other key
//! belongs to whichever stage put it there.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Index of the stage that resumes on the next invocation.
pub const STAGE_INDEX_KEY: &str = "stageIndex";

/// Set once initial values have been seeded.
pub const IS_INITIALIZED_KEY: &str = "isInitialized";

/// Persisted paging context (a.k.a. the page API exposed to stages).
///
/// An empty cursor means "start a fresh import" when passed in and
/// "import complete" when returned.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportCursor(Map<String, Value>);

impl ImportCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parses a cursor previously produced by [`ImportCursor::to_json`].
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Paging context is not a JSON object")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize paging context")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Reads a value as `T`; `None` if the key is missing, null, or of
    /// another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.0.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => T::deserialize(value).ok(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Replaces the whole context with `{}`.
    pub fn clear(&mut self) {
        self.0 = Map::new();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// True once [`ImportCursor::seed`] has run for the current import.
    pub fn is_initialized(&self) -> bool {
        matches!(self.0.get(IS_INITIALIZED_KEY), Some(Value::Bool(true)))
    }

    /// Seeds a fresh cursor: stage 0, then the plugin's initial values,
    /// then the initialized flag.
    pub fn seed(&mut self, initial_values: &Map<String, Value>) {
        self.set(STAGE_INDEX_KEY, 0u64);
        for (key, value) in initial_values {
            self.set(key.clone(), value.clone());
        }
        self.set(IS_INITIALIZED_KEY, true);
    }

    /// Current stage index; `None` when missing or not a non-negative integer.
    pub fn stage_index(&self) -> Option<usize> {
        self.0
            .get(STAGE_INDEX_KEY)
            .and_then(Value::as_u64)
            .and_then(|i| usize::try_from(i).ok())
    }

    pub fn set_stage_index(&mut self, index: usize) {
        self.set(STAGE_INDEX_KEY, index as u64);
    }
}
