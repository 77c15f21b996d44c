//! Shared data model for import plugins.
//!
//! Plugins produce graph payloads (vertices and edges) and read their
//! settings from a plugin configuration object. This crate holds those
//! types, the payload contract checks, host configuration, and log
//! redaction. The import engine itself lives in the `plugin-host` crate.

// Graph payload model and validation
pub mod graph;

// Plugin and host configuration
pub mod config;

// Redacted JSON rendering for logs
pub mod redact;

pub use config::{ApiLimits, HostConfig, PluginConfig, RunBudget, TestSettings};
pub use graph::{Edge, ImportPayload, PayloadValidationError, Vertex};
