//! Plugin Host - paged, resumable imports from external data sources.
//!
//! A plugin splits an import into ordered stages. Each tick runs as many
//! stage pages as the time and payload budget allow, then hands back the
//! graph objects produced so far along with a paging context. The caller
//! persists that context and passes it to the next tick until it comes back
//! empty.
//!
//! # Architecture
//!
//! ```text
//! External source (REST API, synthetic data, ...)
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Plugin (implements trait)          │
//! │  - Ordered import stages                 │
//! │  - Default page sizes, initial cursor    │
//! │  - Error kind classification             │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Import Driver (one tick)           │
//! │  - Seed / resume the cursor              │
//! │  - Page through stages within budget     │
//! │  - Honour rate-limit delays              │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Import Scheduler                   │
//! │  - Tick on an interval                   │
//! │  - Publish payloads                      │
//! │  - Persist cursors (SQLite)              │
//! └─────────────────────────────────────────┘
//!          ↓
//!      Ingest API
//! ```
//!
//! # Core Types
//!
//! - [`Plugin`] - Trait that all plugins implement
//! - [`Stage`] - One ordered unit of import work
//! - [`ImportCursor`] - Paging context persisted between ticks
//! - [`ImportDriver`] - Runs one tick of an import
//! - [`HostApi`] - Report channel and config patching offered to plugins

mod page;
mod stage;
pub mod config_check;
pub mod cursor_store;
pub mod driver;
pub mod harness;
pub mod host;
pub mod plugin;
pub mod plugins;
pub mod problem;
pub mod registry;
pub mod scheduler;

pub use config_check::{TestConfigMessage, TestConfigResult, TestStatus};
pub use cursor_store::CursorStore;
pub use driver::{
    FailurePolicy, ImportDriver, ImportResult, ImportState, StageOutcome, TickEnd, TickOutcome,
    TickSummary,
};
pub use harness::{run_to_completion, CompletedImport};
pub use host::{HostApi, LoggingHost, Report};
pub use page::{ImportCursor, IS_INITIALIZED_KEY, STAGE_INDEX_KEY};
pub use plugin::{import_objects, redacted_plugin_config, ImportEvent, Plugin};
pub use problem::{Problem, ProblemClass, ProblemLevel, ProblemTable, StageError};
pub use scheduler::{ImportScheduler, ImportStatus};
pub use stage::{ResultBuffer, Stage, StageContext};
