//! Stage failures and how they are surfaced.
//!
//! A failing stage returns a [`StageError`] carrying the upstream error kind
//! (e.g. `AccessDeniedException`). The plugin's [`ProblemTable`] maps that
//! kind to a [`Problem`]: what to say, at which level, and whether the
//! whole import must stop.

use std::collections::HashMap;
use thiserror::Error;

/// Error kinds meaning the configured credentials are not accepted.
pub const DEFAULT_CREDENTIAL_KINDS: &[&str] =
    &["UnrecognizedClientException", "InvalidSignatureException"];

/// Error kinds meaning the credentials lack permission for one entity type.
pub const DEFAULT_PERMISSION_KINDS: &[&str] =
    &["AccessDeniedException", "AccessDenied", "UnauthorizedOperation"];

/// Kind used when a failure carries no more specific name.
pub const GENERIC_ERROR_KIND: &str = "Error";

/// Failure returned by one stage invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct StageError {
    /// Error name/kind as reported by the source (drives classification)
    pub kind: String,
    /// Human-readable detail
    pub message: String,
}

impl StageError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// An unclassified failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(GENERIC_ERROR_KIND, message)
    }
}

impl From<anyhow::Error> for StageError {
    fn from(err: anyhow::Error) -> Self {
        Self::other(format!("{:#}", err))
    }
}

/// Classes of failure that get dedicated handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemClass {
    /// Credentials rejected outright; fatal to the import
    CredentialInvalid,
    /// Credentials valid but not allowed to read this entity type
    PermissionDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemLevel {
    Warning,
    Error,
}

/// Outcome of classifying a stage failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub level: ProblemLevel,
    pub message: String,
    /// Fatal problems go through the host's error channel and end the tick
    pub fatal: bool,
}

impl ProblemClass {
    fn problem(self, stage: &str) -> Problem {
        match self {
            ProblemClass::CredentialInvalid => Problem {
                level: ProblemLevel::Error,
                message: "The configured access key details are invalid".to_string(),
                fatal: true,
            },
            ProblemClass::PermissionDenied => Problem {
                level: ProblemLevel::Warning,
                message: format!(
                    "The configured access key has no permission to import {} objects",
                    stage
                ),
                fatal: false,
            },
        }
    }
}

/// Lookup table from error kind to problem class.
///
/// Plugins start from [`ProblemTable::default`] and add the kinds their
/// sources emit.
#[derive(Debug, Clone)]
pub struct ProblemTable {
    classes: HashMap<String, ProblemClass>,
}

impl ProblemTable {
    /// A table that classifies nothing; every failure is a plain warning.
    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    pub fn with_kinds(mut self, class: ProblemClass, kinds: &[&str]) -> Self {
        for kind in kinds {
            self.classes.insert(kind.to_string(), class);
        }
        self
    }

    pub fn class_of(&self, kind: &str) -> Option<ProblemClass> {
        self.classes.get(kind).copied()
    }

    /// Maps a stage failure to what should be logged or reported.
    pub fn classify(&self, err: &StageError, stage: &str) -> Problem {
        match self.class_of(&err.kind) {
            Some(class) => class.problem(stage),
            None => Problem {
                level: ProblemLevel::Warning,
                message: format!("{} objects failed to import: {}", stage, err.message),
                fatal: false,
            },
        }
    }
}

impl Default for ProblemTable {
    fn default() -> Self {
        Self::empty()
            .with_kinds(ProblemClass::CredentialInvalid, DEFAULT_CREDENTIAL_KINDS)
            .with_kinds(ProblemClass::PermissionDenied, DEFAULT_PERMISSION_KINDS)
    }
}
