//! Result of checking a plugin configuration before any import runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of one configuration check message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Success,
    Warning,
    Error,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Success => write!(f, "success"),
            TestStatus::Warning => write!(f, "warning"),
            TestStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfigMessage {
    pub status: TestStatus,
    pub message: String,
}

/// Outcome of `testConfig`: an optional link to the source plus the
/// messages to show the user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfigResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub messages: Vec<TestConfigMessage>,
}

impl TestConfigResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// A result with a single success message.
    pub fn passed(message: impl Into<String>) -> Self {
        Self::new().success(message)
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn success(self, message: impl Into<String>) -> Self {
        self.push(TestStatus::Success, message)
    }

    pub fn warning(self, message: impl Into<String>) -> Self {
        self.push(TestStatus::Warning, message)
    }

    pub fn error(self, message: impl Into<String>) -> Self {
        self.push(TestStatus::Error, message)
    }

    fn push(mut self, status: TestStatus, message: impl Into<String>) -> Self {
        self.messages.push(TestConfigMessage {
            status,
            message: message.into(),
        });
        self
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.status == TestStatus::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let result = TestConfigResult::new()
            .with_link("https://demo")
            .warning("serverUrl is invalid");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "link": "https://demo",
                "messages": [{ "status": "warning", "message": "serverUrl is invalid" }]
            })
        );
    }

    #[test]
    fn test_has_errors() {
        assert!(!TestConfigResult::passed("ok").has_errors());
        assert!(!TestConfigResult::new().warning("hm").has_errors());
        assert!(TestConfigResult::new().warning("hm").error("bad").has_errors());
    }
}
