//! Redacted JSON rendering for log output.
//!
//! Plugin configs and upstream error bodies can carry credentials. Anything
//! logged from them goes through [`redacted_json`] first.

use serde_json::{Map, Value};

/// Property names always dropped, compared case-insensitively.
const SENSITIVE_PROPERTIES: &[&str] = &["auth", "authorization", "request", "_header"];

/// Renders `value` as compact JSON with sensitive properties removed.
///
/// Keys matching [`SENSITIVE_PROPERTIES`] or `omit` (case-insensitive) are
/// dropped entirely, at any depth.
pub fn redacted_json(value: &Value, omit: &[String]) -> String {
    let omit: Vec<String> = SENSITIVE_PROPERTIES
        .iter()
        .map(|p| p.to_string())
        .chain(omit.iter().map(|p| p.to_lowercase()))
        .collect();
    redact(value, &omit).to_string()
}

fn redact(value: &Value, omit: &[String]) -> Value {
    match value {
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .iter()
                .filter(|(key, _)| !omit.contains(&key.to_lowercase()))
                .map(|(key, val)| (key.clone(), redact(val, omit)))
                .collect();
            Value::Object(kept)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| redact(v, omit)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sensitive_properties_removed() {
        let value = json!({
            "serverUrl": "https://example.com",
            "Authorization": "Bearer abc",
            "nested": { "auth": { "user": "u" }, "keep": 1 }
        });
        assert_eq!(
            redacted_json(&value, &[]),
            r#"{"nested":{"keep":1},"serverUrl":"https://example.com"}"#
        );
    }

    #[test]
    fn test_extra_properties_removed_case_insensitive() {
        let value = json!({ "apiKey": "secret", "items": [{ "APIKEY": "x", "id": 1 }] });
        let omit = vec!["apikey".to_string()];
        assert_eq!(redacted_json(&value, &omit), r#"{"items":[{"id":1}]}"#);
    }

    #[test]
    fn test_scalars_unchanged() {
        assert_eq!(redacted_json(&json!("text"), &[]), r#""text""#);
        assert_eq!(redacted_json(&json!(42), &[]), "42");
        assert_eq!(redacted_json(&Value::Null, &[]), "null");
    }
}
