//! Redaction of sensitive fields from trace payloads.
//!
//! Before a trace leaves the process it is passed through [`redact_sensitive_keys`],
//! which walks the payload and replaces the value of any mapping entry whose key
//! matches a configured sensitive name. Matching is case-sensitive and exact.
//!
//! Redaction never fails: unrepresentable spots are replaced with markers instead
//! of raising, so a bad payload can never break trace delivery.

use serde_json::Value;
use std::collections::HashSet;

/// Placeholder substituted for the value of any sensitive key.
pub const REDACTION_MARKER: &str = "<redacted>";

/// Placeholder substituted when traversal exceeds the depth bound.
///
/// `serde_json::Value` trees cannot contain reference cycles, so the depth bound
/// is the guard that guarantees termination on pathological nesting.
pub const CYCLE_MARKER: &str = "<cycle>";

const MAX_DEPTH: usize = 128;

/// Default set of sensitive key names redacted from instrumented data.
pub fn default_sensitive_keys() -> HashSet<String> {
    [
        "api_key",
        "apiKey",
        "apikey",
        "authorization",
        "Authorization",
        "cookie",
        "Cookie",
        "set-cookie",
        "password",
        "secret",
        "token",
        "access_token",
        "refresh_token",
        "client_secret",
        "x-api-key",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

/// Produce a deep copy of `value` with every sensitive entry masked.
pub fn redact_sensitive_keys(value: &Value, sensitive: &HashSet<String>) -> Value {
    redact_at_depth(value, sensitive, 0)
}

fn redact_at_depth(value: &Value, sensitive: &HashSet<String>, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return Value::String(CYCLE_MARKER.to_string());
    }

    match value {
        Value::Object(map) => {
            let mut redacted = serde_json::Map::with_capacity(map.len());
            for (key, entry) in map {
                if sensitive.contains(key) {
                    redacted.insert(key.clone(), Value::String(REDACTION_MARKER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_at_depth(entry, sensitive, depth + 1));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(
            items.iter().map(|item| redact_at_depth(item, sensitive, depth + 1)).collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(names: &[&str]) -> HashSet<String> {
        names.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_redacts_top_level_and_nested_keys() {
        let input = json!({
            "password": "x",
            "nested": {
                "token": "y",
                "safe": "z"
            }
        });

        let output = redact_sensitive_keys(&input, &keys(&["password", "token"]));

        assert_eq!(
            output,
            json!({
                "password": "<redacted>",
                "nested": {
                    "token": "<redacted>",
                    "safe": "z"
                }
            })
        );
    }

    #[test]
    fn test_recurses_into_arrays() {
        let input = json!([{"secret": "a"}, {"other": [{"secret": "b"}]}]);

        let output = redact_sensitive_keys(&input, &keys(&["secret"]));

        assert_eq!(
            output,
            json!([{"secret": "<redacted>"}, {"other": [{"secret": "<redacted>"}]}])
        );
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let input = json!({"Password": "x", "password": "y"});

        let output = redact_sensitive_keys(&input, &keys(&["password"]));

        assert_eq!(output["Password"], "x");
        assert_eq!(output["password"], "<redacted>");
    }

    #[test]
    fn test_scalars_pass_through() {
        let input = json!({"count": 3, "ok": true, "note": null});

        let output = redact_sensitive_keys(&input, &keys(&["password"]));

        assert_eq!(output, input);
    }

    #[test]
    fn test_terminates_on_pathological_nesting() {
        let mut value = json!("leaf");
        for _ in 0..300 {
            value = json!({ "inner": value });
        }

        let output = redact_sensitive_keys(&value, &keys(&["password"]));

        // Traversal must cut off at the depth bound with the cycle marker
        let rendered = serde_json::to_string(&output).unwrap();
        assert!(rendered.contains(CYCLE_MARKER));
        assert!(!rendered.contains("leaf"));
    }

    #[test]
    fn test_default_sensitive_keys_cover_common_credentials() {
        let defaults = default_sensitive_keys();
        assert!(defaults.contains("password"));
        assert!(defaults.contains("authorization"));
        assert!(defaults.contains("api_key"));
        assert!(defaults.contains("token"));
    }
}
