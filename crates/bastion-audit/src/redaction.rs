// redaction.rs — Mask secrets before anything reaches an audit log.
//
// Two passes, applied recursively over a JSON value:
// 1. Object keys that look like credentials (`api_key`, `token`, `secret`,
//    `password`, any case) have their whole value replaced.
// 2. String values are scrubbed of `Bearer <token>` headers and inline
//    `key=value` / `key: "value"` secrets, keeping the surrounding text.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

/// Replacement marker written in place of a secret.
pub const REDACTED: &str = "[REDACTED]";

static SECRET_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(api[_-]?key|token|secret|password)").expect("valid secret key pattern")
});

static BEARER_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-\._~\+/=]+)").expect("valid bearer pattern")
});

static ASSIGNED_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)((api[_-]?key|token|secret|password)\s*[:=]\s*['"]?)([\w\-\.]+)(['"]?)"#)
        .expect("valid assignment pattern")
});

/// True if an object key names a credential.
pub fn is_secret_key(key: &str) -> bool {
    SECRET_KEY.is_match(key)
}

/// Scrub inline secrets out of free text.
pub fn redact_text(text: &str) -> String {
    let pass = BEARER_VALUE.replace_all(text, |caps: &Captures| format!("{}{}", &caps[1], REDACTED));
    ASSIGNED_VALUE
        .replace_all(&pass, |caps: &Captures| {
            format!("{}{}{}", &caps[1], REDACTED, &caps[4])
        })
        .into_owned()
}

/// Return a copy of `value` with every secret masked.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_text(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let masked = if is_secret_key(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_value(inner)
                    };
                    (key.clone(), masked)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}
