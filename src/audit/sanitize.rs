//! Request sanitization for audit logging.
//!
//! Removes or redacts sensitive information from requests before they are
//! written to the audit log.

use axum::http::HeaderMap;
use serde_json::{json, Map, Value};

use crate::auth::SharedSecret;

/// Keys that should be redacted from audit logs. Matched as substrings of
/// lowercased JSON keys and header names.
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "secret",
    "key",
    "token",
    "credential",
    "signature",
    "auth",
    "authorization",
    "cookie",
];

/// Maximum length for string values before truncation.
const MAX_STRING_LENGTH: usize = 1024;

/// Keys whose values should be truncated if too long.
const TRUNCATABLE_KEYS: &[&str] = &["content", "data", "body", "payload", "text"];

const REDACTED: &str = "[REDACTED]";

/// Sanitize a JSON document for audit logging.
///
/// This function:
/// 1. Redacts values for sensitive keys (secret, signature, etc.)
/// 2. Truncates large string values in content/body fields
/// 3. Recursively processes nested objects and arrays
pub fn sanitize_params(params: &Value) -> Value {
    sanitize_value(params, false)
}

/// Build the sanitized view of an inbound request.
///
/// `body` is `None` when the body was never read (oversized requests).
/// Bodies that are not JSON are summarized by length only.
pub fn sanitize_request(headers: &HeaderMap, body: Option<&[u8]>) -> Value {
    let mut sanitized_headers = Map::new();
    for (name, value) in headers {
        let name = name.as_str();
        let shown = if is_sensitive(name) {
            REDACTED.to_string()
        } else {
            value.to_str().unwrap_or("[NON-ASCII]").to_string()
        };
        sanitized_headers.insert(name.to_string(), Value::String(shown));
    }

    let body = match body {
        None => Value::String("[NOT READ]".to_string()),
        Some(bytes) => match serde_json::from_slice::<Value>(bytes) {
            Ok(parsed) => sanitize_params(&parsed),
            Err(_) => Value::String(format!("[NON-JSON - {} bytes]", bytes.len())),
        },
    };

    json!({
        "headers": Value::Object(sanitized_headers),
        "body": body,
    })
}

/// Scrub the shared secret out of free-form diagnostic text.
///
/// Used for collaborator error text (transport errors, provider bodies,
/// panic payloads) before it reaches an audit record. The result is capped
/// at the same length as truncated content fields.
pub fn redact_detail(text: &str, secret: &SharedSecret) -> String {
    let mut scrubbed = match std::str::from_utf8(secret.expose()) {
        Ok(secret) if !secret.is_empty() => text.replace(secret, REDACTED),
        _ => text.to_string(),
    };

    if scrubbed.len() > MAX_STRING_LENGTH {
        let mut cut = MAX_STRING_LENGTH;
        while !scrubbed.is_char_boundary(cut) {
            cut -= 1;
        }
        scrubbed.truncate(cut);
        scrubbed.push_str("...");
    }

    scrubbed
}

fn is_sensitive(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|&s| key_lower.contains(s))
}

/// Recursively sanitize a JSON value.
fn sanitize_value(value: &Value, is_truncatable: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = Map::new();
            for (key, val) in map {
                if is_sensitive(key) {
                    sanitized.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    let key_lower = key.to_lowercase();
                    let should_truncate = TRUNCATABLE_KEYS.iter().any(|&s| key_lower.contains(s));
                    sanitized.insert(key.clone(), sanitize_value(val, should_truncate));
                }
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(
            arr.iter()
                .map(|v| sanitize_value(v, is_truncatable))
                .collect(),
        ),
        Value::String(s) if is_truncatable && s.len() > MAX_STRING_LENGTH => {
            Value::String(format!("[TRUNCATED - {} bytes]", s.len()))
        }
        _ => value.clone(),
    }
}
