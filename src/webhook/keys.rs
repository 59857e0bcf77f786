//! Replay key derivation.

use http::HeaderMap;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Fields of the inner `payload` object tried, in order, when the envelope
/// has no `update_id`.
pub const IDENTIFIER_FIELDS: [&str; 4] = ["invoice_id", "check_id", "transfer_id", "id"];

/// Caller override for replay key derivation: `(payload, raw_body, headers)`.
///
/// Returning `None` (or a blank string) disables deduplication for that
/// delivery.
pub type ReplayKeyResolver =
    Arc<dyn Fn(&Map<String, Value>, &[u8], &HeaderMap) -> Option<String> + Send + Sync>;

/// Default replay key for a webhook.
///
/// * `update_id:<id>` when the envelope carries a delivery id
/// * `<update_type>:<field>:<value>` from the first identifier field found
///   in the inner `payload`
/// * `body:<sha256 hex of the raw body>` otherwise
pub fn default_replay_key(payload: &Map<String, Value>, raw_body: &[u8]) -> String {
    if let Some(update_id) = payload.get("update_id").and_then(scalar) {
        return format!("update_id:{}", update_id);
    }

    let update_type = payload.get("update_type").and_then(Value::as_str);
    let inner = payload.get("payload").and_then(Value::as_object);
    if let (Some(update_type), Some(inner)) = (update_type, inner) {
        for field in IDENTIFIER_FIELDS {
            if let Some(value) = inner.get(field).and_then(scalar) {
                return format!("{}:{}:{}", update_type, field, value);
            }
        }
    }

    format!("body:{}", hex::encode(Sha256::digest(raw_body)))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}
