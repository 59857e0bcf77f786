//! Response envelope normalization.
//!
//! Every gateway response is wrapped as `{"ok": true, "result": ...}` or
//! `{"ok": false, "error": {...}}`. This module is the single place that
//! decides success versus failure for a response.

use crate::errors::ApiError;
use crate::CryptoPayError;
use serde_json::Value;

/// Maximum number of body characters echoed into synthesized errors.
pub const BODY_PREVIEW_CHARS: usize = 100;

/// First [`BODY_PREVIEW_CHARS`] characters of a body, lossily decoded.
pub fn body_preview(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(BODY_PREVIEW_CHARS)
        .collect()
}

/// Turn an HTTP status and body into the `result` payload or a gateway error.
///
/// # Errors
/// * `Api` with the response status when the body is not JSON
/// * `Api` with code 200 when a 200 response has no `result` key
/// * `Api` built from the `error` object for non-200 responses that carry one
/// * `Api` with the response status and a body preview otherwise
pub fn normalize(status: u16, body: &[u8]) -> Result<Value, CryptoPayError> {
    let code = i64::from(status);

    let payload: Value = serde_json::from_slice(body).map_err(|_| {
        ApiError::new(
            code,
            format!("Invalid JSON response: {}", body_preview(body)),
        )
    })?;

    if status == 200 {
        return match payload {
            Value::Object(mut map) if map.contains_key("result") => {
                Ok(map.remove("result").unwrap_or(Value::Null))
            }
            _ => Err(ApiError::new(200, "Malformed success response: missing 'result'").into()),
        };
    }

    if let Some(Value::Object(error)) = payload.get("error") {
        return Err(ApiError::from_json(error, code).into());
    }

    Err(ApiError::new(code, format!("HTTPError: {}", body_preview(body))).into())
}
