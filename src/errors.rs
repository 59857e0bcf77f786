//! Cryptopay error types.

use http::StatusCode;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Errors that can occur when talking to the Crypto Pay gateway.
#[derive(Debug, Error)]
pub enum CryptoPayError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A caller-supplied argument failed local validation.
    ///
    /// Raised before any request is sent; never retried.
    #[error("Invalid argument: {0}")]
    Validation(String),

    /// The gateway answered with an error envelope, a non-2xx status,
    /// or a body that does not follow the envelope convention.
    #[error("Gateway error: {0}")]
    Api(ApiError),

    /// The HTTP transport failed (timeout, connect, dropped connection).
    ///
    /// When retries are exhausted this carries the final transport error
    /// unchanged.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success payload could not be mapped onto the expected record.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The client was closed and can no longer issue requests.
    #[error("Client is closed")]
    Closed,
}

impl CryptoPayError {
    /// Borrow the gateway error, if this is one.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for CryptoPayError {
    fn from(err: ApiError) -> Self {
        Self::Api(err)
    }
}

/// A single terminal failure reported by (or synthesized for) the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// Numeric code, HTTP-like.
    pub code: i64,

    /// Short error name, e.g. `UNAUTHORIZED`.
    pub name: String,

    /// Optional human readable description.
    pub description: Option<String>,

    /// Additional fields of the error object this crate does not model.
    pub extra: Map<String, Value>,
}

impl ApiError {
    /// Build a locally synthesized error.
    pub fn new(code: i64, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            description: None,
            extra: Map::new(),
        }
    }

    /// Build an error from the gateway's `error` object.
    ///
    /// `fallback_code` is used when the object carries no integer `code`.
    pub fn from_json(object: &Map<String, Value>, fallback_code: i64) -> Self {
        let mut extra = object.clone();

        let code = extra
            .remove("code")
            .and_then(|v| v.as_i64())
            .unwrap_or(fallback_code);

        let name = match extra.remove("name") {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => "HTTPError".to_string(),
        };

        let description = match extra.remove("description") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        Self {
            code,
            name,
            description,
            extra,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code={}, name={}", self.code, self.name)
    }
}

impl std::error::Error for ApiError {}

/// Replay key store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayStoreError {
    /// Backing storage could not be read or written.
    #[error("Replay store I/O error: {0}")]
    Io(String),

    /// A stored entry could not be decoded.
    #[error("Replay store entry corrupt: {0}")]
    Corrupt(String),
}

/// Rejections produced while handling an inbound webhook.
///
/// Each variant maps to a fixed HTTP status and `detail` string; internal
/// causes are logged, never echoed to the sender.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Body is not valid UTF-8.
    #[error("Invalid encoding")]
    InvalidEncoding,

    /// Signature header missing or wrong.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Body is not JSON.
    #[error("Invalid JSON")]
    InvalidJson,

    /// Body is JSON but not an object.
    #[error("Invalid JSON payload")]
    InvalidJsonPayload,

    /// The replay key is already reserved.
    #[error("Duplicate webhook")]
    DuplicateWebhook,

    /// The replay store failed while reserving.
    #[error("Replay store error")]
    ReplayStore(#[source] ReplayStoreError),

    /// The replay key resolver panicked.
    #[error("Replay key error")]
    KeyResolver(String),

    /// The user callback failed or panicked.
    #[error("Callback error")]
    Callback(String),
}

impl WebhookError {
    /// HTTP status returned to the sender.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEncoding
            | Self::InvalidSignature
            | Self::InvalidJson
            | Self::InvalidJsonPayload => StatusCode::BAD_REQUEST,
            Self::DuplicateWebhook => StatusCode::CONFLICT,
            Self::ReplayStore(_) | Self::KeyResolver(_) | Self::Callback(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Fixed `detail` string of the JSON error body.
    pub fn detail(&self) -> &'static str {
        match self {
            Self::InvalidEncoding => "Invalid encoding",
            Self::InvalidSignature => "Invalid signature",
            Self::InvalidJson => "Invalid JSON",
            Self::InvalidJsonPayload => "Invalid JSON payload",
            Self::DuplicateWebhook => "Duplicate webhook",
            Self::ReplayStore(_) => "Replay store error",
            Self::KeyResolver(_) => "Replay key error",
            Self::Callback(_) => "Callback error",
        }
    }
}
