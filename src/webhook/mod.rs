//! Inbound webhook receiver, hosted on an `axum` router.

pub mod callback;
pub mod keys;
mod listener;

pub use crate::errors::WebhookError;
pub use callback::{from_async_fn, from_fn, CallbackError, WebhookCallback};
pub use keys::{default_replay_key, ReplayKeyResolver};
pub use listener::{WebhookListener, WebhookListenerBuilder, DEFAULT_HOST, DEFAULT_PATH, DEFAULT_PORT};
