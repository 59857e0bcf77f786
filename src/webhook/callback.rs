//! User callbacks invoked for accepted webhooks.

use async_trait::async_trait;
use http::HeaderMap;
use serde_json::{Map, Value};
use std::future::Future;

/// Error returned by a callback. Its text is logged, never sent back.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Handler for verified, deduplicated webhooks.
///
/// A returned error (or a panic) makes the listener answer 500 and release
/// the replay reservation so the gateway's resend is accepted.
#[async_trait]
pub trait WebhookCallback: Send + Sync {
    /// Handle one delivery.
    async fn call(&self, headers: &HeaderMap, payload: &Map<String, Value>) -> Result<(), CallbackError>;
}

/// Wrap a synchronous closure.
pub fn from_fn<F>(f: F) -> FnCallback<F>
where
    F: Fn(&HeaderMap, &Map<String, Value>) -> Result<(), CallbackError> + Send + Sync,
{
    FnCallback(f)
}

/// Wrap an async closure. Arguments are passed by value.
pub fn from_async_fn<F, Fut>(f: F) -> AsyncFnCallback<F>
where
    F: Fn(HeaderMap, Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), CallbackError>> + Send,
{
    AsyncFnCallback(f)
}

/// See [`from_fn`].
pub struct FnCallback<F>(F);

#[async_trait]
impl<F> WebhookCallback for FnCallback<F>
where
    F: Fn(&HeaderMap, &Map<String, Value>) -> Result<(), CallbackError> + Send + Sync,
{
    async fn call(&self, headers: &HeaderMap, payload: &Map<String, Value>) -> Result<(), CallbackError> {
        (self.0)(headers, payload)
    }
}

/// See [`from_async_fn`].
pub struct AsyncFnCallback<F>(F);

#[async_trait]
impl<F, Fut> WebhookCallback for AsyncFnCallback<F>
where
    F: Fn(HeaderMap, Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), CallbackError>> + Send,
{
    async fn call(&self, headers: &HeaderMap, payload: &Map<String, Value>) -> Result<(), CallbackError> {
        (self.0)(headers.clone(), payload.clone()).await
    }
}
