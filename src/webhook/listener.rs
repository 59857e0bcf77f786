//! Inbound webhook endpoint.
//!
//! Per request: decode, verify signature over the raw bytes, parse, reserve
//! the replay key, run the callback, and release the reservation if the
//! callback fails.

use super::callback::WebhookCallback;
use super::keys::{default_replay_key, ReplayKeyResolver};
use crate::crypto::signature::check_signature;
use crate::errors::WebhookError;
use crate::replay::ReplayKeyStore;
use crate::CryptoPayError;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::FutureExt;
use http::HeaderMap;
use serde_json::{json, Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 2203;

/// Default route.
pub const DEFAULT_PATH: &str = "/webhook";

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

struct Inner {
    api_token: String,
    callback: Box<dyn WebhookCallback>,
    replay_store: Option<Box<dyn ReplayKeyStore>>,
    replay_ttl: Option<Duration>,
    resolver: Option<ReplayKeyResolver>,
    path: String,
    host: String,
    port: u16,
}

/// Verifies and dispatches Crypto Pay webhooks.
///
/// Cheap to clone; clones share the callback and replay store.
#[derive(Clone)]
pub struct WebhookListener {
    inner: Arc<Inner>,
}

/// Builder for [`WebhookListener`].
pub struct WebhookListenerBuilder {
    api_token: String,
    callback: Box<dyn WebhookCallback>,
    replay_store: Option<Box<dyn ReplayKeyStore>>,
    replay_ttl: Option<Duration>,
    resolver: Option<ReplayKeyResolver>,
    path: String,
    host: String,
    port: u16,
}

impl WebhookListenerBuilder {
    /// Enable replay protection with the given store.
    pub fn replay_store(mut self, store: impl ReplayKeyStore + 'static) -> Self {
        self.replay_store = Some(Box::new(store));
        self
    }

    /// Lifetime of a replay reservation. Zero keeps it forever.
    pub fn replay_ttl(mut self, ttl: Duration) -> Self {
        self.replay_ttl = Some(ttl);
        self
    }

    /// Override replay key derivation.
    pub fn replay_key_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Map<String, Value>, &[u8], &HeaderMap) -> Option<String> + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Route the endpoint is mounted on.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Address [`WebhookListener::listen`] binds to.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Port [`WebhookListener::listen`] binds to.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Finish the listener.
    pub fn build(self) -> Result<WebhookListener, CryptoPayError> {
        if self.api_token.trim().is_empty() {
            return Err(CryptoPayError::ConfigError(
                "api_token cannot be empty".to_string(),
            ));
        }
        if !self.path.starts_with('/') {
            return Err(CryptoPayError::ConfigError(format!(
                "webhook path must start with '/', got {:?}",
                self.path
            )));
        }

        Ok(WebhookListener {
            inner: Arc::new(Inner {
                api_token: self.api_token,
                callback: self.callback,
                replay_store: self.replay_store,
                replay_ttl: self.replay_ttl,
                resolver: self.resolver,
                path: self.path,
                host: self.host,
                port: self.port,
            }),
        })
    }
}

impl WebhookListener {
    /// Start building a listener for `api_token`.
    pub fn builder(
        api_token: impl Into<String>,
        callback: impl WebhookCallback + 'static,
    ) -> WebhookListenerBuilder {
        WebhookListenerBuilder {
            api_token: api_token.into(),
            callback: Box::new(callback),
            replay_store: None,
            replay_ttl: None,
            resolver: None,
            path: DEFAULT_PATH.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }

    /// Route the endpoint is mounted on.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// `host:port` that [`listen`](Self::listen) binds to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.inner.host, self.inner.port)
    }

    /// Handle one delivery.
    pub async fn process(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), WebhookError> {
        let text = std::str::from_utf8(body).map_err(|e| {
            warn!(error = %e, "webhook body is not valid UTF-8");
            WebhookError::InvalidEncoding
        })?;

        if !check_signature(&self.inner.api_token, body, headers) {
            warn!("invalid webhook signature");
            return Err(WebhookError::InvalidSignature);
        }

        let payload = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(payload)) => payload,
            Ok(_) => {
                warn!("webhook body is not a JSON object");
                return Err(WebhookError::InvalidJsonPayload);
            }
            Err(e) => {
                warn!(error = %e, "webhook body is not JSON");
                return Err(WebhookError::InvalidJson);
            }
        };

        let update_type = payload
            .get("update_type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown");
        info!(update_type, "webhook received");

        let reservation = self
            .reserve(&payload, body, headers)
            .await?
            .map(|key| Reservation::new(Arc::clone(&self.inner), key));

        match self.run_callback(headers, &payload).await {
            Ok(()) => {
                if let Some(reservation) = reservation {
                    reservation.keep();
                }
                Ok(())
            }
            Err(err) => {
                if let Some(reservation) = reservation {
                    reservation.release().await;
                }
                Err(err)
            }
        }
    }

    fn resolve_key(
        &self,
        payload: &Map<String, Value>,
        body: &[u8],
        headers: &HeaderMap,
    ) -> Result<Option<String>, WebhookError> {
        let Some(resolver) = &self.inner.resolver else {
            return Ok(Some(default_replay_key(payload, body)));
        };
        std::panic::catch_unwind(AssertUnwindSafe(|| resolver(payload, body, headers))).map_err(
            |_| {
                error!("replay key resolver panicked");
                WebhookError::KeyResolver("resolver panicked".to_string())
            },
        )
    }

    /// Reserve the replay key. `None` when deduplication does not apply.
    async fn reserve(
        &self,
        payload: &Map<String, Value>,
        body: &[u8],
        headers: &HeaderMap,
    ) -> Result<Option<String>, WebhookError> {
        let Some(store) = &self.inner.replay_store else {
            return Ok(None);
        };

        let key = self.resolve_key(payload, body, headers)?;
        let Some(key) = key.filter(|key| !key.trim().is_empty()) else {
            return Ok(None);
        };

        let admitted = store
            .put_if_absent(&key, self.inner.replay_ttl)
            .await
            .map_err(|e| {
                error!(error = %e, "replay store failed to reserve key");
                WebhookError::ReplayStore(e)
            })?;
        if !admitted {
            warn!(replay_key = %key, "duplicate webhook rejected");
            return Err(WebhookError::DuplicateWebhook);
        }
        Ok(Some(key))
    }

    async fn run_callback(
        &self,
        headers: &HeaderMap,
        payload: &Map<String, Value>,
    ) -> Result<(), WebhookError> {
        let outcome = AssertUnwindSafe(self.inner.callback.call(headers, payload))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(error = %e, "webhook callback failed");
                Err(WebhookError::Callback(e.to_string()))
            }
            Err(_) => {
                error!("webhook callback panicked");
                Err(WebhookError::Callback("callback panicked".to_string()))
            }
        }
    }

    /// Router serving the webhook route.
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.inner.path, post(handle_webhook))
            .with_state(self.clone())
    }

    /// Bind the configured address and serve until the future is dropped.
    pub async fn listen(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind((self.inner.host.as_str(), self.inner.port)).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        info!(
            address = %listener.local_addr()?,
            path = %self.inner.path,
            "webhook listener started"
        );
        axum::serve(listener, self.router()).await
    }
}

/// A held replay key.
///
/// Released explicitly when the callback fails. If the request future is
/// dropped while the callback is still running, the key is released from a
/// spawned task so the gateway's resend is not rejected as a duplicate.
struct Reservation {
    inner: Arc<Inner>,
    key: Option<String>,
}

impl Reservation {
    fn new(inner: Arc<Inner>, key: String) -> Self {
        Self {
            inner,
            key: Some(key),
        }
    }

    /// The delivery was handled; the key stays reserved.
    fn keep(mut self) {
        self.key = None;
    }

    async fn release(mut self) {
        if let Some(key) = self.key.take() {
            release_key(&self.inner, &key).await;
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        warn!(replay_key = %key, "webhook abandoned mid-callback, releasing replay key");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move { release_key(&inner, &key).await });
            }
            Err(_) => {
                error!(replay_key = %key, "no runtime to release replay key on");
            }
        }
    }
}

async fn release_key(inner: &Inner, key: &str) {
    if let Some(store) = &inner.replay_store {
        if let Err(e) = store.remove(key).await {
            warn!(replay_key = %key, error = %e, "failed to release replay key");
        }
    }
}

async fn handle_webhook(
    State(listener): State<WebhookListener>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match listener.process(&headers, &body).await {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(err) => err.into_response(),
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = json!({ "detail": self.detail() });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signature::{compute_signature, SIGNATURE_HEADER};
    use crate::replay::InMemoryReplayKeyStore;
    use crate::webhook::callback::{from_async_fn, from_fn, CallbackError};
    use http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOKEN: &str = "1234:TEST";

    fn signed(body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&compute_signature(TOKEN, body)).unwrap(),
        );
        headers
    }

    fn counting(calls: &Arc<AtomicUsize>) -> impl WebhookCallback {
        let calls = Arc::clone(calls);
        from_fn(move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_builder_defaults() {
        let listener = WebhookListener::builder(TOKEN, from_fn(|_, _| Ok(())))
            .build()
            .unwrap();
        assert_eq!(listener.path(), "/webhook");
        assert_eq!(listener.address(), "0.0.0.0:2203");
    }

    #[test]
    fn test_builder_rejects_bad_path() {
        let result = WebhookListener::builder(TOKEN, from_fn(|_, _| Ok(())))
            .path("webhook")
            .build();
        assert!(matches!(result, Err(CryptoPayError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_invalid_encoding_checked_first() {
        let listener = WebhookListener::builder(TOKEN, from_fn(|_, _| Ok(())))
            .build()
            .unwrap();
        let body = [0xff, 0xfe];
        let err = listener.process(&HeaderMap::new(), &body).await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidEncoding));
    }

    #[tokio::test]
    async fn test_signature_checked_before_json() {
        let listener = WebhookListener::builder(TOKEN, from_fn(|_, _| Ok(())))
            .build()
            .unwrap();
        let err = listener.process(&HeaderMap::new(), b"not json").await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_json_errors() {
        let listener = WebhookListener::builder(TOKEN, from_fn(|_, _| Ok(())))
            .build()
            .unwrap();

        let err = listener.process(&signed(b"{oops"), b"{oops").await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidJson));

        let err = listener.process(&signed(b"[1,2]"), b"[1,2]").await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidJsonPayload));
    }

    #[tokio::test]
    async fn test_duplicate_is_rejected_once_reserved() {
        let calls = Arc::new(AtomicUsize::new(0));
        let listener = WebhookListener::builder(TOKEN, counting(&calls))
            .replay_store(InMemoryReplayKeyStore::new())
            .build()
            .unwrap();
        let body = br#"{"update_id":7,"update_type":"invoice_paid"}"#;

        listener.process(&signed(body), body).await.unwrap();
        let err = listener.process(&signed(body), body).await.unwrap_err();
        assert!(matches!(err, WebhookError::DuplicateWebhook));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_callback_releases_key() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let callback = from_fn(move |_, _| -> Result<(), CallbackError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first delivery blows up");
            }
            Ok(())
        });
        let listener = WebhookListener::builder(TOKEN, callback)
            .replay_store(InMemoryReplayKeyStore::new())
            .build()
            .unwrap();
        let body = br#"{"update_id":8}"#;

        let err = listener.process(&signed(body), body).await.unwrap_err();
        assert!(matches!(err, WebhookError::Callback(_)));
        listener.process(&signed(body), body).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abandoned_delivery_releases_key() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let store = Arc::new(InMemoryReplayKeyStore::new());
        let callback = from_async_fn(move |_, _| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok::<(), CallbackError>(())
            }
        });
        let listener = WebhookListener::builder(TOKEN, callback)
            .replay_store(Arc::clone(&store))
            .build()
            .unwrap();
        let body = br#"{"update_id":10}"#;

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), listener.process(&signed(body), body))
                .await;
        assert!(abandoned.is_err());

        for _ in 0..100 {
            if store.is_empty().await {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(store.is_empty().await);

        listener.process(&signed(body), body).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_panicking_resolver_is_server_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let listener = WebhookListener::builder(TOKEN, counting(&calls))
            .replay_store(InMemoryReplayKeyStore::new())
            .replay_key_resolver(|_, _, _| panic!("resolver bug"))
            .build()
            .unwrap();
        let body = br#"{"update_id":11}"#;

        let err = listener.process(&signed(body), body).await.unwrap_err();
        assert!(matches!(err, WebhookError::KeyResolver(_)));
        assert_eq!(err.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_resolved_key_skips_store() {
        let calls = Arc::new(AtomicUsize::new(0));
        let listener = WebhookListener::builder(TOKEN, counting(&calls))
            .replay_store(InMemoryReplayKeyStore::new())
            .replay_key_resolver(|_, _, _| Some("  ".to_string()))
            .build()
            .unwrap();
        let body = br#"{"update_id":9}"#;

        listener.process(&signed(body), body).await.unwrap();
        listener.process(&signed(body), body).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
