//! # Cryptopay
//!
//! **Client and webhook receiver for the [Crypto Pay](https://help.crypt.bot/crypto-pay-api) API.**
//!
//! The outbound client creates invoices, sends transfers and reads balances,
//! exchange rates and currencies. Every call shares one request discipline:
//!
//! - **Bounded retries** with exponential backoff that honours `Retry-After`
//! - **Envelope normalization**: every response is either the `result`
//!   payload or a single [`ApiError`]
//! - **Forward-compatible records**: unknown fields and enum values are kept,
//!   never rejected
//! - **Lazy pagination** over invoices
//!
//! The inbound side (feature `webhook`, on by default) verifies the
//! HMAC-SHA256 signature over the exact body bytes, suppresses duplicate
//! deliveries through a pluggable [`ReplayKeyStore`](replay::ReplayKeyStore),
//! and releases the reservation when the callback fails so a resend succeeds.
//!
//! ## Quickstart
//!
//! ```no_run
//! use cryptopay::client::params::CreateInvoice;
//! use cryptopay::{Asset, ClientConfig, CryptoPayClient, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cryptopay::CryptoPayError> {
//!     let config = ClientConfig::new("YOUR_API_TOKEN")
//!         .testnet()
//!         .with_retry(RetryPolicy::new(3));
//!     let client = CryptoPayClient::new(config)?;
//!
//!     let invoice = client
//!         .create_invoice(&CreateInvoice::new(Asset::Usdt, "12.50").description("Order #42"))
//!         .await?;
//!     println!("pay at {:?}", invoice.bot_invoice_url);
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Webhooks
//!
//! ```no_run
//! use cryptopay::replay::InMemoryReplayKeyStore;
//! use cryptopay::webhook::{from_fn, WebhookListener};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = WebhookListener::builder(
//!         "YOUR_API_TOKEN",
//!         from_fn(|_headers, update| {
//!             println!("update: {:?}", update.get("update_type"));
//!             Ok(())
//!         }),
//!     )
//!     .replay_store(InMemoryReplayKeyStore::new())
//!     .replay_ttl(Duration::from_secs(24 * 60 * 60))
//!     .build()?;
//!
//!     listener.listen().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Events are emitted through `tracing`; install a subscriber to see them.
//! The API token is never logged.

#![deny(warnings)]
#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Crypto layer
pub mod crypto;

// Protocol layer
pub mod protocol;

// Client layer
pub mod client;

// Replay protection
pub mod replay;

// Inbound webhooks
#[cfg(feature = "webhook")]
pub mod webhook;

// Re-exports for public API
pub use client::retry::RetryPolicy;
pub use client::{BlockingCryptoPayClient, CryptoPayClient};
pub use clock::{Clock, SystemClock};
pub use config::{ClientConfig, Network};
pub use errors::{ApiError, CryptoPayError, ReplayStoreError, WebhookError};
pub use protocol::models::{
    App, Asset, Balance, ButtonName, Currency, ExchangeRate, Extensible, Invoice, Status, Transfer,
};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
