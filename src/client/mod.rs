//! Outbound gateway clients.
//!
//! [`CryptoPayClient`] is async; [`BlockingCryptoPayClient`] wraps
//! `reqwest::blocking` for synchronous callers. Both share configuration,
//! retry policy, request parameters and response handling.

pub mod blocking;
pub mod http;
pub mod params;
pub mod retry;

pub use blocking::BlockingCryptoPayClient;
pub use http::CryptoPayClient;

use crate::config::{ClientConfig, TOKEN_HEADER};
use crate::CryptoPayError;
use reqwest::header::{HeaderMap, HeaderValue};

pub(crate) const GET_ME: &str = "getMe";
pub(crate) const CREATE_INVOICE: &str = "createInvoice";
pub(crate) const TRANSFER: &str = "transfer";
pub(crate) const GET_INVOICES: &str = "getInvoices";
pub(crate) const GET_BALANCE: &str = "getBalance";
pub(crate) const GET_EXCHANGE_RATES: &str = "getExchangeRates";
pub(crate) const GET_CURRENCIES: &str = "getCurrencies";

/// Headers sent with every request. The token is marked sensitive so it
/// never shows up in `Debug` output.
pub(crate) fn default_headers(config: &ClientConfig) -> Result<HeaderMap, CryptoPayError> {
    let mut token = HeaderValue::from_str(&config.api_token).map_err(|_| {
        CryptoPayError::ConfigError("api_token contains characters not allowed in a header".to_string())
    })?;
    token.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(TOKEN_HEADER, token);
    Ok(headers)
}

pub(crate) fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!("{}/{}", base_url, endpoint)
}
