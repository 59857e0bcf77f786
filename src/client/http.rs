//! Async Crypto Pay client.
//!
//! Every call goes through the same path: local validation, the retry loop,
//! envelope normalization, then typed mapping.

use super::params::{validate_count, CreateInvoice, InvoiceFilter, InvoiceQuery, TransferRequest};
use super::retry::RetryPolicy;
use super::{default_headers, endpoint_url};
use crate::config::ClientConfig;
use crate::protocol::envelope;
use crate::protocol::mapper::{parse_items, parse_model, parse_models};
use crate::protocol::models::{App, Balance, Currency, ExchangeRate, Invoice, Transfer};
use crate::CryptoPayError;
use futures_util::stream::{self, Stream, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Raw gateway response: status plus body bytes.
#[derive(Debug)]
pub struct GatewayResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl GatewayResponse {
    async fn from_response(response: Response) -> Result<Self, CryptoPayError> {
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(Self { status, body })
    }

    /// Normalize the envelope into the `result` payload.
    pub fn into_result(self) -> Result<Value, CryptoPayError> {
        envelope::normalize(self.status, &self.body)
    }
}

/// Async client for the Crypto Pay API.
///
/// Safe to share between tasks (`&self` everywhere). Calls after
/// [`close`](Self::close) fail with [`CryptoPayError::Closed`].
pub struct CryptoPayClient {
    http: Mutex<Option<Client>>,
    base_url: String,
    retry: RetryPolicy,
}

impl CryptoPayClient {
    /// Build a client from a validated config.
    pub fn new(config: ClientConfig) -> Result<Self, CryptoPayError> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(default_headers(&config)?)
            .build()
            .map_err(|e| CryptoPayError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http: Mutex::new(Some(http)),
            base_url: config.base_url().to_string(),
            retry: config.retry,
        })
    }

    /// Mainnet client with default settings.
    pub fn with_token(api_token: impl Into<String>) -> Result<Self, CryptoPayError> {
        Self::new(ClientConfig::new(api_token))
    }

    /// The API root this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Release the underlying HTTP client. Idempotent.
    pub fn close(&self) {
        let released = self
            .http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            debug!(base_url = %self.base_url, "client closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn http(&self) -> Result<Client, CryptoPayError> {
        self.http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CryptoPayError::Closed)
    }

    async fn execute<F>(&self, endpoint: &str, build: F) -> Result<Value, CryptoPayError>
    where
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        let http = self.http()?;
        let url = endpoint_url(&self.base_url, endpoint);

        let response = self.retry.run(|| build(&http, &url).send()).await?;
        let response = GatewayResponse::from_response(response).await?;
        debug!(endpoint, status = response.status, "gateway response");
        response.into_result()
    }

    /// Basic information about the app behind the token.
    pub async fn get_me(&self) -> Result<App, CryptoPayError> {
        let result = self
            .execute(super::GET_ME, |http, url| http.get(url))
            .await?;
        parse_model(result)
    }

    /// Create an invoice.
    pub async fn create_invoice(&self, request: &CreateInvoice) -> Result<Invoice, CryptoPayError> {
        request.validate()?;
        let result = self
            .execute(super::CREATE_INVOICE, |http, url| http.post(url).json(request))
            .await?;
        parse_model(result)
    }

    /// Send coins from the app balance to a user.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<Transfer, CryptoPayError> {
        request.validate()?;
        let result = self
            .execute(super::TRANSFER, |http, url| http.post(url).json(request))
            .await?;
        parse_model(result)
    }

    /// One page of invoices.
    pub async fn get_invoices(&self, query: &InvoiceQuery) -> Result<Vec<Invoice>, CryptoPayError> {
        let params = query.to_params()?;
        let result = self
            .execute(super::GET_INVOICES, |http, url| http.get(url).query(&params))
            .await?;
        parse_items(result)
    }

    /// Lazily walk invoice pages starting at `start_offset`.
    ///
    /// Ends after a short page or an empty page (not yielded). An error is
    /// yielded once and ends the stream.
    pub fn iter_invoice_pages(
        &self,
        filter: InvoiceFilter,
        page_size: u32,
        start_offset: u64,
    ) -> Result<impl Stream<Item = Result<Vec<Invoice>, CryptoPayError>> + '_, CryptoPayError> {
        validate_count("page_size", page_size)?;
        filter.validate()?;

        Ok(stream::unfold(Some(start_offset), move |next| {
            let query = next.map(|offset| InvoiceQuery {
                filter: filter.clone(),
                offset,
                count: page_size,
            });
            async move {
                let query = query?;
                match self.get_invoices(&query).await {
                    Ok(page) if page.is_empty() => None,
                    Ok(page) => {
                        let fetched = page.len() as u64;
                        let next = (fetched >= u64::from(page_size)).then(|| query.offset + fetched);
                        Some((Ok(page), next))
                    }
                    Err(err) => Some((Err(err), None)),
                }
            }
        }))
    }

    /// Lazily walk invoices one by one, in page order.
    pub fn iter_invoices(
        &self,
        filter: InvoiceFilter,
        page_size: u32,
        start_offset: u64,
    ) -> Result<impl Stream<Item = Result<Invoice, CryptoPayError>> + '_, CryptoPayError> {
        let pages = self.iter_invoice_pages(filter, page_size, start_offset)?;
        Ok(pages
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, CryptoPayError>)))
            .try_flatten())
    }

    /// Balances of every currency.
    pub async fn get_balances(&self) -> Result<Vec<Balance>, CryptoPayError> {
        let result = self
            .execute(super::GET_BALANCE, |http, url| http.get(url))
            .await?;
        parse_models(result)
    }

    /// Current exchange rates.
    pub async fn get_exchange_rates(&self) -> Result<Vec<ExchangeRate>, CryptoPayError> {
        let result = self
            .execute(super::GET_EXCHANGE_RATES, |http, url| http.get(url))
            .await?;
        parse_models(result)
    }

    /// Currencies known to the gateway.
    pub async fn get_currencies(&self) -> Result<Vec<Currency>, CryptoPayError> {
        let result = self
            .execute(super::GET_CURRENCIES, |http, url| http.get(url))
            .await?;
        parse_models(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = CryptoPayClient::with_token("123:ABC").unwrap();
        assert_eq!(client.base_url(), crate::config::MAINNET_URL);
        assert!(!client.is_closed());
    }

    #[test]
    fn test_client_rejects_empty_token() {
        assert!(matches!(
            CryptoPayClient::with_token(""),
            Err(CryptoPayError::ConfigError(_))
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let client = CryptoPayClient::with_token("123:ABC").unwrap();
        client.close();
        client.close();
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_call_after_close_fails() {
        let client = CryptoPayClient::with_token("123:ABC").unwrap();
        client.close();
        assert!(matches!(client.get_me().await, Err(CryptoPayError::Closed)));
    }

    #[tokio::test]
    async fn test_validation_happens_before_close_check() {
        let client = CryptoPayClient::with_token("123:ABC").unwrap();
        client.close();
        let result = client.create_invoice(&CreateInvoice::new(crate::Asset::Ton, 0)).await;
        assert!(matches!(result, Err(CryptoPayError::Validation(_))));
    }

    #[test]
    fn test_pagination_validates_eagerly() {
        let client = CryptoPayClient::with_token("123:ABC").unwrap();
        assert!(client.iter_invoice_pages(InvoiceFilter::default(), 0, 0).is_err());
        assert!(client
            .iter_invoice_pages(InvoiceFilter::default().invoice_ids(""), 10, 0)
            .is_err());
    }

    #[test]
    fn test_gateway_response_into_result() {
        let response = GatewayResponse {
            status: 200,
            body: br#"{"ok":true,"result":[]}"#.to_vec(),
        };
        assert_eq!(response.into_result().unwrap(), serde_json::json!([]));
    }
}
