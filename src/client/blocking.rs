//! Blocking Crypto Pay client.
//!
//! Same operations and semantics as [`CryptoPayClient`](super::CryptoPayClient),
//! on top of `reqwest::blocking`. Must not be used from inside an async
//! runtime.

use super::http::GatewayResponse;
use super::params::{validate_count, CreateInvoice, InvoiceFilter, InvoiceQuery, TransferRequest};
use super::retry::RetryPolicy;
use super::{default_headers, endpoint_url};
use crate::config::ClientConfig;
use crate::protocol::mapper::{parse_items, parse_model, parse_models};
use crate::protocol::models::{App, Balance, Currency, ExchangeRate, Invoice, Transfer};
use crate::CryptoPayError;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

impl GatewayResponse {
    fn from_blocking(response: Response) -> Result<Self, CryptoPayError> {
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        Ok(Self { status, body })
    }
}

/// Blocking client for the Crypto Pay API.
pub struct BlockingCryptoPayClient {
    http: Mutex<Option<Client>>,
    base_url: String,
    retry: RetryPolicy,
}

impl BlockingCryptoPayClient {
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

    fn execute<F>(&self, endpoint: &str, build: F) -> Result<Value, CryptoPayError>
    where
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        let http = self.http()?;
        let url = endpoint_url(&self.base_url, endpoint);

        let response = self.retry.run_blocking(|| build(&http, &url).send())?;
        let response = GatewayResponse::from_blocking(response)?;
        debug!(endpoint, status = response.status, "gateway response");
        response.into_result()
    }

    /// Basic information about the app behind the token.
    pub fn get_me(&self) -> Result<App, CryptoPayError> {
        parse_model(self.execute(super::GET_ME, |http, url| http.get(url))?)
    }

    /// Create an invoice.
    pub fn create_invoice(&self, request: &CreateInvoice) -> Result<Invoice, CryptoPayError> {
        request.validate()?;
        parse_model(self.execute(super::CREATE_INVOICE, |http, url| {
            http.post(url).json(request)
        })?)
    }

    /// Send coins from the app balance to a user.
    pub fn transfer(&self, request: &TransferRequest) -> Result<Transfer, CryptoPayError> {
        request.validate()?;
        parse_model(self.execute(super::TRANSFER, |http, url| http.post(url).json(request))?)
    }

    /// One page of invoices.
    pub fn get_invoices(&self, query: &InvoiceQuery) -> Result<Vec<Invoice>, CryptoPayError> {
        let params = query.to_params()?;
        parse_items(self.execute(super::GET_INVOICES, |http, url| {
            http.get(url).query(&params)
        })?)
    }

    /// Lazily walk invoice pages starting at `start_offset`.
    pub fn iter_invoice_pages(
        &self,
        filter: InvoiceFilter,
        page_size: u32,
        start_offset: u64,
    ) -> Result<InvoicePages<'_>, CryptoPayError> {
        validate_count("page_size", page_size)?;
        filter.validate()?;

        Ok(InvoicePages {
            client: self,
            filter,
            page_size,
            next_offset: Some(start_offset),
        })
    }

    /// Lazily walk invoices one by one, in page order.
    pub fn iter_invoices(
        &self,
        filter: InvoiceFilter,
        page_size: u32,
        start_offset: u64,
    ) -> Result<impl Iterator<Item = Result<Invoice, CryptoPayError>> + '_, CryptoPayError> {
        let pages = self.iter_invoice_pages(filter, page_size, start_offset)?;
        Ok(pages.flat_map(|page| match page {
            Ok(invoices) => invoices.into_iter().map(Ok).collect::<Vec<_>>(),
            Err(err) => vec![Err(err)],
        }))
    }

    /// Balances of every currency.
    pub fn get_balances(&self) -> Result<Vec<Balance>, CryptoPayError> {
        parse_models(self.execute(super::GET_BALANCE, |http, url| http.get(url))?)
    }

    /// Current exchange rates.
    pub fn get_exchange_rates(&self) -> Result<Vec<ExchangeRate>, CryptoPayError> {
        parse_models(self.execute(super::GET_EXCHANGE_RATES, |http, url| http.get(url))?)
    }

    /// Currencies known to the gateway.
    pub fn get_currencies(&self) -> Result<Vec<Currency>, CryptoPayError> {
        parse_models(self.execute(super::GET_CURRENCIES, |http, url| http.get(url))?)
    }
}

/// Iterator over invoice pages; see
/// [`BlockingCryptoPayClient::iter_invoice_pages`].
///
/// Ends after a short page or an empty page (not yielded). An error is
/// yielded once and ends iteration.
pub struct InvoicePages<'a> {
    client: &'a BlockingCryptoPayClient,
    filter: InvoiceFilter,
    page_size: u32,
    next_offset: Option<u64>,
}

impl Iterator for InvoicePages<'_> {
    type Item = Result<Vec<Invoice>, CryptoPayError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next_offset.take()?;
        let query = InvoiceQuery {
            filter: self.filter.clone(),
            offset,
            count: self.page_size,
        };

        match self.client.get_invoices(&query) {
            Ok(page) if page.is_empty() => None,
            Ok(page) => {
                let fetched = page.len() as u64;
                if fetched >= u64::from(self.page_size) {
                    self.next_offset = Some(offset + fetched);
                }
                Some(Ok(page))
            }
            Err(err) => Some(Err(err)),
        }
    }
}
