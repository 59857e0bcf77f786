//! Request parameters and local validation.
//!
//! Everything here is checked before a request leaves the process. A
//! validation failure is a [`CryptoPayError::Validation`] and is never
//! retried.

use crate::protocol::models::{Asset, ButtonName, Status};
use crate::CryptoPayError;
use serde::Serialize;

/// Longest invoice lifetime the gateway accepts, in seconds (31 days).
pub const MAX_EXPIRES_IN: u32 = 2_678_400;

/// Largest page the gateway returns for `getInvoices`.
pub const MAX_COUNT: u32 = 1000;

/// Page size used when none is given.
pub const DEFAULT_COUNT: u32 = 100;

fn invalid(msg: impl Into<String>) -> CryptoPayError {
    CryptoPayError::Validation(msg.into())
}

/// Check that an amount is a positive decimal number.
pub fn validate_amount(amount: &str) -> Result<(), CryptoPayError> {
    let value: f64 = amount
        .trim()
        .parse()
        .map_err(|_| invalid(format!("Amount must be a decimal number, got {:?}", amount)))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid("Amount must be greater than 0"));
    }
    Ok(())
}

/// Check an invoice lifetime.
pub fn validate_expires_in(expires_in: u32) -> Result<(), CryptoPayError> {
    if !(1..=MAX_EXPIRES_IN).contains(&expires_in) {
        return Err(invalid(format!(
            "expires_in must be between 1 and {} seconds",
            MAX_EXPIRES_IN
        )));
    }
    Ok(())
}

/// Check a page size; `name` is used in the message.
pub fn validate_count(name: &str, count: u32) -> Result<(), CryptoPayError> {
    if !(1..=MAX_COUNT).contains(&count) {
        return Err(invalid(format!("{} must be between 1 and {}", name, MAX_COUNT)));
    }
    Ok(())
}

/// Invoice ids to filter on: a list, or a comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceIds {
    /// Explicit ids.
    List(Vec<i64>),
    /// Comma-separated ids, whitespace tolerated.
    Raw(String),
}

impl InvoiceIds {
    /// Normalize to the wire form `1,2,3`.
    pub fn normalize(&self) -> Result<String, CryptoPayError> {
        match self {
            InvoiceIds::List(ids) => {
                if ids.is_empty() {
                    return Err(invalid("invoice_ids list cannot be empty"));
                }
                if ids.iter().any(|id| *id <= 0) {
                    return Err(invalid("invoice_ids list must contain positive integers"));
                }
                Ok(ids
                    .iter()
                    .map(i64::to_string)
                    .collect::<Vec<_>>()
                    .join(","))
            }
            InvoiceIds::Raw(raw) => {
                let parts: Vec<&str> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .collect();
                if parts.is_empty() {
                    return Err(invalid("invoice_ids string cannot be empty"));
                }
                for part in &parts {
                    let positive = part.bytes().all(|b| b.is_ascii_digit())
                        && part.parse::<u64>().map(|id| id > 0).unwrap_or(false);
                    if !positive {
                        return Err(invalid(
                            "invoice_ids string must contain positive integer IDs",
                        ));
                    }
                }
                Ok(parts.join(","))
            }
        }
    }
}

impl From<Vec<i64>> for InvoiceIds {
    fn from(ids: Vec<i64>) -> Self {
        InvoiceIds::List(ids)
    }
}

impl From<&[i64]> for InvoiceIds {
    fn from(ids: &[i64]) -> Self {
        InvoiceIds::List(ids.to_vec())
    }
}

impl From<&str> for InvoiceIds {
    fn from(raw: &str) -> Self {
        InvoiceIds::Raw(raw.to_string())
    }
}

impl From<String> for InvoiceIds {
    fn from(raw: String) -> Self {
        InvoiceIds::Raw(raw)
    }
}

/// Body of `createInvoice`. Unset options are omitted from the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateInvoice {
    /// Asset to be paid.
    pub asset: Asset,
    /// Decimal amount.
    pub amount: String,
    /// Shown to the payer, up to 1024 characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Shown to the payer after payment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_message: Option<String>,
    /// Button shown after payment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_btn_name: Option<ButtonName>,
    /// URL the post-payment button opens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_btn_url: Option<String>,
    /// Opaque data returned with the invoice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Let the payer leave a comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_comments: Option<bool>,
    /// Let the payer pay anonymously.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_anonymous: Option<bool>,
    /// Lifetime in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u32>,
    /// Asset the payment is swapped to on receipt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_to: Option<String>,
}

impl CreateInvoice {
    /// An invoice for `amount` of `asset`. Numbers and decimal strings are
    /// both accepted for `amount`.
    pub fn new(asset: Asset, amount: impl ToString) -> Self {
        Self {
            asset,
            amount: amount.to_string(),
            description: None,
            hidden_message: None,
            paid_btn_name: None,
            paid_btn_url: None,
            payload: None,
            allow_comments: None,
            allow_anonymous: None,
            expires_in: None,
            swap_to: None,
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the message revealed after payment.
    pub fn hidden_message(mut self, message: impl Into<String>) -> Self {
        self.hidden_message = Some(message.into());
        self
    }

    /// Button shown after payment, with the URL it opens.
    pub fn paid_button(mut self, name: ButtonName, url: impl Into<String>) -> Self {
        self.paid_btn_name = Some(name);
        self.paid_btn_url = Some(url.into());
        self
    }

    /// Attach opaque data.
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Allow or forbid payer comments.
    pub fn allow_comments(mut self, allow: bool) -> Self {
        self.allow_comments = Some(allow);
        self
    }

    /// Allow or forbid anonymous payment.
    pub fn allow_anonymous(mut self, allow: bool) -> Self {
        self.allow_anonymous = Some(allow);
        self
    }

    /// Invoice lifetime in seconds.
    pub fn expires_in(mut self, seconds: u32) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// Swap the received payment to `asset`.
    pub fn swap_to(mut self, asset: impl Into<String>) -> Self {
        self.swap_to = Some(asset.into());
        self
    }

    /// Check the request locally.
    pub fn validate(&self) -> Result<(), CryptoPayError> {
        validate_amount(&self.amount)?;
        if let Some(expires_in) = self.expires_in {
            validate_expires_in(expires_in)?;
        }
        Ok(())
    }
}

/// Body of `transfer`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRequest {
    /// Telegram user receiving the funds.
    pub user_id: i64,
    /// Asset to send.
    pub asset: Asset,
    /// Decimal amount.
    pub amount: String,
    /// Idempotency key; the gateway refuses a second transfer with the same id.
    pub spend_id: String,
    /// Message sent to the user with the transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Suppress the bot's notification to the user.
    pub disable_send_notification: bool,
}

impl TransferRequest {
    /// Send `amount` of `asset` to `user_id`, keyed by `spend_id`.
    pub fn new(
        user_id: i64,
        asset: Asset,
        amount: impl ToString,
        spend_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            asset,
            amount: amount.to_string(),
            spend_id: spend_id.into(),
            comment: None,
            disable_send_notification: false,
        }
    }

    /// Set the message sent with the transfer.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Suppress the notification.
    pub fn disable_send_notification(mut self, disable: bool) -> Self {
        self.disable_send_notification = disable;
        self
    }

    /// Check the request locally.
    pub fn validate(&self) -> Result<(), CryptoPayError> {
        validate_amount(&self.amount)?;
        if self.spend_id.trim().is_empty() {
            return Err(invalid("spend_id cannot be empty"));
        }
        Ok(())
    }
}

/// Filters shared by `getInvoices` and the pagination helpers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceFilter {
    /// Only invoices in this asset.
    pub asset: Option<Asset>,
    /// Only these invoices.
    pub invoice_ids: Option<InvoiceIds>,
    /// Only invoices in this state.
    pub status: Option<Status>,
}

impl InvoiceFilter {
    /// Filter by asset.
    pub fn asset(mut self, asset: Asset) -> Self {
        self.asset = Some(asset);
        self
    }

    /// Filter by invoice id.
    pub fn invoice_ids(mut self, ids: impl Into<InvoiceIds>) -> Self {
        self.invoice_ids = Some(ids.into());
        self
    }

    /// Filter by status.
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    fn push_params(&self, params: &mut Vec<(&'static str, String)>) -> Result<(), CryptoPayError> {
        if let Some(asset) = &self.asset {
            params.push(("asset", asset.to_string()));
        }
        if let Some(ids) = &self.invoice_ids {
            params.push(("invoice_ids", ids.normalize()?));
        }
        if let Some(status) = &self.status {
            params.push(("status", status.to_string()));
        }
        Ok(())
    }

    /// Validate the filter without building a query.
    pub fn validate(&self) -> Result<(), CryptoPayError> {
        self.push_params(&mut Vec::new())
    }
}

/// A single `getInvoices` request.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceQuery {
    /// Which invoices to return.
    pub filter: InvoiceFilter,
    /// Number of invoices to skip.
    pub offset: u64,
    /// Page size, 1 to [`MAX_COUNT`].
    pub count: u32,
}

impl Default for InvoiceQuery {
    fn default() -> Self {
        Self {
            filter: InvoiceFilter::default(),
            offset: 0,
            count: DEFAULT_COUNT,
        }
    }
}

impl InvoiceQuery {
    /// Query with the given filter, first page, default size.
    pub fn new(filter: InvoiceFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Set the offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the page size.
    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Validate and render the query string parameters.
    ///
    /// `offset` is omitted when zero; `count` is always sent.
    pub fn to_params(&self) -> Result<Vec<(&'static str, String)>, CryptoPayError> {
        validate_count("count", self.count)?;

        let mut params = Vec::new();
        self.filter.push_params(&mut params)?;
        if self.offset > 0 {
            params.push(("offset", self.offset.to_string()));
        }
        params.push(("count", self.count.to_string()));
        Ok(params)
    }
}
