//! Gateway result records and open enumerations.
//!
//! Records keep every field the gateway sends: declared fields are typed,
//! everything else lands in an `extra` side-map readable through
//! [`Extensible`]. Enumerations are open sets so new gateway values never
//! break parsing.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Access to fields the gateway sent but this crate does not declare.
///
/// Equality on records compares declared fields only; two records that
/// differ only in their extras are equal.
pub trait Extensible {
    /// All undeclared fields, keyed by their wire name.
    fn extra(&self) -> &Map<String, Value>;

    /// A single undeclared field.
    fn extra_field(&self, name: &str) -> Option<&Value> {
        self.extra().get(name)
    }
}

macro_rules! open_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )*
            /// A value this version does not know, kept verbatim.
            Unknown(String),
        }

        impl $name {
            /// Wire representation.
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $wire, )*
                    Self::Unknown(raw) => raw.as_str(),
                }
            }

            /// Whether this is a recognized member.
            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Unknown(_))
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                match raw {
                    $( $wire => Self::$variant, )*
                    other => Self::Unknown(other.to_string()),
                }
            }
        }

        impl FromStr for $name {
            type Err = Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::from(s))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(match Value::deserialize(deserializer)? {
                    Value::String(raw) => Self::from(raw.as_str()),
                    other => Self::Unknown(other.to_string()),
                })
            }
        }
    };
}

macro_rules! gateway_record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*

            /// Undeclared fields sent by the gateway.
            #[serde(flatten)]
            pub extra: Map<String, Value>,
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                true $( && self.$field == other.$field )*
            }
        }

        impl Extensible for $name {
            fn extra(&self) -> &Map<String, Value> {
                &self.extra
            }
        }
    };
}

fn default_true() -> bool {
    true
}

open_enum! {
    /// Crypto assets supported by the gateway.
    pub enum Asset {
        /// Bitcoin
        Btc => "BTC",
        /// Toncoin
        Ton => "TON",
        /// Ether
        Eth => "ETH",
        /// Tether
        Usdt => "USDT",
        /// USD Coin
        Usdc => "USDC",
        /// Binance USD
        Busd => "BUSD",
        /// BNB
        Bnb => "BNB",
        /// Tron
        Trx => "TRX",
        /// Litecoin
        Ltc => "LTC",
    }
}

open_enum! {
    /// Invoice and transfer status.
    pub enum Status {
        /// Awaiting payment.
        Active => "active",
        /// Paid.
        Paid => "paid",
        /// Expired before payment.
        Expired => "expired",
        /// Transfer completed.
        Completed => "completed",
    }
}

open_enum! {
    /// Label of the button shown after an invoice is paid.
    pub enum ButtonName {
        /// "View Item"
        ViewItem => "viewItem",
        /// "Open Channel"
        OpenChannel => "openChannel",
        /// "Open Bot"
        OpenBot => "openBot",
        /// "Return"
        Callback => "callback",
    }
}

gateway_record! {
    /// Basic information about the calling app (`getMe`).
    pub struct App {
        /// Numeric app id.
        pub app_id: i64,
        /// App name.
        pub name: String,
        /// Bot that processes payments for this app.
        pub payment_processing_bot_username: String,
    }
}

gateway_record! {
    /// An invoice.
    pub struct Invoice {
        /// Unique invoice id.
        pub invoice_id: i64,
        /// Lifecycle state.
        pub status: Status,
        /// Hash used in payment links.
        pub hash: String,
        /// Amount in `asset` or `fiat`, as a decimal string.
        pub amount: String,
        /// Absent for fiat invoices.
        #[serde(default)]
        pub asset: Option<Asset>,
        /// `crypto` or `fiat`.
        #[serde(default)]
        pub currency_type: Option<String>,
        /// Shown to the payer.
        #[serde(default)]
        pub description: Option<String>,
        /// Payer comment.
        #[serde(default)]
        pub comment: Option<String>,
        /// Shown to the payer after payment.
        #[serde(default)]
        pub hidden_message: Option<String>,
        /// Opaque data attached by the app.
        #[serde(default)]
        pub payload: Option<String>,
        /// Creation time, ISO 8601.
        #[serde(default)]
        pub created_at: Option<String>,
        /// Expiry time, ISO 8601.
        #[serde(default)]
        pub expiration_date: Option<String>,
        /// Payment time, ISO 8601.
        #[serde(default)]
        pub paid_at: Option<String>,
        /// Fiat currency code for fiat invoices.
        #[serde(default)]
        pub fiat: Option<String>,
        /// Assets a fiat invoice can be paid in.
        #[serde(default)]
        pub accepted_assets: Option<Vec<Asset>>,
        /// Asset the fee was charged in.
        #[serde(default)]
        pub fee_asset: Option<String>,
        /// Fee charged on payment.
        #[serde(default)]
        pub fee_amount: Option<String>,
        /// Payer hid their identity.
        #[serde(default = "default_true")]
        pub paid_anonymously: bool,
        /// Amount actually paid.
        #[serde(default)]
        pub paid_amount: Option<String>,
        /// Fiat rate at payment time.
        #[serde(default)]
        pub paid_fiat_rate: Option<String>,
        /// USD rate at payment time.
        #[serde(default)]
        pub paid_usd_rate: Option<String>,
        /// Asset the invoice was paid in.
        #[serde(default)]
        pub paid_asset: Option<String>,
        /// Button shown after payment.
        #[serde(default)]
        pub paid_btn_name: Option<ButtonName>,
        /// Target of the post-payment button.
        #[serde(default)]
        pub paid_btn_url: Option<String>,
        /// Payment link in the bot.
        #[serde(default)]
        pub bot_invoice_url: Option<String>,
        /// Payment link in the mini app.
        #[serde(default)]
        pub mini_app_invoice_url: Option<String>,
        /// Payment link in the web app.
        #[serde(default)]
        pub web_app_invoice_url: Option<String>,
        /// Payer may leave a comment.
        #[serde(default = "default_true")]
        pub allow_comments: bool,
        /// Payer may pay anonymously.
        #[serde(default = "default_true")]
        pub allow_anonymous: bool,
        /// Asset the payment is swapped to.
        #[serde(default)]
        pub swap_to: Option<String>,
        /// Deprecated by the gateway; use `fee_amount`.
        #[serde(default)]
        pub fee: Option<String>,
        /// Deprecated by the gateway; use `bot_invoice_url`.
        #[serde(default)]
        pub pay_url: Option<String>,
        /// Deprecated by the gateway; use `paid_usd_rate`.
        #[serde(default)]
        pub usd_rate: Option<String>,
    }
}

gateway_record! {
    /// A completed transfer from the app balance to a user.
    pub struct Transfer {
        /// Unique transfer id.
        pub transfer_id: i64,
        /// Telegram user that received the transfer.
        pub user_id: i64,
        /// Transferred asset.
        pub asset: Asset,
        /// Transferred amount, as a decimal string.
        pub amount: String,
        /// Always `completed`.
        pub status: Status,
        /// Completion time, ISO 8601.
        pub completed_at: String,
        /// Message sent with the transfer.
        #[serde(default)]
        pub comment: Option<String>,
        /// Idempotency key supplied when the transfer was made.
        #[serde(default)]
        pub spend_id: Option<String>,
    }
}

gateway_record! {
    /// Balance of one currency.
    pub struct Balance {
        /// Asset or currency code.
        pub currency_code: String,
        /// Spendable amount.
        pub available: String,
        /// Amount held by pending operations.
        pub onhold: String,
    }
}

gateway_record! {
    /// Exchange rate between a source asset and a target currency.
    pub struct ExchangeRate {
        /// Rate is current.
        pub is_valid: bool,
        /// Source is a crypto asset.
        pub is_crypto: bool,
        /// Target is a fiat currency.
        pub is_fiat: bool,
        /// Asset being priced.
        pub source: Asset,
        /// Currency the rate is expressed in.
        pub target: String,
        /// Decimal rate.
        pub rate: String,
    }
}

gateway_record! {
    /// A currency known to the gateway.
    pub struct Currency {
        /// Native blockchain coin.
        pub is_blockchain: bool,
        /// Stablecoin.
        pub is_stablecoin: bool,
        /// Fiat currency.
        pub is_fiat: bool,
        /// Human-readable name.
        pub name: String,
        /// Ticker code.
        pub code: String,
        /// Decimal places used for amounts.
        pub decimals: u32,
        /// Project website.
        #[serde(default)]
        pub url: Option<String>,
    }
}
