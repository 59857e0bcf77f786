//! Typed mapping of `result` payloads onto gateway records.

use crate::CryptoPayError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Map a JSON value onto a record type.
///
/// Unknown fields are kept in the record's `extra` map and unknown enum
/// values are kept as `Unknown(raw)`. A missing required field, or a declared
/// field with an incompatible JSON type, fails.
pub fn parse_model<T: DeserializeOwned>(value: Value) -> Result<T, CryptoPayError> {
    serde_json::from_value(value).map_err(|e| {
        CryptoPayError::Decode(format!("{}: {}", short_type_name::<T>(), e))
    })
}

/// Map a JSON array onto a list of records, element by element.
pub fn parse_models<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, CryptoPayError> {
    match value {
        Value::Array(items) => items.into_iter().map(parse_model).collect(),
        other => Err(CryptoPayError::Decode(format!(
            "expected a list of {}, got {}",
            short_type_name::<T>(),
            json_kind(&other)
        ))),
    }
}

/// Map a `{"items": [...]}` page onto a list of records.
pub fn parse_items<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, CryptoPayError> {
    match value {
        Value::Object(mut page) => match page.remove("items") {
            Some(items) => parse_models(items),
            None => Err(CryptoPayError::Decode(
                "page is missing 'items'".to_string(),
            )),
        },
        other => Err(CryptoPayError::Decode(format!(
            "expected a page object, got {}",
            json_kind(&other)
        ))),
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::{App, Asset, ButtonName, Currency, ExchangeRate, Extensible, Invoice, Status, Transfer};
    use serde_json::json;

    #[test]
    fn test_parse_app() {
        let app: App = parse_model(json!({
            "app_id": 12345,
            "name": "Test App",
            "payment_processing_bot_username": "TestBot"
        }))
        .unwrap();
        assert_eq!(app.app_id, 12345);
        assert_eq!(app.name, "Test App");
    }

    #[test]
    fn test_missing_required_field_fails() {
        let result: Result<App, _> = parse_model(json!({"app_id": 12345}));
        match result {
            Err(CryptoPayError::Decode(msg)) => {
                assert!(msg.starts_with("App:"), "{}", msg);
                assert!(msg.contains("name"), "{}", msg);
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_extra_field_is_attached() {
        let app: App = parse_model(json!({
            "app_id": 1,
            "name": "A",
            "payment_processing_bot_username": "Bot",
            "new_server_field": {"nested": true}
        }))
        .unwrap();

        assert_eq!(app.extra_field("new_server_field"), Some(&json!({"nested": true})));

        let without: App = parse_model(json!({
            "app_id": 1,
            "name": "A",
            "payment_processing_bot_username": "Bot"
        }))
        .unwrap();
        assert_eq!(app, without);
    }

    #[test]
    fn test_enum_resolution_and_fallback() {
        let invoice: Invoice = parse_model(json!({
            "invoice_id": 456,
            "status": "refunded",
            "hash": "def456",
            "amount": "25.00",
            "asset": "BTC",
            "paid_btn_name": "viewItem",
            "accepted_assets": ["BTC", "ETH", "DOGS"]
        }))
        .unwrap();

        assert_eq!(invoice.status, Status::Unknown("refunded".to_string()));
        assert_eq!(invoice.asset, Some(Asset::Btc));
        assert_eq!(invoice.paid_btn_name, Some(ButtonName::ViewItem));
        assert_eq!(
            invoice.accepted_assets,
            Some(vec![Asset::Btc, Asset::Eth, Asset::Unknown("DOGS".to_string())])
        );
    }

    #[test]
    fn test_null_optional_fields() {
        let invoice: Invoice = parse_model(json!({
            "invoice_id": 1,
            "status": "active",
            "hash": "h",
            "amount": "1",
            "asset": null,
            "description": null
        }))
        .unwrap();
        assert_eq!(invoice.asset, None);
        assert_eq!(invoice.description, None);
    }

    #[test]
    fn test_parse_transfer() {
        let transfer: Transfer = parse_model(json!({
            "transfer_id": 123,
            "user_id": 456,
            "asset": "TON",
            "amount": "10.0",
            "status": "completed",
            "completed_at": "2023-01-01T12:00:00Z",
            "comment": "thanks"
        }))
        .unwrap();
        assert_eq!(transfer.asset, Asset::Ton);
        assert_eq!(transfer.status, Status::Completed);
        assert_eq!(transfer.comment.as_deref(), Some("thanks"));
    }

    #[test]
    fn test_parse_models_list() {
        let rates: Vec<ExchangeRate> = parse_models(json!([
            {"is_valid": true, "is_crypto": true, "is_fiat": false, "source": "BTC", "target": "USD", "rate": "50000.00"},
            {"is_valid": true, "is_crypto": true, "is_fiat": false, "source": "ETH", "target": "USD", "rate": "3000.00"}
        ]))
        .unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].source, Asset::Btc);
        assert_eq!(rates[1].rate, "3000.00");
    }

    #[test]
    fn test_parse_models_rejects_non_list() {
        let result: Result<Vec<Currency>, _> = parse_models(json!({"items": []}));
        assert!(matches!(result, Err(CryptoPayError::Decode(_))));
    }

    #[test]
    fn test_parse_items_page() {
        let invoices: Vec<Invoice> = parse_items(json!({
            "items": [
                {"invoice_id": 1, "status": "active", "hash": "h1", "amount": "1", "asset": "TON"}
            ]
        }))
        .unwrap();
        assert_eq!(invoices[0].invoice_id, 1);
    }

    #[test]
    fn test_parse_items_missing_items() {
        let result: Result<Vec<Invoice>, _> = parse_items(json!({"count": 0}));
        assert!(matches!(result, Err(CryptoPayError::Decode(_))));
    }

    #[test]
    fn test_type_mismatch_fails() {
        let result: Result<Currency, _> = parse_model(json!({
            "is_blockchain": true,
            "is_stablecoin": false,
            "is_fiat": false,
            "name": "Bitcoin",
            "code": "BTC",
            "decimals": "eight"
        }));
        assert!(matches!(result, Err(CryptoPayError::Decode(_))));
    }
}
