//! Basic smoke test to verify the public surface is reachable.

#[test]
fn crate_compiles() {
    let _ = std::any::type_name::<cryptopay::ClientConfig>();
    let _ = std::any::type_name::<cryptopay::CryptoPayError>();
    let _ = std::any::type_name::<cryptopay::CryptoPayClient>();
    let _ = std::any::type_name::<cryptopay::BlockingCryptoPayClient>();
    let _ = std::any::type_name::<cryptopay::replay::InMemoryReplayKeyStore>();
}

#[cfg(feature = "webhook")]
#[test]
fn webhook_surface() {
    let _ = std::any::type_name::<cryptopay::webhook::WebhookListener>();
    assert_eq!(cryptopay::webhook::DEFAULT_PORT, 2203);
}
