//! Client configuration.

use crate::client::retry::RetryPolicy;
use std::time::Duration;

/// Mainnet API root.
pub const MAINNET_URL: &str = "https://pay.crypt.bot/api";

/// Testnet API root.
pub const TESTNET_URL: &str = "https://testnet-pay.crypt.bot/api";

/// Header carrying the API token on every request.
pub const TOKEN_HEADER: &str = "Crypto-Pay-API-Token";

/// Which Crypto Pay deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// `pay.crypt.bot`
    #[default]
    Mainnet,
    /// `testnet-pay.crypt.bot`
    Testnet,
}

impl Network {
    /// API root for this network.
    pub fn base_url(self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_URL,
            Network::Testnet => TESTNET_URL,
        }
    }
}

/// Configuration shared by the async and blocking clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Crypto Pay API token, issued by @CryptoBot.
    /// SECURITY: never log this value.
    pub api_token: String,

    /// Deployment to talk to.
    pub network: Network,

    /// Overrides the network's API root (mock servers, proxies).
    pub base_url: Option<String>,

    /// Per-attempt request timeout.
    pub timeout: Duration,

    /// Retry and backoff policy for every call.
    pub retry: RetryPolicy,

    /// User-Agent header value.
    pub user_agent: String,
}

impl ClientConfig {
    /// Mainnet configuration with default timeout and no retries.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            network: Network::Mainnet,
            base_url: None,
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            user_agent: format!("cryptopay-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Switch to the testnet deployment.
    pub fn testnet(mut self) -> Self {
        self.network = Network::Testnet;
        self
    }

    /// Point the client at a custom API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The effective API root, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.network.base_url())
            .trim_end_matches('/')
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), crate::CryptoPayError> {
        if self.api_token.trim().is_empty() {
            return Err(crate::CryptoPayError::ConfigError(
                "api_token cannot be empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(crate::CryptoPayError::ConfigError(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(crate::CryptoPayError::ConfigError(format!(
                    "base_url must be an http(s) URL, got {}",
                    url
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CryptoPayError;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("token");
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.base_url(), MAINNET_URL);
    }

    #[test]
    fn test_testnet_url() {
        let config = ClientConfig::new("token").testnet();
        assert_eq!(config.base_url(), TESTNET_URL);
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let config = ClientConfig::new("token").with_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_validate_empty_token() {
        let result = ClientConfig::new("  ").validate();
        assert!(matches!(result, Err(CryptoPayError::ConfigError(_))));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let result = ClientConfig::new("token")
            .with_timeout(Duration::ZERO)
            .validate();
        assert!(matches!(result, Err(CryptoPayError::ConfigError(_))));
    }

    #[test]
    fn test_validate_bad_base_url() {
        let result = ClientConfig::new("token").with_base_url("ftp://x").validate();
        assert!(matches!(result, Err(CryptoPayError::ConfigError(_))));
    }
}
