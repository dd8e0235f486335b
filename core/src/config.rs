//! Client configuration: public key, endpoint, locale and timeout.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use url::Url;

use crate::error::ConfigError;
use crate::http::API_BASE_URL;

pub const PUBLIC_KEY_VAR: &str = "PAYJP_PUBLIC_KEY";
pub const BASE_URL_VAR: &str = "PAYJP_API_BASE_URL";
pub const LOCALE_VAR: &str = "PAYJP_LOCALE";

/// Immutable settings shared by every call of a `PayjpClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    public_key: String,
    base_url: String,
    locale: Option<String>,
    timeout: Option<Duration>,
}

impl ClientConfig {
    /// Configuration for the production endpoint.
    pub fn new(public_key: &str) -> Result<Self, ConfigError> {
        if public_key.trim().is_empty() {
            return Err(ConfigError::EmptyPublicKey);
        }
        Ok(Self {
            public_key: public_key.to_string(),
            base_url: API_BASE_URL.to_string(),
            locale: None,
            timeout: None,
        })
    }

    /// Read `PAYJP_PUBLIC_KEY`, and optionally `PAYJP_API_BASE_URL` and
    /// `PAYJP_LOCALE`, from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let public_key =
            std::env::var(PUBLIC_KEY_VAR).map_err(|_| ConfigError::MissingVar(PUBLIC_KEY_VAR))?;
        let mut config = Self::new(&public_key)?;
        if let Ok(base_url) = std::env::var(BASE_URL_VAR) {
            config = config.with_base_url(&base_url)?;
        }
        if let Ok(locale) = std::env::var(LOCALE_VAR) {
            config = config.with_locale(&locale);
        }
        Ok(config)
    }

    /// Point the client at another endpoint. A trailing slash is added when
    /// missing so request paths can be appended verbatim.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        Url::parse(base_url)?;
        self.base_url = format!("{}/", base_url.trim_end_matches('/'));
        Ok(self)
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = Some(locale.to_string());
        self
    }

    /// Overall per-request timeout. Without one the transport default applies.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// `Authorization` header value: the public key as the Basic user name
    /// with an empty password.
    pub fn authorization(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:", self.public_key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_production_endpoint() {
        let config = ClientConfig::new("pk_test_0383a1b8f91e8a6e3ea0e2a9").unwrap();
        assert_eq!(config.base_url(), "https://api.pay.jp/v1/");
        assert!(config.locale().is_none());
        assert!(config.timeout().is_none());
    }

    #[test]
    fn empty_public_key_is_rejected() {
        assert!(matches!(ClientConfig::new("  "), Err(ConfigError::EmptyPublicKey)));
    }

    #[test]
    fn authorization_is_basic_with_empty_password() {
        let config = ClientConfig::new("pk_test_123").unwrap();
        // base64("pk_test_123:")
        assert_eq!(config.authorization(), "Basic cGtfdGVzdF8xMjM6");
    }

    #[test]
    fn base_url_is_normalized_with_one_trailing_slash() {
        let config = ClientConfig::new("pk_test_123")
            .unwrap()
            .with_base_url("http://127.0.0.1:3000/v1")
            .unwrap();
        assert_eq!(config.base_url(), "http://127.0.0.1:3000/v1/");

        let config = config.with_base_url("http://127.0.0.1:3000/v1//").unwrap();
        assert_eq!(config.base_url(), "http://127.0.0.1:3000/v1/");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = ClientConfig::new("pk_test_123").unwrap().with_base_url("not a url");
        assert!(matches!(result, Err(ConfigError::InvalidBaseUrl(_))));
    }
}
