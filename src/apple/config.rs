//! Immutable runtime configuration for the Apple flows
//!
//! Built once from [`AppleAuthSettings`] at startup. Reloading means building a
//! new `AppleConfig` (and a new service around it); nothing here is mutated
//! after construction.

use std::time::Duration;

use crate::error::AppleAuthError;
use crate::settings::{AppleAuthSettings, JwtValidationSettings};

#[derive(Debug, Clone)]
pub struct AppleConfig {
    pub client_id: String,
    pub team_id: String,
    pub key_id: String,
    /// PEM-encoded PKCS#8 P-256 private key
    pub private_key: String,
    pub redirect_uri: String,
    pub scope: Vec<String>,
    /// Client secret lifetime in seconds
    pub token_ttl: u64,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    /// Client secret audience and expected identity token issuer
    pub validation_audience: String,
    /// Redirect target when the callback state cannot be recovered
    pub fallback_callback_url: String,
    pub state_redirect_field_name: String,
    pub request_timeout: Duration,
    /// `None` keeps identity tokens unverified
    pub jwt_validation: Option<JwtValidationSettings>,
}

impl AppleConfig {
    /// Build the runtime configuration, rejecting missing secrets
    ///
    /// # Errors
    ///
    /// Returns `AppleAuthError::Configuration` if a required value is empty,
    /// an endpoint is not an absolute URL, the private key cannot be loaded or parsed, or the token TTL is zero.
    pub fn from_settings(settings: &AppleAuthSettings) -> Result<Self, AppleAuthError> {
        let apple = &settings.apple;

        let required = [
            ("client_id", &apple.client_id),
            ("team_id", &apple.team_id),
            ("key_id", &apple.key_id),
            ("redirect_url", &apple.redirect_url),
            ("token_callback_url", &apple.token_callback_url),
            ("access_token_url", &apple.access_token_url),
            ("authorization_url", &apple.authorization_url),
            ("fe_redirect_url_param", &apple.fe_redirect_url_param),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AppleAuthError::Configuration(format!(
                    "apple.{name} must be configured"
                )));
            }
        }

        let urls = [
            ("redirect_url", &apple.redirect_url),
            ("token_callback_url", &apple.token_callback_url),
            ("access_token_url", &apple.access_token_url),
            ("authorization_url", &apple.authorization_url),
        ];
        for (name, value) in urls {
            url::Url::parse(value).map_err(|e| {
                AppleAuthError::Configuration(format!("apple.{name} is not a valid URL: {e}"))
            })?;
        }

        let private_key = apple.resolve_private_key()?;
        Self::check_private_key(&private_key)?;

        if apple.token_ttl_seconds == 0 {
            return Err(AppleAuthError::Configuration(
                "apple.token_ttl_seconds must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            client_id: apple.client_id.clone(),
            team_id: apple.team_id.clone(),
            key_id: apple.key_id.clone(),
            private_key,
            redirect_uri: apple.redirect_url.clone(),
            scope: apple.scope.clone(),
            token_ttl: apple.token_ttl_seconds,
            authorization_endpoint: apple.authorization_url.clone(),
            token_endpoint: apple.access_token_url.clone(),
            validation_audience: apple.validation_url.clone(),
            fallback_callback_url: apple.token_callback_url.clone(),
            state_redirect_field_name: apple.fe_redirect_url_param.clone(),
            request_timeout: Duration::from_secs(apple.request_timeout_seconds.max(1)),
            jwt_validation: settings
                .jwt_validation
                .enabled
                .then(|| settings.jwt_validation.clone()),
        })
    }

    fn check_private_key(pem: &str) -> Result<(), AppleAuthError> {
        use p256::ecdsa::SigningKey;
        use p256::pkcs8::DecodePrivateKey;

        SigningKey::from_pkcs8_pem(pem.trim())
            .map(|_| ())
            .map_err(|e| AppleAuthError::Configuration(format!("Invalid Apple private key: {e}")))
    }
}
