//! Authorization code exchange against Apple's token endpoint

use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::AppleAuthError;

/// `grant_type` for the authorization code flow
pub const GRANT_TYPE: &str = "authorization_code";

/// Token endpoint response as Apple documents it
///
/// Every field is optional: a JSON body without `id_token` is a valid
/// outcome and it is up to the caller to decide what that means.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    http_client: reqwest::Client,
    token_endpoint: String,
    timeout: Duration,
}

impl TokenExchangeClient {
    /// Create a client with a bounded request timeout
    ///
    /// # Errors
    ///
    /// Returns `AppleAuthError::Configuration` if the HTTP client cannot be built.
    pub fn new(token_endpoint: &str, timeout: Duration) -> Result<Self, AppleAuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppleAuthError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            token_endpoint: token_endpoint.to_string(),
            timeout,
        })
    }

    #[must_use]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Exchange an authorization code for tokens
    ///
    /// The HTTP status is not inspected; Apple reports failures in the JSON body.
    ///
    /// # Errors
    ///
    /// - `AppleAuthError::Network` on connection failure or timeout
    /// - `AppleAuthError::Remote` if the body is not JSON or carries an `error`
    pub async fn exchange(
        &self,
        authorization_code: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenResponse, AppleAuthError> {
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", authorization_code),
            ("grant_type", GRANT_TYPE),
        ];

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| self.network_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.network_error(&e))?;
        debug!("Apple token endpoint answered with status {status}");

        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            AppleAuthError::Remote(format!("Failed to parse token response ({status}): {e}"))
        })?;

        if let Some(error) = &token_response.error {
            warn!("Apple rejected the authorization code: {error}");
            return Err(AppleAuthError::Remote(match &token_response.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error.clone(),
            }));
        }

        Ok(token_response)
    }

    fn network_error(&self, error: &reqwest::Error) -> AppleAuthError {
        if error.is_timeout() {
            AppleAuthError::Network(format!(
                "Token request timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            AppleAuthError::Network(format!("Failed to exchange code for token: {error}"))
        }
    }
}
