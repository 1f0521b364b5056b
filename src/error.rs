//! Error taxonomy for the Sign in with Apple flows
//!
//! Every failure that can reach an HTTP caller is an [`AppleAuthError`]. State
//! decoding failures have their own type because the callback redirector always
//! recovers from them locally and they never become an HTTP error.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::utils::responses::ResponseBuilder;

#[derive(Debug, Error)]
pub enum AppleAuthError {
    /// Inbound request is missing or has malformed fields
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Settings are incomplete or the private key cannot be loaded
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The client secret JWT could not be produced
    #[error("Client secret signing failed: {0}")]
    Signing(String),

    /// Transport failure or timeout talking to Apple
    #[error("Request to Apple failed: {0}")]
    Network(String),

    /// Apple answered with an unparsable body or an explicit error
    #[error("Apple returned an invalid response: {0}")]
    Remote(String),

    /// The identity token is not structurally a JWT
    #[error("Malformed identity token: {0}")]
    MalformedToken(String),

    /// Signature or claim verification of the identity token failed
    #[error("Identity token verification failed: {0}")]
    Verification(String),

    /// The application's user resolver refused or failed
    #[error("User resolution failed: {0}")]
    UserResolution(String),
}

impl AppleAuthError {
    /// Stable machine-readable error code used in JSON responses
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_request",
            Self::Configuration(_) => "configuration_error",
            Self::Signing(_) => "signing_error",
            Self::Network(_) => "upstream_unavailable",
            Self::Remote(_) => "upstream_error",
            Self::MalformedToken(_) => "invalid_token",
            Self::Verification(_) => "token_verification_failed",
            Self::UserResolution(_) => "user_resolution_failed",
        }
    }

    /// Message that is safe to show to the client
    ///
    /// Server-side faults get a generic message; details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::MalformedToken(msg) | Self::UserResolution(msg) => {
                msg.clone()
            }
            Self::Verification(_) => "The identity token could not be verified".to_string(),
            Self::Network(_) | Self::Remote(_) => {
                "Sign in with Apple is currently unavailable".to_string()
            }
            Self::Configuration(_) | Self::Signing(_) => {
                "An internal server error occurred".to_string()
            }
        }
    }
}

impl ResponseError for AppleAuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::MalformedToken(_) => StatusCode::BAD_REQUEST,
            Self::Verification(_) | Self::UserResolution(_) => StatusCode::UNAUTHORIZED,
            Self::Network(_) | Self::Remote(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) | Self::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        ResponseBuilder::new(self.status_code())
            .with_error_code(self.code())
            .with_message(&self.public_message())
            .build()
    }
}

/// Reasons an opaque state string could not be turned back into an `AuthState`
#[derive(Debug, Error)]
pub enum StateDecodeError {
    #[error("state parameter is missing")]
    Missing,

    #[error("state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state is not a JSON object")]
    NotAnObject,

    #[error("state field '{0}' has an unexpected type")]
    InvalidField(String),

    #[error("state has no '{0}' value")]
    MissingField(String),
}
