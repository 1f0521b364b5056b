//! Identity claims carried by Apple's identity token
//!
//! The token payload is decoded without checking its signature. Whether that
//! is acceptable is the deployment's call: enable `[jwt_validation]` to run
//! [`crate::apple::jwks::IdTokenVerifier`] before extraction.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppleAuthError;
use crate::utils::crypto::decode_jwt_payload;

/// Normalized identity handed to the user resolver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Stable Apple user identifier (`sub`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apple_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Name as Apple posts it in the `user` field on first authorization
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AppleUserName {
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
}

/// The `user` payload Apple sends once, on the first sign in
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AppleUserInfo {
    #[serde(default)]
    pub name: AppleUserName,
    pub email: Option<String>,
}

impl AppleUserInfo {
    /// Parse the `user` field, which arrives as an object (JSON bodies) or as a
    /// JSON string (form posts)
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            Value::String(json_str) => serde_json::from_str(json_str).ok(),
            _ => None,
        }
    }
}

/// Decode `id_token` and read its `email` and `sub` claims
///
/// Missing or non-string claims are simply left out.
///
/// # Errors
///
/// Returns `AppleAuthError::MalformedToken` if the token is not a JWT with a
/// base64url JSON payload.
pub fn extract(id_token: &str) -> Result<IdentityClaims, AppleAuthError> {
    let payload = decode_jwt_payload(id_token)
        .map_err(|e| AppleAuthError::MalformedToken(e.to_string()))?;

    let claim = |name: &str| payload.get(name).and_then(Value::as_str).map(ToString::to_string);

    let claims = IdentityClaims {
        email: claim("email"),
        apple_id: claim("sub"),
        first_name: None,
        last_name: None,
    };
    debug!(
        "Extracted identity claims: email present: {}, subject present: {}",
        claims.email.is_some(),
        claims.apple_id.is_some()
    );
    Ok(claims)
}

impl IdentityClaims {
    /// Fill in name (and missing email) from Apple's first-login `user` payload
    #[must_use]
    pub fn with_user_info(mut self, user_info: Option<&AppleUserInfo>) -> Self {
        if let Some(info) = user_info {
            self.first_name = info.name.first_name.clone();
            self.last_name = info.name.last_name.clone();
            if self.email.is_none() {
                self.email = info.email.clone();
            }
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.apple_id.is_none()
    }
}
