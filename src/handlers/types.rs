// Request and response bodies of the Apple endpoints
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::apple::claims::AppleUserInfo;
use crate::error::AppleAuthError;

#[derive(Deserialize, Debug)]
pub struct AuthUrlQuery {
    /// Extra state fields as a JSON object
    pub state: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AuthUrlResponse {
    pub authorization_url: String,
}

/// Body of `POST authorize`
#[derive(Deserialize, Debug, Default)]
pub struct AuthorizeRequest {
    pub code: Option<String>,
    pub user: Option<Value>,
}

/// Body of `POST authorize/ios`
#[derive(Deserialize, Debug, Default)]
pub struct AuthorizeIosRequest {
    pub id_token: Option<String>,
    pub user: Option<Value>,
}

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Non-empty value of a required field
///
/// # Errors
///
/// Returns `AppleAuthError::Validation` naming the field if it is absent or blank.
pub fn required_field<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, AppleAuthError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppleAuthError::Validation(format!("Missing required field: {name}")))
}

/// Apple's first-login `user` payload, ignored when unparsable
#[must_use]
pub fn user_info(user: Option<&Value>) -> Option<AppleUserInfo> {
    user.and_then(AppleUserInfo::from_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_field() {
        assert_eq!(required_field(Some("C1"), "code").unwrap(), "C1");

        let err = required_field(Some("  "), "code").unwrap_err();
        assert!(err.to_string().contains("code"));
        assert!(required_field(None, "id_token").is_err());
    }

    #[test]
    fn test_user_info_ignores_garbage() {
        assert!(user_info(Some(&json!("{not json"))).is_none());
        assert!(user_info(None).is_none());
        assert_eq!(
            user_info(Some(&json!({"email": "a@b.com"}))).unwrap().email.as_deref(),
            Some("a@b.com")
        );
    }
}
