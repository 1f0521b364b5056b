//! Opaque `state` parameter carried through Apple's redirect round trip
//!
//! The state is a JSON object holding a random identifier, the frontend
//! redirect URL and any extra fields the frontend asked for. Nothing is stored
//! server-side; Apple echoes the string back verbatim on the callback.

use serde_json::{Map, Value};

use crate::error::{AppleAuthError, StateDecodeError};
use crate::utils::crypto::generate_random_string;

/// Length of the random identifier embedded in every state
pub const IDENTIFIER_LENGTH: usize = 128;

/// Key of the random identifier inside the state object
pub const IDENTIFIER_KEY: &str = "identifier";

/// Decoded form of a state string
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    /// Absent when the state was produced by something other than this codec.
    /// A non-string identifier supplied as extra state stays in `extra`.
    pub identifier: Option<String>,
    pub fe_redirect_url: Option<String>,
    /// Every other field, as supplied by the frontend
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct StateCodec {
    redirect_field: String,
}

impl StateCodec {
    /// `redirect_field` is the key that stores the frontend redirect URL
    #[must_use]
    pub fn new(redirect_field: &str) -> Self {
        Self {
            redirect_field: redirect_field.to_string(),
        }
    }

    #[must_use]
    pub fn redirect_field(&self) -> &str {
        &self.redirect_field
    }

    /// Parse the caller-supplied extra state (a JSON object in a query string)
    ///
    /// # Errors
    ///
    /// Returns `AppleAuthError::Validation` if the value is not a JSON object.
    pub fn parse_extra_state(raw: &str) -> Result<Map<String, Value>, AppleAuthError> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AppleAuthError::Validation(
                "state must be a JSON object".to_string(),
            )),
            Err(e) => Err(AppleAuthError::Validation(format!(
                "state is not valid JSON: {e}"
            ))),
        }
    }

    /// Build a new state string
    ///
    /// Extra fields are merged last, so an extra `identifier` or redirect key
    /// replaces the generated one.
    #[must_use]
    pub fn encode(&self, redirect_url: Option<&str>, extra_state: Option<&Map<String, Value>>) -> String {
        let mut state = Map::new();
        state.insert(
            IDENTIFIER_KEY.to_string(),
            Value::String(generate_random_string(IDENTIFIER_LENGTH)),
        );
        state.insert(
            self.redirect_field.clone(),
            redirect_url.map_or(Value::Null, |url| Value::String(url.to_string())),
        );

        if let Some(extra) = extra_state {
            for (key, value) in extra {
                state.insert(key.clone(), value.clone());
            }
        }

        Value::Object(state).to_string()
    }

    /// Decode a state string received on the callback
    ///
    /// # Errors
    ///
    /// Returns a `StateDecodeError` if the state is empty, not JSON, not an
    /// object, or its redirect field is not a string.
    pub fn decode(&self, state: &str) -> Result<AuthState, StateDecodeError> {
        if state.trim().is_empty() {
            return Err(StateDecodeError::Missing);
        }

        let Value::Object(mut fields) = serde_json::from_str::<Value>(state)? else {
            return Err(StateDecodeError::NotAnObject);
        };

        let identifier = match fields.remove(IDENTIFIER_KEY) {
            Some(Value::String(value)) => Some(value),
            None | Some(Value::Null) => None,
            Some(other) => {
                fields.insert(IDENTIFIER_KEY.to_string(), other);
                None
            }
        };
        let fe_redirect_url = Self::take_string(&mut fields, &self.redirect_field)?;

        Ok(AuthState {
            identifier,
            fe_redirect_url,
            extra: fields,
        })
    }

    fn take_string(
        fields: &mut Map<String, Value>,
        key: &str,
    ) -> Result<Option<String>, StateDecodeError> {
        match fields.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value)),
            Some(_) => Err(StateDecodeError::InvalidField(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codec() -> StateCodec {
        StateCodec::new("fe_redirect_url")
    }

    #[test]
    fn test_roundtrip_recovers_redirect_and_extras() {
        let extra = StateCodec::parse_extra_state(r#"{"next":"/billing","plan":3}"#).unwrap();
        let encoded = codec().encode(Some("https://fe.example/done"), Some(&extra));

        let state = codec().decode(&encoded).unwrap();
        assert_eq!(state.fe_redirect_url.as_deref(), Some("https://fe.example/done"));
        assert_eq!(state.extra.get("next"), Some(&json!("/billing")));
        assert_eq!(state.extra.get("plan"), Some(&json!(3)));
        assert_eq!(state.identifier.as_ref().map(String::len), Some(IDENTIFIER_LENGTH));
    }

    #[test]
    fn test_identifier_differs_between_calls() {
        let first = codec().decode(&codec().encode(Some("https://fe.example"), None)).unwrap();
        let second = codec().decode(&codec().encode(Some("https://fe.example"), None)).unwrap();
        assert_ne!(first.identifier, second.identifier);
    }

    #[test]
    fn test_extra_fields_override_reserved_keys() {
        let extra = StateCodec::parse_extra_state(
            r#"{"identifier":"fixed","fe_redirect_url":"https://other.example"}"#,
        )
        .unwrap();
        let encoded = codec().encode(Some("https://fe.example"), Some(&extra));

        let state = codec().decode(&encoded).unwrap();
        assert_eq!(state.identifier.as_deref(), Some("fixed"));
        assert_eq!(state.fe_redirect_url.as_deref(), Some("https://other.example"));
    }

    #[test]
    fn test_non_string_identifier_in_extras_still_decodes() {
        let extra = StateCodec::parse_extra_state(r#"{"identifier":5,"next":"/x"}"#).unwrap();
        let encoded = codec().encode(Some("https://fe.example/done"), Some(&extra));

        let state = codec().decode(&encoded).unwrap();
        assert_eq!(state.fe_redirect_url.as_deref(), Some("https://fe.example/done"));
        assert!(state.identifier.is_none());
        assert_eq!(state.extra.get("identifier"), Some(&json!(5)));
        assert_eq!(state.extra.get("next"), Some(&json!("/x")));
    }

    #[test]
    fn test_missing_redirect_is_encoded_as_null() {
        let encoded = codec().encode(None, None);
        let raw: Value = serde_json::from_str(&encoded).unwrap();
        assert!(raw["fe_redirect_url"].is_null());
        assert!(codec().decode(&encoded).unwrap().fe_redirect_url.is_none());
    }

    #[test]
    fn test_custom_redirect_field() {
        let codec = StateCodec::new("next_url");
        let state = codec.decode(&codec.encode(Some("https://fe.example/x"), None)).unwrap();
        assert_eq!(state.fe_redirect_url.as_deref(), Some("https://fe.example/x"));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(codec().decode(""), Err(StateDecodeError::Missing)));
        assert!(matches!(codec().decode("not-json"), Err(StateDecodeError::Json(_))));
        assert!(matches!(codec().decode("[1,2]"), Err(StateDecodeError::NotAnObject)));
        assert!(matches!(
            codec().decode(r#"{"fe_redirect_url": 5}"#),
            Err(StateDecodeError::InvalidField(_))
        ));
    }

    #[test]
    fn test_decode_without_identifier() {
        let state = codec()
            .decode(r#"{"fe_redirect_url":"https://fe.example/done"}"#)
            .unwrap();
        assert!(state.identifier.is_none());
        assert_eq!(state.fe_redirect_url.as_deref(), Some("https://fe.example/done"));
    }

    #[test]
    fn test_parse_extra_state_rejects_non_objects() {
        assert!(StateCodec::parse_extra_state("[1]").is_err());
        assert!(StateCodec::parse_extra_state("{broken").is_err());
    }
}
