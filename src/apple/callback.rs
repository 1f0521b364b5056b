//! Redirect decision for Apple's `form_post` callback
//!
//! The callback either recovers the frontend redirect URL from the state and
//! forwards `code`, `state` and `error` to it, or, when the state is lost,
//! sends the browser to the configured fallback URL with nothing but
//! `error=state_not_found`. The code never reaches an unverified destination.
//!
//! The fallback query is a regular `key=value` pair. Frontends that expect the
//! older raw JSON form (`?{"error": "state_not_found"}`) must read the `error`
//! query parameter instead.

use serde::Deserialize;
use serde_json::Value;

use crate::apple::authorize_url::{append_query, encode_query};
use crate::apple::state::StateCodec;
use crate::error::StateDecodeError;

/// Error reported to the fallback URL when the state cannot be recovered
pub const STATE_NOT_FOUND: &str = "state_not_found";

/// Parameters Apple sends to the redirect URI
#[derive(Deserialize, Debug, Default, Clone)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub id_token: Option<String>,
    pub state: Option<String>,
    /// Apple sends user info in the form POST on first login
    pub user: Option<Value>,
    pub error: Option<String>,
}

/// Phases of a callback. `AwaitingCallback` moves to exactly one of the
/// middle phases, which both end in `Redirecting`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackPhase {
    AwaitingCallback,
    StateRecovered { redirect_url: String },
    StateLost { reason: String },
    Redirecting { location: String },
}

/// Outcome of handling one callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRedirect {
    resolved: CallbackPhase,
    location: String,
}

impl CallbackRedirect {
    /// `StateRecovered` or `StateLost`
    #[must_use]
    pub fn resolved(&self) -> &CallbackPhase {
        &self.resolved
    }

    /// Final redirect target
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The terminal phase, always `Redirecting`
    #[must_use]
    pub fn terminal(&self) -> CallbackPhase {
        CallbackPhase::Redirecting {
            location: self.location.clone(),
        }
    }

    #[must_use]
    pub fn state_recovered(&self) -> bool {
        matches!(self.resolved, CallbackPhase::StateRecovered { .. })
    }
}

#[derive(Debug, Clone)]
pub struct CallbackRedirector {
    codec: StateCodec,
    fallback_url: String,
}

impl CallbackRedirector {
    #[must_use]
    pub fn new(codec: StateCodec, fallback_url: &str) -> Self {
        Self {
            codec,
            fallback_url: fallback_url.to_string(),
        }
    }

    /// Decide where to send the browser
    ///
    /// Pure function of the parameters and configuration.
    #[must_use]
    pub fn redirect(&self, params: &CallbackParams) -> CallbackRedirect {
        let resolved = self.resolve(params);
        let location = self.location_for(&resolved, params);
        CallbackRedirect { resolved, location }
    }

    /// Step out of `AwaitingCallback`
    #[must_use]
    pub fn resolve(&self, params: &CallbackParams) -> CallbackPhase {
        match self.recover_redirect_url(params.state.as_deref()) {
            Ok(redirect_url) => CallbackPhase::StateRecovered { redirect_url },
            Err(e) => CallbackPhase::StateLost {
                reason: e.to_string(),
            },
        }
    }

    fn recover_redirect_url(&self, state: Option<&str>) -> Result<String, StateDecodeError> {
        let state = self.codec.decode(state.ok_or(StateDecodeError::Missing)?)?;
        state
            .fe_redirect_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| StateDecodeError::MissingField(self.codec.redirect_field().to_string()))
    }

    fn location_for(&self, phase: &CallbackPhase, params: &CallbackParams) -> String {
        match phase {
            CallbackPhase::StateRecovered { redirect_url } => {
                append_query(redirect_url, &Self::forwarded_query(params))
            }
            _ => append_query(&self.fallback_url, &encode_query(&[("error", STATE_NOT_FOUND)])),
        }
    }

    /// `code`, `state` and `error` are always present; absent values are empty
    fn forwarded_query(params: &CallbackParams) -> String {
        let value = |v: &Option<String>| v.clone().unwrap_or_default();
        encode_query(&[
            ("code", value(&params.code)),
            ("state", value(&params.state)),
            ("error", value(&params.error)),
        ])
    }
}
