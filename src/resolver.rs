//! Collaborators supplied by the embedding application
//!
//! This crate never touches a user store. After the identity is extracted, a
//! [`UserResolver`] turns it into an application user and a
//! [`ResponseHandler`] renders the authenticated response body.

use actix_web::HttpRequest;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::apple::claims::IdentityClaims;
use crate::error::AppleAuthError;
use crate::utils::user_agent::extract_user_agent_info;

/// Which flow produced the identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlow {
    /// Web flow, authorization code exchanged server-side
    AuthorizationCode,
    /// Native flow, identity token presented by the app
    IdToken,
}

impl AuthFlow {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::IdToken => "id_token",
        }
    }
}

/// Request details handed to the resolver alongside the claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRequestContext {
    pub flow: AuthFlow,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub platform: Option<String>,
}

impl IdentityRequestContext {
    #[must_use]
    pub fn from_request(req: &HttpRequest, flow: AuthFlow) -> Self {
        let info = extract_user_agent_info(req);
        Self {
            flow,
            client_ip: info.client_ip,
            user_agent: info.user_agent,
            platform: info.platform,
        }
    }
}

/// Fetch or create the application user for an Apple identity
#[async_trait]
pub trait UserResolver: Send + Sync {
    type User: Send;

    /// Returns the user and any extra context the response handler needs
    ///
    /// # Errors
    ///
    /// Implementations return `AppleAuthError::UserResolution` to refuse the login.
    async fn resolve(
        &self,
        context: &IdentityRequestContext,
        claims: &IdentityClaims,
    ) -> Result<(Self::User, Value), AppleAuthError>;
}

/// Render the authenticated response body (tokens, session payload, ...)
pub trait ResponseHandler<U>: Send + Sync {
    fn render(&self, user: &U, extra_context: &Value) -> Value;
}

/// Resolver and handler that treat the claims themselves as the user
///
/// Requires a stable `apple_id`; an identity without one is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimsPassthrough;

#[async_trait]
impl UserResolver for ClaimsPassthrough {
    type User = IdentityClaims;

    async fn resolve(
        &self,
        context: &IdentityRequestContext,
        claims: &IdentityClaims,
    ) -> Result<(IdentityClaims, Value), AppleAuthError> {
        if claims.apple_id.as_deref().is_none_or(str::is_empty) {
            return Err(AppleAuthError::UserResolution(
                "Apple identity has no subject".to_string(),
            ));
        }

        Ok((
            claims.clone(),
            json!({
                "flow": context.flow.as_str(),
                "platform": context.platform,
            }),
        ))
    }
}

impl ResponseHandler<IdentityClaims> for ClaimsPassthrough {
    fn render(&self, user: &IdentityClaims, extra_context: &Value) -> Value {
        json!({
            "user": user,
            "context": extra_context,
        })
    }
}
