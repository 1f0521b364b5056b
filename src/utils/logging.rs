// Recurring log lines for the Sign in with Apple flows
// Codes, client secrets and identity tokens are never written out, only their presence.
use log::{debug, info, warn};

use crate::apple::callback::CallbackRedirect;
use crate::apple::claims::{AppleUserInfo, IdentityClaims};
use crate::apple::token_exchange::TokenResponse;

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log service configuration at startup
    pub fn log_service_init(client_id: &str, redirect_uri: &str, verify_id_token: bool) {
        info!("🔧 Sign in with Apple configured for client {client_id}");
        info!("   Redirect URI: {redirect_uri}");
        if verify_id_token {
            info!("   Identity token signatures are verified against Apple's JWKS");
        } else {
            warn!("   Identity token signatures are NOT verified ([jwt_validation] enabled = false)");
        }
    }

    pub fn log_auth_url_issued(has_redirect_url: bool, extra_state_keys: usize) {
        info!(
            "🔍 Issued Apple authorization URL (redirect_url={}, extra state fields={extra_state_keys})",
            if has_redirect_url { "present" } else { "missing" }
        );
    }

    /// Log token exchange start
    pub fn log_token_exchange_start(token_endpoint: &str) {
        info!("🔄 Exchanging authorization code with {token_endpoint}");
    }

    /// Log token exchange summary
    pub fn log_token_exchange_summary(response: &TokenResponse) {
        info!(
            "🔍 Token exchange summary: id_token={}, access_token={}, refresh_token={}, token_type={:?}, expires_in={:?}",
            presence(response.id_token.as_ref()),
            presence(response.access_token.as_ref()),
            presence(response.refresh_token.as_ref()),
            response.token_type,
            response.expires_in,
        );
        if response.id_token.is_none() {
            warn!("Apple token response carried no id_token; identity claims will be empty");
        }
    }

    pub fn log_identity_extracted(flow: &str, claims: &IdentityClaims) {
        info!(
            "Identity extracted via {flow}: apple_id={}, email={}, name={}",
            presence(claims.apple_id.as_ref()),
            presence(claims.email.as_ref()),
            presence(claims.first_name.as_ref().or(claims.last_name.as_ref())),
        );
    }

    /// Apple only sends the user payload on the first authorization
    pub fn log_apple_user_info(user_info: Option<&AppleUserInfo>) {
        match user_info {
            Some(info) => debug!(
                "Apple user info present: email={}, first_name={}, last_name={}",
                presence(info.email.as_ref()),
                presence(info.name.first_name.as_ref()),
                presence(info.name.last_name.as_ref()),
            ),
            None => debug!("No Apple user info in request (expected after the first login)"),
        }
    }

    pub fn log_callback_redirect(redirect: &CallbackRedirect) {
        if redirect.state_recovered() {
            info!("↪️  Callback state recovered, redirecting to frontend");
        } else {
            warn!("↪️  Callback state lost ({:?}), redirecting to fallback", redirect.resolved());
        }
    }

    /// Log callback details in debug mode
    pub fn log_callback_debug(req: &actix_web::HttpRequest) {
        debug!("Apple callback received via {}", req.method());
        debug!("Callback request connection info: {:?}", req.connection_info());
    }
}

fn presence<T>(value: Option<T>) -> &'static str {
    if value.is_some() {
        "present"
    } else {
        "missing"
    }
}
