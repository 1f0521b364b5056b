//! Apple authorization endpoint URL

use crate::apple::config::AppleConfig;

/// `response_type` requested from Apple
pub const RESPONSE_TYPE: &str = "code";

/// Apple posts the callback as a form when name or email scopes are requested
pub const RESPONSE_MODE: &str = "form_post";

/// Ordered query parameters for the authorization request
///
/// `state` and `scope` are only included when non-empty.
#[must_use]
pub fn auth_params(
    client_id: &str,
    redirect_uri: &str,
    scope: &[String],
    state: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("client_id", client_id.to_string()),
        ("redirect_uri", redirect_uri.to_string()),
    ];

    if let Some(state) = state.filter(|s| !s.is_empty()) {
        params.push(("state", state.to_string()));
    }

    if !scope.is_empty() {
        params.push(("scope", scope.join(" ")));
    }

    params.push(("response_type", RESPONSE_TYPE.to_string()));
    params.push(("response_mode", RESPONSE_MODE.to_string()));
    params
}

/// Percent-encode `key=value` pairs, spaces as `%20`
#[must_use]
pub fn encode_query<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key.as_ref()),
                urlencoding::encode(value.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Append an encoded query string to `base`, respecting an existing query
#[must_use]
pub fn append_query(base: &str, query: &str) -> String {
    if query.is_empty() {
        return base.to_string();
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

/// Compose the full authorization URL
#[must_use]
pub fn build(
    base_authorize_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: &[String],
    state: Option<&str>,
) -> String {
    let params = auth_params(client_id, redirect_uri, scope, state);
    append_query(base_authorize_url, &encode_query(&params))
}

/// Compose the authorization URL from runtime configuration
#[must_use]
pub fn build_from_config(config: &AppleConfig, state: Option<&str>) -> String {
    build(
        &config.authorization_endpoint,
        &config.client_id,
        &config.redirect_uri,
        &config.scope,
        state,
    )
}
