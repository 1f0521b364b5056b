// Client details attached to every identity resolution
use actix_web::HttpRequest;

/// Client details extracted from HTTP headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub client_ip: Option<String>,
}

/// Extract user agent, platform and client IP from request headers
/// Client hints are preferred, with fallback to the traditional User-Agent header
#[must_use]
pub fn extract_user_agent_info(req: &HttpRequest) -> UserAgentInfo {
    let headers = req.headers();

    let user_agent = headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(ToString::to_string);

    let platform = headers
        .get("sec-ch-ua-platform")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| user_agent.as_deref().map(derive_platform_from_user_agent));

    UserAgentInfo {
        user_agent,
        platform,
        client_ip: client_ip(req),
    }
}

/// Client IP, honouring `X-Forwarded-For` and `Forwarded` from a reverse proxy
#[must_use]
pub fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info()
        .realip_remote_addr()
        .map(|addr| strip_port(addr).to_string())
}

fn strip_port(addr: &str) -> &str {
    // [::1]:8080 or 10.0.0.1:8080, bare IPv6 stays untouched
    if let Some(rest) = addr.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => addr,
    }
}

/// Derive platform from User-Agent string
#[must_use]
pub fn derive_platform_from_user_agent(user_agent: &str) -> String {
    let ua_lower = user_agent.to_lowercase();

    if ua_lower.contains("android") {
        "Android".to_string()
    } else if ua_lower.contains("iphone")
        || ua_lower.contains("ipad")
        || ua_lower.contains("ios")
        || ua_lower.contains("cfnetwork")
    {
        "iOS".to_string()
    } else if ua_lower.contains("windows") {
        "Windows".to_string()
    } else if ua_lower.contains("macintosh") || ua_lower.contains("mac os") {
        "macOS".to_string()
    } else if ua_lower.contains("linux") {
        "Linux".to_string()
    } else {
        "Unknown".to_string()
    }
}
