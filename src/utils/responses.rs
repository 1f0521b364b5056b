//! HTTP response helpers
//!
//! Gives handlers and error types one way to build JSON error bodies, JSON
//! success bodies and redirects, so every endpoint answers in the same shape.

use actix_web::{
    http::{header, StatusCode},
    HttpResponse,
};
use serde_json::json;

/// Entry point for building responses
pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Start an error response with an explicit status code
    #[must_use]
    pub fn new(status: StatusCode) -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(status)
    }

    /// Create a redirect response (302 Found)
    #[must_use]
    pub fn redirect(location: &str) -> RedirectBuilder {
        RedirectBuilder::new(location)
    }

    /// Create an OK response (200) with JSON content
    #[must_use]
    pub fn ok() -> JsonResponseBuilder {
        JsonResponseBuilder::new(StatusCode::OK)
    }
}

/// Builder for `{"error", "message"}` bodies
pub struct ErrorResponseBuilder {
    status: StatusCode,
    error_code: Option<String>,
    message: Option<String>,
}

/// Builder for redirect responses
pub struct RedirectBuilder {
    location: String,
}

/// Builder for JSON responses
pub struct JsonResponseBuilder {
    status: StatusCode,
    headers: Vec<(String, String)>,
}

impl ErrorResponseBuilder {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            error_code: None,
            message: None,
        }
    }

    /// Set a custom error code (e.g., "`invalid_request`", "`upstream_error`")
    #[must_use]
    pub fn with_error_code(mut self, code: &str) -> Self {
        self.error_code = Some(code.to_string());
        self
    }

    /// Set a human-readable message
    #[must_use]
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    /// Build the final `HttpResponse`
    #[must_use]
    pub fn build(self) -> HttpResponse {
        let json_body = json!({
            "error": self.error_code.as_deref().unwrap_or_else(|| self.default_error_code()),
            "message": self.message.as_deref().unwrap_or_else(|| self.default_message()),
        });

        HttpResponse::build(self.status).json(json_body)
    }

    fn default_error_code(&self) -> &'static str {
        match self.status {
            StatusCode::BAD_REQUEST => "invalid_request",
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::BAD_GATEWAY => "bad_gateway",
            _ => "server_error",
        }
    }

    fn default_message(&self) -> &'static str {
        match self.status {
            StatusCode::BAD_REQUEST => "The request is malformed or invalid",
            StatusCode::UNAUTHORIZED => "Authentication failed",
            StatusCode::BAD_GATEWAY => "Failed to reach Apple",
            _ => "An internal server error occurred",
        }
    }
}

impl RedirectBuilder {
    fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
        }
    }

    /// Build the final redirect response
    #[must_use]
    pub fn build(self) -> HttpResponse {
        HttpResponse::Found()
            .append_header((header::LOCATION, self.location))
            .finish()
    }
}

impl JsonResponseBuilder {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Add a custom header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Build the response with JSON content
    #[must_use]
    pub fn json<T: serde::Serialize>(self, data: &T) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status);
        for (name, value) in self.headers {
            builder.insert_header((name, value));
        }
        builder.json(data)
    }
}
