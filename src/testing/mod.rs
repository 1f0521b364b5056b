//! Testing utilities for the Apple flows
//!
//! Available to unit tests and, with the `testing` feature, to the
//! integration tests under `tests/`.
//!
//! - [`fixtures`] - Fixed test key, settings, config and token builders
//! - [`mock`] - A local stand-in for Apple's token and keys endpoints
//!
//! ```rust,ignore
//! use appleauth::testing::{fixtures, mock::MockAppleTokenEndpoint};
//!
//! let mock = MockAppleTokenEndpoint::start(200, r#"{"id_token":"..."}"#).await;
//! let config = fixtures::test_config(&mock.url());
//! ```

pub mod fixtures;
pub mod mock;

/// Common test constants
pub mod constants {
    pub const TEST_CLIENT_ID: &str = "com.example.web";
    pub const TEST_TEAM_ID: &str = "TEAM123456";
    pub const TEST_KEY_ID: &str = "KEY789XYZ";
    pub const TEST_REDIRECT_URL: &str = "https://api.example/apple/token";
    pub const TEST_FALLBACK_URL: &str = "https://fe.example/apple/error";
    pub const TEST_FE_REDIRECT_URL: &str = "https://fe.example/done";
    /// `kid` of the JWK derived from the test key
    pub const TEST_JWK_KID: &str = "TESTKID";
}
