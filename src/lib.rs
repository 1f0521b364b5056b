#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Server-side Sign in with Apple
//!
//! Builds the authorization URL with an opaque state, signs the ES256 client
//! secret, exchanges authorization codes, extracts identity claims and decides
//! the callback redirect. Turning an identity into an application user is left
//! to a [`resolver::UserResolver`] supplied by the embedding application.

/// Version of the appleauth crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod apple;
pub mod error;
pub mod handlers;
pub mod resolver;
pub mod settings;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use apple::{AppleAuthService, AppleConfig, IdentityClaims};
pub use error::AppleAuthError;
pub use handlers::{configure_services, health};
pub use resolver::{ClaimsPassthrough, ResponseHandler, UserResolver};
pub use settings::AppleAuthSettings;
