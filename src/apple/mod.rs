//! Sign in with Apple protocol engine
//!
//! State tokens, client-secret signing, the authorization URL, the code
//! exchange, identity claims and the callback redirect decision.

pub mod authorize_url;
pub mod callback;
pub mod claims;
pub mod client_secret;
pub mod config;
pub mod jwks;
pub mod service;
pub mod state;
pub mod token_exchange;

pub use callback::{CallbackParams, CallbackPhase, CallbackRedirect, CallbackRedirector};
pub use claims::{AppleUserInfo, AppleUserName, IdentityClaims};
pub use client_secret::{ClientSecretClaims, ClientSecretSigner};
pub use config::AppleConfig;
pub use jwks::{IdTokenVerifier, JsonWebKey, JsonWebKeySet};
pub use service::AppleAuthService;
pub use state::{AuthState, StateCodec};
pub use token_exchange::{TokenExchangeClient, TokenResponse};
