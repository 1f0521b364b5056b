//! The Sign in with Apple flows, assembled from the protocol pieces
//!
//! `AppleAuthService` is built once from an [`AppleConfig`] and shared by all
//! requests. Apart from the optional JWKS cache it holds no mutable state.

use log::{debug, info};

use crate::apple::authorize_url;
use crate::apple::callback::{CallbackParams, CallbackRedirect, CallbackRedirector};
use crate::apple::claims::{self, AppleUserInfo, IdentityClaims};
use crate::apple::client_secret::ClientSecretSigner;
use crate::apple::config::AppleConfig;
use crate::apple::jwks::IdTokenVerifier;
use crate::apple::state::StateCodec;
use crate::apple::token_exchange::TokenExchangeClient;
use crate::error::AppleAuthError;
use crate::utils::logging::LoggingHelper;

pub struct AppleAuthService {
    config: AppleConfig,
    signer: ClientSecretSigner,
    codec: StateCodec,
    token_client: TokenExchangeClient,
    redirector: CallbackRedirector,
    verifier: Option<IdTokenVerifier>,
}

impl AppleAuthService {
    /// # Errors
    ///
    /// Returns `AppleAuthError::Configuration` if an HTTP client cannot be built.
    pub fn new(config: AppleConfig) -> Result<Self, AppleAuthError> {
        let signer = ClientSecretSigner::from_config(&config);
        let codec = StateCodec::new(&config.state_redirect_field_name);
        let token_client =
            TokenExchangeClient::new(&config.token_endpoint, config.request_timeout)?;
        let redirector = CallbackRedirector::new(codec.clone(), &config.fallback_callback_url);
        let verifier = IdTokenVerifier::from_config(&config)?;

        LoggingHelper::log_service_init(&config.client_id, &config.redirect_uri, verifier.is_some());

        Ok(Self {
            config,
            signer,
            codec,
            token_client,
            redirector,
            verifier,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AppleConfig {
        &self.config
    }

    /// Authorization URL carrying a fresh state
    ///
    /// `extra_state` is the raw JSON object the frontend passed; an empty
    /// value is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `AppleAuthError::Validation` if `extra_state` is not a JSON object.
    pub fn authorization_url(
        &self,
        redirect_url: Option<&str>,
        extra_state: Option<&str>,
    ) -> Result<String, AppleAuthError> {
        let extra = extra_state
            .filter(|raw| !raw.trim().is_empty())
            .map(StateCodec::parse_extra_state)
            .transpose()?;

        let state = self.codec.encode(redirect_url, extra.as_ref());
        LoggingHelper::log_auth_url_issued(
            redirect_url.is_some(),
            extra.as_ref().map_or(0, serde_json::Map::len),
        );

        Ok(authorize_url::build_from_config(&self.config, Some(&state)))
    }

    /// Web flow: exchange an authorization code and extract the identity
    ///
    /// A token response without `id_token` yields empty claims.
    ///
    /// # Errors
    ///
    /// - `AppleAuthError::Signing` if the client secret cannot be produced
    /// - `AppleAuthError::Network`/`Remote` if the exchange fails
    /// - `AppleAuthError::MalformedToken`/`Verification` for a bad identity token
    pub async fn do_auth(
        &self,
        code: &str,
        user_info: Option<&AppleUserInfo>,
    ) -> Result<IdentityClaims, AppleAuthError> {
        let client_secret = self.signer.sign()?;

        LoggingHelper::log_token_exchange_start(self.token_client.token_endpoint());
        let response = self
            .token_client
            .exchange(code, self.signer.client_id(), &client_secret)
            .await?;
        LoggingHelper::log_token_exchange_summary(&response);

        let claims = match response.id_token.as_deref() {
            Some(id_token) => self.claims_from_id_token(id_token).await?,
            None => IdentityClaims::default(),
        }
        .with_user_info(user_info);

        LoggingHelper::log_identity_extracted("authorization code", &claims);
        Ok(claims)
    }

    /// Native flow: the app already holds the identity token
    ///
    /// # Errors
    ///
    /// - `AppleAuthError::MalformedToken` if the token is not a JWT
    /// - `AppleAuthError::Verification` if verification is enabled and fails
    pub async fn ios_auth(
        &self,
        id_token: &str,
        user_info: Option<&AppleUserInfo>,
    ) -> Result<IdentityClaims, AppleAuthError> {
        let claims = self
            .claims_from_id_token(id_token)
            .await?
            .with_user_info(user_info);

        LoggingHelper::log_identity_extracted("identity token", &claims);
        Ok(claims)
    }

    /// Redirect target for Apple's callback
    #[must_use]
    pub fn callback_redirect(&self, params: &CallbackParams) -> CallbackRedirect {
        let redirect = self.redirector.redirect(params);
        LoggingHelper::log_callback_redirect(&redirect);
        redirect
    }

    async fn claims_from_id_token(&self, id_token: &str) -> Result<IdentityClaims, AppleAuthError> {
        if let Some(verifier) = &self.verifier {
            verifier.verify(id_token).await?;
            info!("Identity token signature and claims verified");
        } else {
            debug!("Identity token accepted without signature verification");
        }
        claims::extract(id_token)
    }
}
