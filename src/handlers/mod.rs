// HTTP surface of the Sign in with Apple flows
pub mod apple;
pub mod health;
pub mod types;

pub use apple::{auth_url, authorize, authorize_ios, token};
pub use health::health;

use actix_web::web;

use crate::error::AppleAuthError;
use crate::resolver::{ResponseHandler, UserResolver};

/// Register the Apple routes on `cfg`
///
/// Mount inside a scope (the binary uses `/apple`). Expects
/// `web::Data<AppleAuthService>`, `web::Data<R>` and `web::Data<H>` as app data.
pub fn configure_services<R, H>(cfg: &mut web::ServiceConfig)
where
    R: UserResolver + 'static,
    H: ResponseHandler<R::User> + 'static,
{
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppleAuthError::Validation(err.to_string()).into()
    }))
    .app_data(web::FormConfig::default().error_handler(|err, _req| {
        AppleAuthError::Validation(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppleAuthError::Validation(err.to_string()).into()
    }))
    .route("/auth-url", web::get().to(auth_url))
    .route("/authorize", web::post().to(authorize::<R, H>))
    .route("/authorize/ios", web::post().to(authorize_ios::<R, H>))
    .route("/token", web::get().to(token))
    .route("/token", web::post().to(token));
}
