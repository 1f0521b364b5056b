// Sign in with Apple endpoints: auth-url, authorize, authorize/ios and token
use actix_web::{web, Either, HttpRequest, HttpResponse};
use log::debug;

use super::types::{
    required_field, user_info, AuthUrlQuery, AuthUrlResponse, AuthorizeIosRequest,
    AuthorizeRequest,
};
use crate::apple::callback::CallbackParams;
use crate::apple::claims::IdentityClaims;
use crate::apple::service::AppleAuthService;
use crate::error::AppleAuthError;
use crate::resolver::{AuthFlow, IdentityRequestContext, ResponseHandler, UserResolver};
use crate::utils::logging::LoggingHelper;
use crate::utils::responses::ResponseBuilder;

/// `GET auth-url?state=&redirect_url=`
///
/// # Errors
///
/// Returns a validation error if `state` is not a JSON object.
pub async fn auth_url(
    query: web::Query<AuthUrlQuery>,
    service: web::Data<AppleAuthService>,
) -> Result<HttpResponse, AppleAuthError> {
    let authorization_url =
        service.authorization_url(query.redirect_url.as_deref(), query.state.as_deref())?;

    Ok(ResponseBuilder::ok()
        .with_header("Cache-Control", "no-store")
        .json(&AuthUrlResponse { authorization_url }))
}

/// `POST authorize` with `{code, user?}` as JSON or form
///
/// # Errors
///
/// Returns an error if `code` is missing, the exchange with Apple fails, or the
/// resolver refuses the identity.
pub async fn authorize<R, H>(
    req: HttpRequest,
    body: Either<web::Json<AuthorizeRequest>, web::Form<AuthorizeRequest>>,
    service: web::Data<AppleAuthService>,
    resolver: web::Data<R>,
    handler: web::Data<H>,
) -> Result<HttpResponse, AppleAuthError>
where
    R: UserResolver + 'static,
    H: ResponseHandler<R::User> + 'static,
{
    let body = body.into_inner();
    let code = required_field(body.code.as_deref(), "code")?;
    let user_info = user_info(body.user.as_ref());
    LoggingHelper::log_apple_user_info(user_info.as_ref());

    let claims = service.do_auth(code, user_info.as_ref()).await?;
    complete_login(
        &req,
        AuthFlow::AuthorizationCode,
        &claims,
        resolver.get_ref(),
        handler.get_ref(),
    )
    .await
}

/// `POST authorize/ios` with `{id_token, user?}` as JSON or form
///
/// # Errors
///
/// Returns an error if `id_token` is missing or malformed, or the resolver
/// refuses the identity.
pub async fn authorize_ios<R, H>(
    req: HttpRequest,
    body: Either<web::Json<AuthorizeIosRequest>, web::Form<AuthorizeIosRequest>>,
    service: web::Data<AppleAuthService>,
    resolver: web::Data<R>,
    handler: web::Data<H>,
) -> Result<HttpResponse, AppleAuthError>
where
    R: UserResolver + 'static,
    H: ResponseHandler<R::User> + 'static,
{
    let body = body.into_inner();
    let id_token = required_field(body.id_token.as_deref(), "id_token")?;
    let user_info = user_info(body.user.as_ref());
    LoggingHelper::log_apple_user_info(user_info.as_ref());

    let claims = service.ios_auth(id_token, user_info.as_ref()).await?;
    complete_login(
        &req,
        AuthFlow::IdToken,
        &claims,
        resolver.get_ref(),
        handler.get_ref(),
    )
    .await
}

/// `GET|POST token`: Apple's `form_post` callback
///
/// Always answers with a redirect, either to the frontend URL recovered from
/// the state or to the fallback URL.
pub async fn token(
    req: HttpRequest,
    query: web::Query<CallbackParams>,
    form: Option<web::Form<CallbackParams>>,
    service: web::Data<AppleAuthService>,
) -> HttpResponse {
    LoggingHelper::log_callback_debug(&req);
    let params = extract_callback_data(query, form);

    let redirect = service.callback_redirect(&params);
    ResponseBuilder::redirect(redirect.location()).build()
}

/// Callback data from either query parameters or form submission
fn extract_callback_data(
    query: web::Query<CallbackParams>,
    form: Option<web::Form<CallbackParams>>,
) -> CallbackParams {
    form.map_or_else(
        || {
            debug!("Apple callback received via query");
            query.into_inner()
        },
        |form_data| {
            debug!("Apple callback received via form_post");
            form_data.into_inner()
        },
    )
}

async fn complete_login<R, H>(
    req: &HttpRequest,
    flow: AuthFlow,
    claims: &IdentityClaims,
    resolver: &R,
    handler: &H,
) -> Result<HttpResponse, AppleAuthError>
where
    R: UserResolver,
    H: ResponseHandler<R::User>,
{
    let context = IdentityRequestContext::from_request(req, flow);
    let (user, extra_context) = resolver.resolve(&context, claims).await?;
    let body = handler.render(&user, &extra_context);

    Ok(ResponseBuilder::ok()
        .with_header("Cache-Control", "no-store")
        .json(&body))
}
