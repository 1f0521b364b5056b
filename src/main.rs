#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use appleauth::{
    configure_services, health, AppleAuthService, AppleAuthSettings, AppleConfig,
    ClaimsPassthrough,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = AppleAuthSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    let config = AppleConfig::from_settings(&settings)
        .map_err(|e| std::io::Error::other(format!("Invalid Apple configuration: {e}")))?;
    let service = AppleAuthService::new(config)
        .map_err(|e| std::io::Error::other(format!("Failed to initialize Apple service: {e}")))?;

    start_server(service, &settings).await
}

/// Start the HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(service: AppleAuthService, settings: &AppleAuthSettings) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, settings);

    let service = web::Data::new(service);
    let resolver = web::Data::new(ClaimsPassthrough);
    let cors_origins = settings.get_cors_origins();

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["Content-Type", "Accept"])
            .max_age(3600);

        App::new()
            .app_data(service.clone())
            .app_data(resolver.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(
                web::scope("/apple")
                    .configure(configure_services::<ClaimsPassthrough, ClaimsPassthrough>),
            )
            .route("/ping", web::get().to(health))
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &AppleAuthSettings) {
    println!("Starting Sign in with Apple service on http://{bind_address}");
    println!();
    println!("Apple endpoints:");
    println!("  GET  /apple/auth-url       - Authorization URL with a fresh state");
    println!("  POST /apple/authorize      - Exchange an authorization code");
    println!("  POST /apple/authorize/ios  - Accept an identity token from a native app");
    println!("  GET|POST /apple/token      - Apple form_post callback (redirects)");
    println!();
    println!("Redirect URI registered with Apple:");
    println!("  {}", settings.apple.redirect_url);
    println!();
    println!("System endpoints:");
    println!("  GET  /ping            - Health check");
}
