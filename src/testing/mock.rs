//! Local stand-in for Apple's token and keys endpoints
//!
//! Serves `POST /auth/token` with a canned status and body, recording the
//! last form it received, and `GET /auth/keys` with the JWKS of the test key,
//! counting how often the keys were fetched.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer};
use serde_json::json;

use super::constants::TEST_JWK_KID;
use super::fixtures::test_jwk;

struct MockState {
    status: StatusCode,
    body: String,
    delay: Duration,
    last_form: Mutex<Option<HashMap<String, String>>>,
    keys_fetches: AtomicUsize,
}

pub struct MockAppleTokenEndpoint {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: ServerHandle,
}

impl MockAppleTokenEndpoint {
    /// Start the mock on an ephemeral port
    ///
    /// Must be called inside an actix runtime (`#[actix_web::test]`).
    ///
    /// # Panics
    ///
    /// Panics if the local port cannot be bound.
    pub async fn start(status: u16, body: &str) -> Self {
        Self::start_with_delay(status, body, Duration::ZERO).await
    }

    /// Like [`MockAppleTokenEndpoint::start`], but the token endpoint waits
    /// `delay` before answering
    ///
    /// # Panics
    ///
    /// Panics if the local port cannot be bound.
    pub async fn start_with_delay(status: u16, body: &str, delay: Duration) -> Self {
        let state = Arc::new(MockState {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: body.to_string(),
            delay,
            last_form: Mutex::new(None),
            keys_fetches: AtomicUsize::new(0),
        });

        let data = web::Data::from(Arc::clone(&state));
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .route("/auth/token", web::post().to(token_endpoint))
                .route("/auth/keys", web::get().to(keys_endpoint))
        })
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .expect("bind mock Apple endpoint");

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            addr,
            state,
            handle,
        }
    }

    /// URL of the token endpoint
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/auth/token", self.addr)
    }

    /// URL of the JWKS endpoint
    #[must_use]
    pub fn keys_url(&self) -> String {
        format!("http://{}/auth/keys", self.addr)
    }

    /// Form fields of the last token request
    ///
    /// # Panics
    ///
    /// Panics if the recording mutex is poisoned.
    #[must_use]
    pub fn last_form(&self) -> Option<HashMap<String, String>> {
        self.state.last_form.lock().expect("mock state lock").clone()
    }

    /// Number of requests served by the JWKS endpoint
    #[must_use]
    pub fn keys_fetch_count(&self) -> usize {
        self.state.keys_fetches.load(Ordering::SeqCst)
    }
}

impl Drop for MockAppleTokenEndpoint {
    fn drop(&mut self) {
        // The stop command is sent immediately; the returned future only waits for shutdown
        drop(self.handle.stop(false));
    }
}

async fn token_endpoint(
    form: web::Form<HashMap<String, String>>,
    state: web::Data<MockState>,
) -> HttpResponse {
    if let Ok(mut last_form) = state.last_form.lock() {
        *last_form = Some(form.into_inner());
    }
    if !state.delay.is_zero() {
        actix_web::rt::time::sleep(state.delay).await;
    }
    HttpResponse::build(state.status)
        .content_type("application/json")
        .body(state.body.clone())
}

async fn keys_endpoint(state: web::Data<MockState>) -> HttpResponse {
    state.keys_fetches.fetch_add(1, Ordering::SeqCst);
    HttpResponse::Ok().json(json!({ "keys": [test_jwk(TEST_JWK_KID)] }))
}
