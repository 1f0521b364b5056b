// Identity token verification against Apple's published signing keys
// Supports RS256 (what Apple uses today) and ES256, plus iss/aud/exp checks

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::apple::config::AppleConfig;
use crate::error::AppleAuthError;
use crate::settings::JwtValidationSettings;
use crate::utils::crypto::{decode_json_segment, decode_segment, split_jwt};

// ============================================================================
// JWKS Structures
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKey {
    pub kty: String,
    pub kid: Option<String>,
    pub alg: Option<String>,
    #[serde(rename = "use")]
    pub key_use: Option<String>,

    // RSA keys
    pub n: Option<String>,
    pub e: Option<String>,

    // EC keys
    pub crv: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

impl JsonWebKeySet {
    #[must_use]
    pub fn find(&self, kid: Option<&str>) -> Option<&JsonWebKey> {
        match kid {
            Some(kid) => self.keys.iter().find(|key| key.kid.as_deref() == Some(kid)),
            None if self.keys.len() == 1 => self.keys.first(),
            None => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
    kid: Option<String>,
}

struct CachedKeys {
    keys: JsonWebKeySet,
    fetched_at: DateTime<Utc>,
}

#[derive(Default)]
struct KeyCache {
    current: Option<CachedKeys>,
    /// Last fetch attempt, successful or not
    last_attempt: Option<DateTime<Utc>>,
}

/// Default minimum time between two JWKS fetches
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// Verifier
// ============================================================================

pub struct IdTokenVerifier {
    http_client: reqwest::Client,
    jwks_uri: String,
    expected_issuer: String,
    expected_audience: String,
    settings: JwtValidationSettings,
    cache: RwLock<KeyCache>,
    cache_duration: Duration,
    refresh_interval: Duration,
}

impl IdTokenVerifier {
    /// # Errors
    ///
    /// Returns `AppleAuthError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        settings: JwtValidationSettings,
        expected_issuer: &str,
        expected_audience: &str,
        timeout: Duration,
    ) -> Result<Self, AppleAuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppleAuthError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            jwks_uri: settings.jwks_uri.clone(),
            expected_issuer: expected_issuer.to_string(),
            expected_audience: expected_audience.to_string(),
            settings,
            cache: RwLock::new(KeyCache::default()),
            cache_duration: Duration::from_secs(3600),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        })
    }

    /// Minimum time between fetches triggered by unknown `kid`s or failures
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Verifier for `config`, or `None` when validation is disabled
    ///
    /// # Errors
    ///
    /// Same as [`IdTokenVerifier::new`].
    pub fn from_config(config: &AppleConfig) -> Result<Option<Self>, AppleAuthError> {
        config
            .jwt_validation
            .clone()
            .map(|settings| {
                Self::new(
                    settings,
                    &config.validation_audience,
                    &config.client_id,
                    config.request_timeout,
                )
            })
            .transpose()
    }

    /// Verify signature and claims of an Apple identity token
    ///
    /// # Errors
    ///
    /// - `AppleAuthError::MalformedToken` if the token cannot be parsed
    /// - `AppleAuthError::Network`/`Remote` if Apple's keys cannot be fetched
    /// - `AppleAuthError::Verification` if the signature or a claim is invalid
    pub async fn verify(&self, token: &str) -> Result<(), AppleAuthError> {
        let header = Self::decode_header(token)?;
        let keys = self.key_set(header.kid.as_deref()).await?;
        self.verify_with_key_set(token, &keys, Utc::now().timestamp())
    }

    /// Verify against an already known key set at time `now`
    ///
    /// # Errors
    ///
    /// Same as [`IdTokenVerifier::verify`], minus fetch failures.
    pub fn verify_with_key_set(
        &self,
        token: &str,
        keys: &JsonWebKeySet,
        now: i64,
    ) -> Result<(), AppleAuthError> {
        let [header_b64, payload_b64, signature_b64] =
            split_jwt(token).map_err(|e| AppleAuthError::MalformedToken(e.to_string()))?;
        let header = Self::decode_header(token)?;

        let key = keys.find(header.kid.as_deref()).ok_or_else(|| {
            AppleAuthError::Verification(format!("Signing key not found: {:?}", header.kid))
        })?;

        let signature = decode_segment(signature_b64)
            .map_err(|e| AppleAuthError::MalformedToken(format!("Invalid signature encoding: {e}")))?;
        let signing_input = format!("{header_b64}.{payload_b64}");

        match header.alg.as_str() {
            "RS256" => verify_rs256(signing_input.as_bytes(), &signature, key)?,
            "ES256" => verify_es256(signing_input.as_bytes(), &signature, key)?,
            alg => {
                return Err(AppleAuthError::Verification(format!(
                    "Unsupported algorithm: {alg}"
                )))
            }
        }
        debug!("Identity token signature verified");

        let claims = decode_json_segment(payload_b64)
            .map_err(|e| AppleAuthError::MalformedToken(e.to_string()))?;
        self.validate_claims(&claims, now)
    }

    fn decode_header(token: &str) -> Result<JwtHeader, AppleAuthError> {
        let [header_b64, _, _] =
            split_jwt(token).map_err(|e| AppleAuthError::MalformedToken(e.to_string()))?;
        let header = decode_json_segment(header_b64)
            .map_err(|e| AppleAuthError::MalformedToken(format!("Invalid header: {e}")))?;
        serde_json::from_value(header)
            .map_err(|e| AppleAuthError::MalformedToken(format!("Invalid header: {e}")))
    }

    /// Cached key set, refreshed when stale or when `kid` is unknown (key rotation)
    ///
    /// At most one fetch happens per refresh interval. Within it, an unknown
    /// `kid` is answered from the cache and a failed fetch is not retried.
    async fn key_set(&self, kid: Option<&str>) -> Result<JsonWebKeySet, AppleAuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = self.fresh_keys(&cache) {
                if cached.find(kid).is_some() {
                    return Ok(cached.clone());
                }
            }
        }

        // Held across the fetch so concurrent misses share one request
        let mut cache = self.cache.write().await;
        let now = Utc::now();
        let recently_attempted = cache
            .last_attempt
            .is_some_and(|at| Self::within(now, at, self.refresh_interval));

        if let Some(cached) = self.fresh_keys(&cache) {
            if cached.find(kid).is_some() || recently_attempted {
                return Ok(cached.clone());
            }
        } else if recently_attempted {
            warn!("Skipping JWKS fetch after a recent failure");
            return Err(AppleAuthError::Network(
                "Skipping JWKS fetch due to recent failure and backoff".to_string(),
            ));
        }

        debug!("Refreshing Apple signing keys (kid {kid:?})");
        cache.last_attempt = Some(now);
        let keys = self.fetch_keys().await?;
        cache.current = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Utc::now(),
        });
        Ok(keys)
    }

    fn fresh_keys<'a>(&self, cache: &'a KeyCache) -> Option<&'a JsonWebKeySet> {
        cache
            .current
            .as_ref()
            .filter(|cached| Self::within(Utc::now(), cached.fetched_at, self.cache_duration))
            .map(|cached| &cached.keys)
    }

    fn within(now: DateTime<Utc>, since: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(since)
            .to_std()
            .is_ok_and(|age| age < window)
    }

    async fn fetch_keys(&self) -> Result<JsonWebKeySet, AppleAuthError> {
        info!("Fetching Apple signing keys from {}", self.jwks_uri);
        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| AppleAuthError::Network(format!("Failed to fetch JWKS: {e}")))?;

        response
            .json::<JsonWebKeySet>()
            .await
            .map_err(|e| AppleAuthError::Remote(format!("Invalid JWKS response: {e}")))
    }

    fn validate_claims(&self, claims: &Value, now: i64) -> Result<(), AppleAuthError> {
        let skew = i64::try_from(self.settings.clock_skew_seconds).unwrap_or(300);

        if self.settings.validate_expiration {
            let exp = claims
                .get("exp")
                .and_then(Value::as_i64)
                .ok_or_else(|| AppleAuthError::Verification("Missing exp claim".to_string()))?;
            if now > exp.saturating_add(skew) {
                return Err(AppleAuthError::Verification("Token has expired".to_string()));
            }
            if let Some(nbf) = claims.get("nbf").and_then(Value::as_i64) {
                if now < nbf.saturating_sub(skew) {
                    return Err(AppleAuthError::Verification("Token is not yet valid".to_string()));
                }
            }
        }

        if self.settings.validate_issuer {
            let issuer = claims.get("iss").and_then(Value::as_str);
            if issuer != Some(self.expected_issuer.as_str()) {
                return Err(AppleAuthError::Verification(format!(
                    "Claim 'iss' validation failed: expected '{}', got '{}'",
                    self.expected_issuer,
                    issuer.unwrap_or_default()
                )));
            }
        }

        if self.settings.validate_audience {
            let audiences: Vec<&str> = match claims.get("aud") {
                Some(Value::String(aud)) => vec![aud.as_str()],
                Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            if !audiences.contains(&self.expected_audience.as_str()) {
                warn!("Identity token audience mismatch: {audiences:?}");
                return Err(AppleAuthError::Verification(format!(
                    "Claim 'aud' validation failed: expected '{}'",
                    self.expected_audience
                )));
            }
        }

        Ok(())
    }
}

fn key_component(value: Option<&String>, name: &str) -> Result<Vec<u8>, AppleAuthError> {
    let value = value
        .ok_or_else(|| AppleAuthError::Verification(format!("Signing key is missing '{name}'")))?;
    decode_segment(value)
        .map_err(|e| AppleAuthError::Verification(format!("Invalid key component '{name}': {e}")))
}

fn verify_rs256(message: &[u8], signature: &[u8], key: &JsonWebKey) -> Result<(), AppleAuthError> {
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::signature::Verifier;
    use rsa::{BigUint, RsaPublicKey};
    use sha2::Sha256;

    let n = key_component(key.n.as_ref(), "n")?;
    let e = key_component(key.e.as_ref(), "e")?;

    let public_key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
        .map_err(|e| AppleAuthError::Verification(format!("Invalid RSA key: {e}")))?;
    let signature = Signature::try_from(signature)
        .map_err(|e| AppleAuthError::Verification(format!("Invalid signature format: {e}")))?;

    VerifyingKey::<Sha256>::new(public_key)
        .verify(message, &signature)
        .map_err(|_| AppleAuthError::Verification("JWT signature verification failed".to_string()))
}

fn verify_es256(message: &[u8], signature: &[u8], key: &JsonWebKey) -> Result<(), AppleAuthError> {
    use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
    use p256::EncodedPoint;

    let x = key_component(key.x.as_ref(), "x")?;
    let y = key_component(key.y.as_ref(), "y")?;

    // Uncompressed SEC1 point: 0x04 || x || y
    let mut point = Vec::with_capacity(1 + x.len() + y.len());
    point.push(0x04);
    point.extend_from_slice(&x);
    point.extend_from_slice(&y);

    let encoded = EncodedPoint::from_bytes(&point)
        .map_err(|e| AppleAuthError::Verification(format!("Invalid EC point: {e}")))?;
    let verifying_key = VerifyingKey::from_encoded_point(&encoded)
        .map_err(|e| AppleAuthError::Verification(format!("Invalid ECDSA key: {e}")))?;
    let signature = Signature::from_slice(signature)
        .map_err(|e| AppleAuthError::Verification(format!("Invalid signature format: {e}")))?;

    verifying_key
        .verify(message, &signature)
        .map_err(|_| AppleAuthError::Verification("JWT signature verification failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::constants::{TEST_CLIENT_ID, TEST_JWK_KID};
    use crate::testing::fixtures::{apple_id_token_claims, signed_id_token, test_jwk, unsigned_token};
    use crate::testing::mock::MockAppleTokenEndpoint;
    use serde_json::json;

    const NOW: i64 = 1_780_000_000;

    fn verifier() -> IdTokenVerifier {
        IdTokenVerifier::new(
            JwtValidationSettings {
                enabled: true,
                ..Default::default()
            },
            "https://appleid.apple.com",
            "com.example.web",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn keys() -> JsonWebKeySet {
        JsonWebKeySet {
            keys: vec![test_jwk("TESTKID")],
        }
    }

    fn claims() -> Value {
        json!({
            "iss": "https://appleid.apple.com",
            "aud": "com.example.web",
            "exp": NOW + 600,
            "iat": NOW,
            "sub": "001.xyz",
        })
    }

    #[test]
    fn test_valid_token_is_accepted() {
        let token = signed_id_token(&claims(), "TESTKID");
        verifier().verify_with_key_set(&token, &keys(), NOW).unwrap();
    }

    #[test]
    fn test_audience_array_is_accepted() {
        let mut c = claims();
        c["aud"] = json!(["other", "com.example.web"]);
        let token = signed_id_token(&c, "TESTKID");
        assert!(verifier().verify_with_key_set(&token, &keys(), NOW).is_ok());
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let token = signed_id_token(&claims(), "TESTKID");
        let [header, _, signature] = split_jwt(&token).unwrap();
        let forged_payload = unsigned_token(&json!({"sub": "001.attacker"}));
        let [_, payload, _] = split_jwt(&forged_payload).unwrap();

        let forged = format!("{header}.{payload}.{signature}");
        assert!(matches!(
            verifier().verify_with_key_set(&forged, &keys(), NOW),
            Err(AppleAuthError::Verification(_))
        ));
    }

    #[test]
    fn test_unknown_kid_is_rejected() {
        let token = signed_id_token(&claims(), "ROTATED");
        assert!(verifier().verify_with_key_set(&token, &keys(), NOW).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = signed_id_token(&claims(), "TESTKID");
        let result = verifier().verify_with_key_set(&token, &keys(), NOW + 3600);
        assert!(result.unwrap_err().to_string().contains("expired"));
    }

    #[test]
    fn test_clock_skew_is_tolerated() {
        let token = signed_id_token(&claims(), "TESTKID");
        assert!(verifier().verify_with_key_set(&token, &keys(), NOW + 800).is_ok());
    }

    #[test]
    fn test_wrong_issuer_is_rejected() {
        let mut c = claims();
        c["iss"] = json!("https://evil.example");
        let token = signed_id_token(&c, "TESTKID");
        let err = verifier().verify_with_key_set(&token, &keys(), NOW).unwrap_err();
        assert!(err.to_string().contains("iss"));
    }

    #[test]
    fn test_wrong_audience_is_rejected() {
        let mut c = claims();
        c["aud"] = json!("com.other.app");
        let token = signed_id_token(&c, "TESTKID");
        let err = verifier().verify_with_key_set(&token, &keys(), NOW).unwrap_err();
        assert!(err.to_string().contains("aud"));
    }

    #[test]
    fn test_unsupported_algorithm() {
        let token = unsigned_token(&claims());
        let err = verifier().verify_with_key_set(&token, &keys(), NOW).unwrap_err();
        assert!(matches!(err, AppleAuthError::Verification(_)));
    }

    #[test]
    fn test_key_set_lookup() {
        let set = keys();
        assert!(set.find(Some("TESTKID")).is_some());
        assert!(set.find(Some("OTHER")).is_none());
        assert!(set.find(None).is_some());
    }

    #[actix_web::test]
    async fn test_verify_fetches_keys_from_jwks_uri() {
        let mock = MockAppleTokenEndpoint::start(200, "{}").await;
        let verifier = IdTokenVerifier::new(
            JwtValidationSettings {
                enabled: true,
                jwks_uri: mock.keys_url(),
                ..Default::default()
            },
            "https://appleid.apple.com",
            TEST_CLIENT_ID,
            Duration::from_secs(5),
        )
        .unwrap();

        let token = signed_id_token(&apple_id_token_claims(Utc::now().timestamp()), TEST_JWK_KID);
        verifier.verify(&token).await.unwrap();
        // Second call is served from the cache
        verifier.verify(&token).await.unwrap();
        assert_eq!(mock.keys_fetch_count(), 1);
    }

    #[test]
    fn test_far_future_expiry_does_not_overflow() {
        let mut c = claims();
        c["exp"] = json!(i64::MAX);
        c["nbf"] = json!(i64::MIN);
        let token = signed_id_token(&c, "TESTKID");
        assert!(verifier().verify_with_key_set(&token, &keys(), NOW).is_ok());
    }

    fn mock_verifier(mock: &MockAppleTokenEndpoint) -> IdTokenVerifier {
        IdTokenVerifier::new(
            JwtValidationSettings {
                enabled: true,
                jwks_uri: mock.keys_url(),
                ..Default::default()
            },
            "https://appleid.apple.com",
            TEST_CLIENT_ID,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[actix_web::test]
    async fn test_unknown_kids_do_not_refetch_within_interval() {
        let mock = MockAppleTokenEndpoint::start(200, "{}").await;
        let verifier = mock_verifier(&mock);
        let claims = apple_id_token_claims(Utc::now().timestamp());

        verifier
            .verify(&signed_id_token(&claims, TEST_JWK_KID))
            .await
            .unwrap();

        for i in 0..5 {
            let forged = signed_id_token(&claims, &format!("junk{i}"));
            assert!(matches!(
                verifier.verify(&forged).await,
                Err(AppleAuthError::Verification(_))
            ));
        }
        assert_eq!(mock.keys_fetch_count(), 1);
    }

    #[actix_web::test]
    async fn test_unknown_kid_refetches_after_interval() {
        let mock = MockAppleTokenEndpoint::start(200, "{}").await;
        let verifier = mock_verifier(&mock).with_refresh_interval(Duration::ZERO);
        let claims = apple_id_token_claims(Utc::now().timestamp());

        verifier
            .verify(&signed_id_token(&claims, TEST_JWK_KID))
            .await
            .unwrap();
        assert!(verifier.verify(&signed_id_token(&claims, "ROTATED")).await.is_err());
        assert_eq!(mock.keys_fetch_count(), 2);
    }

    #[actix_web::test]
    async fn test_unreachable_jwks_is_network_error() {
        let verifier = IdTokenVerifier::new(
            JwtValidationSettings {
                enabled: true,
                jwks_uri: "http://127.0.0.1:9/auth/keys".to_string(),
                ..Default::default()
            },
            "https://appleid.apple.com",
            TEST_CLIENT_ID,
            Duration::from_secs(2),
        )
        .unwrap();

        let token = signed_id_token(&apple_id_token_claims(Utc::now().timestamp()), TEST_JWK_KID);
        assert!(matches!(
            verifier.verify(&token).await,
            Err(AppleAuthError::Network(_))
        ));

        // The failure is not retried right away
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(err.to_string().contains("backoff"));
    }
}
