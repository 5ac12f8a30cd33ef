//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Value, json};
use token_relay::Config;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const RP_ID: &str = "rp-123";
pub const IDP_DOMAIN: &str = "idp.example.com";
pub const IDP_CLIENT_ID: &str = "relay-client";
pub const INTERMEDIARY_DOMAIN: &str = "relay.example.com";
pub const CLIENT_SECRET: &str = "s3cret";

pub const IDP_ISSUER: &str = "https://idp.example.com/";
pub const RELAY_ISSUER: &str = "https://relay.example.com/";

pub const JWKS_PATH: &str = "/.well-known/jwks.json";

pub fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).unwrap()
}

/// Complete environment for a relay pointed at `idp_base_url`.
pub fn base_vars(idp_base_url: &str) -> HashMap<String, String> {
    [
        ("RP_ID", RP_ID.to_string()),
        ("RP_ALG", "RS256".to_string()),
        ("KEY_RS256", fixture("rp_rs256.pem")),
        ("KID_RS256", "rp-rs256-1".to_string()),
        ("KEY_ES256", fixture("rp_es256.pem")),
        ("KID_ES256", "rp-es256-1".to_string()),
        ("IDP_DOMAIN", IDP_DOMAIN.to_string()),
        ("IDP_CLIENT_ID", IDP_CLIENT_ID.to_string()),
        ("IDP_BASE_URL", idp_base_url.to_string()),
        ("INTERMEDIARY_DOMAIN", INTERMEDIARY_DOMAIN.to_string()),
        ("INTERMEDIARY_PRIVATE_KEY", fixture("intermediary_rs256.pem")),
        ("INTERMEDIARY_KID", "relay-rs256-1".to_string()),
        ("CLIENT_SECRET", CLIENT_SECRET.to_string()),
        ("RP_JWKS_FILE", fixture_path("relying_party_jwks.json")),
        ("INTERMEDIARY_JWKS_FILE", fixture_path("intermediary_jwks.json")),
        ("UPSTREAM_TIMEOUT", "5".to_string()),
        ("UPSTREAM_CONNECT_TIMEOUT", "2".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub fn config_from(vars: &HashMap<String, String>) -> Arc<Config> {
    Arc::new(Config::from_lookup(|name| vars.get(name).cloned()).unwrap())
}

pub fn test_config(idp_base_url: &str) -> Arc<Config> {
    config_from(&base_vars(idp_base_url))
}

/// Claims the IDP puts in a fresh identity token.
pub fn idp_claims(nonce: Option<&str>) -> Value {
    let now = chrono::Utc::now().timestamp();
    let mut claims = json!({
        "iss": IDP_ISSUER,
        "aud": IDP_CLIENT_ID,
        "sub": "auth0|user-1",
        "email": "user@example.com",
        "email_verified": true,
        "iat": now,
        "exp": now + 3600,
    });
    if let Some(nonce) = nonce {
        claims["nonce"] = json!(nonce);
    }
    claims
}

/// Identity token signed with an IDP fixture key.
pub fn mint_id_token(key_fixture: &str, kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(fixture(key_fixture).as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

/// Payload of a compact JWT, without checking the signature.
pub fn decode_payload(token: &str) -> Value {
    let payload = token.split('.').nth(1).unwrap();
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
}

/// Verifies a relay-issued identity token with the published relay key.
pub fn verify_relay_token(token: &str) -> Value {
    let key = DecodingKey::from_rsa_pem(fixture("intermediary_rs256.pub.pem").as_bytes()).unwrap();
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[RELAY_ISSUER]);
    validation.set_audience(&[IDP_CLIENT_ID]);
    jsonwebtoken::decode::<Value>(token, &key, &validation)
        .unwrap()
        .claims
}

/// Verifies a client assertion with the RP's RS256 public key.
pub fn verify_client_assertion(token: &str) -> Value {
    let key = DecodingKey::from_rsa_pem(fixture("rp_rs256.pub.pem").as_bytes()).unwrap();
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[IDP_ISSUER]);
    jsonwebtoken::decode::<Value>(token, &key, &validation)
        .unwrap()
        .claims
}

pub async fn mount_jwks(server: &MockServer, fixture_name: &str) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(fixture(fixture_name), "application/json"),
        )
        .mount(server)
        .await;
}

/// Upstream token set wrapping `id_token`.
pub fn token_set(id_token: &str) -> Value {
    json!({
        "access_token": "upstream-access-token",
        "refresh_token": "upstream-refresh-token",
        "token_type": "Bearer",
        "expires_in": 86400,
        "scope": "openid profile email",
        "id_token": id_token,
    })
}

pub fn form_fields(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}
