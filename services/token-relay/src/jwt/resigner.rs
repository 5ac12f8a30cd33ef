//! Re-issues a verified identity token under the relay's own identity.

use serde_json::{Map, Value};
use tracing::debug;

use super::claims::{NONCE_CLAIM, TOKEN_TTL_SECONDS, new_jti, now_timestamp};
use super::signer::TokenSigner;
use super::token::{IdToken, Verified};
use crate::config::Config;
use crate::error::RelayError;

/// Signs verified identity-token claims as the intermediary.
#[derive(Debug, Clone)]
pub struct IdTokenResigner {
    issuer: String,
    audience: String,
    signer: TokenSigner,
}

impl IdTokenResigner {
    /// Re-signer with explicit issuer and audience.
    #[must_use]
    pub const fn new(issuer: String, audience: String, signer: TokenSigner) -> Self {
        Self {
            issuer,
            audience,
            signer,
        }
    }

    /// Issuer is the intermediary origin; audience is the IDP client id.
    #[must_use]
    pub fn from_config(config: &Config, signer: TokenSigner) -> Self {
        Self::new(
            config.intermediary.issuer(),
            config.idp.client_id.clone(),
            signer,
        )
    }

    /// Issuer stamped on re-signed tokens.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Rewrites `claims` for re-issue at `now`: drops `nonce`, replaces
    /// `iss` and `aud`, and sets a fresh `iat`, `exp` and `jti`. Every other
    /// claim is kept as-is.
    #[must_use]
    pub fn resign_claims(&self, mut claims: Map<String, Value>, now: i64) -> Map<String, Value> {
        claims.remove(NONCE_CLAIM);
        claims.insert("iss".to_string(), Value::String(self.issuer.clone()));
        claims.insert("aud".to_string(), Value::String(self.audience.clone()));
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert("exp".to_string(), Value::from(now + TOKEN_TTL_SECONDS));
        claims.insert("jti".to_string(), Value::String(new_jti()));
        claims
    }

    /// Signs the transformed claims of `token`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Signing`] if signing fails.
    pub async fn resign(&self, token: IdToken<Verified>) -> Result<String, RelayError> {
        let claims = self.resign_claims(token.into_claims(), now_timestamp());
        debug!(jti = ?claims.get("jti"), "Re-signing identity token");
        self.signer.sign(self.signer.header(), &claims).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeySlot;
    use crate::keys::import_slot;
    use jsonwebtoken::Algorithm;
    use secrecy::SecretString;
    use serde_json::json;

    fn resigner() -> IdTokenResigner {
        let slot = KeySlot {
            pem: SecretString::from(
                include_str!("../../tests/fixtures/intermediary_rs256.pem").to_string(),
            ),
            kid: Some("relay-rs256-1".to_string()),
        };
        IdTokenResigner::new(
            "https://relay.example.com/".to_string(),
            "relay-client".to_string(),
            TokenSigner::new(import_slot(&slot, Algorithm::RS256).unwrap()),
        )
    }

    fn upstream_claims() -> Map<String, Value> {
        json!({
            "iss": "https://idp.example.com/",
            "aud": ["relay-client", "other"],
            "sub": "user-1",
            "nonce": "abc",
            "email": "user@example.com",
            "jti": "upstream-jti",
            "iat": 1,
            "exp": 2,
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_resign_claims_rewrites_identity() {
        let claims = resigner().resign_claims(upstream_claims(), 1_000);

        assert!(!claims.contains_key("nonce"));
        assert_eq!(claims["iss"], "https://relay.example.com/");
        assert_eq!(claims["aud"], "relay-client");
        assert_eq!(claims["iat"], 1_000);
        assert_eq!(claims["exp"], 1_120);
        assert_ne!(claims["jti"], "upstream-jti");
        assert_eq!(claims["sub"], "user-1");
        assert_eq!(claims["email"], "user@example.com");
    }

    #[test]
    fn test_resign_claims_without_nonce() {
        let mut claims = upstream_claims();
        claims.remove("nonce");
        let out = resigner().resign_claims(claims, 5);
        assert!(!out.contains_key("nonce"));
        assert_eq!(out.len(), upstream_claims().len() - 1);
    }

    #[test]
    fn test_fresh_jti_per_call() {
        let resigner = resigner();
        let a = resigner.resign_claims(upstream_claims(), 10);
        let b = resigner.resign_claims(upstream_claims(), 10);
        assert_ne!(a["jti"], b["jti"]);
    }
}
