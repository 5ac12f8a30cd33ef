//! JWT claim types and lifetimes.

use serde::{Deserialize, Serialize};

/// Lifetime of every JWT the relay issues.
pub const TOKEN_TTL_SECONDS: i64 = 120;

/// Single-use claim bound to the RP-to-IDP leg; never re-issued.
pub const NONCE_CLAIM: &str = "nonce";

/// Current Unix time in seconds.
#[must_use]
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A fresh random token id (UUID v4, 122 random bits).
#[must_use]
pub fn new_jti() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Claims of the `private_key_jwt` client assertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientAssertionClaims {
    /// The RP client id
    pub iss: String,
    /// The RP client id
    pub sub: String,
    /// IDP origin and token endpoint
    pub aud: Vec<String>,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

impl ClientAssertionClaims {
    /// Assertion for `client_id` issued at `issued_at`.
    #[must_use]
    pub fn new(client_id: &str, audience: Vec<String>, issued_at: i64) -> Self {
        Self {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: audience,
            iat: issued_at,
            exp: issued_at + TOKEN_TTL_SECONDS,
            jti: new_jti(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_claims_creation() {
        let claims = ClientAssertionClaims::new("rp-123", vec!["aud".to_string()], 1_000);

        assert_eq!(claims.iss, "rp-123");
        assert_eq!(claims.sub, "rp-123");
        assert_eq!(claims.exp - claims.iat, 120);
        assert_eq!(claims.jti.len(), 36);
    }

    #[test]
    fn test_jti_unique() {
        assert_ne!(new_jti(), new_jti());
    }
}
