//! JSON Web Key Set documents.
//!
//! The same [`Jwks`] shape is used for the IDP key set the relay fetches and
//! for the two static key sets it publishes.

pub mod publisher;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use publisher::PublishedKeySets;

/// JSON Web Key structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (RSA, EC, OKP)
    pub kty: String,
    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// RSA modulus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// EC / OKP x coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// EC / OKP curve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Members this type does not model (`x5c`, `x5t`, ...), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// JSON Web Key Set structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Jwks {
    /// List of keys
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Finds the key with `kid`.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// Returns true if a key with `kid` is present.
    #[must_use]
    pub fn contains_kid(&self, kid: &str) -> bool {
        self.find(kid).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_members_survive_round_trip() {
        let raw = r#"{"keys":[{"kty":"RSA","kid":"k1","n":"abc","e":"AQAB","x5t":"thumb"}]}"#;
        let jwks: Jwks = serde_json::from_str(raw).unwrap();

        assert!(jwks.contains_kid("k1"));
        assert!(!jwks.contains_kid("k2"));
        let out = serde_json::to_value(&jwks).unwrap();
        assert_eq!(out["keys"][0]["x5t"], "thumb");
        assert!(out["keys"][0].get("crv").is_none());
    }
}
