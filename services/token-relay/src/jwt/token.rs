//! Type-state identity token.
//!
//! An [`IdToken<Unverified>`] only exposes its header. Claims become
//! readable once [`IdToken::verify`] has checked the signature against the
//! IDP key set and validated issuer, audience and lifetime.

use std::marker::PhantomData;

use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header};
use serde_json::{Map, Value};

use crate::error::TokenVerificationError;
use crate::jwt::jwk_cache::JwkCache;
use crate::keys;

/// Clock skew tolerated on `exp` and `nbf`.
pub const LEEWAY_SECONDS: u64 = 60;

mod private {
    pub trait Sealed {}
}

/// Marker trait for token validation states
pub trait TokenState: private::Sealed {
    /// Human-readable state name for debugging
    fn state_name() -> &'static str;
}

/// Parsed, nothing checked
#[derive(Debug)]
pub struct Unverified;
impl private::Sealed for Unverified {}
impl TokenState for Unverified {
    fn state_name() -> &'static str {
        "Unverified"
    }
}

/// Signature and claims verified
#[derive(Debug)]
pub struct Verified;
impl private::Sealed for Verified {}
impl TokenState for Verified {
    fn state_name() -> &'static str {
        "Verified"
    }
}

/// What the IDP identity token must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationExpectations {
    /// Expected `iss`
    pub issuer: String,
    /// Required `aud` member
    pub audience: String,
}

impl VerificationExpectations {
    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = LEEWAY_SECONDS;
        validation
    }
}

/// An identity token in state `S`.
#[derive(Debug)]
pub struct IdToken<S: TokenState> {
    raw: String,
    header: Header,
    claims: Map<String, Value>,
    _state: PhantomData<S>,
}

impl IdToken<Unverified> {
    /// Parses the protected header of a compact JWT.
    ///
    /// # Errors
    ///
    /// Returns [`TokenVerificationError::Malformed`] if the header cannot be
    /// decoded.
    pub fn parse(raw: &str) -> Result<Self, TokenVerificationError> {
        let header = decode_header(raw)
            .map_err(|e| TokenVerificationError::Malformed(format!("invalid header: {e}")))?;

        Ok(Self {
            raw: raw.to_string(),
            header,
            claims: Map::new(),
            _state: PhantomData,
        })
    }

    /// Key id from the header.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Algorithm from the header.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.header.alg
    }

    /// Verifies the signature with the IDP key named by `kid` and validates
    /// `iss`, `aud`, `exp` and `nbf`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenVerificationError`] describing the first failed check.
    pub async fn verify(
        self,
        cache: &JwkCache,
        expected: &VerificationExpectations,
    ) -> Result<IdToken<Verified>, TokenVerificationError> {
        let algorithm = self.header.alg;
        if !keys::is_supported(algorithm) {
            return Err(TokenVerificationError::DisallowedAlgorithm(
                keys::algorithm_name(algorithm).to_string(),
            ));
        }

        let kid = self.kid().ok_or(TokenVerificationError::MissingKeyId)?;
        let key = cache.get_key(kid).await?;
        if !key.permits(algorithm) {
            return Err(TokenVerificationError::DisallowedAlgorithm(format!(
                "{} does not match key {kid}",
                keys::algorithm_name(algorithm)
            )));
        }

        let validation = expected.validation(algorithm);
        let raw = self.raw.clone();
        let claims = tokio::task::spawn_blocking(move || {
            decode::<Map<String, Value>>(&raw, key.decoding_key(), &validation)
                .map(|data| data.claims)
        })
        .await
        .map_err(|e| TokenVerificationError::Malformed(format!("verification task failed: {e}")))??;

        Ok(IdToken {
            raw: self.raw,
            header: self.header,
            claims,
            _state: PhantomData,
        })
    }
}

impl IdToken<Verified> {
    /// Verified claims.
    #[must_use]
    pub const fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Consumes the token, returning its claims.
    #[must_use]
    pub fn into_claims(self) -> Map<String, Value> {
        self.claims
    }
}

impl<S: TokenState> IdToken<S> {
    /// Get the current state name
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        S::state_name()
    }
}
