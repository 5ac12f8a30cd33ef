//! `private_key_jwt` client assertion.

use tracing::debug;

use super::claims::{ClientAssertionClaims, now_timestamp};
use super::signer::TokenSigner;
use crate::config::Config;
use crate::error::RelayError;

/// Value of the `client_assertion_type` form parameter.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Builds the JWT the relay authenticates to the IDP with.
#[derive(Debug, Clone)]
pub struct ClientAssertionBuilder {
    client_id: String,
    audience: Vec<String>,
    signer: TokenSigner,
}

impl ClientAssertionBuilder {
    /// Builder for `client_id` with an explicit audience.
    #[must_use]
    pub const fn new(client_id: String, audience: Vec<String>, signer: TokenSigner) -> Self {
        Self {
            client_id,
            audience,
            signer,
        }
    }

    /// Builder for the configured RP. The audience is exactly the IDP origin
    /// and the IDP token endpoint.
    #[must_use]
    pub fn from_config(config: &Config, signer: TokenSigner) -> Self {
        Self::new(
            config.rp.client_id.clone(),
            vec![config.idp.origin(), config.idp.token_endpoint_url()],
            signer,
        )
    }

    /// Claims for an assertion issued at `now`.
    #[must_use]
    pub fn claims_at(&self, now: i64) -> ClientAssertionClaims {
        ClientAssertionClaims::new(&self.client_id, self.audience.clone(), now)
    }

    /// Signs a fresh assertion.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Signing`] if signing fails.
    pub async fn build(&self) -> Result<String, RelayError> {
        let claims = self.claims_at(now_timestamp());
        debug!(jti = %claims.jti, "Signing client assertion");
        self.signer.sign(self.signer.header(), &claims).await
    }
}
