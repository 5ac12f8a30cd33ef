//! Token exchange orchestrator.
//!
//! Validates the caller, exchanges the authorization code at the IDP using a
//! `private_key_jwt` client assertion, verifies the returned identity token
//! and swaps it for one re-signed by the relay.

use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, instrument, warn};

use super::request::{TokenGrant, TokenRequest};
use super::stage::ExchangeStage;
use super::upstream::UpstreamClient;
use crate::config::Config;
use crate::error::RelayError;
use crate::http_client::{HttpClientConfig, build_http_client};
use crate::jwt::{
    ClientAssertionBuilder, IdToken, IdTokenResigner, JwkCache, NONCE_CLAIM, TokenSigner,
    VerificationExpectations,
};
use crate::keys::{KeySelector, load_signing_key};

/// Field of the token set carrying the identity token.
pub const ID_TOKEN_FIELD: &str = "id_token";

/// The exchange pipeline. Built once at startup and shared by all requests.
#[derive(Debug)]
pub struct TokenExchange {
    config: Arc<Config>,
    assertion: ClientAssertionBuilder,
    upstream: UpstreamClient,
    jwk_cache: JwkCache,
    expectations: VerificationExpectations,
    resigner: IdTokenResigner,
}

impl TokenExchange {
    /// Builds the pipeline with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or a signing key
    /// cannot be imported.
    pub fn new(config: Arc<Config>) -> Result<Self, RelayError> {
        let http_client =
            build_http_client(&HttpClientConfig::from(config.as_ref())).map_err(|e| {
                RelayError::Internal(anyhow::Error::new(e).context("failed to build HTTP client"))
            })?;
        Self::with_http_client(config, http_client)
    }

    /// Builds the pipeline on an existing HTTP client. Both signing keys are
    /// imported here so a bad key fails startup rather than a request.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::KeyImport`] if a signing key cannot be imported.
    pub fn with_http_client(
        config: Arc<Config>,
        http_client: reqwest::Client,
    ) -> Result<Self, RelayError> {
        let rp_key = load_signing_key(&config, KeySelector::RelyingParty(config.rp.algorithm))?;
        let relay_key = load_signing_key(&config, KeySelector::Intermediary)?;

        info!(
            rp_alg = ?rp_key.algorithm(),
            rp_kid = ?rp_key.kid(),
            intermediary_alg = ?relay_key.algorithm(),
            intermediary_kid = ?relay_key.kid(),
            "Signing keys loaded"
        );

        let assertion = ClientAssertionBuilder::from_config(&config, TokenSigner::new(rp_key));
        let resigner = IdTokenResigner::from_config(&config, TokenSigner::new(relay_key));
        let upstream = UpstreamClient::new(http_client.clone(), config.idp.token_url.clone());
        let jwk_cache = JwkCache::new(
            http_client,
            config.idp.jwks_url.clone(),
            config.jwks_cache_ttl,
        );
        let expectations = VerificationExpectations {
            issuer: config.idp.expected_issuer(),
            audience: config.idp.client_id.clone(),
        };

        Ok(Self {
            config,
            assertion,
            upstream,
            jwk_cache,
            expectations,
            resigner,
        })
    }

    /// IDP key-set cache.
    #[must_use]
    pub const fn jwk_cache(&self) -> &JwkCache {
        &self.jwk_cache
    }

    /// Checks the caller's identity: `client_id` must be present, a
    /// `client_secret`, if sent, must match the configured one, and
    /// `client_id` must be the configured RP.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MissingClientId`],
    /// [`RelayError::ClientAuthFailed`] or [`RelayError::InvalidClientId`].
    pub fn validate(&self, request: &TokenRequest) -> Result<(), RelayError> {
        let client_id = request
            .client_id
            .as_deref()
            .ok_or(RelayError::MissingClientId)?;

        if let Some(secret) = request.client_secret.as_deref() {
            let matches = self.config.client_secret.as_ref().is_some_and(|expected| {
                bool::from(expected.expose_secret().as_bytes().ct_eq(secret.as_bytes()))
            });
            if !matches {
                warn!("Client secret mismatch");
                return Err(RelayError::ClientAuthFailed);
            }
        }

        if client_id != self.config.rp.client_id {
            warn!(client_id = %client_id, "Unknown client_id");
            return Err(RelayError::InvalidClientId);
        }
        Ok(())
    }

    /// Runs one exchange and returns the token set to send back: the
    /// upstream body with `id_token` re-signed and any top-level `nonce`
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns the [`RelayError`] of the first failing step. Nothing is
    /// retried.
    #[instrument(skip_all, fields(correlation_id = %uuid::Uuid::new_v4()))]
    pub async fn exchange(&self, request: TokenRequest) -> Result<Map<String, Value>, RelayError> {
        let mut stage = ExchangeStage::Received;
        debug!(stage = %stage, "Exchange started");

        match self.run(&request, &mut stage).await {
            Ok(body) => {
                advance(&mut stage);
                Ok(body)
            }
            Err(err) => {
                let terminal = ExchangeStage::terminal_for(&err);
                debug!(from = %stage, to = %terminal, code = err.code().as_str(), "Exchange stopped");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        request: &TokenRequest,
        stage: &mut ExchangeStage,
    ) -> Result<Map<String, Value>, RelayError> {
        self.validate(request)?;
        advance(stage);

        let assertion = self.assertion.build().await?;
        advance(stage);

        let grant = TokenGrant::new(&self.config.rp.client_id, &assertion, request);
        let mut body = self.upstream.exchange(&grant).await?;
        advance(stage);

        let raw = body
            .get(ID_TOKEN_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RelayError::MalformedUpstreamResponse("token response has no id_token".to_string())
            })?;
        let verified = IdToken::parse(raw)?
            .verify(&self.jwk_cache, &self.expectations)
            .await?;
        advance(stage);

        let resigned = self.resigner.resign(verified).await?;
        advance(stage);

        body.insert(ID_TOKEN_FIELD.to_string(), Value::String(resigned));
        body.remove(NONCE_CLAIM);
        Ok(body)
    }
}

fn advance(stage: &mut ExchangeStage) {
    if let Some(next) = stage.next() {
        debug!(from = %stage, to = %next, "Exchange stage");
        *stage = next;
    }
}
