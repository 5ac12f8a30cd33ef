//! Static key sets served by the relay.
//!
//! `/.well-known/keys` carries the RP public keys the IDP uses to check
//! client assertions; `/intermediary.jwks` carries the relay key the RP uses
//! to check re-signed identity tokens. Both are read once at startup.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use super::Jwks;
use crate::config::Config;
use crate::error::RelayError;

/// The two published key sets.
#[derive(Debug, Clone, Default)]
pub struct PublishedKeySets {
    relying_party: Arc<Jwks>,
    intermediary: Arc<Jwks>,
}

impl PublishedKeySets {
    /// Wraps already-parsed key sets.
    #[must_use]
    pub fn new(relying_party: Jwks, intermediary: Jwks) -> Self {
        Self {
            relying_party: Arc::new(relying_party),
            intermediary: Arc::new(intermediary),
        }
    }

    /// Loads both key sets from the files named in `config`. A set without
    /// a configured file is published empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured file cannot be read or parsed.
    pub fn load(config: &Config) -> Result<Self, RelayError> {
        let relying_party = load_key_set(config.rp_jwks_file.as_deref())?;
        let intermediary = load_key_set(config.intermediary_jwks_file.as_deref())?;

        let rp_kid = config
            .rp
            .key_slot(config.rp.algorithm)
            .and_then(|slot| slot.kid.as_deref());
        warn_if_unpublished("relying party", &relying_party, rp_kid);
        warn_if_unpublished(
            "intermediary",
            &intermediary,
            config.intermediary.key.kid.as_deref(),
        );

        info!(
            rp_keys = relying_party.keys.len(),
            intermediary_keys = intermediary.keys.len(),
            "Published key sets loaded"
        );
        Ok(Self::new(relying_party, intermediary))
    }

    /// Key set served at `/.well-known/keys`.
    #[must_use]
    pub fn relying_party(&self) -> &Jwks {
        &self.relying_party
    }

    /// Key set served at `/intermediary.jwks`.
    #[must_use]
    pub fn intermediary(&self) -> &Jwks {
        &self.intermediary
    }
}

/// Reads a JWKS document, or an empty set when `path` is `None`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JWKS document.
pub fn load_key_set(path: Option<&Path>) -> Result<Jwks, RelayError> {
    let Some(path) = path else {
        return Ok(Jwks::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read key set {}", path.display()))?;
    let jwks = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse key set {}", path.display()))?;
    Ok(jwks)
}

fn warn_if_unpublished(name: &str, jwks: &Jwks, kid: Option<&str>) {
    if let Some(kid) = kid {
        if !jwks.contains_kid(kid) {
            warn!(key_set = name, kid, "Configured kid is not in the published key set");
        }
    }
}
