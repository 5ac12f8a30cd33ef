//! JWT signing.
//!
//! Signing runs on the blocking pool so RSA operations never stall the
//! async workers serving other requests.

use jsonwebtoken::Header;
use serde::Serialize;
use std::sync::Arc;

use crate::error::RelayError;
use crate::keys::SigningKey;

/// Signs compact JWTs with one imported key.
#[derive(Debug, Clone)]
pub struct TokenSigner {
    key: Arc<SigningKey>,
}

impl TokenSigner {
    /// Wraps an imported key.
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self { key: Arc::new(key) }
    }

    /// The key this signer uses.
    #[must_use]
    pub fn key(&self) -> &SigningKey {
        &self.key
    }

    /// Protected header with the key's algorithm, `kid` (when set) and
    /// `typ: JWT`.
    #[must_use]
    pub fn header(&self) -> Header {
        let mut header = Header::new(self.key.algorithm());
        header.kid = self.key.kid().map(str::to_string);
        header
    }

    /// Signs `claims` under `header`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Signing`] if the claims cannot be serialized or
    /// the signature cannot be produced.
    pub async fn sign<T: Serialize>(&self, header: Header, claims: &T) -> Result<String, RelayError> {
        let payload =
            serde_json::to_value(claims).map_err(|e| RelayError::Signing(e.to_string()))?;
        let key = Arc::clone(&self.key);

        tokio::task::spawn_blocking(move || {
            jsonwebtoken::encode(&header, &payload, key.encoding_key())
        })
        .await
        .map_err(|e| RelayError::Signing(format!("signing task failed: {e}")))?
        .map_err(|e| RelayError::Signing(e.to_string()))
    }
}
