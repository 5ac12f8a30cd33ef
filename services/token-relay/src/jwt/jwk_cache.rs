//! IDP key-set cache with single-flight refresh.
//!
//! Keys are held in memory for the configured TTL. A lookup for a `kid` that
//! is not cached (or a stale cache) triggers one refresh; concurrent callers
//! share the same in-flight fetch.

use arc_swap::ArcSwapOption;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use jsonwebtoken::{Algorithm, DecodingKey};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::TokenVerificationError;
use crate::jwks::{Jwk, Jwks};
use crate::keys;

/// Base64url length of a 2048-bit modulus.
const MIN_RSA_MODULUS_B64_LEN: usize = 342;

/// Key family a JWK can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// RSA, usable for `RS*` and `PS*`
    Rsa,
    /// EC on P-256
    EcP256,
    /// EC on P-384
    EcP384,
    /// OKP Ed25519
    Ed25519,
}

impl KeyFamily {
    /// Returns true if a key of this family can verify `algorithm`.
    #[must_use]
    pub const fn accepts(self, algorithm: Algorithm) -> bool {
        match self {
            Self::Rsa => matches!(
                algorithm,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            Self::EcP256 => matches!(algorithm, Algorithm::ES256),
            Self::EcP384 => matches!(algorithm, Algorithm::ES384),
            Self::Ed25519 => matches!(algorithm, Algorithm::EdDSA),
        }
    }
}

/// A verification key taken from the IDP key set.
#[derive(Clone)]
pub struct CachedKey {
    key: DecodingKey,
    family: KeyFamily,
    algorithm: Option<Algorithm>,
}

impl CachedKey {
    /// The decoding key.
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }

    /// Key family.
    #[must_use]
    pub const fn family(&self) -> KeyFamily {
        self.family
    }

    /// Returns true if this key may verify a token signed with `algorithm`.
    #[must_use]
    pub fn permits(&self, algorithm: Algorithm) -> bool {
        self.family.accepts(algorithm) && self.algorithm.is_none_or(|pinned| pinned == algorithm)
    }
}

impl fmt::Debug for CachedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedKey")
            .field("family", &self.family)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

struct CacheEntry {
    keys: HashMap<String, CachedKey>,
    fetched_at: Instant,
}

type InflightFuture =
    Shared<BoxFuture<'static, Result<Arc<CacheEntry>, TokenVerificationError>>>;

/// In-memory IDP key-set cache.
pub struct JwkCache {
    entry: Arc<ArcSwapOption<CacheEntry>>,
    jwks_url: Url,
    ttl: Duration,
    inflight: Arc<Mutex<Option<InflightFuture>>>,
    http_client: reqwest::Client,
}

impl fmt::Debug for JwkCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwkCache")
            .field("jwks_url", &self.jwks_url.as_str())
            .field("ttl", &self.ttl)
            .field("keys", &self.local_key_count())
            .finish_non_exhaustive()
    }
}

impl JwkCache {
    /// Creates an empty cache that fetches from `jwks_url`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, jwks_url: Url, ttl: Duration) -> Self {
        Self {
            entry: Arc::new(ArcSwapOption::empty()),
            jwks_url,
            ttl,
            inflight: Arc::new(Mutex::new(None)),
            http_client,
        }
    }

    /// Gets the verification key for `kid`, refreshing once if it is not
    /// cached or the cache is stale.
    ///
    /// # Errors
    ///
    /// Returns [`TokenVerificationError::KeySetFetch`] if a needed refresh
    /// fails and [`TokenVerificationError::UnknownKey`] if the key is still
    /// absent afterwards.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<CachedKey, TokenVerificationError> {
        if let Some(key) = self.try_get_local(kid) {
            return Ok(key);
        }

        debug!("Key not cached, refreshing IDP key set");
        let entry = self.refresh_single_flight().await?;

        entry
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| TokenVerificationError::UnknownKey {
                kid: kid.to_string(),
            })
    }

    fn try_get_local(&self, kid: &str) -> Option<CachedKey> {
        let guard = self.entry.load();
        let entry = (*guard).as_ref()?;
        if entry.fetched_at.elapsed() < self.ttl {
            entry.keys.get(kid).cloned()
        } else {
            None
        }
    }

    /// Checks if the cache is empty or older than the TTL.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        let guard = self.entry.load();
        (*guard)
            .as_ref()
            .is_none_or(|entry| entry.fetched_at.elapsed() >= self.ttl)
    }

    /// Number of cached keys.
    #[must_use]
    pub fn local_key_count(&self) -> usize {
        let guard = self.entry.load();
        (*guard).as_ref().map_or(0, |entry| entry.keys.len())
    }

    /// Drops the cached set and fetches it again.
    ///
    /// # Errors
    ///
    /// Returns [`TokenVerificationError::KeySetFetch`] if the fetch fails.
    pub async fn force_refresh(&self) -> Result<(), TokenVerificationError> {
        self.entry.store(None);
        self.refresh_single_flight().await.map(|_| ())
    }

    /// Only one fetch runs at a time; late callers await the running one.
    /// The in-flight slot is cleared by the fetch itself, so a caller that
    /// gives up early cannot leave a finished future behind.
    async fn refresh_single_flight(&self) -> Result<Arc<CacheEntry>, TokenVerificationError> {
        let mut inflight_guard = self.inflight.lock().await;

        if let Some(fut) = inflight_guard.as_ref() {
            let fut = fut.clone();
            drop(inflight_guard);
            return fut.await;
        }

        let url = self.jwks_url.clone();
        let client = self.http_client.clone();
        let entry_slot = Arc::clone(&self.entry);
        let inflight = Arc::clone(&self.inflight);

        let fut: BoxFuture<'static, Result<Arc<CacheEntry>, TokenVerificationError>> =
            Box::pin(async move {
                let result = fetch_key_set(&client, &url).await.map(|keys| {
                    let entry = Arc::new(CacheEntry {
                        keys,
                        fetched_at: Instant::now(),
                    });
                    entry_slot.store(Some(Arc::clone(&entry)));
                    info!(keys = entry.keys.len(), "IDP key set cache updated");
                    entry
                });
                inflight.lock().await.take();
                result
            });

        let shared = fut.shared();
        *inflight_guard = Some(shared.clone());
        drop(inflight_guard);

        shared.await
    }
}

async fn fetch_key_set(
    client: &reqwest::Client,
    url: &Url,
) -> Result<HashMap<String, CachedKey>, TokenVerificationError> {
    info!(url = %url, "Fetching IDP key set");

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| TokenVerificationError::KeySetFetch {
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(TokenVerificationError::KeySetFetch {
            reason: format!("key set fetch failed with status: {}", response.status()),
        });
    }

    let jwks: Jwks = response
        .json()
        .await
        .map_err(|e| TokenVerificationError::KeySetFetch {
            reason: format!("failed to parse key set: {e}"),
        })?;

    let mut keys = HashMap::with_capacity(jwks.keys.len());
    for jwk in &jwks.keys {
        let Some(kid) = jwk.kid.as_deref() else {
            warn!(kty = %jwk.kty, "Skipping IDP key without kid");
            continue;
        };
        if let Some(key) = jwk_to_cached_key(jwk) {
            keys.insert(kid.to_string(), key);
        }
    }
    Ok(keys)
}

/// Converts a JWK into a verification key, rejecting symmetric keys, RSA
/// moduli under 2048 bits, and curves other than P-256, P-384 and Ed25519.
#[must_use]
pub fn jwk_to_cached_key(jwk: &Jwk) -> Option<CachedKey> {
    let kid = jwk.kid.as_deref().unwrap_or_default();

    if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
        debug!(kid = %kid, "Skipping non-signing key");
        return None;
    }

    let algorithm = match jwk.alg.as_deref() {
        None => None,
        Some(name) => match Algorithm::from_str(name) {
            Ok(alg) if keys::is_supported(alg) => Some(alg),
            _ => {
                warn!(kid = %kid, alg = %name, "Unsupported key algorithm, rejecting");
                return None;
            }
        },
    };

    let (family, key) = match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_deref()?;
            let e = jwk.e.as_deref()?;
            if n.trim_end_matches('=').len() < MIN_RSA_MODULUS_B64_LEN {
                warn!(kid = %kid, "RSA key too small, rejecting");
                return None;
            }
            (KeyFamily::Rsa, DecodingKey::from_rsa_components(n, e).ok()?)
        }
        "EC" => {
            let x = jwk.x.as_deref()?;
            let y = jwk.y.as_deref()?;
            let family = match jwk.crv.as_deref() {
                Some("P-256") => KeyFamily::EcP256,
                Some("P-384") => KeyFamily::EcP384,
                crv => {
                    warn!(kid = %kid, crv = ?crv, "Unsupported EC curve, rejecting");
                    return None;
                }
            };
            (family, DecodingKey::from_ec_components(x, y).ok()?)
        }
        "OKP" => {
            if jwk.crv.as_deref() != Some("Ed25519") {
                warn!(kid = %kid, crv = ?jwk.crv, "Unsupported OKP curve, rejecting");
                return None;
            }
            let x = jwk.x.as_deref()?;
            (KeyFamily::Ed25519, DecodingKey::from_ed_components(x).ok()?)
        }
        other => {
            warn!(kid = %kid, kty = %other, "Unsupported key type");
            return None;
        }
    };

    if let Some(alg) = algorithm {
        if !family.accepts(alg) {
            warn!(kid = %kid, alg = ?alg, "Key algorithm does not match key type, rejecting");
            return None;
        }
    }

    Some(CachedKey {
        key,
        family,
        algorithm,
    })
}
