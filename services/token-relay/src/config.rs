//! Type-Safe Configuration with Validation
//!
//! The relay reads its settings once at startup into an immutable [`Config`]
//! that is shared as `Arc<Config>`. Per-algorithm key slots are resolved
//! eagerly, so a missing slot for the configured algorithm fails before the
//! first request is served.

use jsonwebtoken::Algorithm;
use secrecy::SecretString;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::keys::{SUPPORTED_ALGORITHMS, algorithm_name, is_supported};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Variable holding the URL
        field: String,
        /// Parser message
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// A duration that must be positive was zero.
    #[error("Invalid {0}: must be greater than 0")]
    NonPositive(String),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Unknown or non-asymmetric signing algorithm
    #[error("Invalid algorithm for {field}: {value}")]
    InvalidAlgorithm {
        /// Variable holding the algorithm
        field: String,
        /// Rejected value
        value: String,
    },

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Private key material and the key id published next to its public half.
#[derive(Clone)]
pub struct KeySlot {
    /// PKCS8 PEM text.
    pub pem: SecretString,
    /// `kid` placed in the protected header, when configured.
    pub kid: Option<String>,
}

impl fmt::Debug for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySlot")
            .field("pem", &"[REDACTED]")
            .field("kid", &self.kid)
            .finish()
    }
}

/// Relying-party identity used for client assertions.
#[derive(Debug, Clone)]
pub struct RelyingPartyConfig {
    /// Client id the RP is registered under at the IDP.
    pub client_id: String,
    /// Algorithm the client assertion is signed with.
    pub algorithm: Algorithm,
    /// Key slots by algorithm.
    pub keys: HashMap<Algorithm, KeySlot>,
}

impl RelyingPartyConfig {
    /// Key slot for `algorithm`, if one was configured.
    #[must_use]
    pub fn key_slot(&self, algorithm: Algorithm) -> Option<&KeySlot> {
        self.keys.get(&algorithm)
    }
}

/// Upstream identity provider settings.
#[derive(Debug, Clone)]
pub struct IdpConfig {
    /// IDP host name, e.g. `tenant.eu.auth0.com`.
    pub domain: String,
    /// Token endpoint path, e.g. `/token`.
    pub token_endpoint: String,
    /// Client id the IDP issues identity tokens for.
    pub client_id: String,
    /// Where HTTP requests to the token endpoint go.
    pub token_url: Url,
    /// Where the IDP key set is fetched from.
    pub jwks_url: Url,
}

impl IdpConfig {
    /// `https://{domain}/`, the IDP issuer and first assertion audience.
    #[must_use]
    pub fn origin(&self) -> String {
        format!("https://{}/", self.domain)
    }

    /// `https://{domain}{token_endpoint}`.
    #[must_use]
    pub fn token_endpoint_url(&self) -> String {
        format!("https://{}{}", self.domain, self.token_endpoint)
    }

    /// Issuer expected in identity tokens returned by the IDP.
    #[must_use]
    pub fn expected_issuer(&self) -> String {
        self.origin()
    }
}

/// The relay's own issuer identity for re-signed identity tokens.
#[derive(Debug, Clone)]
pub struct IntermediaryConfig {
    /// Host of the relay's issuer origin.
    pub domain: String,
    /// Re-signing algorithm.
    pub algorithm: Algorithm,
    /// Re-signing key.
    pub key: KeySlot,
}

impl IntermediaryConfig {
    /// `https://{domain}/`
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.domain)
    }
}

/// Service configuration with validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port (1-65535)
    pub port: u16,
    /// Relying party identity
    pub rp: RelyingPartyConfig,
    /// Upstream identity provider
    pub idp: IdpConfig,
    /// Relay issuer identity
    pub intermediary: IntermediaryConfig,
    /// Shared secret accepted from RPs that still send one
    pub client_secret: Option<SecretString>,
    /// JSON key set served at `/.well-known/keys`
    pub rp_jwks_file: Option<PathBuf>,
    /// JSON key set served at `/intermediary.jwks`
    pub intermediary_jwks_file: Option<PathBuf>,
    /// Total timeout for upstream HTTP calls
    pub upstream_timeout: Duration,
    /// Connect timeout for upstream HTTP calls
    pub upstream_connect_timeout: Duration,
    /// IDP key-set cache TTL
    pub jwks_cache_ttl: Duration,
    /// Graceful shutdown drain timeout
    pub shutdown_timeout: Duration,
    /// Debug logging toggle
    pub debug: bool,
    /// Emit logs as JSON
    pub log_json: bool,
}

impl Config {
    /// Loads configuration from environment variables with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value. Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let rp = load_relying_party(&get)?;
        let idp = load_idp(&get)?;

        let intermediary_algorithm =
            parse_algorithm(&get, "INTERMEDIARY_ALG", Algorithm::RS256)?;
        let intermediary = IntermediaryConfig {
            domain: get("INTERMEDIARY_DOMAIN").unwrap_or_else(|| idp.domain.clone()),
            algorithm: intermediary_algorithm,
            key: KeySlot {
                pem: required(&get, "INTERMEDIARY_PRIVATE_KEY")
                    .map(|pem| SecretString::from(decode_escaped_newlines(&pem)))?,
                kid: get("INTERMEDIARY_KID"),
            },
        };

        let config = Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_env(&get, "PORT", 3000)?,
            rp,
            idp,
            intermediary,
            client_secret: get("CLIENT_SECRET")
                .or_else(|| get("A0_CLIENT_SECRET"))
                .map(SecretString::from),
            rp_jwks_file: get("RP_JWKS_FILE").map(PathBuf::from),
            intermediary_jwks_file: get("INTERMEDIARY_JWKS_FILE").map(PathBuf::from),
            upstream_timeout: Duration::from_secs(parse_env(&get, "UPSTREAM_TIMEOUT", 30)?),
            upstream_connect_timeout: Duration::from_secs(parse_env(
                &get,
                "UPSTREAM_CONNECT_TIMEOUT",
                10,
            )?),
            jwks_cache_ttl: Duration::from_secs(parse_env(&get, "JWKS_CACHE_TTL", 3600)?),
            shutdown_timeout: Duration::from_secs(parse_env(&get, "SHUTDOWN_TIMEOUT", 30)?),
            debug: parse_flag(&get, "DEBUG")?,
            log_json: parse_flag(&get, "LOG_JSON")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        for (name, value) in [
            ("UPSTREAM_TIMEOUT", self.upstream_timeout),
            ("UPSTREAM_CONNECT_TIMEOUT", self.upstream_connect_timeout),
            ("JWKS_CACHE_TTL", self.jwks_cache_ttl),
            ("SHUTDOWN_TIMEOUT", self.shutdown_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::NonPositive(name.to_string()));
            }
        }
        if self.rp.key_slot(self.rp.algorithm).is_none() {
            return Err(ConfigError::MissingRequired(format!(
                "KEY_{}",
                algorithm_name(self.rp.algorithm).to_uppercase()
            )));
        }
        if !self.idp.token_endpoint.starts_with('/') {
            return Err(ConfigError::ParseError {
                name: "IDP_TOKEN_ENDPOINT".to_string(),
                reason: "path must start with '/'".to_string(),
            });
        }
        Ok(())
    }

    /// Bind address as `host:port`.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn load_relying_party<G>(get: &G) -> Result<RelyingPartyConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let client_id = required(get, "RP_ID")?;
    let algorithm = parse_algorithm(get, "RP_ALG", Algorithm::RS256)?;

    let mut keys = HashMap::new();
    for &alg in SUPPORTED_ALGORITHMS {
        let suffix = algorithm_name(alg).to_uppercase();
        if let Some(pem) = get(&format!("KEY_{suffix}")) {
            keys.insert(
                alg,
                KeySlot {
                    pem: SecretString::from(decode_escaped_newlines(&pem)),
                    kid: get(&format!("KID_{suffix}")),
                },
            );
        }
    }

    // Single-key deployments configure only the RP_ALG slot.
    if let Some(pem) = get("RP_PRIVATE_KEY") {
        keys.entry(algorithm).or_insert_with(|| KeySlot {
            pem: SecretString::from(decode_escaped_newlines(&pem)),
            kid: get("RP_KID"),
        });
    }

    Ok(RelyingPartyConfig {
        client_id,
        algorithm,
        keys,
    })
}

fn load_idp<G>(get: &G) -> Result<IdpConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let domain = required(get, "IDP_DOMAIN")?;
    let token_endpoint = get("IDP_TOKEN_ENDPOINT").unwrap_or_else(|| "/token".to_string());
    let jwks_path =
        get("IDP_JWKS_PATH").unwrap_or_else(|| "/.well-known/jwks.json".to_string());

    let base = get("IDP_BASE_URL").unwrap_or_else(|| format!("https://{domain}"));
    let base_url = parse_url("IDP_BASE_URL", &base)?;
    let token_url = join_url(&base_url, "IDP_TOKEN_ENDPOINT", &token_endpoint)?;
    let jwks_url = join_url(&base_url, "IDP_JWKS_PATH", &jwks_path)?;

    Ok(IdpConfig {
        domain,
        token_endpoint,
        client_id: required(get, "IDP_CLIENT_ID")?,
        token_url,
        jwks_url,
    })
}

fn required<G>(get: &G, name: &str) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(name).ok_or_else(|| ConfigError::MissingRequired(name.to_string()))
}

/// Parse a variable with a default value.
fn parse_env<G, T>(get: &G, name: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a boolean toggle, accepting `true/false`, `1/0` and `yes/no`.
fn parse_flag<G>(get: &G, name: &str) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(name) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::ParseError {
            name: name.to_string(),
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

fn parse_algorithm<G>(get: &G, name: &str, default: Algorithm) -> Result<Algorithm, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(name) else {
        return Ok(default);
    };
    let invalid = || ConfigError::InvalidAlgorithm {
        field: name.to_string(),
        value: raw.clone(),
    };
    let algorithm = Algorithm::from_str(raw.trim()).map_err(|_| invalid())?;
    if is_supported(algorithm) {
        Ok(algorithm)
    } else {
        Err(invalid())
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })
}

fn join_url(base: &Url, name: &str, path: &str) -> Result<Url, ConfigError> {
    base.join(path).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })
}

/// Single-line `.env` files carry PEM line breaks as literal `\n`.
fn decode_escaped_newlines(value: &str) -> String {
    value.replace("\\n", "\n")
}
