//! Outbound HTTP client for the IDP.
//!
//! One pooled `reqwest` client is built at startup and shared by the token
//! exchange and the key-set fetch. Every request is bounded by the
//! configured timeouts.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::config::Config;

/// Outbound HTTP settings.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Total request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Pool idle timeout
    pub pool_idle_timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: concat!("token-relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl From<&Config> for HttpClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.upstream_timeout,
            connect_timeout: config.upstream_connect_timeout,
            ..Self::default()
        }
    }
}

/// Build the shared client.
///
/// # Errors
///
/// Returns an error if the client cannot be built (e.g., TLS initialization fails).
pub fn build_http_client(config: &HttpClientConfig) -> Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .user_agent(&config.user_agent)
        .use_rustls_tls()
        .build()
}
