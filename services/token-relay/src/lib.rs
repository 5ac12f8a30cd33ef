//! Token Relay Service library.
//!
//! Sits between a relying party and an upstream identity provider:
//! authenticates to the IDP with a `private_key_jwt` client assertion,
//! exchanges the authorization code, verifies the returned identity token
//! against the IDP key set, and re-signs it under the relay's own key.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod exchange;
pub mod http_client;
pub mod jwks;
pub mod jwt;
pub mod keys;
pub mod observability;
pub mod server;
pub mod shutdown;

pub use config::Config;
pub use error::{ErrorCode, RelayError};
pub use exchange::{TokenExchange, TokenRequest};
pub use server::{AppState, router};
