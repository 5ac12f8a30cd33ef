//! HTTP surface.
//!
//! - `POST /token`: authorization-code exchange
//! - `GET /.well-known/keys`: RP public keys, for the IDP
//! - `GET /intermediary.jwks`: relay public keys, for the RP

pub mod extract;
pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::exchange::TokenExchange;
use crate::jwks::PublishedKeySets;

pub use extract::TokenForm;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Exchange pipeline
    pub exchange: Arc<TokenExchange>,
    /// Static key sets
    pub key_sets: PublishedKeySets,
    /// Service configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// State sharing `exchange`'s configuration.
    #[must_use]
    pub fn new(exchange: Arc<TokenExchange>, key_sets: PublishedKeySets, config: Arc<Config>) -> Self {
        Self {
            exchange,
            key_sets,
            config,
        }
    }
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/token", post(handlers::token))
        .route("/.well-known/keys", get(handlers::relying_party_keys))
        .route("/intermediary.jwks", get(handlers::intermediary_keys))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
