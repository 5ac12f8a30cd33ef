//! Route handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Map, Value};
use tracing::error;

use super::AppState;
use super::extract::TokenForm;
use crate::error::RelayError;
use crate::jwks::Jwks;

/// `POST /token`
pub async fn token(
    State(state): State<AppState>,
    TokenForm(request): TokenForm,
) -> Result<Json<Map<String, Value>>, RelayError> {
    match state.exchange.exchange(request).await {
        Ok(body) => Ok(Json(body)),
        Err(err) => {
            if err.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
                if state.config.debug {
                    error!(code = err.code().as_str(), error = ?err, "Token exchange failed");
                } else {
                    error!(code = err.code().as_str(), error = %err, "Token exchange failed");
                }
            }
            Err(err)
        }
    }
}

/// `GET /.well-known/keys`
pub async fn relying_party_keys(State(state): State<AppState>) -> Json<Jwks> {
    Json(state.key_sets.relying_party().clone())
}

/// `GET /intermediary.jwks`
pub async fn intermediary_keys(State(state): State<AppState>) -> Json<Jwks> {
    Json(state.key_sets.intermediary().clone())
}
