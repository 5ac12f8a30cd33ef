//! `POST /token` body extractor.

use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};

use crate::exchange::TokenRequest;

/// `POST /token` body. JSON when the content type says so, form-encoded
/// otherwise. A request without a content type carries no fields.
#[derive(Debug)]
pub struct TokenForm(pub TokenRequest);

impl<S> FromRequest<S> for TokenForm
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        match content_type.as_deref() {
            Some(ct) if ct.starts_with("application/json") => {
                let Json(request) = Json::<TokenRequest>::from_request(req, state)
                    .await
                    .map_err(IntoResponse::into_response)?;
                Ok(Self(request))
            }
            Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
                let Form(request) = Form::<TokenRequest>::from_request(req, state)
                    .await
                    .map_err(IntoResponse::into_response)?;
                Ok(Self(request))
            }
            _ => Ok(Self(TokenRequest::default())),
        }
    }
}
