//! Error handling module with type-safe, non-exhaustive error types
//!
//! Every failure terminates the single in-flight exchange. Validation
//! failures map to 400/401, upstream HTTP errors are passed through
//! verbatim, and every local failure (network, key, signing, verification)
//! surfaces as a plain-text 500. Nothing here is retried.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::keys::KeyImportError;

/// Failures verifying the identity token returned by the IDP.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenVerificationError {
    /// Token header has no `kid`
    #[error("identity token header has no kid")]
    MissingKeyId,

    /// No key with this id in the IDP key set, even after a refresh
    #[error("no IDP key matches kid {kid}")]
    UnknownKey {
        /// Key id from the token header
        kid: String,
    },

    /// The IDP key set could not be fetched or parsed
    #[error("failed to fetch IDP key set: {reason}")]
    KeySetFetch {
        /// Fetch failure detail
        reason: String,
    },

    /// Signature does not verify
    #[error("identity token signature invalid")]
    InvalidSignature,

    /// `exp` is in the past
    #[error("identity token expired")]
    Expired,

    /// `nbf` is in the future
    #[error("identity token not yet valid")]
    NotYetValid,

    /// `iss` is not the expected IDP issuer
    #[error("identity token issuer mismatch")]
    IssuerMismatch,

    /// `aud` does not contain the IDP client id
    #[error("identity token audience mismatch")]
    AudienceMismatch,

    /// A required claim is absent
    #[error("identity token is missing required claim {0}")]
    MissingClaim(String),

    /// Header algorithm is symmetric, unknown, or does not match the key
    #[error("identity token algorithm not allowed: {0}")]
    DisallowedAlgorithm(String),

    /// Token structure is malformed
    #[error("identity token malformed: {0}")]
    Malformed(String),
}

impl From<jsonwebtoken::errors::Error> for TokenVerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidIssuer => Self::IssuerMismatch,
            ErrorKind::InvalidAudience => Self::AudienceMismatch,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::DisallowedAlgorithm(err.to_string())
            }
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Relay error taxonomy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RelayError {
    /// `client_id` absent from the request
    #[error("Missing client_id")]
    MissingClientId,

    /// `client_secret` present but wrong
    #[error("client auth failed by auth0!")]
    ClientAuthFailed,

    /// `client_id` is not the configured RP
    #[error("Invalid request, client_id is incorrect!")]
    InvalidClientId,

    /// The IDP answered the exchange with an error status
    #[error("upstream token endpoint returned HTTP {status}")]
    UpstreamHttp {
        /// Upstream status code
        status: u16,
        /// Upstream body, verbatim
        body: Vec<u8>,
        /// Upstream content type, if any
        content_type: Option<String>,
    },

    /// No response from the IDP
    #[error("{0}")]
    UpstreamNetwork(String),

    /// Private key could not be imported
    #[error(transparent)]
    KeyImport(#[from] KeyImportError),

    /// JWT signing failed
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// The IDP identity token failed verification
    #[error(transparent)]
    TokenVerification(#[from] TokenVerificationError),

    /// Successful upstream response without a usable token set
    #[error("malformed upstream token response: {0}")]
    MalformedUpstreamResponse(String),

    /// Internal error
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Error codes for logs and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// See [`RelayError::MissingClientId`]
    MissingClientId,
    /// See [`RelayError::ClientAuthFailed`]
    ClientAuthFailed,
    /// See [`RelayError::InvalidClientId`]
    InvalidClientId,
    /// See [`RelayError::UpstreamHttp`]
    UpstreamHttp,
    /// See [`RelayError::UpstreamNetwork`]
    UpstreamNetwork,
    /// See [`RelayError::KeyImport`]
    KeyImport,
    /// See [`RelayError::Signing`]
    Signing,
    /// See [`RelayError::TokenVerification`]
    TokenVerification,
    /// See [`RelayError::MalformedUpstreamResponse`]
    MalformedUpstreamResponse,
    /// See [`RelayError::Internal`]
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingClientId => "RELAY_MISSING_CLIENT_ID",
            Self::ClientAuthFailed => "RELAY_CLIENT_AUTH_FAILED",
            Self::InvalidClientId => "RELAY_INVALID_CLIENT_ID",
            Self::UpstreamHttp => "UPSTREAM_HTTP_ERROR",
            Self::UpstreamNetwork => "UPSTREAM_NETWORK_ERROR",
            Self::KeyImport => "KEY_IMPORT_ERROR",
            Self::Signing => "SIGNING_ERROR",
            Self::TokenVerification => "TOKEN_VERIFICATION_ERROR",
            Self::MalformedUpstreamResponse => "UPSTREAM_RESPONSE_MALFORMED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl RelayError {
    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingClientId => ErrorCode::MissingClientId,
            Self::ClientAuthFailed => ErrorCode::ClientAuthFailed,
            Self::InvalidClientId => ErrorCode::InvalidClientId,
            Self::UpstreamHttp { .. } => ErrorCode::UpstreamHttp,
            Self::UpstreamNetwork(_) => ErrorCode::UpstreamNetwork,
            Self::KeyImport(_) => ErrorCode::KeyImport,
            Self::Signing(_) => ErrorCode::Signing,
            Self::TokenVerification(_) => ErrorCode::TokenVerification,
            Self::MalformedUpstreamResponse(_) => ErrorCode::MalformedUpstreamResponse,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// HTTP status returned to the relying party.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingClientId | Self::ClientAuthFailed => StatusCode::BAD_REQUEST,
            Self::InvalidClientId => StatusCode::UNAUTHORIZED,
            Self::UpstreamHttp { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Validation failures are answered before any upstream call.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingClientId | Self::ClientAuthFailed | Self::InvalidClientId
        )
    }

    /// No failure in the exchange pipeline is retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::UpstreamHttp {
                body, content_type, ..
            } => {
                let mut response = (status, body).into_response();
                // Bytes bodies default to octet-stream; only the IDP's own label is sent.
                match content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
                    Some(value) => {
                        response.headers_mut().insert(header::CONTENT_TYPE, value);
                    }
                    None => {
                        response.headers_mut().remove(header::CONTENT_TYPE);
                    }
                }
                response
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::Algorithm;

    #[test]
    fn test_validation_status_codes() {
        assert_eq!(RelayError::MissingClientId.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::ClientAuthFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::InvalidClientId.status_code(), StatusCode::UNAUTHORIZED);
        assert!(RelayError::InvalidClientId.is_validation());
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(RelayError::MissingClientId.to_string(), "Missing client_id");
        assert_eq!(
            RelayError::ClientAuthFailed.to_string(),
            "client auth failed by auth0!"
        );
        assert_eq!(
            RelayError::InvalidClientId.to_string(),
            "Invalid request, client_id is incorrect!"
        );
    }

    #[test]
    fn test_upstream_status_passthrough() {
        let err = RelayError::UpstreamHttp {
            status: 403,
            body: b"{}".to_vec(),
            content_type: None,
        };
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(!err.is_validation());
    }

    #[test]
    fn test_upstream_content_type_is_not_invented() {
        let unlabelled = RelayError::UpstreamHttp {
            status: 400,
            body: b"invalid_grant".to_vec(),
            content_type: None,
        }
        .into_response();
        assert_eq!(unlabelled.status(), StatusCode::BAD_REQUEST);
        assert!(unlabelled.headers().get(header::CONTENT_TYPE).is_none());

        let labelled = RelayError::UpstreamHttp {
            status: 400,
            body: b"{}".to_vec(),
            content_type: Some("application/json".to_string()),
        }
        .into_response();
        assert_eq!(labelled.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_local_failures_are_500() {
        let errors = [
            RelayError::UpstreamNetwork("connection refused".to_string()),
            RelayError::KeyImport(KeyImportError::MissingSlot(Algorithm::ES256)),
            RelayError::Signing("boom".to_string()),
            RelayError::TokenVerification(TokenVerificationError::InvalidSignature),
            RelayError::MalformedUpstreamResponse("no id_token".to_string()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_network_message_is_verbatim() {
        let err = RelayError::UpstreamNetwork("dns error".to_string());
        assert_eq!(err.to_string(), "dns error");
        assert_eq!(err.code().as_str(), "UPSTREAM_NETWORK_ERROR");
    }

    #[test]
    fn test_jsonwebtoken_error_mapping() {
        use jsonwebtoken::errors::{Error, ErrorKind};

        let mapped: TokenVerificationError = Error::from(ErrorKind::InvalidIssuer).into();
        assert_eq!(mapped, TokenVerificationError::IssuerMismatch);

        let mapped: TokenVerificationError = Error::from(ErrorKind::InvalidAudience).into();
        assert_eq!(mapped, TokenVerificationError::AudienceMismatch);

        let mapped: TokenVerificationError = Error::from(ErrorKind::ExpiredSignature).into();
        assert_eq!(mapped, TokenVerificationError::Expired);
    }
}
