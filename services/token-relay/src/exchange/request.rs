//! Inbound token request and the upstream grant built from it.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::jwt::CLIENT_ASSERTION_TYPE;

/// `grant_type` sent upstream.
pub const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";

/// `POST /token` body, from either a JSON or a form-encoded request.
/// Empty strings are treated as absent.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenRequest {
    /// Relying party client id
    #[serde(default, deserialize_with = "empty_as_none")]
    pub client_id: Option<String>,
    /// Authorization code
    #[serde(default, deserialize_with = "empty_as_none")]
    pub code: Option<String>,
    /// Redirect URI the code was issued for
    #[serde(default, deserialize_with = "empty_as_none")]
    pub redirect_uri: Option<String>,
    /// PKCE verifier
    #[serde(default, deserialize_with = "empty_as_none")]
    pub code_verifier: Option<String>,
    /// Shared compatibility secret
    #[serde(default, deserialize_with = "empty_as_none")]
    pub client_secret: Option<String>,
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("client_id", &self.client_id)
            .field("code", &self.code.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("code_verifier", &self.code_verifier.as_ref().map(|_| "[REDACTED]"))
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}

/// Form body of the upstream `authorization_code` grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenGrant<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_assertion: &'a str,
    client_assertion_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

impl<'a> TokenGrant<'a> {
    /// Grant for `client_id` carrying `client_assertion` and the code
    /// parameters of `request`.
    #[must_use]
    pub fn new(client_id: &'a str, client_assertion: &'a str, request: &'a TokenRequest) -> Self {
        Self {
            grant_type: AUTHORIZATION_CODE_GRANT,
            client_id,
            client_assertion,
            client_assertion_type: CLIENT_ASSERTION_TYPE,
            code: request.code.as_deref(),
            redirect_uri: request.redirect_uri.as_deref(),
            code_verifier: request.code_verifier.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_strings_are_absent() {
        let request: TokenRequest =
            serde_json::from_str(r#"{"client_id":"","code":"abc","client_secret":""}"#).unwrap();
        assert_eq!(request.client_id, None);
        assert_eq!(request.code.as_deref(), Some("abc"));
        assert_eq!(request.client_secret, None);
    }

    #[test]
    fn test_missing_fields_default() {
        let request: TokenRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, TokenRequest::default());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let request = TokenRequest {
            client_id: Some("rp-123".to_string()),
            code: Some("the-code".to_string()),
            client_secret: Some("hunter2".to_string()),
            ..TokenRequest::default()
        };
        let printed = format!("{request:?}");
        assert!(printed.contains("rp-123"));
        assert!(!printed.contains("the-code"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_grant_omits_absent_verifier() {
        let request = TokenRequest {
            code: Some("abc".to_string()),
            redirect_uri: Some("https://rp.example.com/cb".to_string()),
            ..TokenRequest::default()
        };
        let grant = TokenGrant::new("rp-123", "jwt", &request);
        let value = serde_json::to_value(&grant).unwrap();

        assert_eq!(value["grant_type"], "authorization_code");
        assert_eq!(value["client_assertion_type"], CLIENT_ASSERTION_TYPE);
        assert_eq!(value["code"], "abc");
        assert!(value.get("code_verifier").is_none());
    }
}
