//! IDP token endpoint client.

use reqwest::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use super::request::TokenGrant;
use crate::error::RelayError;

/// Posts grants to the IDP token endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    token_url: Url,
}

impl UpstreamClient {
    /// Client posting to `token_url`.
    #[must_use]
    pub const fn new(client: reqwest::Client, token_url: Url) -> Self {
        Self { client, token_url }
    }

    /// Sends `grant` form-encoded and returns the JSON token set.
    ///
    /// # Errors
    ///
    /// - [`RelayError::UpstreamNetwork`] if no response arrives
    /// - [`RelayError::UpstreamHttp`] with the status and body verbatim on a
    ///   non-2xx response
    /// - [`RelayError::MalformedUpstreamResponse`] if a 2xx body is not a
    ///   JSON object
    pub async fn exchange(&self, grant: &TokenGrant<'_>) -> Result<Map<String, Value>, RelayError> {
        let response = self
            .client
            .post(self.token_url.clone())
            .form(grant)
            .send()
            .await
            .map_err(|e| RelayError::UpstreamNetwork(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::UpstreamNetwork(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "IDP rejected token exchange");
            return Err(RelayError::UpstreamHttp {
                status: status.as_u16(),
                body: body.to_vec(),
                content_type,
            });
        }

        debug!(status = status.as_u16(), bytes = body.len(), "IDP token response received");
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(RelayError::MalformedUpstreamResponse(
                "token response is not a JSON object".to_string(),
            )),
            Err(e) => Err(RelayError::MalformedUpstreamResponse(format!(
                "token response is not JSON: {e}"
            ))),
        }
    }
}
