//! Thin VK API client: form-encoded method calls and the response envelope.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Default base URL of the VK method API.
pub const VK_API_BASE: &str = "https://api.vk.com/method";

/// One authenticated VK API client (user or community token).
#[derive(Clone)]
pub struct VkApi {
    client: reqwest::Client,
    token: SecretString,
    version: String,
    base_url: String,
}

impl VkApi {
    pub fn new(token: SecretString, version: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            version: version.into(),
            base_url: VK_API_BASE.to_string(),
        }
    }

    /// Point the client at another host (tests use a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The underlying HTTP client, shared with long-poll requests.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// Call `method` and decode the `response` field of the envelope.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut form: Vec<(&str, String)> = params.to_vec();
        form.push(("access_token", self.token.expose_secret().to_string()));
        form.push(("v", self.version.clone()));

        let resp = self
            .client
            .post(self.method_url(method))
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(ApiError::RequestFailed {
                method: method.to_string(),
                reason: format!("HTTP {}", resp.status()),
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| ApiError::InvalidResponse {
            method: method.to_string(),
            reason: e.to_string(),
        })?;

        decode_envelope(method, body)
    }
}

impl std::fmt::Debug for VkApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VkApi")
            .field("version", &self.version)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Split a VK envelope into the decoded `response` or the remote `error`.
fn decode_envelope<T: DeserializeOwned>(
    method: &str,
    mut body: serde_json::Value,
) -> Result<T, ApiError> {
    if let Some(error) = body.get("error") {
        let code = error
            .get("error_code")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);
        let message = error
            .get("error_msg")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(ApiError::Remote {
            method: method.to_string(),
            code,
            message,
        });
    }

    let Some(response) = body.get_mut("response").map(serde_json::Value::take) else {
        return Err(ApiError::InvalidResponse {
            method: method.to_string(),
            reason: "missing `response` field".to_string(),
        });
    };

    serde_json::from_value(response).map_err(|e| ApiError::InvalidResponse {
        method: method.to_string(),
        reason: e.to_string(),
    })
}
