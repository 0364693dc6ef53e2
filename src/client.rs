//! HTTP client for the activation server.
//!
//! ```rust,ignore
//! use activator::client::ActivationClient;
//!
//! let client = ActivationClient::new("http://127.0.0.1:8090");
//! let secret = client.activate("c24782a8...", "machine-01").await?;
//! ```

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::errors::{LicenseError, LicenseResult};
use crate::protocol::{ActivationRequest, ApiResponse, IssueCodeRequest};

/// Thin wrapper around `reqwest` speaking the envelope protocol.
#[derive(Debug, Clone)]
pub struct ActivationClient {
    base_url: String,
    http: Client,
}

impl ActivationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Activate (or re-validate) a code for this machine.
    ///
    /// Returns the derived secret key on success.
    pub async fn activate(&self, activation_code: &str, machine_code: &str) -> LicenseResult<String> {
        let body = ActivationRequest {
            activation_code: activation_code.to_string(),
            protected_machine_code: machine_code.to_string(),
        };
        self.post("/", &body).await
    }

    /// Draw an unused activation code from the server's pool.
    pub async fn request_code(&self, secret_key: &str) -> LicenseResult<String> {
        let body = IssueCodeRequest {
            secret_key: secret_key.to_string(),
        };
        self.post("/code/get", &body).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> LicenseResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {url}");

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();

        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            LicenseError::ServerError(format!("unexpected response (HTTP {status}): {e}"))
        })?;

        if !envelope.is_success() {
            return Err(LicenseError::from_response(envelope.code, envelope.message));
        }

        envelope
            .data
            .ok_or_else(|| LicenseError::ServerError("success response without data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = ActivationClient::new("http://localhost:8090/");
        assert_eq!(client.base_url(), "http://localhost:8090");
    }
}
