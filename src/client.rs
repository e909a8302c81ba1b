//! HTTP completion backends for OpenAI-compatible servers.
//!
//! [`OpenAiClient`] (async, `reqwest::Client`) and [`BlockingOpenAiClient`]
//! (`reqwest::blocking::Client`) implement the gateway traits by POSTing the request to
//! `{base_url}/chat/completions` and decoding the non-streaming response body into a
//! [`RawResponse`].
//!
//! # Error Mapping
//!
//! - network failures and timeouts surface as [`Error::Http`]
//! - a non-2xx status surfaces as [`Error::Api`] carrying the status and the response body
//! - a body that is not a completion response surfaces as [`Error::Json`]
//!
//! When the [`HttpSettings`] carry a [`RetryConfig`](crate::retry::RetryConfig), each
//! request is retried on transient failures (network errors, timeouts, 5xx).
//!
//! # Example
//!
//! ```rust,no_run
//! use structured_llm::{Client, CompletionOptions, HttpSettings, Message, OpenAiClient, Provider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = OpenAiClient::new(HttpSettings::for_provider(Provider::OpenAI).api_key("sk-..."))?;
//! let client = Client::new(backend);
//!
//! let options = CompletionOptions::builder().model("gpt-4o-mini").build()?;
//! let result = client.completion(vec![Message::user("Say hi")], &options).await?;
//! println!("{}", result.content);
//! # Ok(())
//! # }
//! ```

use crate::config::HttpSettings;
use crate::gateway::{BlockingCompletionApi, CompletionApi, CompletionRequest};
use crate::retry::{retry_blocking_conditional, retry_with_backoff_conditional};
use crate::types::RawResponse;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

fn api_error(status: reqwest::StatusCode, body: String) -> Error {
    warn!(%status, "completion request rejected");
    Error::api_status(status, body)
}

fn decode_body(bytes: &[u8]) -> Result<RawResponse> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Async HTTP backend
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    settings: HttpSettings,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    /// Build a backend; the underlying `reqwest::Client` is reused for every request.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Config`] when the settings are invalid or the HTTP client
    /// cannot be built.
    pub fn new(settings: HttpSettings) -> Result<Self> {
        settings.validate()?;
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    async fn send_once(&self, url: &str, body: &Value) -> Result<RawResponse> {
        let mut request = self.http_client.post(url).json(body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                warn!(error = %e, "failed to read error response body");
                "Unknown error (failed to read response body)".to_string()
            });
            return Err(api_error(status, body));
        }

        let bytes = response.bytes().await.map_err(Error::Http)?;
        decode_body(&bytes)
    }
}

#[async_trait]
impl CompletionApi for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawResponse> {
        let url = self.settings.completions_url();
        let body = request.to_body(self.settings.forward_metadata)?;
        debug!(
            model = request.model,
            messages = request.messages.len(),
            url = %url,
            "sending completion request"
        );

        match &self.settings.retry {
            Some(retry) => retry_with_backoff_conditional(retry, || self.send_once(&url, &body)).await,
            None => self.send_once(&url, &body).await,
        }
    }
}

/// Blocking HTTP backend.
///
/// Like any `reqwest::blocking` client, it must not be created or used from inside an
/// async runtime.
#[derive(Debug, Clone)]
pub struct BlockingOpenAiClient {
    settings: HttpSettings,
    http_client: reqwest::blocking::Client,
}

impl BlockingOpenAiClient {
    pub fn new(settings: HttpSettings) -> Result<Self> {
        settings.validate()?;
        let http_client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    fn send_once(&self, url: &str, body: &Value) -> Result<RawResponse> {
        let mut request = self.http_client.post(url).json(body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_else(|e| {
                warn!(error = %e, "failed to read error response body");
                "Unknown error (failed to read response body)".to_string()
            });
            return Err(api_error(status, body));
        }

        let bytes = response.bytes().map_err(Error::Http)?;
        decode_body(&bytes)
    }
}

impl BlockingCompletionApi for BlockingOpenAiClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawResponse> {
        let url = self.settings.completions_url();
        let body = request.to_body(self.settings.forward_metadata)?;
        debug!(
            model = request.model,
            messages = request.messages.len(),
            url = %url,
            "sending completion request"
        );

        match &self.settings.retry {
            Some(retry) => retry_blocking_conditional(retry, || self.send_once(&url, &body)),
            None => self.send_once(&url, &body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_client_creation() {
        let client = OpenAiClient::new(HttpSettings::new("http://localhost:1234/v1"))
            .expect("should create client");
        assert_eq!(
            client.settings().completions_url(),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn test_client_rejects_invalid_settings() {
        assert!(matches!(
            OpenAiClient::new(HttpSettings::new("not-a-url")),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            BlockingOpenAiClient::new(HttpSettings::new("http://x").timeout(Duration::ZERO)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_api_error_format() {
        let err = api_error(reqwest::StatusCode::UNAUTHORIZED, "bad key".to_string());
        assert_eq!(err.to_string(), "API error: 401 Unauthorized: bad key");
        assert_eq!(err.status(), Some(reqwest::StatusCode::UNAUTHORIZED));
        assert!(!err.is_retryable());

        let err = api_error(reqwest::StatusCode::BAD_GATEWAY, String::new());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_decode_body() {
        let raw = decode_body(br#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#)
            .unwrap();
        assert_eq!(raw.content(), "hi");
        assert!(matches!(decode_body(b"<html>"), Err(Error::Json(_))));
    }
}
