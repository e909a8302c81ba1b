//! Configuration helpers: provider shortcuts, environment lookups, and HTTP transport
//! settings.
//!
//! Environment variables:
//!
//! | Variable                   | Used by                          |
//! |----------------------------|----------------------------------|
//! | `STRUCTURED_LLM_BASE_URL`  | [`get_base_url`]                 |
//! | `STRUCTURED_LLM_MODEL`     | [`get_model`]                    |
//! | `STRUCTURED_LLM_API_KEY`   | [`get_api_key`] (first choice)   |
//! | `OPENAI_API_KEY`           | [`get_api_key`] (second choice)  |

use crate::retry::RetryConfig;
use crate::{Error, Result};
use std::env;
use std::time::Duration;

pub const BASE_URL_ENV: &str = "STRUCTURED_LLM_BASE_URL";
pub const MODEL_ENV: &str = "STRUCTURED_LLM_MODEL";
pub const API_KEY_ENV: &str = "STRUCTURED_LLM_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default request timeout for the HTTP backends
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Supported provider shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    LMStudio,
    Ollama,
    LlamaCpp,
    VLLM,
}

impl Provider {
    /// Default base URL for this provider
    pub fn default_url(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::LMStudio => "http://localhost:1234/v1",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::LlamaCpp => "http://localhost:8080/v1",
            Provider::VLLM => "http://localhost:8000/v1",
        }
    }

    /// Whether the provider is a local server, where model names carry no capability
    /// information
    pub fn is_local(&self) -> bool {
        !matches!(self, Provider::OpenAI)
    }

    /// Parse a provider from a string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Provider::OpenAI),
            "lmstudio" | "lm-studio" | "lm_studio" => Some(Provider::LMStudio),
            "ollama" => Some(Provider::Ollama),
            "llamacpp" | "llama-cpp" | "llama_cpp" | "llama.cpp" => Some(Provider::LlamaCpp),
            "vllm" => Some(Provider::VLLM),
            _ => None,
        }
    }
}

/// Base URL from the environment, the provider default, or the fallback.
///
/// Priority:
/// 1. `STRUCTURED_LLM_BASE_URL`
/// 2. provider default URL (if `provider` is `Some`)
/// 3. `fallback`, else the OpenAI endpoint
///
/// ```rust,no_run
/// use structured_llm::{get_base_url, Provider};
///
/// let url = get_base_url(Some(Provider::Ollama), None);
/// let url = get_base_url(None, Some("http://localhost:1234/v1"));
/// ```
pub fn get_base_url(provider: Option<Provider>, fallback: Option<&str>) -> String {
    resolve_base_url(env::var(BASE_URL_ENV).ok(), provider, fallback)
}

fn resolve_base_url(
    from_env: Option<String>,
    provider: Option<Provider>,
    fallback: Option<&str>,
) -> String {
    if let Some(url) = from_env.filter(|u| !u.trim().is_empty()) {
        return url;
    }

    if let Some(p) = provider {
        return p.default_url().to_string();
    }

    fallback
        .unwrap_or(Provider::OpenAI.default_url())
        .to_string()
}

/// Model name from `STRUCTURED_LLM_MODEL` (when `prefer_env`) or the fallback
///
/// ```rust,no_run
/// use structured_llm::get_model;
///
/// let model = get_model(Some("gpt-4o-mini"), true);
/// let forced = get_model(Some("gpt-4o-mini"), false);
/// ```
pub fn get_model(fallback: Option<&str>, prefer_env: bool) -> Option<String> {
    let from_env = if prefer_env {
        env::var(MODEL_ENV).ok()
    } else {
        None
    };
    from_env
        .filter(|m| !m.trim().is_empty())
        .or_else(|| fallback.map(str::to_string))
}

/// API key from `STRUCTURED_LLM_API_KEY`, then `OPENAI_API_KEY`
pub fn get_api_key() -> Option<String> {
    first_non_empty([env::var(API_KEY_ENV).ok(), env::var(OPENAI_API_KEY_ENV).ok()])
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

/// Settings shared by the HTTP completion backends
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// OpenAI-compatible endpoint, e.g. `https://api.openai.com/v1`
    pub base_url: String,

    /// Bearer token; local servers usually accept anything
    pub api_key: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Transport retry policy; `None` sends each request once
    pub retry: Option<RetryConfig>,

    /// Send call metadata in the request body
    pub forward_metadata: bool,
}

impl HttpSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            retry: None,
            forward_metadata: false,
        }
    }

    /// Settings for a provider shortcut
    pub fn for_provider(provider: Provider) -> Self {
        Self::new(provider.default_url())
    }

    /// Settings resolved from the environment (see the module docs)
    pub fn from_env() -> Self {
        let mut settings = Self::new(get_base_url(None, None));
        settings.api_key = get_api_key();
        settings
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn forward_metadata(mut self, enabled: bool) -> Self {
        self.forward_metadata = enabled;
        self
    }

    /// Full URL of the chat completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::config("base_url is required"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::config(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::config("timeout must be greater than zero"));
        }
        Ok(())
    }
}
