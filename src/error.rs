//! Error types for structured completions and the tool-calling loop

use crate::types::{Message, RawResponse};
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Diagnostic context attached to a failed structured parse.
///
/// Carries exactly what the model said on its final turn together with the
/// transcript that led there, so a caller can re-drive the conversation with a
/// corrective prompt.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// The terminal completion response whose content failed to parse
    pub raw_response: RawResponse,

    /// Full transcript up to and including the final assistant message
    pub messages: Vec<Message>,
}

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// API error from the model server. `status` is set when the server answered with a
    /// non-success status code.
    #[error("API error: {message}")]
    Api {
        status: Option<reqwest::StatusCode>,
        message: String,
    },

    /// The model does not support a requested feature
    #[error("Model capability error: {0}")]
    Capability(String),

    /// The model kept requesting tools past the configured round limit
    #[error("Max recursion error in tool calling: reached depth {depth} (limit {max_recursion})")]
    MaxRecursion { depth: u32, max_recursion: u32 },

    /// A tool-call request named a tool that is not registered
    #[error("Function {name} name mismatch in tool calling")]
    FunctionDispatch { name: String },

    /// A registered tool failed while executing
    #[error("Error in {name} (tool call {id}): {details}")]
    FunctionExecution {
        id: String,
        name: String,
        details: String,
    },

    /// The final content did not parse into the requested response type
    #[error("Failed to validate response: {source}")]
    StructuredValidation {
        source: serde_json::Error,
        retry_context: Box<RetryContext>,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout error
    #[error("Request timeout")]
    Timeout,

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api {
            status: None,
            message: msg.into(),
        }
    }

    /// Create an API error for a non-success HTTP status
    pub fn api_status(status: reqwest::StatusCode, body: impl AsRef<str>) -> Self {
        Error::Api {
            status: Some(status),
            message: format!("{}: {}", status, body.as_ref()),
        }
    }

    /// HTTP status of an API error, if any
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Error::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// Create a new capability error
    pub fn capability(msg: impl Into<String>) -> Self {
        Error::Capability(msg.into())
    }

    /// Create a new max recursion error
    pub fn max_recursion(depth: u32, max_recursion: u32) -> Self {
        Error::MaxRecursion {
            depth,
            max_recursion,
        }
    }

    /// Create a new dispatch error for an unknown tool name
    pub fn function_dispatch(name: impl Into<String>) -> Self {
        Error::FunctionDispatch { name: name.into() }
    }

    /// Create a new function execution error
    pub fn function_execution(
        id: impl Into<String>,
        name: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Error::FunctionExecution {
            id: id.into(),
            name: name.into(),
            details: details.into(),
        }
    }

    /// Create a new structured validation error
    pub fn structured_validation(source: serde_json::Error, retry_context: RetryContext) -> Self {
        Error::StructuredValidation {
            source,
            retry_context: Box::new(retry_context),
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Returns the retry context of a structured validation failure.
    pub fn retry_context(&self) -> Option<&RetryContext> {
        match self {
            Error::StructuredValidation { retry_context, .. } => Some(retry_context),
            _ => None,
        }
    }

    /// Whether the error is a transient transport failure.
    ///
    /// Every error raised by the tool-calling loop itself is fatal for the call.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout => true,
            Error::Api {
                status: Some(status),
                ..
            } => status.is_server_error(),
            _ => false,
        }
    }
}
