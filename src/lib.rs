//! # structured-llm
//!
//! Structured (schema-validated) completions and transparent tool-calling loops over
//! OpenAI-compatible chat-completion APIs.
//!
//! ## Overview
//!
//! The crate adds two conveniences on top of a plain chat-completion call:
//!
//! - **Structured output**: ask for a Rust type (`Deserialize + JsonSchema`), send its
//!   schema as the response format, and get the parsed value back, or a
//!   [`Error::StructuredValidation`] carrying everything needed to retry.
//! - **Tool calling**: register host functions as tools; when the model requests them the
//!   crate executes them, feeds their results back, and keeps going until the model
//!   answers (bounded by `max_recursion`).
//!
//! Both are available as a blocking API ([`BlockingClient`]) and an async API
//! ([`Client`]). The async loop runs the tool calls of one round concurrently.
//!
//! ## Example
//!
//! ```rust,no_run
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//! use serde_json::json;
//! use structured_llm::prelude::*;
//!
//! /// Return the current weather for a location
//! #[derive(Deserialize, JsonSchema)]
//! struct WeatherArgs {
//!     location: String,
//! }
//!
//! /// Temperature reading
//! #[derive(Debug, Deserialize, JsonSchema)]
//! struct Temperature {
//!     temperature: f64,
//!     unit: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let weather = FunctionTool::blocking("get_current_weather", |args: WeatherArgs, _meta| {
//!         Ok(json!({"location": args.location, "temperature": "68°F"}))
//!     });
//!
//!     let options = CompletionOptions::builder()
//!         .model("gpt-4o-mini")
//!         .tool(weather)
//!         .metadata(json!({"trace_id": "abc-123"}))
//!         .build()?;
//!
//!     let client = Client::new(OpenAiClient::new(HttpSettings::from_env())?);
//!     let result = client
//!         .structured_completion::<Temperature>(
//!             vec![Message::user("How warm is it in San Francisco?")],
//!             &options,
//!         )
//!         .await?;
//!
//!     println!("{:?}", result.content);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **tools**: tool declarations, schema reflection, and the name → tool registry
//! - **capabilities**: per-model feature lookup and pre-flight validation
//! - **gateway**: request/response types and the backend traits
//! - **client**: HTTP backends for OpenAI-compatible servers
//! - **tool_loop**: the sequential and concurrent tool-calling loops
//! - **completion**: entry points and response assembly
//! - **types**: messages, raw responses, and call options
//! - **config**: provider shortcuts, environment lookups, HTTP settings
//! - **error**: the crate error type
//! - **retry**: exponential backoff for transient transport failures

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Model capability table and pre-flight validation.
mod capabilities;

/// HTTP completion backends (async and blocking) built on reqwest.
mod client;

/// Entry points (`Client`, `BlockingClient`) and response assembly.
mod completion;

/// Provider shortcuts, environment variable lookups, and HTTP transport settings.
mod config;

/// Error types used across all public APIs.
mod error;

/// Completion request/response plumbing and the backend traits.
mod gateway;

/// Tool declaration, schema reflection, and the registry used for dispatch.
mod tools;

/// Messages, raw completion responses, results, and call options.
mod types;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

/// Retry utilities with exponential backoff and jitter.
pub mod retry;

/// The tool-calling loop. Public so custom entry points can drive it directly.
pub mod tool_loop;

// --- Entry Points ---

pub use completion::{BlockingClient, Client, assemble_structured, assemble_text};

// --- Completion Gateway ---

pub use client::{BlockingOpenAiClient, OpenAiClient};
pub use gateway::{
    BlockingCompletionApi, CompletionApi, CompletionRequest, RequestTemplate, ResponseSchema,
};

// --- Capabilities ---

pub use capabilities::{
    Capabilities, CapabilityTable, ModelCapabilities, validate_model_capabilities,
};

// --- Configuration ---

pub use config::{HttpSettings, Provider, get_api_key, get_base_url, get_model};

// --- Error Handling ---

pub use error::{Error, Result, RetryContext};

// --- Tool System ---

pub use tools::{
    FunctionTool, ResolvedTool, Tool, ToolBuilder, ToolHandler, ToolRegistry, ToolSpec, tool,
};

// --- Core Types ---

pub use types::{
    Choice, CompletionOptions, CompletionOptionsBuilder, DEFAULT_MAX_RECURSION,
    DEFAULT_REFORMAT_INSTRUCTION, FunctionCall, Message, MessageRole, Metadata, RawResponse,
    ReformatPolicy, ResponseMessage, ToolCallRequest, UnifiedResult,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The types needed for typical usage: `use structured_llm::prelude::*;`
pub mod prelude {
    pub use crate::{
        BlockingClient, BlockingOpenAiClient, CapabilityTable, Client, CompletionOptions, Error,
        FunctionTool, HttpSettings, Message, Metadata, OpenAiClient, Result, Tool,
        UnifiedResult, tool,
    };
}
