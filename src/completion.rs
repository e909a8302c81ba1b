//! Entry points and response assembly.
//!
//! [`Client`] (async) and [`BlockingClient`] (blocking) are thin orchestrators over a
//! completion backend:
//!
//! 1. validate the model's capabilities against what the call asks for
//! 2. run the tool-calling loop (concurrent for [`Client`], sequential for
//!    [`BlockingClient`])
//! 3. assemble the result: parse the final text into the response type, or return it
//!    verbatim when no response type was requested
//!
//! # Example
//!
//! ```rust,no_run
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//! use structured_llm::{BlockingClient, BlockingOpenAiClient, CompletionOptions, HttpSettings, Message};
//!
//! /// A temperature reading
//! #[derive(Debug, Deserialize, JsonSchema)]
//! struct Temperature {
//!     value: f64,
//!     unit: String,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BlockingClient::new(BlockingOpenAiClient::new(HttpSettings::from_env())?);
//! let options = CompletionOptions::builder().model("gpt-4o-mini").build()?;
//!
//! let result = client.structured_completion::<Temperature>(
//!     vec![Message::user("What is 20°C in Fahrenheit?")],
//!     &options,
//! )?;
//! println!("{:?} after {} messages", result.content, result.messages.len());
//! # Ok(())
//! # }
//! ```

use crate::capabilities::{CapabilityTable, ModelCapabilities, validate_model_capabilities};
use crate::error::RetryContext;
use crate::gateway::{BlockingCompletionApi, CompletionApi, RequestTemplate, ResponseSchema};
use crate::tool_loop::{LoopOutcome, reformat, reformat_applies, run_blocking, run_concurrent};
use crate::types::{CompletionOptions, Message, UnifiedResult};
use crate::{Error, Result};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Package the final text verbatim
pub fn assemble_text(outcome: LoopOutcome) -> UnifiedResult<String> {
    UnifiedResult {
        content: outcome.raw_response.content(),
        messages: outcome.messages,
    }
}

/// Parse the final text into `T`.
///
/// # Errors
///
/// [`Error::StructuredValidation`] when the text does not parse; its retry context holds
/// the terminal response and the full transcript.
pub fn assemble_structured<T: DeserializeOwned>(outcome: LoopOutcome) -> Result<UnifiedResult<T>> {
    let text = outcome.raw_response.content();
    match serde_json::from_str::<T>(&text) {
        Ok(content) => Ok(UnifiedResult {
            content,
            messages: outcome.messages,
        }),
        Err(source) => {
            debug!(error = %source, "final content failed schema validation");
            Err(Error::structured_validation(
                source,
                RetryContext {
                    raw_response: outcome.raw_response,
                    messages: outcome.messages,
                },
            ))
        }
    }
}

/// Async entry point
pub struct Client<B> {
    backend: B,
    capabilities: Arc<dyn ModelCapabilities>,
}

impl<B> std::fmt::Debug for Client<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl<B: CompletionApi> Client<B> {
    /// Wrap a backend, validating models against [`CapabilityTable::default`]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            capabilities: Arc::new(CapabilityTable::default()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl ModelCapabilities + 'static) -> Self {
        self.capabilities = Arc::new(capabilities);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run a completion (with any configured tools) and return the final text verbatim
    pub async fn completion(
        &self,
        messages: Vec<Message>,
        options: &CompletionOptions,
    ) -> Result<UnifiedResult<String>> {
        validate_model_capabilities(
            self.capabilities.as_ref(),
            &options.model,
            false,
            !options.tools.is_empty(),
        )?;

        let template = RequestTemplate::from_options(options, None);
        let outcome = run_concurrent(&self.backend, &template, options, messages).await?;
        Ok(assemble_text(outcome))
    }

    /// Run a completion constrained to the schema of `T` and parse the final text into `T`.
    ///
    /// When the options carry a [`ReformatPolicy`](crate::ReformatPolicy) matching the
    /// model and tools are present, the loop runs without the schema and one extra call on
    /// the fallback model restates the answer with it.
    pub async fn structured_completion<T>(
        &self,
        messages: Vec<Message>,
        options: &CompletionOptions,
    ) -> Result<UnifiedResult<T>>
    where
        T: DeserializeOwned + JsonSchema,
    {
        validate_model_capabilities(
            self.capabilities.as_ref(),
            &options.model,
            true,
            !options.tools.is_empty(),
        )?;

        let schema = ResponseSchema::of::<T>();
        let template = RequestTemplate::from_options(options, Some(&schema));

        let outcome = match reformat_applies(options, true) {
            Some(policy) => {
                validate_model_capabilities(
                    self.capabilities.as_ref(),
                    &policy.fallback_model,
                    true,
                    false,
                )?;
                let loop_template = template.clone().with_response_format(None);
                let outcome = run_concurrent(&self.backend, &loop_template, options, messages).await?;
                reformat(&self.backend, &template, policy, outcome).await?
            }
            None => run_concurrent(&self.backend, &template, options, messages).await?,
        };

        assemble_structured(outcome)
    }
}

/// Blocking entry point
pub struct BlockingClient<B> {
    backend: B,
    capabilities: Arc<dyn ModelCapabilities>,
}

impl<B> std::fmt::Debug for BlockingClient<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient").finish_non_exhaustive()
    }
}

impl<B: BlockingCompletionApi> BlockingClient<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            capabilities: Arc::new(CapabilityTable::default()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl ModelCapabilities + 'static) -> Self {
        self.capabilities = Arc::new(capabilities);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn completion(
        &self,
        messages: Vec<Message>,
        options: &CompletionOptions,
    ) -> Result<UnifiedResult<String>> {
        validate_model_capabilities(
            self.capabilities.as_ref(),
            &options.model,
            false,
            !options.tools.is_empty(),
        )?;

        let template = RequestTemplate::from_options(options, None);
        let outcome = run_blocking(&self.backend, &template, options, messages)?;
        Ok(assemble_text(outcome))
    }

    /// Blocking counterpart of [`Client::structured_completion`]. The reformat policy is
    /// not applied on this path.
    pub fn structured_completion<T>(
        &self,
        messages: Vec<Message>,
        options: &CompletionOptions,
    ) -> Result<UnifiedResult<T>>
    where
        T: DeserializeOwned + JsonSchema,
    {
        validate_model_capabilities(
            self.capabilities.as_ref(),
            &options.model,
            true,
            !options.tools.is_empty(),
        )?;

        let schema = ResponseSchema::of::<T>();
        let template = RequestTemplate::from_options(options, Some(&schema));
        let outcome = run_blocking(&self.backend, &template, options, messages)?;
        assemble_structured(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawResponse;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    fn outcome(text: &str) -> LoopOutcome {
        LoopOutcome {
            messages: vec![Message::user("q"), Message::assistant(text)],
            raw_response: RawResponse::from_text(text),
        }
    }

    #[test]
    fn test_assemble_text_verbatim() {
        let result = assemble_text(outcome("  not json at all "));
        assert_eq!(result.content, "  not json at all ");
        assert_eq!(result.messages.len(), 2);
    }

    #[test]
    fn test_assemble_structured_parses() {
        let result = assemble_structured::<Point>(outcome(r#"{"x":1,"y":2}"#)).unwrap();
        assert_eq!(result.content, Point { x: 1, y: 2 });
    }

    #[test]
    fn test_assemble_structured_failure_keeps_context() {
        let err = assemble_structured::<Point>(outcome("invalid json")).unwrap_err();
        let ctx = err.retry_context().expect("retry context");
        assert_eq!(ctx.raw_response.content(), "invalid json");
        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.messages[1], Message::assistant("invalid json"));
    }

    #[test]
    fn test_missing_content_parses_as_empty_object() {
        #[derive(Debug, Deserialize)]
        struct Empty {}

        let outcome = LoopOutcome {
            messages: vec![],
            raw_response: RawResponse::default(),
        };
        assert!(assemble_structured::<Empty>(outcome).is_ok());
    }
}
