//! Completion gateway: the single point of contact with the completion API.
//!
//! Everything that talks to a model goes through [`CompletionApi`] (async) or
//! [`BlockingCompletionApi`] (blocking). Each `complete` call performs exactly one
//! request and returns the decoded [`RawResponse`]. The HTTP implementations live in
//! [`crate::client`]; tests plug in scripted backends.

use crate::types::{CompletionOptions, Message, Metadata, RawResponse};
use crate::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Name and JSON Schema of a structured response type
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: Value,
}

impl ResponseSchema {
    /// Derive the schema of `T`.
    ///
    /// The name is the type's schema name with characters outside `[A-Za-z0-9_-]`
    /// replaced by `_`.
    pub fn of<T: JsonSchema>() -> Self {
        let name: String = T::schema_name()
            .to_string()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();

        let mut schema = serde_json::to_value(schemars::schema_for!(T))
            .unwrap_or_else(|_| serde_json::json!({}));
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("$schema");
        }

        Self { name, schema }
    }

    /// `response_format` value in OpenAI structured-output shape
    pub fn to_response_format(&self) -> Value {
        serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": self.name,
                "schema": self.schema
            }
        })
    }
}

/// One completion request.
///
/// Borrows everything: the loop builds one per external call from a
/// [`RequestTemplate`] and the current transcript.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a Value>,
    #[serde(flatten)]
    pub extra: &'a Map<String, Value>,
}

impl CompletionRequest<'_> {
    /// JSON body of the request. Metadata is dropped unless `include_metadata` is set,
    /// since not every server accepts the field.
    pub fn to_body(&self, include_metadata: bool) -> Result<Value> {
        let mut body = serde_json::to_value(self)?;
        if !include_metadata {
            if let Some(obj) = body.as_object_mut() {
                obj.remove("metadata");
            }
        }
        Ok(body)
    }
}

/// Everything about a request except the message list, fixed for one top-level call
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    model: String,
    tools: Option<Vec<Value>>,
    response_format: Option<Value>,
    metadata: Metadata,
    extra: Map<String, Value>,
}

impl RequestTemplate {
    pub fn from_options(options: &CompletionOptions, schema: Option<&ResponseSchema>) -> Self {
        Self {
            model: options.model.clone(),
            tools: options.tools.schemas(),
            response_format: schema.map(ResponseSchema::to_response_format),
            metadata: options.metadata.clone(),
            extra: options.extra.clone(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn without_tools(mut self) -> Self {
        self.tools = None;
        self
    }

    /// Drop pass-through options (they are tuned for the original model)
    pub fn without_extra(mut self) -> Self {
        self.extra = Map::new();
        self
    }

    pub fn with_response_format(mut self, response_format: Option<Value>) -> Self {
        self.response_format = response_format;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_tools(&self) -> bool {
        self.tools.is_some()
    }

    pub fn response_format(&self) -> Option<&Value> {
        self.response_format.as_ref()
    }

    pub fn request<'a>(&'a self, messages: &'a [Message]) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages,
            tools: self.tools.as_deref(),
            response_format: self.response_format.as_ref(),
            metadata: self.metadata.value(),
            extra: &self.extra,
        }
    }
}

/// Async completion backend
#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Perform exactly one completion request
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawResponse>;
}

/// Blocking completion backend
pub trait BlockingCompletionApi: Send + Sync {
    /// Perform exactly one completion request on the calling thread
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawResponse>;
}

#[async_trait]
impl<T: CompletionApi + ?Sized> CompletionApi for Arc<T> {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawResponse> {
        (**self).complete(request).await
    }
}

impl<T: BlockingCompletionApi + ?Sized> BlockingCompletionApi for Arc<T> {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawResponse> {
        (**self).complete(request)
    }
}
