//! Core types: messages, tool-call requests, raw responses, and call options

use crate::tools::{ToolRegistry, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Default ceiling for tool-executing rounds in one completion call
pub const DEFAULT_MAX_RECURSION: u32 = 3;

/// Default instruction appended before the reformatting call
pub const DEFAULT_REFORMAT_INSTRUCTION: &str = "Make the output of last response structured.";

/// Message role in the conversation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    #[default]
    Assistant,
    Tool,
}

/// A single message in the conversation, in OpenAI wire shape.
///
/// Assistant turns that request tools carry `tool_calls`; tool-result turns carry
/// `tool_call_id` (linking them to the request they answer) and `name` (the tool that
/// ran).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    /// Assistant turn that requests tool executions
    pub fn assistant_with_tool_calls(
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            name: None,
        }
    }

    /// Tool-result turn answering the request with id `tool_call_id`
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }

    /// Returns the textual content, or `""` when there is none.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

fn function_call_type() -> String {
    "function".to_string()
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type", default = "function_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

/// Name and JSON-encoded arguments of a requested function
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: function_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Decode the argument blob. An empty blob decodes to an empty object.
    pub fn arguments(&self) -> crate::Result<Value> {
        if self.function.arguments.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        Ok(serde_json::from_str(&self.function.arguments)?)
    }
}

/// Assistant message as returned inside a completion choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: MessageRole,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

/// One choice of a completion response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Decoded body of a (non-streaming) chat completion response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

impl RawResponse {
    /// Response whose first choice carries only text
    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                message: ResponseMessage {
                    role: MessageRole::Assistant,
                    content: Some(content.into()),
                    tool_calls: None,
                },
                finish_reason: Some("stop".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// Response whose first choice requests the given tool calls
    pub fn from_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            choices: vec![Choice {
                message: ResponseMessage {
                    role: MessageRole::Assistant,
                    content: None,
                    tool_calls: Some(tool_calls),
                },
                finish_reason: Some("tool_calls".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn first_message(&self) -> Option<&ResponseMessage> {
        self.choices.first().map(|c| &c.message)
    }

    /// Textual content of the latest turn.
    ///
    /// Never absent: defaults to the empty JSON object `"{}"` so schema parsing always
    /// sees well-formed input.
    pub fn content(&self) -> String {
        self.first_message()
            .and_then(|m| m.content.clone())
            .unwrap_or_else(|| "{}".to_string())
    }

    /// Tool-call requests of the latest turn; `None` when absent or empty.
    pub fn tool_calls(&self) -> Option<&[ToolCallRequest]> {
        self.first_message()
            .and_then(|m| m.tool_calls.as_deref())
            .filter(|calls| !calls.is_empty())
    }

    /// The latest turn as a transcript message (including any tool-call requests)
    pub fn assistant_message(&self) -> Message {
        match self.first_message() {
            Some(m) => Message {
                role: MessageRole::Assistant,
                content: m.content.clone(),
                tool_calls: m.tool_calls.clone(),
                tool_call_id: None,
                name: None,
            },
            None => Message::assistant(self.content()),
        }
    }
}

/// Terminal value of a completion call: the parsed content plus the full transcript.
#[derive(Debug, Clone, Serialize)]
pub struct UnifiedResult<T> {
    pub content: T,
    pub messages: Vec<Message>,
}

/// Call metadata handed unchanged to every nested completion request and tool invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(Option<Arc<Value>>);

impl Metadata {
    pub fn new(value: Value) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn value(&self) -> Option<&Value> {
        self.0.as_deref()
    }

    /// Look up a top-level key when the metadata is an object
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value().and_then(|v| v.get(key))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

/// Workaround for model families that cannot honour tool calling and a response schema
/// in the same request.
///
/// When it applies, the tool-calling exchange runs without the schema constraint, and one
/// extra call on `fallback_model` restates the last answer with the schema applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ReformatPolicy {
    pub model_families: Vec<String>,
    pub fallback_model: String,
    pub instruction: String,
}

impl ReformatPolicy {
    pub fn new(fallback_model: impl Into<String>) -> Self {
        Self {
            model_families: Vec::new(),
            fallback_model: fallback_model.into(),
            instruction: DEFAULT_REFORMAT_INSTRUCTION.to_string(),
        }
    }

    /// Add a model family (name prefix, matched per `/`-separated segment)
    pub fn family(mut self, prefix: impl Into<String>) -> Self {
        self.model_families.push(prefix.into());
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn applies_to(&self, model: &str) -> bool {
        self.model_families.iter().any(|family| {
            !family.is_empty() && model.split('/').any(|segment| segment.starts_with(family.as_str()))
        })
    }
}

/// Immutable configuration for one top-level completion call
#[derive(Clone)]
pub struct CompletionOptions {
    /// Model identifier forwarded to the completion API
    pub model: String,

    /// Tools the model may call
    pub tools: ToolRegistry,

    /// Ceiling on tool-executing rounds
    pub max_recursion: u32,

    /// Metadata forwarded to every request and tool invocation
    pub metadata: Metadata,

    /// Pass-through request options (temperature, parallel_tool_calls, ...)
    pub extra: Map<String, Value>,

    /// Optional schema/tool reconciliation workaround (async path only)
    pub reformat: Option<ReformatPolicy>,
}

impl std::fmt::Debug for CompletionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionOptions")
            .field("model", &self.model)
            .field("tools", &format!("{} tools", self.tools.len()))
            .field("max_recursion", &self.max_recursion)
            .field("metadata", &self.metadata)
            .field("extra", &self.extra)
            .field("reformat", &self.reformat)
            .finish()
    }
}

impl CompletionOptions {
    /// Create a new builder for CompletionOptions
    pub fn builder() -> CompletionOptionsBuilder {
        CompletionOptionsBuilder::default()
    }
}

/// Builder for CompletionOptions
#[derive(Default)]
pub struct CompletionOptionsBuilder {
    model: Option<String>,
    tools: Vec<ToolSpec>,
    max_recursion: Option<u32>,
    metadata: Option<Value>,
    extra: Map<String, Value>,
    reformat: Option<ReformatPolicy>,
}

impl std::fmt::Debug for CompletionOptionsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionOptionsBuilder")
            .field("model", &self.model)
            .field("tools", &format!("{} tools", self.tools.len()))
            .field("max_recursion", &self.max_recursion)
            .finish()
    }
}

impl CompletionOptionsBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn tool(mut self, tool: impl Into<ToolSpec>) -> Self {
        self.tools.push(tool.into());
        self
    }

    pub fn tools<I, T>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ToolSpec>,
    {
        self.tools.extend(tools.into_iter().map(Into::into));
        self
    }

    pub fn max_recursion(mut self, max_recursion: u32) -> Self {
        self.max_recursion = Some(max_recursion);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Add a pass-through request option
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn temperature(self, temperature: f32) -> Self {
        self.option("temperature", temperature)
    }

    pub fn parallel_tool_calls(self, enabled: bool) -> Self {
        self.option("parallel_tool_calls", enabled)
    }

    pub fn reformat(mut self, policy: ReformatPolicy) -> Self {
        self.reformat = Some(policy);
        self
    }

    pub fn build(self) -> crate::Result<CompletionOptions> {
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| crate::Error::config("model is required"))?;

        let max_recursion = self.max_recursion.unwrap_or(DEFAULT_MAX_RECURSION);
        if max_recursion == 0 {
            return Err(crate::Error::config("max_recursion must be at least 1"));
        }

        // Request keys owned by the gateway cannot be overridden through pass-through options
        for reserved in ["model", "messages", "tools", "response_format", "metadata"] {
            if self.extra.contains_key(reserved) {
                return Err(crate::Error::config(format!(
                    "'{}' cannot be set as a pass-through option",
                    reserved
                )));
            }
        }

        Ok(CompletionOptions {
            model,
            tools: ToolRegistry::new(self.tools)?,
            max_recursion,
            metadata: self.metadata.map(Metadata::new).unwrap_or_default(),
            extra: self.extra,
            reformat: self.reformat,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completion_options_builder() {
        let options = CompletionOptions::builder()
            .model("gpt-4o-mini")
            .max_recursion(10)
            .metadata(json!({"trace_id": "abc"}))
            .temperature(0.5)
            .parallel_tool_calls(true)
            .build()
            .unwrap();

        assert_eq!(options.model, "gpt-4o-mini");
        assert_eq!(options.max_recursion, 10);
        assert_eq!(options.metadata.get("trace_id"), Some(&json!("abc")));
        assert_eq!(options.extra["temperature"], json!(0.5));
        assert_eq!(options.extra["parallel_tool_calls"], json!(true));
        assert!(options.tools.is_empty());
        assert!(options.reformat.is_none());
    }

    #[test]
    fn test_completion_options_defaults() {
        let options = CompletionOptions::builder().model("m").build().unwrap();
        assert_eq!(options.max_recursion, DEFAULT_MAX_RECURSION);
        assert!(options.metadata.is_none());
        assert!(options.extra.is_empty());
    }

    #[test]
    fn test_completion_options_missing_model() {
        assert!(CompletionOptions::builder().build().is_err());
        assert!(CompletionOptions::builder().model("  ").build().is_err());
    }

    #[test]
    fn test_completion_options_rejects_zero_recursion() {
        let result = CompletionOptions::builder().model("m").max_recursion(0).build();
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_completion_options_rejects_reserved_option() {
        let result = CompletionOptions::builder()
            .model("m")
            .option("messages", json!([]))
            .build();
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_message_role_serialization() {
        assert_eq!(serde_json::to_string(&MessageRole::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&MessageRole::Tool).unwrap(), "\"tool\"");
    }

    #[test]
    fn test_tool_result_message_wire_shape() {
        let msg = Message::tool_result("call_1", "get_weather", "{\"temp\":68}");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "tool",
                "content": "{\"temp\":68}",
                "tool_call_id": "call_1",
                "name": "get_weather"
            })
        );
    }

    #[test]
    fn test_raw_response_deserialization() {
        let raw: RawResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"location\":\"X\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();

        let calls = raw.tool_calls().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name(), "get_weather");
        assert_eq!(calls[0].arguments().unwrap(), json!({"location": "X"}));
        // null content defaults to the empty JSON object
        assert_eq!(raw.content(), "{}");
    }

    #[test]
    fn test_raw_response_content_defaults() {
        assert_eq!(RawResponse::default().content(), "{}");
        assert!(RawResponse::default().tool_calls().is_none());
        assert_eq!(RawResponse::from_text("hello").content(), "hello");
    }

    #[test]
    fn test_empty_tool_call_list_is_final() {
        let raw = RawResponse::from_tool_calls(vec![]);
        assert!(raw.tool_calls().is_none());
    }

    #[test]
    fn test_assistant_message_keeps_tool_calls() {
        let call = ToolCallRequest::new("call_1", "add", "{}");
        let msg = RawResponse::from_tool_calls(vec![call.clone()]).assistant_message();
        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(msg.tool_calls, Some(vec![call]));
        assert!(msg.content.is_none());
    }

    #[test]
    fn test_empty_arguments_decode_to_object() {
        let call = ToolCallRequest::new("call_1", "now", "");
        assert_eq!(call.arguments().unwrap(), json!({}));
    }

    #[test]
    fn test_malformed_arguments_are_json_errors() {
        let call = ToolCallRequest::new("call_1", "now", "{not json");
        assert!(matches!(call.arguments(), Err(crate::Error::Json(_))));
    }

    #[test]
    fn test_reformat_policy_matching() {
        let policy = ReformatPolicy::new("gemini/gemini-2.0-flash").family("gemini");
        assert!(policy.applies_to("gemini/gemini-1.5-pro"));
        assert!(policy.applies_to("gemini-1.5-pro"));
        assert!(!policy.applies_to("gpt-4o-mini"));
        assert_eq!(policy.instruction, DEFAULT_REFORMAT_INSTRUCTION);
        assert!(!ReformatPolicy::new("x").applies_to("gemini-1.5-pro"));
    }
}
