//! # Tool Registry
//!
//! This module turns host functions into tools a model can call through OpenAI-style
//! function calling, and resolves them into a single lookup used by the tool-calling loop.
//!
//! ## Two Ways to Declare a Tool
//!
//! Tool inputs are a tagged variant, [`ToolSpec`], resolved exactly once when a
//! [`ToolRegistry`] is built:
//!
//! 1. **Bare function** ([`FunctionTool`]) - a typed closure whose argument type derives
//!    `serde::Deserialize` and `schemars::JsonSchema`. The declared identifier becomes the
//!    tool name; the argument type's doc comment becomes the description and its fields
//!    become the parameter schema.
//!
//! 2. **Described tool** ([`Tool`]) - a record wrapping a function with its own name,
//!    description, and optionally an explicit parameter schema. An explicit schema is used
//!    as given; otherwise the wrapped function is reflected, with the record's name and
//!    description taking precedence.
//!
//! The [`tool()`] builder produces described tools with untyped (`serde_json::Value`)
//! handlers and schemas written in simple notation.
//!
//! ## Handlers
//!
//! Handlers receive the decoded arguments and the call's [`Metadata`], and return an
//! `anyhow::Result`. They can be blocking or async; both kinds run under both loop
//! variants:
//!
//! ```text
//!                  sequential loop              concurrent loop
//! Blocking         called directly              called inline in its future
//! Async            driven on a Tokio runtime    awaited with the rest of the round
//! ```
//!
//! On the sequential loop an async handler runs on the caller's Tokio runtime when there is
//! one (multi-thread flavour), and otherwise on a shared current-thread runtime, so timers,
//! `reqwest` and `tokio::sync` work inside handlers either way.
//!
//! ## Example
//!
//! ```rust,no_run
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//! use serde_json::json;
//! use structured_llm::{FunctionTool, Tool, ToolRegistry, tool};
//!
//! /// Return the current weather for a location
//! #[derive(Deserialize, JsonSchema)]
//! struct WeatherArgs {
//!     /// City name, e.g. San Francisco
//!     location: String,
//! }
//!
//! let weather = FunctionTool::blocking("get_current_weather", |args: WeatherArgs, _meta| {
//!     Ok(json!({"location": args.location, "temperature": "68°F"}))
//! });
//!
//! let renamed = Tool::new(weather.clone())
//!     .with_name("get_weather")
//!     .with_description("Get weather information for a specific location");
//!
//! let echo = tool("echo", "Echo the input back")
//!     .param("text", "string")
//!     .build(|args, _meta| async move { Ok(args) });
//!
//! let registry = ToolRegistry::new(vec![weather.into(), renamed.into(), echo.into()])?;
//! assert_eq!(registry.len(), 3);
//! # Ok::<(), structured_llm::Error>(())
//! ```

use crate::types::Metadata;
use crate::{Error, Result};
use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

/// Blocking handler signature
pub type BlockingHandler = Arc<dyn Fn(Value, Metadata) -> anyhow::Result<Value> + Send + Sync>;

/// Async handler signature
pub type AsyncHandler =
    Arc<dyn Fn(Value, Metadata) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// The callable behind a tool.
///
/// Cloning only bumps the `Arc` counter; the closure itself is shared.
#[derive(Clone)]
pub enum ToolHandler {
    Blocking(BlockingHandler),
    Async(AsyncHandler),
}

impl ToolHandler {
    /// Invoke from async code. Blocking handlers run inline.
    pub async fn call(&self, arguments: Value, metadata: Metadata) -> anyhow::Result<Value> {
        match self {
            ToolHandler::Blocking(f) => f(arguments, metadata),
            ToolHandler::Async(f) => f(arguments, metadata).await,
        }
    }

    /// Invoke from blocking code. Async handlers are driven to completion on a Tokio
    /// runtime before this returns.
    pub fn call_blocking(&self, arguments: Value, metadata: Metadata) -> anyhow::Result<Value> {
        match self {
            ToolHandler::Blocking(f) => f(arguments, metadata),
            ToolHandler::Async(f) => block_on_tokio(f(arguments, metadata)),
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, ToolHandler::Async(_))
    }
}

/// Shared runtime for async handlers called outside any Tokio runtime
fn handler_runtime() -> anyhow::Result<&'static Runtime> {
    static RUNTIME: OnceLock<std::io::Result<Runtime>> = OnceLock::new();
    RUNTIME
        .get_or_init(|| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
        })
        .as_ref()
        .map_err(|e| anyhow::anyhow!("failed to start runtime for async tool handler: {}", e))
}

fn block_on_tokio(future: BoxFuture<'static, anyhow::Result<Value>>) -> anyhow::Result<Value> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(future))
        }
        // current-thread runtimes cannot block in place; drive the future from another thread
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| handler_runtime()?.block_on(future))
                .join()
                .unwrap_or_else(|_| Err(anyhow::anyhow!("async tool handler panicked")))
        }),
        Err(_) => handler_runtime()?.block_on(future),
    }
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolHandler::Blocking(_) => f.write_str("ToolHandler::Blocking"),
            ToolHandler::Async(_) => f.write_str("ToolHandler::Async"),
        }
    }
}

/// A bare function exposed as a tool.
///
/// Name is the declared identifier; description and parameters come from reflecting
/// over the argument type.
#[derive(Clone, Debug)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
    handler: ToolHandler,
}

impl FunctionTool {
    /// Wrap a blocking typed function.
    ///
    /// Arguments that do not deserialize into `A` surface as an execution failure of the
    /// tool.
    pub fn blocking<A, R, F>(name: impl Into<String>, f: F) -> Self
    where
        A: DeserializeOwned + JsonSchema + 'static,
        R: Serialize + 'static,
        F: Fn(A, Metadata) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let (description, parameters) = reflect::<A>();
        let handler: BlockingHandler = Arc::new(move |arguments: Value, metadata: Metadata| {
            let args: A = serde_json::from_value(arguments)?;
            let output = f(args, metadata)?;
            Ok(serde_json::to_value(output)?)
        });

        Self {
            name: name.into(),
            description,
            parameters,
            handler: ToolHandler::Blocking(handler),
        }
    }

    /// Wrap an async typed function.
    pub fn asynchronous<A, R, F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        A: DeserializeOwned + JsonSchema + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A, Metadata) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        let (description, parameters) = reflect::<A>();
        let handler: AsyncHandler = Arc::new(
            move |arguments: Value, metadata: Metadata| -> BoxFuture<'static, anyhow::Result<Value>> {
                match serde_json::from_value::<A>(arguments) {
                    Ok(args) => {
                        let fut = f(args, metadata);
                        Box::pin(async move {
                            let output = fut.await?;
                            Ok(serde_json::to_value(output)?)
                        })
                    }
                    Err(e) => Box::pin(async move { Err(e.into()) }),
                }
            },
        );

        Self {
            name: name.into(),
            description,
            parameters,
            handler: ToolHandler::Async(handler),
        }
    }

    /// Wrap an untyped handler with an explicit description and schema
    pub fn from_handler(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: convert_schema_to_openai(parameters),
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    pub fn handler(&self) -> &ToolHandler {
        &self.handler
    }
}

/// A described tool: a function plus caller-supplied name, description, and
/// (optionally) parameter schema.
#[derive(Clone, Debug)]
pub struct Tool {
    func: FunctionTool,
    name: Option<String>,
    description: Option<String>,
    parameters: Option<Value>,
}

impl Tool {
    pub fn new(func: FunctionTool) -> Self {
        Self {
            func,
            name: None,
            description: None,
            parameters: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Use this schema verbatim instead of reflecting over the wrapped function
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.func.name())
    }

    pub fn description(&self) -> &str {
        self.description
            .as_deref()
            .unwrap_or(self.func.description())
    }
}

/// Either form of tool input accepted by the registry
#[derive(Clone, Debug)]
pub enum ToolSpec {
    Function(FunctionTool),
    Described(Tool),
}

impl From<FunctionTool> for ToolSpec {
    fn from(func: FunctionTool) -> Self {
        ToolSpec::Function(func)
    }
}

impl From<Tool> for ToolSpec {
    fn from(tool: Tool) -> Self {
        ToolSpec::Described(tool)
    }
}

impl ToolSpec {
    fn resolve(self) -> ResolvedTool {
        match self {
            ToolSpec::Function(func) => ResolvedTool {
                name: func.name,
                description: func.description,
                parameters: func.parameters,
                handler: func.handler,
            },
            ToolSpec::Described(tool) => {
                let name = tool.name.unwrap_or(tool.func.name);
                let description = tool.description.unwrap_or(tool.func.description);
                let parameters = match tool.parameters {
                    Some(explicit) => convert_schema_to_openai(explicit),
                    None => tool.func.parameters,
                };
                ResolvedTool {
                    name,
                    description,
                    parameters,
                    handler: tool.func.handler,
                }
            }
        }
    }
}

/// Uniform internal tool record used for schema emission and dispatch
#[derive(Clone, Debug)]
pub struct ResolvedTool {
    name: String,
    description: String,
    parameters: Value,
    handler: ToolHandler,
}

impl ResolvedTool {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    pub fn handler(&self) -> &ToolHandler {
        &self.handler
    }

    /// Execute from async code
    pub async fn execute(&self, arguments: Value, metadata: Metadata) -> anyhow::Result<Value> {
        self.handler.call(arguments, metadata).await
    }

    /// Execute from blocking code
    pub fn execute_blocking(&self, arguments: Value, metadata: Metadata) -> anyhow::Result<Value> {
        self.handler.call_blocking(arguments, metadata)
    }

    /// Tool schema descriptor in OpenAI function-calling format:
    ///
    /// ```json
    /// {"type": "function", "function": {"name": "...", "description": "...", "parameters": {...}}}
    /// ```
    pub fn to_openai_format(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters
            }
        })
    }
}

/// Name → tool lookup built once per options record.
///
/// Names must be unique: a collision is a configuration error rather than a silent
/// override.
#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ResolvedTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new<I>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = ToolSpec>,
    {
        let mut registry = Self::default();
        for spec in specs {
            let resolved = spec.resolve();
            if resolved.name.is_empty() {
                return Err(Error::config("tool name must not be empty"));
            }
            if registry.index.contains_key(&resolved.name) {
                return Err(Error::config(format!(
                    "duplicate tool name '{}'",
                    resolved.name
                )));
            }
            registry
                .index
                .insert(resolved.name.clone(), registry.tools.len());
            registry.tools.push(resolved);
        }
        Ok(registry)
    }

    /// API-facing schema list, or `None` when no tools are registered
    pub fn schemas(&self) -> Option<Vec<Value>> {
        if self.tools.is_empty() {
            return None;
        }
        Some(self.tools.iter().map(ResolvedTool::to_openai_format).collect())
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Reflect a tool argument type into `(description, parameters)`.
///
/// The type-level doc comment is lifted out as the description; `$schema` and `title`
/// are dropped since they mean nothing to the completion API.
fn reflect<A: JsonSchema>() -> (String, Value) {
    let schema = schemars::schema_for!(A);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({}));

    let mut description = String::new();
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        if let Some(Value::String(doc)) = obj.remove("description") {
            description = doc;
        }
    }

    (description, convert_schema_to_openai(value))
}

/// Convert the accepted schema notations to OpenAI's JSON Schema format.
///
/// - A schema that already declares `"type": "object"` passes through (an empty
///   `properties` map is added when missing).
/// - A schema declaring any other `type` cannot describe function parameters and is
///   replaced by an empty object schema.
/// - Simple notation, `{"location": "string"}`, expands to full JSON Schema with every
///   parameter required.
/// - Extended notation, `{"limit": {"type": "integer", "optional": true}}`, keeps the
///   property schema; `optional`/`required` flags and `default` values decide whether the
///   parameter lands in `required`.
fn convert_schema_to_openai(schema: Value) -> Value {
    let Value::Object(mut obj) = schema else {
        return empty_object_schema();
    };

    match obj.get("type") {
        Some(Value::String(t)) if t == "object" => {
            obj.entry("properties")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            return Value::Object(obj);
        }
        Some(Value::String(_)) => return empty_object_schema(),
        _ => {}
    }

    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for (param_name, param_type) in obj {
        match param_type {
            Value::String(type_str) => {
                properties.insert(param_name.clone(), type_to_json_schema(&type_str));
                required.push(param_name);
            }
            Value::Object(mut prop) => {
                let is_optional = prop
                    .remove("optional")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let is_required = prop.remove("required").and_then(|v| v.as_bool());
                let has_default = prop.contains_key("default");

                properties.insert(param_name.clone(), Value::Object(prop));

                if let Some(true) = is_required {
                    required.push(param_name);
                } else if is_optional || is_required == Some(false) {
                    // explicitly optional
                } else if !has_default {
                    required.push(param_name);
                }
            }
            _ => {}
        }
    }

    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn empty_object_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

/// Map friendly type names (`"str"`, `"i64"`, `"dict"`, ...) to JSON Schema types.
/// Unknown names fall back to `"string"`.
fn type_to_json_schema(type_str: &str) -> Value {
    let json_type = match type_str {
        "string" | "str" => "string",
        "integer" | "int" | "i32" | "i64" | "u32" | "u64" => "integer",
        "number" | "float" | "f32" | "f64" => "number",
        "boolean" | "bool" => "boolean",
        "array" | "list" | "vec" => "array",
        "object" | "dict" | "map" => "object",
        _ => "string",
    };

    serde_json::json!({ "type": json_type })
}

/// Builder for described tools with untyped handlers.
///
/// Use either `.param()` for simple cases or `.schema()` for complex ones; `.schema()`
/// replaces anything added through `.param()`.
pub struct ToolBuilder {
    name: String,
    description: String,
    schema: Value,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: serde_json::json!({}),
        }
    }

    /// Set the complete parameter schema (simple, extended, or full JSON Schema)
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Add a required parameter with a simple type name
    pub fn param(mut self, name: &str, type_str: &str) -> Self {
        if !self.schema.is_object() {
            self.schema = Value::Object(serde_json::Map::new());
        }
        if let Some(obj) = self.schema.as_object_mut() {
            obj.insert(name.to_string(), Value::String(type_str.to_string()));
        }
        self
    }

    /// Finish with an async handler
    pub fn build<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(Value, Metadata) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: AsyncHandler = Arc::new(
            move |args: Value, metadata: Metadata| -> BoxFuture<'static, anyhow::Result<Value>> {
                Box::pin(handler(args, metadata))
            },
        );
        self.finish(ToolHandler::Async(handler))
    }

    /// Finish with a blocking handler
    pub fn build_blocking<F>(self, handler: F) -> Tool
    where
        F: Fn(Value, Metadata) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.finish(ToolHandler::Blocking(Arc::new(handler)))
    }

    fn finish(self, handler: ToolHandler) -> Tool {
        let func = FunctionTool::from_handler(
            self.name.clone(),
            self.description.clone(),
            serde_json::json!({}),
            handler,
        );
        Tool::new(func)
            .with_name(self.name)
            .with_description(self.description)
            .with_parameters(self.schema)
    }
}

/// Start building a described tool.
///
/// ```rust
/// use serde_json::json;
/// use structured_llm::tool;
///
/// let add = tool("add", "Add two numbers")
///     .param("a", "number")
///     .param("b", "number")
///     .build_blocking(|args, _meta| {
///         let a = args["a"].as_f64().unwrap_or(0.0);
///         let b = args["b"].as_f64().unwrap_or(0.0);
///         Ok(json!({"result": a + b}))
///     });
/// assert_eq!(add.name(), "add");
/// ```
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    /// Return weather
    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct WeatherArgs {
        /// City to look up
        location: String,
    }

    fn weather_fn() -> FunctionTool {
        FunctionTool::blocking("get_current_weather", |args: WeatherArgs, _meta| {
            Ok(json!({"location": args.location, "temperature": "68°F"}))
        })
    }

    #[test]
    fn test_type_to_json_schema() {
        assert_eq!(type_to_json_schema("string"), json!({"type": "string"}));
        assert_eq!(type_to_json_schema("i64"), json!({"type": "integer"}));
        assert_eq!(type_to_json_schema("f32"), json!({"type": "number"}));
        assert_eq!(type_to_json_schema("bool"), json!({"type": "boolean"}));
        assert_eq!(type_to_json_schema("unknown"), json!({"type": "string"}));
    }

    #[test]
    fn test_convert_simple_schema() {
        let result = convert_schema_to_openai(json!({"location": "string", "units": "string"}));

        assert_eq!(result["type"], "object");
        assert_eq!(result["properties"]["location"]["type"], "string");
        assert_eq!(result["required"], json!(["location", "units"]));
    }

    #[test]
    fn test_convert_extended_schema_optionality() {
        let result = convert_schema_to_openai(json!({
            "query": {"type": "string", "description": "Search query"},
            "limit": {"type": "integer", "optional": true},
            "page": {"type": "integer", "default": 1}
        }));

        assert_eq!(result["required"], json!(["query"]));
        assert!(result["properties"]["limit"].get("optional").is_none());
    }

    #[test]
    fn test_convert_full_schema_passthrough() {
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        });
        assert_eq!(convert_schema_to_openai(schema.clone()), schema);
    }

    #[test]
    fn test_convert_object_schema_without_properties() {
        let result = convert_schema_to_openai(json!({"type": "object"}));
        assert_eq!(result, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_convert_non_object_schema() {
        assert_eq!(convert_schema_to_openai(json!({"type": "null"})), empty_object_schema());
        assert_eq!(convert_schema_to_openai(json!("string")), empty_object_schema());
    }

    #[test]
    fn test_reflection_of_bare_function() {
        let func = weather_fn();
        assert_eq!(func.name(), "get_current_weather");
        assert_eq!(func.description(), "Return weather");
        assert_eq!(func.parameters()["type"], "object");
        assert_eq!(func.parameters()["properties"]["location"]["type"], "string");
        assert_eq!(func.parameters()["required"], json!(["location"]));
        assert!(func.parameters().get("$schema").is_none());
        assert!(func.parameters().get("title").is_none());
    }

    #[test]
    fn test_described_tool_overrides_reflected_metadata() {
        let registry = ToolRegistry::new(vec![
            Tool::new(weather_fn())
                .with_name("get_weather")
                .with_description("Weather lookup")
                .into(),
        ])
        .unwrap();

        let resolved = registry.get("get_weather").unwrap();
        assert_eq!(resolved.description(), "Weather lookup");
        // parameters still come from reflection
        assert_eq!(resolved.parameters()["properties"]["location"]["type"], "string");
    }

    #[test]
    fn test_described_tool_explicit_parameters_verbatim() {
        let explicit = json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        });
        let registry = ToolRegistry::new(vec![
            Tool::new(weather_fn()).with_parameters(explicit.clone()).into(),
        ])
        .unwrap();

        let resolved = registry.get("get_current_weather").unwrap();
        assert_eq!(resolved.parameters(), &explicit);
        assert_eq!(resolved.description(), "Return weather");
    }

    #[test]
    fn test_registry_without_tools_has_no_schemas() {
        let registry = ToolRegistry::new(Vec::new()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.schemas().is_none());
    }

    #[test]
    fn test_registry_schema_descriptor_shape() {
        let registry = ToolRegistry::new(vec![weather_fn().into()]).unwrap();
        let schemas = registry.schemas().unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0]["type"], "function");
        assert_eq!(schemas[0]["function"]["name"], "get_current_weather");
        assert_eq!(schemas[0]["function"]["description"], "Return weather");
        assert!(schemas[0]["function"]["parameters"].is_object());
    }

    #[test]
    fn test_registry_rejects_duplicate_names() {
        let result = ToolRegistry::new(vec![
            weather_fn().into(),
            Tool::new(weather_fn()).into(),
        ]);
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("get_current_weather")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_registry_preserves_declaration_order() {
        let registry = ToolRegistry::new(vec![
            tool("b", "B").build_blocking(|_, _| Ok(json!(null))).into(),
            tool("a", "A").build_blocking(|_, _| Ok(json!(null))).into(),
        ])
        .unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_blocking_handler_executes() {
        let registry = ToolRegistry::new(vec![weather_fn().into()]).unwrap();
        let tool = registry.get("get_current_weather").unwrap();
        let output = tool
            .execute_blocking(json!({"location": "X"}), Metadata::none())
            .unwrap();
        assert_eq!(output, json!({"location": "X", "temperature": "68°F"}));
    }

    #[test]
    fn test_typed_handler_rejects_mismatched_arguments() {
        let registry = ToolRegistry::new(vec![weather_fn().into()]).unwrap();
        let tool = registry.get("get_current_weather").unwrap();
        assert!(tool.execute_blocking(json!({"city": 1}), Metadata::none()).is_err());
    }

    #[tokio::test]
    async fn test_async_function_tool() {
        let func = FunctionTool::asynchronous("aget_weather", |args: WeatherArgs, meta: Metadata| async move {
            Ok(json!({
                "location": args.location,
                "trace": meta.get("trace_id").cloned()
            }))
        });
        assert!(func.handler().is_async());

        let output = func
            .handler()
            .call(json!({"location": "X"}), Metadata::new(json!({"trace_id": "t1"})))
            .await
            .unwrap();
        assert_eq!(output, json!({"location": "X", "trace": "t1"}));
    }

    #[test]
    fn test_async_handler_from_blocking_code() {
        let echo = tool("echo", "Echo").build(|args, _meta| async move { Ok(args) });
        let registry = ToolRegistry::new(vec![echo.into()]).unwrap();
        let output = registry
            .get("echo")
            .unwrap()
            .execute_blocking(json!({"x": 1}), Metadata::none())
            .unwrap();
        assert_eq!(output, json!({"x": 1}));
    }

    fn sleeper() -> ToolHandler {
        let t = tool("wait", "Wait briefly").build(|_args, _meta| async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok(json!("waited"))
        });
        let registry = ToolRegistry::new(vec![t.into()]).unwrap();
        registry.get("wait").unwrap().handler().clone()
    }

    #[test]
    fn test_async_timer_handler_without_runtime() {
        let output = sleeper().call_blocking(json!({}), Metadata::none()).unwrap();
        assert_eq!(output, json!("waited"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_timer_handler_inside_multi_thread_runtime() {
        let output = sleeper().call_blocking(json!({}), Metadata::none()).unwrap();
        assert_eq!(output, json!("waited"));
    }

    #[tokio::test]
    async fn test_async_timer_handler_inside_current_thread_runtime() {
        let output = sleeper().call_blocking(json!({}), Metadata::none()).unwrap();
        assert_eq!(output, json!("waited"));
    }

    #[test]
    fn test_builder_schema_and_params() {
        let t = tool("search", "Search")
            .param("query", "string")
            .param("limit", "integer")
            .build_blocking(|_, _| Ok(json!([])));
        let registry = ToolRegistry::new(vec![t.into()]).unwrap();
        let params = registry.get("search").unwrap().parameters();
        assert_eq!(params["properties"]["limit"]["type"], "integer");
        assert_eq!(params["required"], json!(["query", "limit"]));
    }

    #[test]
    fn test_param_after_non_object_schema() {
        let t = tool("test", "Test tool")
            .schema(json!("string"))
            .param("key", "number")
            .build_blocking(|_, _| Ok(json!({})));
        let registry = ToolRegistry::new(vec![t.into()]).unwrap();
        assert!(registry.get("test").unwrap().parameters()["properties"]["key"].is_object());
    }
}
