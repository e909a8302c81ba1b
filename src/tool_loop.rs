//! # Tool-Call Loop
//!
//! Drives the request → response → tool-execution cycle until the model produces a final
//! answer or the recursion limit is hit.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 ▼                                              │
//!        AWAITING_MODEL ──(tool calls)──► HAS_TOOL_CALLS ────────┘
//!                 │                      depth += 1
//!                 │                      depth >= max_recursion → MaxRecursion
//!                 │                      run tools, append assistant turn + results
//!                 └──(no tool calls)───► FINAL: append assistant(content), stop
//! ```
//!
//! Two variants share the same state machine:
//!
//! - [`run_blocking`] executes the calls of a round one at a time, in the order the model
//!   listed them.
//! - [`run_concurrent`] starts every call of a round together and joins them; results are
//!   committed in request order once the whole round has finished.
//!
//! Any dispatch, decoding, or execution failure aborts the whole call. Nothing is
//! retried or skipped, and no partial transcript is returned.

use crate::gateway::{BlockingCompletionApi, CompletionApi, RequestTemplate};
use crate::tools::{ResolvedTool, ToolRegistry};
use crate::types::{CompletionOptions, Message, Metadata, RawResponse, ReformatPolicy, ToolCallRequest};
use crate::{Error, Result};
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, trace};

/// Per-call conversation state, owned by one loop invocation
#[derive(Debug, Clone)]
pub struct ConversationState {
    messages: Vec<Message>,
    last_response: RawResponse,
    recursion_depth: u32,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>, initial_response: RawResponse) -> Self {
        Self {
            messages,
            last_response: initial_response,
            recursion_depth: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_response(&self) -> &RawResponse {
        &self.last_response
    }

    pub fn recursion_depth(&self) -> u32 {
        self.recursion_depth
    }

    /// Tool calls requested by the latest response, if any
    pub fn pending_tool_calls(&self) -> Option<Vec<ToolCallRequest>> {
        self.last_response.tool_calls().map(<[_]>::to_vec)
    }

    /// Count a tool-executing round against the limit
    fn enter_round(&mut self, max_recursion: u32) -> Result<()> {
        self.recursion_depth += 1;
        if self.recursion_depth >= max_recursion {
            return Err(Error::max_recursion(self.recursion_depth, max_recursion));
        }
        Ok(())
    }

    /// Append the assistant turn that requested the round, then its results in order
    fn commit_round(&mut self, results: Vec<Message>) {
        self.messages.push(self.last_response.assistant_message());
        self.messages.extend(results);
    }

    fn record_response(&mut self, response: RawResponse) {
        self.last_response = response;
    }

    /// Close the conversation with the final assistant message
    fn finish(mut self) -> LoopOutcome {
        self.messages
            .push(Message::assistant(self.last_response.content()));
        LoopOutcome {
            messages: self.messages,
            raw_response: self.last_response,
        }
    }
}

/// Transcript and terminal response of a finished loop
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub messages: Vec<Message>,
    pub raw_response: RawResponse,
}

/// Text sent back to the model for a tool's return value.
///
/// Strings pass through unchanged; every other value is serialized to JSON text.
pub fn tool_result_content(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Resolve a tool-call request to its tool and decoded arguments
fn dispatch<'r>(registry: &'r ToolRegistry, call: &ToolCallRequest) -> Result<(&'r ResolvedTool, Value)> {
    let tool = registry
        .get(call.name())
        .ok_or_else(|| Error::function_dispatch(call.name()))?;
    let arguments = call.arguments()?;
    Ok((tool, arguments))
}

fn result_message(call: &ToolCallRequest, output: anyhow::Result<Value>) -> Result<Message> {
    let value = output
        .map_err(|e| Error::function_execution(&call.id, call.name(), format!("{:#}", e)))?;
    Ok(Message::tool_result(&call.id, call.name(), tool_result_content(value)))
}

fn execute_blocking(registry: &ToolRegistry, call: &ToolCallRequest, metadata: &Metadata) -> Result<Message> {
    let (tool, arguments) = dispatch(registry, call)?;
    trace!(tool = call.name(), id = %call.id, "executing tool call");
    let output = tool.execute_blocking(arguments, metadata.clone());
    result_message(call, output)
}

/// Blocking loop: one network call at a time, tools executed sequentially in request order.
///
/// Issues the initial request for `messages`, then keeps re-invoking the backend with the
/// extended transcript while the model requests tools.
pub fn run_blocking<B>(
    backend: &B,
    template: &RequestTemplate,
    options: &CompletionOptions,
    messages: Vec<Message>,
) -> Result<LoopOutcome>
where
    B: BlockingCompletionApi + ?Sized,
{
    let initial = backend.complete(&template.request(&messages))?;
    let mut state = ConversationState::new(messages, initial);

    while let Some(calls) = state.pending_tool_calls() {
        state.enter_round(options.max_recursion)?;
        debug!(
            depth = state.recursion_depth(),
            calls = calls.len(),
            "starting tool round"
        );

        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            results.push(execute_blocking(&options.tools, call, &options.metadata)?);
        }
        state.commit_round(results);

        let response = backend.complete(&template.request(state.messages()))?;
        state.record_response(response);
    }

    Ok(state.finish())
}

/// Async loop: every call of a round runs concurrently and the round is joined before the
/// next request.
///
/// All requests of a round are dispatched before any tool starts, so an unknown tool
/// name or undecodable arguments fail the round without side effects. During execution
/// the first failing tool fails the round and the remaining futures are dropped.
pub async fn run_concurrent<B>(
    backend: &B,
    template: &RequestTemplate,
    options: &CompletionOptions,
    messages: Vec<Message>,
) -> Result<LoopOutcome>
where
    B: CompletionApi + ?Sized,
{
    let initial = backend.complete(&template.request(&messages)).await?;
    let mut state = ConversationState::new(messages, initial);

    while let Some(calls) = state.pending_tool_calls() {
        state.enter_round(options.max_recursion)?;
        debug!(
            depth = state.recursion_depth(),
            calls = calls.len(),
            "starting concurrent tool round"
        );

        let prepared = calls
            .iter()
            .map(|call| dispatch(&options.tools, call).map(|(tool, args)| (call, tool, args)))
            .collect::<Result<Vec<_>>>()?;

        let round = prepared.into_iter().map(|(call, tool, arguments)| {
            let metadata = options.metadata.clone();
            async move {
                trace!(tool = call.name(), id = %call.id, "executing tool call");
                let output = tool.execute(arguments, metadata).await;
                result_message(call, output)
            }
        });
        let results = try_join_all(round).await?;
        state.commit_round(results);

        let response = backend.complete(&template.request(state.messages())).await?;
        state.record_response(response);
    }

    Ok(state.finish())
}

/// Whether the reformat workaround applies to this call
pub fn reformat_applies<'o>(options: &'o CompletionOptions, wants_schema: bool) -> Option<&'o ReformatPolicy> {
    options
        .reformat
        .as_ref()
        .filter(|policy| wants_schema && !options.tools.is_empty() && policy.applies_to(&options.model))
}

/// Restate the last answer of a finished loop under the schema constraint.
///
/// Sends the transcript, an assistant message with the last content, and a system
/// message with the policy's instruction to `policy.fallback_model`, with
/// `response_format` applied and no tools. The final assistant message of the returned
/// outcome carries the reformatted content.
pub async fn reformat<B>(
    backend: &B,
    template: &RequestTemplate,
    policy: &ReformatPolicy,
    outcome: LoopOutcome,
) -> Result<LoopOutcome>
where
    B: CompletionApi + ?Sized,
{
    let LoopOutcome {
        mut messages,
        raw_response,
    } = outcome;

    // drop the closing assistant message appended by the loop; it is re-added below
    let last_content = raw_response.content();
    messages.pop();

    let mut request_messages = messages.clone();
    request_messages.push(Message::assistant(last_content));
    request_messages.push(Message::system(policy.instruction.clone()));

    let reformat_template = template
        .clone()
        .with_model(policy.fallback_model.clone())
        .without_tools()
        .without_extra();

    debug!(fallback_model = %policy.fallback_model, "reformatting final answer");
    let response = backend
        .complete(&reformat_template.request(&request_messages))
        .await?;

    messages.push(Message::assistant(response.content()));
    Ok(LoopOutcome {
        messages,
        raw_response: response,
    })
}
