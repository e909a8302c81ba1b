//! Shared test fixtures: a scripted completion backend and tool-call helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use structured_llm::{
    BlockingCompletionApi, CompletionApi, CompletionRequest, Error, RawResponse, Result,
    ToolCallRequest,
};

/// Backend that replays canned responses in order and records every request body.
///
/// Implements both the async and the blocking gateway trait, so the same script can
/// drive either client.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<RawResponse>>,
    requests: Mutex<Vec<Value>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<RawResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Recorded request bodies, metadata included
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    fn next(&self, request: &CompletionRequest<'_>) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(request.to_body(true)?);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::other("scripted backend ran out of responses"))
    }
}

#[async_trait]
impl CompletionApi for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawResponse> {
        self.next(request)
    }
}

impl BlockingCompletionApi for ScriptedBackend {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<RawResponse> {
        self.next(request)
    }
}

/// Tool-call request with JSON arguments
pub fn call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments.to_string())
}

/// Response requesting the given tool calls
pub fn tool_calls(calls: Vec<ToolCallRequest>) -> RawResponse {
    RawResponse::from_tool_calls(calls)
}

/// Final text response
pub fn text(content: &str) -> RawResponse {
    RawResponse::from_text(content)
}
