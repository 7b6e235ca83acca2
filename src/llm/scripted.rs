//! Scripted completion adapter
//!
//! Replays queued completions in order and records every request, so graph
//! runs can be driven deterministically in tests and demos.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{EventflowError, Result, ToolCall};
use crate::llm::traits::{Completion, CompletionAdapter, CompletionRequest};

/// Completion adapter that replays a fixed script
#[derive(Default)]
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<Completion>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    next_call: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, item: Result<Completion>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(item);
        }
    }

    /// Mint a call id unique within this script
    pub fn call_id(&self) -> String {
        format!("call-{}", self.next_call.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Queue a plain reply
    pub fn push_reply(&self, content: impl Into<String>) -> &Self {
        self.push(Ok(Completion::reply(content)));
        self
    }

    /// Queue a single tool call; returns its call id
    pub fn push_tool_call(&self, name: &str, arguments: serde_json::Value) -> String {
        let call_id = self.call_id();
        self.push(Ok(Completion::tool_calls(vec![ToolCall::new(
            name,
            arguments,
            call_id.clone(),
        )])));
        call_id
    }

    /// Queue several tool calls in one turn; returns their call ids
    pub fn push_tool_calls(&self, calls: Vec<(&str, serde_json::Value)>) -> Vec<String> {
        let calls: Vec<ToolCall> = calls
            .into_iter()
            .map(|(name, arguments)| ToolCall::new(name, arguments, self.call_id()))
            .collect();
        let ids = calls.iter().map(|c| c.call_id.clone()).collect();
        self.push(Ok(Completion::tool_calls(calls)));
        ids
    }

    /// Queue a structured object
    pub fn push_structured(&self, value: serde_json::Value) -> &Self {
        self.push(Ok(Completion::Structured(value)));
        self
    }

    /// Queue a failure
    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        self.push(Err(EventflowError::adapter(message)));
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Completions still queued
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CompletionAdapter for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        self.script
            .lock()
            .map_err(|_| EventflowError::adapter("script lock poisoned"))?
            .pop_front()
            .unwrap_or_else(|| Err(EventflowError::adapter("completion script exhausted")))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
