//! Queue-based fakes for tests.
//!
//! [`MockBackend`] returns queued responses in order and records every
//! transcript it was called with. [`MockToolHost`] serves a fixed tool set,
//! records every call, and counts how often it was closed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, StopReason, ToolCall,
    Usage,
};
use crate::tools::{ToolDescriptor, ToolError, ToolHost};

/// A model backend that replays queued responses.
#[derive(Default)]
pub struct MockBackend {
    responses: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// One recorded backend invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_response(&self, response: ModelResponse) -> &Self {
        self.lock_responses().push_back(Ok(response));
        self
    }

    pub fn queue_error(&self, error: ModelError) -> &Self {
        self.lock_responses().push_back(Err(error));
        self
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<ModelResponse, ModelError>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Backend for MockBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                messages: request.messages.to_vec(),
                tool_names: request.tools.iter().map(|t| t.name().to_string()).collect(),
            });

        self.lock_responses()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::InvalidResponse("mock queue empty".into())))
    }
}

/// An `end_turn` response carrying one text part.
pub fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        stop_reason: StopReason::EndTurn,
        message: Message::assistant(text),
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

/// A `tool_use` response requesting `calls` as `(name, input)` pairs,
/// optionally preceded by a text part.
pub fn tool_use_response(text: Option<&str>, calls: &[(&str, Value)]) -> ModelResponse {
    let mut parts: Vec<Part> = text.map(Part::text).into_iter().collect();
    parts.extend(calls.iter().enumerate().map(|(i, (name, input))| {
        Part::ToolCall(ToolCall {
            id: format!("tooluse_{i}"),
            name: name.to_string(),
            input: input.clone(),
        })
    }));

    ModelResponse {
        stop_reason: StopReason::ToolUse,
        message: Message::from_parts(Role::Assistant, parts),
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

/// A tool host with canned results per tool name.
#[derive(Default)]
pub struct MockToolHost {
    tools: Vec<ToolDescriptor>,
    results: HashMap<String, Result<Value, ToolError>>,
    list_error: Option<ToolError>,
    calls: Mutex<Vec<(String, Value)>>,
    closed: Arc<AtomicUsize>,
}

impl MockToolHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with an empty object schema and a canned result.
    pub fn with_tool(mut self, name: &str, result: Result<Value, ToolError>) -> Self {
        self.tools.push(ToolDescriptor {
            name: name.to_string(),
            description: Some(format!("mock {name}")),
            input_schema: json!({"type": "object", "properties": {}}),
        });
        self.results.insert(name.to_string(), result);
        self
    }

    /// Register a raw descriptor with no canned result.
    pub fn with_descriptor(mut self, descriptor: ToolDescriptor) -> Self {
        self.tools.push(descriptor);
        self
    }

    /// Make `list_tools` fail.
    pub fn with_list_error(mut self, error: ToolError) -> Self {
        self.list_error = Some(error);
        self
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    /// Every `(name, arguments)` pair passed to `call_tool`, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Shared counter incremented by every `close`.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closed)
    }
}

impl ToolHost for MockToolHost {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        match &self.list_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.tools.clone()),
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name.to_string(), arguments));

        self.results
            .get(name)
            .cloned()
            .unwrap_or_else(|| Err(ToolError::NotFound(name.to_string())))
    }

    async fn close(self) -> Result<(), ToolError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
