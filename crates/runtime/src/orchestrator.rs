//! Tool-augmented conversation turns.
//!
//! A turn runs as a small state machine:
//!
//! ```text
//! AwaitingModel ──tool_use──▶ DispatchingTools ──fold──▶ AwaitingModel
//!       │
//!       └──────────────anything else─────────────▶ Done
//! ```
//!
//! Each pass through `DispatchingTools` is one round. After
//! `max_tool_rounds` rounds a further tool request ends the turn.

use serde_json::Value;

use crate::model::{Backend, Message, ModelRequest, Part, StopReason, ToolOutcome, ToolResult, Usage};
use crate::schema::translate;
use crate::tools::{ToolHost, dispatch};
use crate::{Error, Result};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

/// Something the operator sees during a turn but the answer does not carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// Model text that accompanied a tool request.
    Thinking(String),
    /// A tool the model asked to run.
    ToolCall { name: String, input: Value },
    /// A tool that failed or could not be resolved.
    ToolFailed { name: String, message: String },
}

/// Everything a finished turn produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnReport {
    /// Final answer text.
    pub answer: String,
    /// Operator-facing notes, in the order they happened.
    pub annotations: Vec<Annotation>,
    /// Number of tool calls dispatched (including failed ones).
    pub tool_calls: usize,
    /// Number of dispatch rounds.
    pub rounds: usize,
    /// Token usage summed over every inference call of the turn.
    pub usage: Usage,
}

enum State {
    AwaitingModel,
    DispatchingTools(Message),
    Done { message: Message, exhausted: bool },
}

/// Drives query turns against a model backend and a tool host.
pub struct Orchestrator<B> {
    backend: B,
    max_tool_rounds: usize,
}

impl<B: Backend> Orchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Limit how many dispatch rounds one turn may run.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    /// Answer one query on a fresh transcript.
    pub async fn process_query<H: ToolHost>(&self, query: &str, host: &H) -> Result<String> {
        let mut transcript = Vec::new();
        let report = self.run_turn(&mut transcript, query, host).await?;
        Ok(report.answer)
    }

    /// Run one turn, appending to `transcript`.
    ///
    /// The query is appended as a user message. Each dispatch round appends
    /// an assistant summary of the tool request and a user message carrying
    /// the results, so roles keep alternating. The final answer itself is
    /// not appended.
    pub async fn run_turn<H: ToolHost>(
        &self,
        transcript: &mut Vec<Message>,
        query: &str,
        host: &H,
    ) -> Result<TurnReport> {
        transcript.push(Message::user(query));

        let descriptors = host.list_tools().await?;
        let specs = translate(&descriptors)?;
        tracing::debug!(tools = specs.len(), "tool set translated");

        let mut report = TurnReport::default();
        let mut state = State::AwaitingModel;

        loop {
            state = match state {
                State::AwaitingModel => {
                    let response = self
                        .backend
                        .call(ModelRequest {
                            messages: transcript.as_slice(),
                            tools: &specs,
                        })
                        .await?;
                    report.usage.add(response.usage);

                    let wants_tools = response.stop_reason == StopReason::ToolUse
                        && !response.message.tool_calls().is_empty();
                    if !wants_tools {
                        State::Done {
                            message: response.message,
                            exhausted: false,
                        }
                    } else if report.rounds >= self.max_tool_rounds {
                        tracing::warn!(rounds = report.rounds, "tool round limit reached");
                        State::Done {
                            message: response.message,
                            exhausted: true,
                        }
                    } else {
                        State::DispatchingTools(response.message)
                    }
                }

                State::DispatchingTools(message) => {
                    report.rounds += 1;
                    let calls = message.tool_calls();

                    for part in &message.parts {
                        match part {
                            Part::Text { text } => {
                                report.annotations.push(Annotation::Thinking(text.clone()))
                            }
                            Part::ToolCall(call) => report.annotations.push(Annotation::ToolCall {
                                name: call.name.clone(),
                                input: call.input.clone(),
                            }),
                            Part::ToolResult(_) => {
                                tracing::debug!("ignoring tool result part in model output")
                            }
                        }
                    }

                    let results = dispatch(&calls, &descriptors, host).await;
                    report.tool_calls += results.len();
                    report
                        .annotations
                        .extend(results.iter().filter_map(|r| match &r.outcome {
                            ToolOutcome::Error { message } => Some(Annotation::ToolFailed {
                                name: r.tool_name.clone(),
                                message: message.clone(),
                            }),
                            ToolOutcome::Success { .. } => None,
                        }));

                    transcript.push(Message::assistant(summarize_request(&message)));
                    transcript.push(Message::user(fold_results(&results)));
                    State::AwaitingModel
                }

                State::Done { message, exhausted } => {
                    // Converse rejects blank text blocks, so a blank answer
                    // must never reach a transcript.
                    let answer = message.first_text().filter(|text| !text.trim().is_empty());
                    report.answer = match (answer, exhausted) {
                        (Some(text), _) => text.to_string(),
                        (None, true) => return Err(Error::ToolRoundsExhausted(report.rounds)),
                        (None, false) => return Err(Error::EmptyResponse),
                    };
                    return Ok(report);
                }
            };
        }
    }
}

/// Textual stand-in for an assistant tool request.
///
/// The model's own text is kept verbatim, and each call becomes one
/// `[Calling tool ...]` line.
fn summarize_request(message: &Message) -> String {
    message
        .parts
        .iter()
        .filter_map(|part| match part {
            Part::Text { text } => Some(text.clone()),
            Part::ToolCall(call) => Some(format!(
                "[Calling tool {} with args {}]",
                call.name, call.input
            )),
            Part::ToolResult(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize dispatch results, in order, as one block of text.
fn fold_results(results: &[ToolResult]) -> String {
    results
        .iter()
        .map(|result| match &result.outcome {
            ToolOutcome::Success { output } => {
                format!("[Tool {} returned: {}]", result.tool_name, render(output))
            }
            ToolOutcome::Error { message } => {
                format!("[Tool {} failed: {message}]", result.tool_name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockToolHost, text_response, tool_use_response};
    use crate::model::{ModelError, Role};
    use crate::tools::{ToolDescriptor, ToolError};
    use serde_json::json;

    fn list_dir_host() -> MockToolHost {
        MockToolHost::new().with_tool("list_dir", Ok(json!(["a.txt"])))
    }

    #[tokio::test]
    async fn plain_answer_skips_dispatch() {
        let backend = MockBackend::new();
        backend.queue_response(text_response("4"));
        let host = list_dir_host();
        let orchestrator = Orchestrator::new(backend);

        let answer = orchestrator.process_query("what is 2+2", &host).await.unwrap();

        assert_eq!(answer, "4");
        assert!(host.calls().is_empty());
        let calls = orchestrator.backend().recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].messages, vec![Message::user("what is 2+2")]);
        assert_eq!(calls[0].tool_names, ["list_dir"]);
    }

    #[tokio::test]
    async fn single_tool_round_trip() {
        let backend = MockBackend::new();
        backend
            .queue_response(tool_use_response(
                None,
                &[("list_dir", json!({"path": "/tmp"}))],
            ))
            .queue_response(text_response("The directory contains a.txt"));
        let host = list_dir_host();
        let orchestrator = Orchestrator::new(backend);

        let answer = orchestrator
            .process_query("list files in /tmp", &host)
            .await
            .unwrap();

        assert_eq!(answer, "The directory contains a.txt");
        assert_eq!(
            host.calls(),
            vec![("list_dir".to_string(), json!({"path": "/tmp"}))]
        );
    }

    #[tokio::test]
    async fn second_call_sees_one_extra_user_message() {
        let backend = MockBackend::new();
        backend
            .queue_response(tool_use_response(
                Some("Checking."),
                &[("a", json!({})), ("b", json!({"n": 2})), ("a", json!({"n": 3}))],
            ))
            .queue_response(text_response("done"));
        let host = MockToolHost::new()
            .with_tool("a", Ok(json!("A")))
            .with_tool("b", Ok(json!("B")));
        let orchestrator = Orchestrator::new(backend);

        orchestrator.process_query("go", &host).await.unwrap();

        assert_eq!(host.calls().len(), 3);
        let calls = orchestrator.backend().recorded_calls();
        let users = |i: usize| {
            calls[i]
                .messages
                .iter()
                .filter(|m| m.role == Role::User)
                .count()
        };
        assert_eq!(users(1), users(0) + 1);

        let second = &calls[1].messages;
        assert_eq!(second.len(), 3);
        assert_eq!(second[0], Message::user("go"));
        assert_eq!(second[1].role, Role::Assistant);
        assert_eq!(second[2].role, Role::User);
        assert_eq!(second[2].parts.len(), 1);
        assert!(second[1].text().starts_with("Checking.\n[Calling tool a with args {}]"));
    }

    #[tokio::test]
    async fn folded_results_keep_dispatch_order() {
        let backend = MockBackend::new();
        backend
            .queue_response(tool_use_response(
                None,
                &[("a", json!({})), ("b", json!({}))],
            ))
            .queue_response(text_response("ok"));
        let host = MockToolHost::new()
            .with_tool("a", Ok(json!("result of A")))
            .with_tool("b", Ok(json!({"value": "B"})));
        let orchestrator = Orchestrator::new(backend);

        orchestrator.process_query("go", &host).await.unwrap();

        let calls = orchestrator.backend().recorded_calls();
        let folded = calls[1].messages[2].text();
        assert_eq!(
            folded,
            "[Tool a returned: result of A]\n[Tool b returned: {\"value\":\"B\"}]"
        );
    }

    #[tokio::test]
    async fn tool_failure_is_reported_to_model() {
        let backend = MockBackend::new();
        backend
            .queue_response(tool_use_response(None, &[("a", json!({})), ("ghost", json!({}))]))
            .queue_response(text_response("sorry"));
        let host = MockToolHost::new().with_tool("a", Err(ToolError::Execution("boom".into())));
        let orchestrator = Orchestrator::new(backend);

        let mut transcript = Vec::new();
        let report = orchestrator
            .run_turn(&mut transcript, "go", &host)
            .await
            .unwrap();

        assert_eq!(report.answer, "sorry");
        assert_eq!(report.tool_calls, 2);
        assert_eq!(
            transcript[2].text(),
            "[Tool a failed: execution failed: boom]\n[Tool ghost failed: tool not found: ghost]"
        );
        assert!(report.annotations.contains(&Annotation::ToolFailed {
            name: "ghost".into(),
            message: "tool not found: ghost".into(),
        }));
    }

    #[tokio::test]
    async fn annotations_follow_response_order() {
        let backend = MockBackend::new();
        backend
            .queue_response(tool_use_response(
                Some("I'll list it."),
                &[("list_dir", json!({"path": "/tmp"}))],
            ))
            .queue_response(text_response("a.txt"));
        let host = list_dir_host();
        let orchestrator = Orchestrator::new(backend);

        let report = orchestrator
            .run_turn(&mut Vec::new(), "ls /tmp", &host)
            .await
            .unwrap();

        assert_eq!(
            report.annotations,
            vec![
                Annotation::Thinking("I'll list it.".into()),
                Annotation::ToolCall {
                    name: "list_dir".into(),
                    input: json!({"path": "/tmp"}),
                },
            ]
        );
        assert_eq!(report.rounds, 1);
        assert_eq!(report.usage.input_tokens, 20);
    }

    #[tokio::test]
    async fn nested_tool_requests_run_further_rounds() {
        let backend = MockBackend::new();
        backend
            .queue_response(tool_use_response(None, &[("list_dir", json!({"path": "/"}))]))
            .queue_response(tool_use_response(None, &[("list_dir", json!({"path": "/tmp"}))]))
            .queue_response(text_response("found a.txt"));
        let host = list_dir_host();
        let orchestrator = Orchestrator::new(backend);

        let report = orchestrator
            .run_turn(&mut Vec::new(), "find a.txt", &host)
            .await
            .unwrap();

        assert_eq!(report.answer, "found a.txt");
        assert_eq!(report.rounds, 2);
        assert_eq!(host.calls().len(), 2);
        assert_eq!(orchestrator.backend().recorded_calls()[2].messages.len(), 5);
    }

    #[tokio::test]
    async fn round_limit_stops_tool_loop() {
        let backend = MockBackend::new();
        for _ in 0..3 {
            backend.queue_response(tool_use_response(None, &[("list_dir", json!({}))]));
        }
        let host = list_dir_host();
        let orchestrator = Orchestrator::new(backend).with_max_tool_rounds(2);

        let err = orchestrator.process_query("loop", &host).await.unwrap_err();

        assert!(matches!(err, Error::ToolRoundsExhausted(2)));
        assert_eq!(host.calls().len(), 2);
        assert_eq!(orchestrator.backend().recorded_calls().len(), 3);
    }

    #[tokio::test]
    async fn round_limit_returns_text_when_present() {
        let backend = MockBackend::new();
        backend
            .queue_response(tool_use_response(None, &[("list_dir", json!({}))]))
            .queue_response(tool_use_response(
                Some("Still looking."),
                &[("list_dir", json!({}))],
            ));
        let host = list_dir_host();
        let orchestrator = Orchestrator::new(backend).with_max_tool_rounds(1);

        let answer = orchestrator.process_query("loop", &host).await.unwrap();

        assert_eq!(answer, "Still looking.");
        assert_eq!(host.calls().len(), 1);
    }

    #[tokio::test]
    async fn inference_error_surfaces() {
        let backend = MockBackend::new();
        backend.queue_error(ModelError::Network("connection reset".into()));
        let host = list_dir_host();
        let orchestrator = Orchestrator::new(backend);

        let err = orchestrator.process_query("hi", &host).await.unwrap_err();

        assert!(matches!(err, Error::Model(ModelError::Network(_))));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_descriptor_aborts_before_inference() {
        let backend = MockBackend::new();
        let host = MockToolHost::new().with_descriptor(ToolDescriptor {
            name: "broken".into(),
            description: None,
            input_schema: json!({"type": "object"}),
        });
        let orchestrator = Orchestrator::new(backend);

        let err = orchestrator.process_query("hi", &host).await.unwrap_err();

        assert!(matches!(err, Error::Schema(_)));
        assert!(orchestrator.backend().recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn tool_listing_failure_surfaces() {
        let host = MockToolHost::new().with_list_error(ToolError::Protocol("gone".into()));
        let orchestrator = Orchestrator::new(MockBackend::new());

        let err = orchestrator.process_query("hi", &host).await.unwrap_err();

        assert!(matches!(err, Error::Tool(ToolError::Protocol(_))));
    }

    #[tokio::test]
    async fn response_without_text_is_empty() {
        let backend = MockBackend::new();
        let mut response = text_response("");
        response.message.parts.clear();
        backend.queue_response(response);
        let orchestrator = Orchestrator::new(backend);

        let err = orchestrator
            .process_query("hi", &list_dir_host())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EmptyResponse));
    }

    #[tokio::test]
    async fn blank_answer_is_empty() {
        let backend = MockBackend::new();
        backend
            .queue_response(text_response(""))
            .queue_response(text_response(" \n\t"));
        let orchestrator = Orchestrator::new(backend);
        let host = list_dir_host();

        for _ in 0..2 {
            let err = orchestrator.process_query("hi", &host).await.unwrap_err();
            assert!(matches!(err, Error::EmptyResponse));
        }
    }

    #[tokio::test]
    async fn blank_text_at_round_limit_is_exhausted() {
        let backend = MockBackend::new();
        backend
            .queue_response(tool_use_response(None, &[("list_dir", json!({}))]))
            .queue_response(tool_use_response(Some(""), &[("list_dir", json!({}))]));
        let orchestrator = Orchestrator::new(backend).with_max_tool_rounds(1);

        let err = orchestrator
            .process_query("loop", &list_dir_host())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ToolRoundsExhausted(1)));
    }
}
