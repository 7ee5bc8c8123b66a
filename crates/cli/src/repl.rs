//! Interactive query loop and tool-host session lifecycle.

use std::future::Future;
use std::io::Write;

use runtime::{Annotation, Backend, Conversation, Orchestrator, ToolHost, TurnReport};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::Result;

/// Line-oriented chat over any reader and writer.
pub struct Repl<'a, B, H> {
    orchestrator: &'a Orchestrator<B>,
    host: &'a H,
    conversation: Option<Conversation>,
}

impl<'a, B: Backend, H: ToolHost> Repl<'a, B, H> {
    /// With `remember` set, every turn sees the earlier ones; otherwise
    /// each query starts from an empty transcript.
    pub fn new(orchestrator: &'a Orchestrator<B>, host: &'a H, remember: bool) -> Self {
        Self {
            orchestrator,
            host,
            conversation: remember.then(Conversation::new),
        }
    }

    /// Read queries until `quit` (any case), end of input, or `interrupt`
    /// completes.
    ///
    /// Returns the number of turns attempted. A failed turn is reported
    /// and the loop continues. An interrupt abandons the pending read or
    /// the turn in flight.
    pub async fn run<R, W, I>(&mut self, mut input: R, mut out: W, interrupt: I) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
        I: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        writeln!(out, "\nferry started!")?;
        writeln!(out, "Type your queries or 'quit' to exit.")?;

        let mut turns = 0;
        loop {
            write!(out, "\nQuery: ")?;
            out.flush()?;

            let mut line = String::new();
            let read = tokio::select! {
                biased;
                () = &mut interrupt => None,
                read = input.read_line(&mut line) => Some(read?),
            };
            match read {
                None => {
                    writeln!(out)?;
                    break;
                }
                // EOF
                Some(0) => break,
                Some(_) => {}
            }

            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if query.eq_ignore_ascii_case("quit") {
                break;
            }

            turns += 1;
            let outcome = tokio::select! {
                biased;
                () = &mut interrupt => None,
                outcome = self.ask(query) => Some(outcome),
            };
            match outcome {
                None => {
                    writeln!(out, "\nInterrupted.")?;
                    break;
                }
                Some(Ok(report)) => {
                    for annotation in &report.annotations {
                        writeln!(out, "{}", render_annotation(annotation))?;
                    }
                    writeln!(out, "\n{}", report.answer)?;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "query failed");
                    writeln!(out, "\nError: {e}")?;
                }
            }
        }

        Ok(turns)
    }

    async fn ask(&mut self, query: &str) -> runtime::Result<TurnReport> {
        match &mut self.conversation {
            Some(conversation) => conversation.ask(self.orchestrator, query, self.host).await,
            None => {
                self.orchestrator
                    .run_turn(&mut Vec::new(), query, self.host)
                    .await
            }
        }
    }
}

fn render_annotation(annotation: &Annotation) -> String {
    match annotation {
        Annotation::Thinking(text) => format!("[Thinking: {text}]"),
        Annotation::ToolCall { name, input } => format!("[Calling tool {name} with args {input}]"),
        Annotation::ToolFailed { name, message } => format!("[Tool {name} failed: {message}]"),
    }
}

/// Run the chat loop on `host`, then close it.
///
/// The host is closed exactly once however the loop ends, including on
/// `interrupt` and when the terminal itself fails.
pub async fn run_session<B, H, R, W, I>(
    orchestrator: &Orchestrator<B>,
    host: H,
    remember: bool,
    input: R,
    mut out: W,
    interrupt: I,
) -> Result<usize>
where
    B: Backend,
    H: ToolHost,
    R: AsyncBufRead + Unpin,
    W: Write,
    I: Future<Output = ()>,
{
    let result: Result<usize> = async {
        match host.list_tools().await {
            Ok(tools) => {
                let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                writeln!(out, "\nConnected to server with tools: {names:?}")?;
            }
            Err(e) => tracing::warn!(error = %e, "could not list tools"),
        }
        Repl::new(orchestrator, &host, remember)
            .run(input, &mut out, interrupt)
            .await
    }
    .await;

    if let Err(e) = host.close().await {
        tracing::warn!(error = %e, "failed to close tool host session");
    }
    result
}
