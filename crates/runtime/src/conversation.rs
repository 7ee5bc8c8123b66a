//! Conversations that remember earlier turns.

use crate::model::{Backend, Message};
use crate::orchestrator::{Orchestrator, TurnReport};
use crate::tools::ToolHost;
use crate::Result;

/// An owned transcript carried from one turn to the next.
///
/// Each successful turn leaves the transcript ending in an assistant message
/// with the final answer. A failed turn leaves it exactly as it was before
/// the turn started.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    transcript: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one turn on top of everything said so far.
    pub async fn ask<B: Backend, H: ToolHost>(
        &mut self,
        orchestrator: &Orchestrator<B>,
        query: &str,
        host: &H,
    ) -> Result<TurnReport> {
        let mark = self.transcript.len();
        match orchestrator.run_turn(&mut self.transcript, query, host).await {
            Ok(report) => {
                self.transcript.push(Message::assistant(report.answer.as_str()));
                Ok(report)
            }
            Err(e) => {
                self.transcript.truncate(mark);
                Err(e)
            }
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    /// Forget every earlier turn.
    pub fn clear(&mut self) {
        self.transcript.clear();
    }
}
