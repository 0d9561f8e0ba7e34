//! Conversation state for a single run

use crate::agent::outcome::{RunOutcome, RunStatus};
use crate::agent::usage::UsageTracker;
use crate::error::{AgentError, Result};
use crate::llm::{LlmMessage, MessageRole};
use crate::tools::ToolCall;

/// Append-only transcript plus round bookkeeping
///
/// Owned by exactly one run. Every tool-use request in an assistant message
/// must be answered by a single tool-result message before the next
/// assistant message is accepted.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<LlmMessage>,
    iterations: usize,
    tool_calls: usize,
}

impl Conversation {
    /// Start a conversation seeded with the mission message
    pub fn new<S: Into<String>>(mission: S) -> Self {
        Self {
            messages: vec![LlmMessage::user(mission)],
            iterations: 0,
            tool_calls: 0,
        }
    }

    pub fn messages(&self) -> &[LlmMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Completed rounds so far
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Tool results appended so far
    pub fn tool_calls(&self) -> usize {
        self.tool_calls
    }

    /// Tool calls from the last assistant message still waiting for results
    pub fn pending_calls(&self) -> Vec<ToolCall> {
        match self.messages.last() {
            Some(message) if message.role == MessageRole::Assistant => message.tool_calls(),
            _ => Vec::new(),
        }
    }

    /// Append a model reply
    pub fn push_assistant(&mut self, message: LlmMessage) -> Result<()> {
        if message.role != MessageRole::Assistant {
            return Err(transcript_error("expected an assistant message"));
        }
        if !self.pending_calls().is_empty() {
            return Err(transcript_error(
                "previous tool requests have not been answered",
            ));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Append the combined result message for the pending tool calls
    ///
    /// The message must carry exactly one result per pending request, in
    /// request order.
    pub fn push_tool_results(&mut self, message: LlmMessage) -> Result<()> {
        if message.role != MessageRole::ToolResult {
            return Err(transcript_error("expected a tool-result message"));
        }

        let pending = self.pending_calls();
        if pending.is_empty() {
            return Err(transcript_error("no tool requests are pending"));
        }

        let answered = message.tool_result_ids();
        let expected: Vec<&str> = pending.iter().map(|c| c.id.as_str()).collect();
        if answered != expected {
            return Err(transcript_error(&format!(
                "tool results {:?} do not match requests {:?}",
                answered, expected
            )));
        }

        self.tool_calls += answered.len();
        self.messages.push(message);
        Ok(())
    }

    /// Close the current round, returning the new round count
    pub fn complete_round(&mut self) -> usize {
        self.iterations += 1;
        self.iterations
    }

    /// Freeze the conversation into the terminal record
    pub fn finish(
        self,
        status: RunStatus,
        error: Option<String>,
        usage: UsageTracker,
        duration_ms: u64,
    ) -> RunOutcome {
        RunOutcome {
            status,
            iterations: self.iterations,
            tool_calls: self.tool_calls,
            transcript: self.messages,
            error,
            usage,
            duration_ms,
        }
    }
}

fn transcript_error(message: &str) -> crate::error::Error {
    AgentError::Transcript {
        message: message.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ContentBlock;
    use crate::tools::ToolOutput;
    use serde_json::json;

    fn two_calls() -> LlmMessage {
        LlmMessage::assistant(vec![
            ContentBlock::tool_use("a", "noop", json!({})),
            ContentBlock::tool_use("b", "noop", json!({})),
        ])
    }

    #[test]
    fn test_seeded_with_mission() {
        let conversation = Conversation::new("Find jeans");
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].role, MessageRole::User);
        assert!(conversation.pending_calls().is_empty());
    }

    #[test]
    fn test_results_must_match_requests_in_order() {
        let mut conversation = Conversation::new("mission");
        conversation.push_assistant(two_calls()).unwrap();
        assert_eq!(conversation.pending_calls().len(), 2);

        let reversed = LlmMessage::tool_results(vec![
            ToolOutput::ok("b").into_block("b"),
            ToolOutput::ok("a").into_block("a"),
        ]);
        assert!(conversation.push_tool_results(reversed).is_err());

        let missing = LlmMessage::tool_results(vec![ToolOutput::ok("a").into_block("a")]);
        assert!(conversation.push_tool_results(missing).is_err());

        let paired = LlmMessage::tool_results(vec![
            ToolOutput::ok("a").into_block("a"),
            ToolOutput::ok("b").into_block("b"),
            ContentBlock::text("[Iteration 1/3 - $0.00 spent]"),
        ]);
        conversation.push_tool_results(paired).unwrap();
        assert_eq!(conversation.tool_calls(), 2);
        assert!(conversation.pending_calls().is_empty());
    }

    #[test]
    fn test_assistant_rejected_while_requests_pending() {
        let mut conversation = Conversation::new("mission");
        conversation.push_assistant(two_calls()).unwrap();
        let err = conversation
            .push_assistant(LlmMessage::assistant_text("done"))
            .unwrap_err();
        assert!(err.to_string().contains("not been answered"));
    }

    #[test]
    fn test_results_without_requests_rejected() {
        let mut conversation = Conversation::new("mission");
        let results = LlmMessage::tool_results(vec![ToolOutput::ok("x").into_block("x")]);
        assert!(conversation.push_tool_results(results).is_err());
    }

    #[test]
    fn test_finish_carries_counters() {
        let mut conversation = Conversation::new("mission");
        conversation
            .push_assistant(LlmMessage::assistant_text("done"))
            .unwrap();
        conversation.complete_round();

        let outcome = conversation.finish(
            RunStatus::Completed,
            None,
            UsageTracker::default(),
            5,
        );
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.tool_calls, 0);
        assert_eq!(outcome.transcript.len(), 2);
    }
}
