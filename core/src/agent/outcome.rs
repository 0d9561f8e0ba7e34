//! Terminal record of a run

use crate::agent::usage::UsageTracker;
use crate::llm::{LlmMessage, MessageRole};
use serde::{Deserialize, Serialize};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model ended its turn without asking for tools
    Completed,
    /// The iteration ceiling was reached first
    Exhausted,
    /// Talking to the model failed
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Exhausted => write!(f, "exhausted"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Everything a caller gets back from a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,

    /// Rounds performed
    pub iterations: usize,

    /// Tool results produced
    pub tool_calls: usize,

    /// Full transcript, whatever the status
    pub transcript: Vec<LlmMessage>,

    /// What stopped a failed run
    pub error: Option<String>,

    pub usage: UsageTracker,

    pub duration_ms: u64,
}

impl RunOutcome {
    /// True only for runs the model finished on its own
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Text of the last assistant message, if any
    pub fn final_text(&self) -> Option<String> {
        self.transcript
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .and_then(|m| m.get_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_completed_is_success() {
        let mut outcome = RunOutcome {
            status: RunStatus::Completed,
            iterations: 1,
            tool_calls: 0,
            transcript: vec![
                LlmMessage::user("mission"),
                LlmMessage::assistant_text("Wrote results to item-1.md"),
            ],
            error: None,
            usage: UsageTracker::default(),
            duration_ms: 10,
        };
        assert!(outcome.is_success());
        assert_eq!(
            outcome.final_text().as_deref(),
            Some("Wrote results to item-1.md")
        );

        outcome.status = RunStatus::Exhausted;
        assert!(!outcome.is_success());
        assert_eq!(outcome.status.to_string(), "exhausted");
    }
}
