//! Trajectory entry structures

use crate::llm::{ContentBlock, LlmMessage, ToolResultContent, Usage};
use crate::tools::{Dispatch, ToolCall};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in the run trajectory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryEntry {
    /// Unique identifier for this entry
    pub id: String,

    /// Timestamp when this entry was created
    pub timestamp: DateTime<Utc>,

    /// Type of entry
    pub entry_type: EntryType,

    /// Iteration the entry belongs to, 0 before the first round
    pub step: usize,
}

/// Type of trajectory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryType {
    /// Run started
    TaskStart {
        task: String,
        agent_config: serde_json::Value,
    },

    /// Request sent to the model
    LlmRequest {
        /// Messages in the payload
        message_count: usize,
        /// Newest message in the payload, images omitted
        latest: Option<LlmMessage>,
        model: String,
        provider: String,
    },

    /// Reply received from the model
    LlmResponse {
        message: LlmMessage,
        usage: Option<Usage>,
        stop_reason: Option<String>,
        api_ms: u64,
    },

    /// Tool call about to be dispatched
    ToolCall { call: ToolCall },

    /// Tool call finished
    ToolResult {
        tool_use_id: String,
        tool_name: String,
        text: String,
        has_image: bool,
        is_error: bool,
        duration_ms: u64,
    },

    /// One round of consultation plus dispatch finished
    IterationComplete {
        tool_calls: usize,
        step_cost: f64,
        total_cost: f64,
    },

    /// Run reached a terminal state
    RunComplete {
        status: String,
        iterations: usize,
        tool_calls: usize,
        duration_ms: u64,
        error: Option<String>,
    },

    /// Error occurred
    Error {
        error: String,
        context: Option<String>,
    },
}

impl TrajectoryEntry {
    /// Create a new trajectory entry
    pub fn new(entry_type: EntryType, step: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            entry_type,
            step,
        }
    }

    /// Create a task start entry
    pub fn task_start(task: String, agent_config: serde_json::Value) -> Self {
        Self::new(EntryType::TaskStart { task, agent_config }, 0)
    }

    /// Create a model request entry
    pub fn llm_request(messages: &[LlmMessage], model: &str, provider: &str, step: usize) -> Self {
        Self::new(
            EntryType::LlmRequest {
                message_count: messages.len(),
                latest: messages.last().map(without_images),
                model: model.to_string(),
                provider: provider.to_string(),
            },
            step,
        )
    }

    /// Create a model response entry
    pub fn llm_response(
        message: LlmMessage,
        usage: Option<Usage>,
        stop_reason: Option<String>,
        api_ms: u64,
        step: usize,
    ) -> Self {
        Self::new(
            EntryType::LlmResponse {
                message,
                usage,
                stop_reason,
                api_ms,
            },
            step,
        )
    }

    /// Create a tool call entry
    pub fn tool_call(call: ToolCall, step: usize) -> Self {
        Self::new(EntryType::ToolCall { call }, step)
    }

    /// Create a tool result entry from a finished dispatch
    pub fn tool_result(dispatch: &Dispatch, step: usize) -> Self {
        Self::new(
            EntryType::ToolResult {
                tool_use_id: dispatch.call.id.clone(),
                tool_name: dispatch.call.name.clone(),
                text: dispatch.output.text.clone(),
                has_image: dispatch.output.image.is_some(),
                is_error: dispatch.output.is_error,
                duration_ms: dispatch.duration_ms,
            },
            step,
        )
    }

    /// Create an iteration complete entry
    pub fn iteration_complete(
        tool_calls: usize,
        step_cost: f64,
        total_cost: f64,
        step: usize,
    ) -> Self {
        Self::new(
            EntryType::IterationComplete {
                tool_calls,
                step_cost,
                total_cost,
            },
            step,
        )
    }

    /// Create a run complete entry
    pub fn run_complete(
        status: String,
        iterations: usize,
        tool_calls: usize,
        duration_ms: u64,
        error: Option<String>,
    ) -> Self {
        Self::new(
            EntryType::RunComplete {
                status,
                iterations,
                tool_calls,
                duration_ms,
                error,
            },
            iterations,
        )
    }

    /// Create an error entry
    pub fn error(error: String, context: Option<String>, step: usize) -> Self {
        Self::new(EntryType::Error { error, context }, step)
    }
}

/// Copy of `message` with image payloads replaced by a marker
fn without_images(message: &LlmMessage) -> LlmMessage {
    let content = message
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => ContentBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content
                    .iter()
                    .map(|part| match part {
                        ToolResultContent::Image { .. } => ToolResultContent::Text {
                            text: "[image omitted]".to_string(),
                        },
                        other => other.clone(),
                    })
                    .collect(),
                is_error: *is_error,
            },
            other => other.clone(),
        })
        .collect();

    LlmMessage {
        role: message.role,
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolOutput;

    #[test]
    fn test_llm_request_entry_omits_images() {
        let messages = vec![
            LlmMessage::user("Find jeans"),
            LlmMessage::tool_results(vec![ToolOutput::image("aGk=").into_block("toolu_1")]),
        ];

        let entry = TrajectoryEntry::llm_request(&messages, "model", "anthropic", 1);
        let EntryType::LlmRequest {
            message_count,
            latest,
            ..
        } = entry.entry_type
        else {
            panic!("expected llm_request entry");
        };

        assert_eq!(message_count, 2);
        let json = serde_json::to_string(&latest).unwrap();
        assert!(json.contains("[image omitted]"));
        assert!(!json.contains("aGk="));
    }

    #[test]
    fn test_entry_type_tag() {
        let entry = TrajectoryEntry::run_complete("exhausted".to_string(), 3, 3, 10, None);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["entry_type"]["type"], "run_complete");
        assert_eq!(value["step"], 3);
    }
}
