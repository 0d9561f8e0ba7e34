//! Conversation message structures

use crate::tools::ToolCall;
use serde::{Deserialize, Serialize};

/// One turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    /// Role of the message sender
    pub role: MessageRole,

    /// Ordered content blocks
    pub content: Vec<ContentBlock>,
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Mission brief or other human input
    User,

    /// Model reply
    Assistant,

    /// Results of the tools the model asked for
    ToolResult,
}

/// A block of content within a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content
    Text { text: String },

    /// Model reasoning, echoed back verbatim on later turns
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// Reasoning the provider chose not to reveal
    RedactedThinking { data: String },

    /// Tool use request
    ToolUse {
        /// Unique identifier for this tool use
        id: String,
        /// Name of the tool to use
        name: String,
        /// Input arguments for the tool
        input: serde_json::Value,
    },

    /// Tool result
    ToolResult {
        /// ID of the tool use this is a result for
        tool_use_id: String,
        /// Result payload
        content: Vec<ToolResultContent>,
        /// Whether the tool reported a failure
        is_error: bool,
    },
}

/// Payload parts carried by a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultContent {
    Text { text: String },
    Image {
        /// MIME type of the image
        media_type: String,
        /// Base64-encoded image data
        data: String,
    },
}

impl LlmMessage {
    /// Create a user message from plain text
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentBlock::text(content)],
        }
    }

    /// Create an assistant message from content blocks
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
        }
    }

    /// Create an assistant message holding only text
    pub fn assistant_text<S: Into<String>>(content: S) -> Self {
        Self::assistant(vec![ContentBlock::text(content)])
    }

    /// Create a tool-result message
    pub fn tool_results(content: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::ToolResult,
            content,
        }
    }

    /// Get the text content of the message
    pub fn get_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Check if the message contains tool use
    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }

    /// Extract tool use requests in the order the model emitted them
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCall::with_id(id.clone(), name.clone(), input.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// IDs of the tool results carried by this message
    pub fn tool_result_ids(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl ContentBlock {
    /// Create a text block
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Create a tool-use block
    pub fn tool_use<S: Into<String>>(id: S, name: S, input: serde_json::Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_calls_preserve_request_order() {
        let message = LlmMessage::assistant(vec![
            ContentBlock::text("Let me look around."),
            ContentBlock::tool_use("toolu_1", "computer", json!({"action": "screenshot"})),
            ContentBlock::tool_use("toolu_2", "bash", json!({"command": "pwd"})),
        ]);

        let calls = message.tool_calls();
        assert!(message.has_tool_use());
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "toolu_1");
        assert_eq!(calls[1].name, "bash");
        assert_eq!(message.get_text().as_deref(), Some("Let me look around."));
    }

    #[test]
    fn test_text_only_message_has_no_tool_calls() {
        let message = LlmMessage::assistant_text("All done.");
        assert!(!message.has_tool_use());
        assert!(message.tool_calls().is_empty());
    }

    #[test]
    fn test_block_serialization_is_tagged() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: vec![ToolResultContent::Text {
                text: "ok".to_string(),
            }],
            is_error: false,
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_result");
        assert_eq!(value["content"][0]["type"], "text");

        let role = serde_json::to_value(MessageRole::ToolResult).unwrap();
        assert_eq!(role, "tool_result");
    }
}
