//! Model client trait and request/response structures

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::message::LlmMessage;

/// Trait for model clients
///
/// One call is one consultation: the full payload goes out, exactly one
/// assistant message comes back. Retries, if any, happen inside the client.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a request and wait for the complete reply
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

/// Everything the model sees in one consultation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// System-level instructions
    pub system: String,

    /// Conversation payload, already shaped by the context strategy
    pub messages: Vec<LlmMessage>,

    /// Tools the model may call
    pub tools: Vec<ToolDefinition>,
}

/// Response from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated message
    pub message: LlmMessage,

    /// Usage statistics
    pub usage: Option<Usage>,

    /// Model used for generation
    pub model: String,

    /// Why generation stopped
    pub stop_reason: Option<StopReason>,
}

/// Token usage for a single request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

/// Reason why generation finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model ended its turn
    EndTurn,

    /// Hit the maximum token limit
    MaxTokens,

    /// The model is waiting on tool results
    ToolUse,

    /// A stop sequence was produced
    StopSequence,

    /// Anything the provider adds later
    Other(String),
}

impl StopReason {
    /// Map a provider stop reason string
    pub fn parse(reason: &str) -> Self {
        match reason {
            "end_turn" => StopReason::EndTurn,
            "max_tokens" => StopReason::MaxTokens,
            "tool_use" => StopReason::ToolUse,
            "stop_sequence" => StopReason::StopSequence,
            other => StopReason::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::EndTurn => write!(f, "end_turn"),
            StopReason::MaxTokens => write!(f, "max_tokens"),
            StopReason::ToolUse => write!(f, "tool_use"),
            StopReason::StopSequence => write!(f, "stop_sequence"),
            StopReason::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// How a tool is advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolDefinition {
    /// A tool described entirely by its JSON schema
    Custom {
        name: String,
        description: String,
        input_schema: serde_json::Value,
    },

    /// A provider-native tool, identified by a versioned type
    Builtin {
        tool_type: String,
        name: String,
        #[serde(default)]
        options: serde_json::Map<String, serde_json::Value>,
    },
}

impl ToolDefinition {
    /// Name the model uses to call the tool
    pub fn name(&self) -> &str {
        match self {
            ToolDefinition::Custom { name, .. } | ToolDefinition::Builtin { name, .. } => name,
        }
    }
}
