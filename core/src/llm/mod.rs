//! Model client abstractions and implementations

pub mod client;
pub mod message;
pub mod providers;

pub use client::{LlmClient, LlmRequest, LlmResponse, StopReason, ToolDefinition, Usage};
pub use message::{ContentBlock, LlmMessage, MessageRole, ToolResultContent};
pub use providers::*;
