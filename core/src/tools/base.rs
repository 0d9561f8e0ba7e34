//! Base tool traits and structures

use crate::error::{Result, ToolError};
use crate::llm::{ContentBlock, ToolDefinition, ToolResultContent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trait for all tools
///
/// Each instance owns whatever resource it drives (a shell session, a
/// screen handle) and is never shared between runs.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of the tool
    fn name(&self) -> &str;

    /// Get the description of the tool
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's arguments
    fn input_schema(&self) -> serde_json::Value;

    /// How the tool is advertised to the model
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::Custom {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// Execute the tool with validated arguments
    ///
    /// An `Err` is turned into an error-flagged result by the executor, so
    /// implementations may use `?` freely.
    async fn execute(&self, call: &ToolCall) -> Result<ToolOutput>;

    /// Release owned resources at the end of a run
    async fn shutdown(&self) {}
}

/// A call to a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Arguments to pass to the tool
    pub arguments: serde_json::Value,
}

/// What a tool hands back to the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Human readable result or diagnostic
    pub text: String,

    /// Optional base64 PNG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Whether the call failed
    pub is_error: bool,
}

impl ToolCall {
    /// Create a new tool call with a fresh id
    pub fn new<S: Into<String>>(name: S, arguments: serde_json::Value) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name.into(), arguments)
    }

    /// Create a tool call with a provider-assigned id
    pub fn with_id<S: Into<String>>(id: S, name: S, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Get a parameter value by key
    pub fn get_parameter<T>(&self, key: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self
            .arguments
            .get(key)
            .ok_or_else(|| ToolError::InvalidParameters {
                message: format!("Missing parameter: {}", key),
            })?;

        serde_json::from_value(value.clone()).map_err(|_| {
            ToolError::InvalidParameters {
                message: format!("Invalid parameter type for: {}", key),
            }
            .into()
        })
    }

    /// Get an optional parameter, failing only on a type mismatch
    pub fn get_optional<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self.arguments.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(_) => self.get_parameter(key).map(Some),
        }
    }
}

impl ToolOutput {
    /// Create a successful text result
    pub fn ok<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            image: None,
            is_error: false,
        }
    }

    /// Create an error result
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self {
            text: message.into(),
            image: None,
            is_error: true,
        }
    }

    /// Create a result carrying only an image
    pub fn image<S: Into<String>>(data: S) -> Self {
        Self {
            text: String::new(),
            image: Some(data.into()),
            is_error: false,
        }
    }

    /// Attach a base64 PNG
    pub fn with_image<S: Into<String>>(mut self, data: S) -> Self {
        self.image = Some(data.into());
        self
    }

    /// Short preview for logs
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            preview.push_str("...");
        }
        if self.image.is_some() {
            if !preview.is_empty() {
                preview.push(' ');
            }
            preview.push_str("[screenshot]");
        }
        preview
    }

    /// Turn the output into the tool-result block paired with `tool_use_id`
    pub fn into_block<S: Into<String>>(self, tool_use_id: S) -> ContentBlock {
        let mut content = Vec::new();
        if self.is_error {
            content.push(ToolResultContent::Text { text: self.text });
        } else {
            if !self.text.is_empty() {
                content.push(ToolResultContent::Text { text: self.text });
            }
            if let Some(data) = self.image {
                content.push(ToolResultContent::Image {
                    media_type: "image/png".to_string(),
                    data,
                });
            }
        }

        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content,
            is_error: self.is_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_parameter() {
        let call = ToolCall::new("bash", json!({"command": "ls", "timeout": 5}));
        let command: String = call.get_parameter("command").unwrap();
        assert_eq!(command, "ls");
        assert!(call.get_parameter::<String>("missing").is_err());
        assert!(call.get_parameter::<u64>("command").is_err());
        assert_eq!(call.get_optional::<bool>("restart").unwrap(), None);
        assert_eq!(call.get_optional::<u64>("timeout").unwrap(), Some(5));
        assert_eq!(call.get_optional::<u64>("missing").unwrap(), None);
    }

    #[test]
    fn test_error_output_drops_image() {
        let block = ToolOutput::error("boom").with_image("aGk=").into_block("toolu_1");
        match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "toolu_1");
                assert!(is_error);
                assert_eq!(
                    content,
                    vec![ToolResultContent::Text {
                        text: "boom".to_string()
                    }]
                );
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn test_image_output_block() {
        let block = ToolOutput::image("aGk=").into_block("toolu_2");
        let ContentBlock::ToolResult { content, .. } = block else {
            panic!("expected tool result");
        };
        assert_eq!(content.len(), 1);
        assert!(matches!(content[0], ToolResultContent::Image { .. }));
    }

    #[test]
    fn test_preview_marks_screenshot() {
        let output = ToolOutput::ok("clicked at (10, 20)").with_image("aGk=");
        assert_eq!(output.preview(7), "clicked... [screenshot]");
    }
}
