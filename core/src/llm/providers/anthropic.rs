//! Anthropic Messages API client

use crate::config::ResolvedLlmConfig;
use crate::error::{LlmError, Result};
use crate::llm::{
    ContentBlock, LlmClient, LlmMessage, LlmRequest, LlmResponse, MessageRole, StopReason,
    ToolDefinition, ToolResultContent, Usage,
};
use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic client with transient-failure retries
pub struct AnthropicClient {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
    model: String,
    config: ResolvedLlmConfig,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    pub fn new(config: &ResolvedLlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Authentication {
                message: "No API key found for Anthropic".to_string(),
            }
            .into());
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(500), Duration::from_secs(30))
            .build_with_max_retries(config.max_retries);

        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            config: config.clone(),
        })
    }

    fn build_body(&self, request: &LlmRequest) -> Value {
        let params = &self.config.params;
        let mut body = json!({
            "model": self.model,
            "max_tokens": params.max_tokens.unwrap_or(16384),
            "system": [{ "type": "text", "text": request.system }],
            "messages": request.messages.iter().map(to_api_message).collect::<Vec<_>>(),
        });

        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(to_api_tool).collect());
        }

        match params.thinking_budget {
            Some(budget) => {
                body["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
            }
            // Temperature is rejected by the API while thinking is enabled
            None => {
                if let Some(temperature) = params.temperature {
                    body["temperature"] = json!(temperature);
                }
            }
        }

        if let Some(stop) = &params.stop_sequences {
            body["stop_sequences"] = json!(stop);
        }

        if params.prompt_caching {
            body["cache_control"] = json!({ "type": "ephemeral" });
        }

        body
    }

    fn convert_response(&self, response: AnthropicResponse) -> LlmResponse {
        let content = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContent::Text { text } if text.is_empty() => None,
                AnthropicContent::Text { text } => Some(ContentBlock::Text { text }),
                AnthropicContent::Thinking {
                    thinking,
                    signature,
                } => Some(ContentBlock::Thinking {
                    thinking,
                    signature,
                }),
                AnthropicContent::RedactedThinking { data } => {
                    Some(ContentBlock::RedactedThinking { data })
                }
                AnthropicContent::ToolUse { id, name, input } => {
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                AnthropicContent::Unsupported => {
                    tracing::debug!("Skipping unsupported content block in response");
                    None
                }
            })
            .collect();

        let usage = response.usage.map(|u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
            cache_creation_input_tokens: u.cache_creation_input_tokens.unwrap_or(0),
            cache_read_input_tokens: u.cache_read_input_tokens.unwrap_or(0),
        });

        LlmResponse {
            message: LlmMessage::assistant(content),
            usage,
            model: response.model,
            stop_reason: response.stop_reason.as_deref().map(StopReason::parse),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let body = self.build_body(&request);

        let mut builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json");

        if !self.config.betas.is_empty() {
            builder = builder.header("anthropic-beta", self.config.betas.join(","));
        }

        for (key, value) in &self.config.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), error_text).into());
        }

        let anthropic_response: AnthropicResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        Ok(self.convert_response(anthropic_response))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

fn map_status(status: u16, message: String) -> LlmError {
    match status {
        401 | 403 => LlmError::Authentication { message },
        429 => LlmError::RateLimit { message },
        400 | 404 | 413 => LlmError::InvalidRequest { message },
        _ => LlmError::ApiError { status, message },
    }
}

/// Convert a transcript message into the wire format
fn to_api_message(message: &LlmMessage) -> Value {
    // Tool results travel back to the API in a user turn
    let role = match message.role {
        MessageRole::Assistant => "assistant",
        MessageRole::User | MessageRole::ToolResult => "user",
    };

    let content: Vec<Value> = message.content.iter().map(to_api_block).collect();
    json!({ "role": role, "content": content })
}

fn to_api_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({ "type": "text", "text": text }),
        ContentBlock::Thinking {
            thinking,
            signature,
        } => json!({ "type": "thinking", "thinking": thinking, "signature": signature }),
        ContentBlock::RedactedThinking { data } => {
            json!({ "type": "redacted_thinking", "data": data })
        }
        ContentBlock::ToolUse { id, name, input } => {
            json!({ "type": "tool_use", "id": id, "name": name, "input": input })
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let parts: Vec<Value> = content
                .iter()
                .map(|part| match part {
                    ToolResultContent::Text { text } => json!({ "type": "text", "text": text }),
                    ToolResultContent::Image { media_type, data } => json!({
                        "type": "image",
                        "source": { "type": "base64", "media_type": media_type, "data": data },
                    }),
                })
                .collect();
            json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": parts,
                "is_error": is_error,
            })
        }
    }
}

fn to_api_tool(tool: &ToolDefinition) -> Value {
    match tool {
        ToolDefinition::Custom {
            name,
            description,
            input_schema,
        } => json!({ "name": name, "description": description, "input_schema": input_schema }),
        ToolDefinition::Builtin {
            tool_type,
            name,
            options,
        } => {
            let mut map = options.clone();
            map.insert("type".to_string(), json!(tool_type));
            map.insert("name".to_string(), json!(name));
            Value::Object(map)
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<AnthropicContent>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContent {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },
    RedactedThinking {
        data: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
}
