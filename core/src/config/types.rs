//! Resolved configuration types for shopper core
//!
//! Core only accepts fully resolved, validated configuration.
//! All discovery, loading, and merging happens in the CLI layer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Beta flag that enables the computer-use tool family
pub const COMPUTER_USE_BETA: &str = "computer-use-2025-11-24";

/// Default model for unattended shopping runs
pub const DEFAULT_MODEL: &str = "claude-opus-4-6";

/// Supported model protocols
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Anthropic Messages API
    #[serde(rename = "anthropic")]
    Anthropic,
    /// Anything else; rejected when a client is built
    #[serde(rename = "custom")]
    Custom(String),
}

impl Protocol {
    /// Get the protocol name as a string
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Anthropic => "anthropic",
            Protocol::Custom(name) => name,
        }
    }

    /// Get the default base URL for this protocol
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Protocol::Anthropic => Some("https://api.anthropic.com"),
            Protocol::Custom(_) => None,
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Protocol::Anthropic),
            _ => Ok(Protocol::Custom(s.to_string())),
        }
    }
}

/// Model parameters for requests
///
/// Fields left out of a config file keep their [`Default`] values; an
/// explicit `null` clears an optional one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling; ignored when extended thinking is enabled
    pub temperature: Option<f32>,
    /// Token budget for extended thinking, `None` disables thinking
    pub thinking_budget: Option<u32>,
    /// Stop sequences
    pub stop_sequences: Option<Vec<String>>,
    /// Ask the provider to cache the request prefix
    pub prompt_caching: bool,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            max_tokens: Some(16384),
            temperature: None,
            thinking_budget: Some(8192),
            stop_sequences: None,
            prompt_caching: true,
        }
    }
}

/// A fully resolved model configuration ready for use by core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLlmConfig {
    /// The protocol to use
    pub protocol: Protocol,
    /// Base URL for the API
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Model name/identifier
    pub model: String,
    /// Model parameters
    #[serde(default)]
    pub params: ModelParams,
    /// Additional headers for requests
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Beta feature flags sent with every request
    #[serde(default = "default_betas")]
    pub betas: Vec<String>,
    /// Transient-failure retries before a request is given up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_betas() -> Vec<String> {
    vec![COMPUTER_USE_BETA.to_string()]
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    600
}

impl ResolvedLlmConfig {
    /// Create a new resolved config
    pub fn new(protocol: Protocol, base_url: String, api_key: String, model: String) -> Self {
        Self {
            protocol,
            base_url,
            api_key,
            model,
            params: ModelParams::default(),
            headers: HashMap::new(),
            betas: default_betas(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Set model parameters
    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Add multiple headers
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Set the retry count
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err("API key cannot be empty".to_string());
        }

        if self.model.is_empty() {
            return Err("Model name cannot be empty".to_string());
        }

        if self.base_url.is_empty() {
            return Err("Base URL cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("Base URL must start with http:// or https://".to_string());
        }

        if let Some(temp) = self.params.temperature {
            if !(0.0..=1.0).contains(&temp) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if let (Some(budget), Some(max_tokens)) =
            (self.params.thinking_budget, self.params.max_tokens)
        {
            if budget >= max_tokens {
                return Err(format!(
                    "Thinking budget ({}) must be smaller than max_tokens ({})",
                    budget, max_tokens
                ));
            }
        }

        if self.timeout_secs == 0 {
            return Err("Request timeout must be at least one second".to_string());
        }

        Ok(())
    }
}
