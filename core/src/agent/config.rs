//! Agent configuration and builder

use crate::agent::context::{strategy_for, ContextStrategy};
use crate::agent::usage::Pricing;
use crate::agent::{AgentLoop, StopSignal};
use crate::config::{Protocol, ResolvedLlmConfig};
use crate::error::{AgentError, ConfigError, Result};
use crate::llm::{AnthropicClient, LlmClient};
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::trajectory::TrajectoryRecorder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for one agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard ceiling on model-consultation/tool-dispatch rounds
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// System-level instructions sent with every consultation
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Names of the tools this run gets
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,

    /// Screenshots kept in the payload, 0 keeps all of them
    #[serde(default = "default_keep_recent_images")]
    pub keep_recent_images: usize,

    /// Append an iteration/cost note to every tool-result message
    #[serde(default = "default_budget_notes")]
    pub budget_notes: bool,

    /// Share of the budget left at which the note tells the model to wrap up
    #[serde(default = "default_budget_warning_fraction")]
    pub budget_warning_fraction: f64,

    #[serde(default)]
    pub pricing: Pricing,
}

fn default_max_iterations() -> usize {
    50
}

fn default_tools() -> Vec<String> {
    vec![
        "computer".to_string(),
        "bash".to_string(),
        "str_replace_based_edit_tool".to_string(),
    ]
}

fn default_keep_recent_images() -> usize {
    3
}

fn default_budget_notes() -> bool {
    true
}

fn default_budget_warning_fraction() -> f64 {
    0.2
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            system_prompt: None,
            tools: default_tools(),
            keep_recent_images: default_keep_recent_images(),
            budget_notes: default_budget_notes(),
            budget_warning_fraction: default_budget_warning_fraction(),
            pricing: Pricing::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&self.budget_warning_fraction) {
            return Err("budget_warning_fraction must be between 0.0 and 1.0".to_string());
        }
        if self.pricing.input_per_token < 0.0 || self.pricing.output_per_token < 0.0 {
            return Err("token prices cannot be negative".to_string());
        }
        Ok(())
    }
}

enum ClientSource {
    Config(ResolvedLlmConfig),
    Client(Arc<dyn LlmClient>),
}

/// Builder for assembling an [`AgentLoop`]
pub struct AgentBuilder {
    client: ClientSource,
    agent_config: AgentConfig,
    trajectory: Option<TrajectoryRecorder>,
    context: Option<Box<dyn ContextStrategy>>,
    stop: Option<StopSignal>,
}

impl AgentBuilder {
    /// Create a builder that will connect with the given model configuration
    pub fn new(llm_config: ResolvedLlmConfig) -> Self {
        Self::from_source(ClientSource::Config(llm_config))
    }

    /// Create a builder around an existing client
    pub fn with_client(client: Arc<dyn LlmClient>) -> Self {
        Self::from_source(ClientSource::Client(client))
    }

    fn from_source(client: ClientSource) -> Self {
        Self {
            client,
            agent_config: AgentConfig::default(),
            trajectory: None,
            context: None,
            stop: None,
        }
    }

    /// Set agent configuration
    pub fn with_agent_config(mut self, agent_config: AgentConfig) -> Self {
        self.agent_config = agent_config;
        self
    }

    /// Set the iteration ceiling
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.agent_config.max_iterations = max_iterations;
        self
    }

    /// Set tools
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.agent_config.tools = tools;
        self
    }

    /// Set system prompt
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.agent_config.system_prompt = system_prompt;
        self
    }

    /// Record the run
    pub fn with_trajectory(mut self, recorder: TrajectoryRecorder) -> Self {
        self.trajectory = Some(recorder);
        self
    }

    /// Replace the payload strategy picked from `keep_recent_images`
    pub fn with_context_strategy(mut self, strategy: Box<dyn ContextStrategy>) -> Self {
        self.context = Some(strategy);
        self
    }

    /// Let the caller end the run between rounds
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Build with fresh instances of the configured tools
    pub fn build(self, registry: &ToolRegistry) -> Result<AgentLoop> {
        let executor = registry.create_executor(&self.agent_config.tools)?;
        self.build_with_executor(executor)
    }

    /// Build around tools the caller already created
    pub fn build_with_executor(self, tools: ToolExecutor) -> Result<AgentLoop> {
        self.agent_config
            .validate()
            .map_err(|message| AgentError::InvalidConfig { message })?;

        let client = match self.client {
            ClientSource::Client(client) => client,
            ClientSource::Config(llm_config) => create_client(&llm_config)?,
        };

        let context = self
            .context
            .unwrap_or_else(|| strategy_for(self.agent_config.keep_recent_images));

        Ok(AgentLoop::new(
            self.agent_config,
            client,
            tools,
            context,
            self.trajectory,
            self.stop,
        ))
    }
}

/// Create the client for a resolved model configuration
pub fn create_client(llm_config: &ResolvedLlmConfig) -> Result<Arc<dyn LlmClient>> {
    llm_config
        .validate()
        .map_err(|message| AgentError::InvalidConfig { message })?;

    match &llm_config.protocol {
        Protocol::Anthropic => Ok(Arc::new(AnthropicClient::new(llm_config)?)),
        Protocol::Custom(protocol) => Err(ConfigError::UnsupportedProtocol {
            protocol: protocol.clone(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MODEL;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.keep_recent_images, 3);
        assert!(config.budget_notes);
        assert_eq!(config.tools.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{"max_iterations": 5, "tools": ["bash"]}"#).unwrap();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.tools, vec!["bash"]);
        assert!((config.budget_warning_fraction - 0.2).abs() < f64::EPSILON);
        assert!((config.pricing.cache_read_multiplier - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let config = AgentConfig {
            budget_warning_fraction: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_custom_protocol_unsupported() {
        let config = ResolvedLlmConfig::new(
            Protocol::Custom("gemini".to_string()),
            "https://example.com".to_string(),
            "key".to_string(),
            DEFAULT_MODEL.to_string(),
        );
        let err = create_client(&config).err().unwrap();
        assert!(err.to_string().contains("gemini"));
    }

    #[test]
    fn test_build_fails_for_unregistered_tool() {
        let config = ResolvedLlmConfig::new(
            Protocol::Anthropic,
            "https://api.anthropic.com".to_string(),
            "key".to_string(),
            DEFAULT_MODEL.to_string(),
        );
        let result = AgentBuilder::new(config)
            .with_tools(vec!["teleport".to_string()])
            .build(&ToolRegistry::new());
        assert!(result.is_err());
    }
}
