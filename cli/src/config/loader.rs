//! CLI configuration loader for shopper
//!
//! Implements single-source priority loading with flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./shopper.json or ./.shopper/config.json
//! 3. XDG config: $XDG_CONFIG_HOME/shopper/config.json or ~/.config/shopper/config.json
//! 4. Environment variables only (no files)

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use shopper_core::config::DEFAULT_MODEL;
use shopper_core::{AgentConfig, ModelParams, Protocol, ResolvedLlmConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Raw configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    /// Protocol to use
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// API key (can be "env:VAR_NAME" for environment variable)
    pub api_key: String,
    /// Base URL (optional, uses protocol default if not specified)
    pub base_url: Option<String>,
    /// Model name
    #[serde(default = "default_model")]
    pub model: String,
    /// Model parameters (optional)
    #[serde(default)]
    pub params: ModelParams,
    /// Additional headers (optional)
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Beta flags, replacing the defaults when present
    pub betas: Option<Vec<String>>,
    /// Transient-failure retries
    pub max_retries: Option<u32>,
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_protocol() -> String {
    "anthropic".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Everything a run needs from configuration
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub llm: ResolvedLlmConfig,
    pub agent: AgentConfig,
    /// File the configuration came from, `None` for environment only
    pub source: Option<PathBuf>,
}

/// CLI configuration loader
#[derive(Debug, Clone, Default)]
pub struct CliConfigLoader {
    /// Override config file/directory path
    config_override: Option<PathBuf>,
    /// Directory searched for project config, defaults to the cwd
    working_dir: Option<PathBuf>,
    /// Flag overrides
    api_key_override: Option<String>,
    base_url_override: Option<String>,
    model_override: Option<String>,
}

impl CliConfigLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Set config file/directory override
    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    /// Search `dir` instead of the process working directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Set API key override
    pub fn with_api_key_override(mut self, api_key: String) -> Self {
        self.api_key_override = Some(api_key);
        self
    }

    /// Set base URL override
    pub fn with_base_url_override(mut self, base_url: String) -> Self {
        self.base_url_override = Some(base_url);
        self
    }

    /// Set model override
    pub fn with_model_override(mut self, model: String) -> Self {
        self.model_override = Some(model);
        self
    }

    /// Load and resolve configuration
    pub async fn load(&self) -> Result<LoadedConfig> {
        let (mut config, source) = if let Some(override_path) = &self.config_override {
            let (config, path) = self.load_from_path(override_path).await.with_context(|| {
                format!(
                    "Failed to load config from override path: {}",
                    override_path.display()
                )
            })?;
            (config, Some(path))
        } else {
            self.search_and_load().await?
        };

        if let Some(api_key) = &self.api_key_override {
            config.api_key = api_key.clone();
        }
        if let Some(base_url) = &self.base_url_override {
            config.base_url = Some(base_url.clone());
        }
        if let Some(model) = &self.model_override {
            config.model = model.clone();
        }

        let agent = config.agent.clone();
        agent
            .validate()
            .map_err(|e| anyhow!("Invalid agent configuration: {}", e))?;

        let llm = self.resolve_config(config)?;
        Ok(LoadedConfig { llm, agent, source })
    }

    /// Search for config in priority order
    async fn search_and_load(&self) -> Result<(RawConfig, Option<PathBuf>)> {
        let cwd = match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };

        let candidates = [
            Some(cwd.join("shopper.json")),
            Some(cwd.join(".shopper").join("config.json")),
            get_xdg_config_dir().map(|dir| dir.join("shopper").join("config.json")),
        ];

        for path in candidates.into_iter().flatten() {
            if path.exists() {
                tracing::debug!("Loading configuration from {}", path.display());
                let config = self.load_file(&path).await?;
                return Ok((config, Some(path)));
            }
        }

        Ok((self.try_load_env_only()?, None))
    }

    /// Build configuration from environment variables alone
    fn try_load_env_only(&self) -> Result<RawConfig> {
        let api_key = match (&self.api_key_override, std::env::var("ANTHROPIC_API_KEY")) {
            (Some(key), _) => key.clone(),
            (None, Ok(key)) if !key.is_empty() => key,
            _ => {
                return Err(anyhow!(
                    "No configuration found. Create ./shopper.json, pass --config, \
                     or set ANTHROPIC_API_KEY"
                ))
            }
        };

        Ok(RawConfig {
            protocol: default_protocol(),
            api_key,
            base_url: std::env::var("ANTHROPIC_BASE_URL").ok(),
            model: std::env::var("SHOPPER_MODEL").unwrap_or_else(|_| default_model()),
            params: ModelParams::default(),
            headers: HashMap::new(),
            betas: None,
            max_retries: None,
            timeout_secs: None,
            agent: AgentConfig::default(),
        })
    }

    /// Load configuration from a specific path (file or directory)
    async fn load_from_path(&self, path: &Path) -> Result<(RawConfig, PathBuf)> {
        let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());

        if expanded.is_file() {
            Ok((self.load_file(&expanded).await?, expanded))
        } else if expanded.is_dir() {
            let config_file = expanded.join("config.json");
            if config_file.exists() {
                Ok((self.load_file(&config_file).await?, config_file))
            } else {
                Err(anyhow!(
                    "No config.json found in directory: {}",
                    expanded.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", expanded.display()))
        }
    }

    /// Load a single config file
    async fn load_file(&self, path: &Path) -> Result<RawConfig> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Resolve raw config to ResolvedLlmConfig
    fn resolve_config(&self, config: RawConfig) -> Result<ResolvedLlmConfig> {
        let protocol: Protocol = config
            .protocol
            .parse()
            .map_err(|_| anyhow!("Invalid protocol: {}", config.protocol))?;

        let api_key = match config.api_key.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .with_context(|| format!("Environment variable not found: {}", var_name))?,
            None => config.api_key,
        };

        let base_url = match config.base_url {
            Some(url) => url,
            None => protocol
                .default_base_url()
                .ok_or_else(|| {
                    anyhow!("base_url is required for protocol '{}'", protocol.as_str())
                })?
                .to_string(),
        };

        let mut resolved = ResolvedLlmConfig::new(protocol, base_url, api_key, config.model)
            .with_params(config.params)
            .with_headers(config.headers);
        if let Some(betas) = config.betas {
            resolved.betas = betas;
        }
        if let Some(max_retries) = config.max_retries {
            resolved = resolved.with_max_retries(max_retries);
        }
        if let Some(timeout_secs) = config.timeout_secs {
            resolved.timeout_secs = timeout_secs;
        }

        resolved
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        Ok(resolved)
    }
}

/// Get XDG config directory
fn get_xdg_config_dir() -> Option<PathBuf> {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg_config) if !xdg_config.is_empty() => Some(PathBuf::from(xdg_config)),
        _ => dirs::home_dir().map(|home| home.join(".config")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_project_file_in_working_dir() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "shopper.json",
            r#"{"api_key": "sk-file", "agent": {"max_iterations": 12}}"#,
        );

        let loaded = CliConfigLoader::new()
            .with_working_dir(dir.path().to_path_buf())
            .load()
            .await
            .unwrap();

        assert_eq!(loaded.llm.api_key, "sk-file");
        assert_eq!(loaded.llm.model, DEFAULT_MODEL);
        assert_eq!(loaded.llm.base_url, "https://api.anthropic.com");
        assert_eq!(loaded.agent.max_iterations, 12);
        assert_eq!(loaded.source, Some(dir.path().join("shopper.json")));
    }

    #[tokio::test]
    async fn test_dot_directory_config() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            ".shopper/config.json",
            r#"{"api_key": "sk-dot", "max_retries": 1, "betas": []}"#,
        );

        let loaded = CliConfigLoader::new()
            .with_working_dir(dir.path().to_path_buf())
            .load()
            .await
            .unwrap();

        assert_eq!(loaded.llm.api_key, "sk-dot");
        assert_eq!(loaded.llm.max_retries, 1);
        assert!(loaded.llm.betas.is_empty());
    }

    #[tokio::test]
    async fn test_override_path_and_flags_win() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "shopper.json", r#"{"api_key": "sk-project"}"#);
        let explicit = write(
            dir.path(),
            "custom/config.json",
            r#"{"api_key": "sk-explicit", "model": "claude-sonnet-4-5"}"#,
        );

        let loaded = CliConfigLoader::new()
            .with_working_dir(dir.path().to_path_buf())
            .with_config_override(explicit.parent().unwrap().to_path_buf())
            .with_model_override("claude-haiku-4-5".to_string())
            .with_base_url_override("http://localhost:8080".to_string())
            .load()
            .await
            .unwrap();

        assert_eq!(loaded.llm.api_key, "sk-explicit");
        assert_eq!(loaded.llm.model, "claude-haiku-4-5");
        assert_eq!(loaded.llm.base_url, "http://localhost:8080");
        assert_eq!(loaded.source, Some(explicit));
    }

    #[tokio::test]
    async fn test_env_prefixed_api_key() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("SHOPPER_TEST_LOADER_KEY", "sk-from-env");
        write(
            dir.path(),
            "shopper.json",
            r#"{"api_key": "env:SHOPPER_TEST_LOADER_KEY"}"#,
        );

        let loaded = CliConfigLoader::new()
            .with_working_dir(dir.path().to_path_buf())
            .load()
            .await
            .unwrap();
        assert_eq!(loaded.llm.api_key, "sk-from-env");
    }

    #[tokio::test]
    async fn test_missing_env_var_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "shopper.json",
            r#"{"api_key": "env:SHOPPER_TEST_DEFINITELY_UNSET"}"#,
        );

        let err = CliConfigLoader::new()
            .with_working_dir(dir.path().to_path_buf())
            .load()
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("SHOPPER_TEST_DEFINITELY_UNSET"));
    }

    #[tokio::test]
    async fn test_invalid_agent_section_rejected() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "shopper.json",
            r#"{"api_key": "sk", "agent": {"budget_warning_fraction": 2.0}}"#,
        );

        let result = CliConfigLoader::new()
            .with_working_dir(dir.path().to_path_buf())
            .load()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_override_path() {
        let dir = TempDir::new().unwrap();
        let result = CliConfigLoader::new()
            .with_config_override(dir.path().join("absent.json"))
            .load()
            .await;
        assert!(result.is_err());
    }
}
