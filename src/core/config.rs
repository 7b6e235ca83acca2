//! Configuration management for Eventflow
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/eventflow/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{EventflowError, Result};

/// Main configuration for Eventflow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ollama configuration
    pub ollama: OllamaConfig,
    /// Model configuration
    pub models: ModelConfig,
    /// Agent graph configuration
    pub agent: AgentConfig,
    /// Checkpoint persistence
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// State feed configuration
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model bound to the agent tools in the chat node
    pub chat: String,
    /// Model used for structured search output
    pub search: String,
}

/// Agent graph configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum node executions in a single run
    /// Default: 25
    pub max_steps: usize,
    /// Whether to log at debug level
    pub debug: bool,
    /// Seconds after which a pending approval counts as cancelled.
    /// Unset means pending approvals never expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt_ttl_secs: Option<u64>,
    /// Override for the food agent system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_prompt: Option<String>,
    /// Override for the license agent system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_prompt: Option<String>,
}

/// Checkpoint persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory for file checkpoints; in-memory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// State feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Buffered events per subscriber before the oldest are dropped
    pub capacity: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            timeout_secs: 120,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            chat: env::var("EVENTFLOW_CHAT_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string()),
            search: env::var("EVENTFLOW_SEARCH_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string()),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: env::var("EVENTFLOW_MAX_STEPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            debug: env::var("EVENTFLOW_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            interrupt_ttl_secs: env::var("EVENTFLOW_INTERRUPT_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
            food_prompt: None,
            license_prompt: None,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eventflow")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from_file().unwrap_or_default();
        if let Ok(dir) = env::var("EVENTFLOW_CHECKPOINT_DIR") {
            config.checkpoint.dir = Some(PathBuf::from(dir));
        }
        config
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(EventflowError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| EventflowError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| EventflowError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                EventflowError::config(format!("Failed to create config dir: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| EventflowError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| EventflowError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Reject settings the graph cannot run with
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.ollama_url())
            .map_err(|e| EventflowError::config(format!("Invalid Ollama URL: {}", e)))?;

        if self.agent.max_steps == 0 {
            return Err(EventflowError::config("agent.max_steps must be at least 1"));
        }

        if self.feed.capacity == 0 {
            return Err(EventflowError::config("feed.capacity must be at least 1"));
        }

        Ok(())
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }
}
