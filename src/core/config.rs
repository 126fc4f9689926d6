//! Configuration management for the digital twin
//!
//! Supports environment variables, config files, and runtime overrides.
//! The config object is built once at startup and handed to constructors;
//! nothing here mutates the process environment.
//!
//! Config file location: ~/.config/twin/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{Result, TwinError};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Completion API configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Web search configuration
    #[serde(default)]
    pub search: SearchConfig,
    /// Agent behavior configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Checkpoint store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// OpenAI-compatible completion API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the chat completions API
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Per-attempt timeout in seconds (none = wait indefinitely)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

/// Search tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Whether the search tool is offered to the model
    pub enabled: bool,
    /// Base URL of the search API
    pub base_url: String,
    /// Maximum snippets returned per query
    pub max_results: usize,
    /// Request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum reasoning/tool round trips per turn
    /// Default: 10
    pub max_round_trips: usize,
    /// Inline system directive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// File holding the system directive (takes precedence over `system_prompt`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_file: Option<PathBuf>,
    /// Version label attached to reasoning spans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_version: Option<String>,
    /// Language the assistant must reply in, injected per turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_language: Option<String>,
    /// Whether to show debug output
    #[serde(default)]
    pub debug: bool,
}

/// Which checkpoint backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Lives for the process lifetime
    #[default]
    Memory,
    /// One JSON document per thread on disk
    File,
}

/// Checkpoint store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory for the file backend (default: data dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("TWIN_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            max_retries: 2,
            timeout_secs: None,
            max_tokens: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: env_flag("TWIN_SEARCH_ENABLED", true),
            base_url: "https://api.tavily.com".to_string(),
            max_results: 2,
            timeout_secs: Some(30),
            api_key_env: "TAVILY_API_KEY".to_string(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_round_trips: 10,
            system_prompt: None,
            system_prompt_file: None,
            prompt_version: None,
            response_language: env::var("TWIN_RESPONSE_LANGUAGE").ok(),
            debug: env_flag("TWIN_DEBUG", false),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        env::var(&self.api_key_env)
            .map_err(|_| TwinError::config(format!("{} is not set", self.api_key_env)))
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        env::var(&self.api_key_env)
            .map_err(|_| TwinError::config(format!("{} is not set", self.api_key_env)))
    }
}

impl AgentConfig {
    /// Resolve the system directive, reading it from disk when a file is configured
    pub fn directive(&self) -> Result<Option<String>> {
        if let Some(ref path) = self.system_prompt_file {
            let text = fs::read_to_string(path).map_err(|e| {
                TwinError::config(format!(
                    "Failed to read system prompt {}: {}",
                    path.display(),
                    e
                ))
            })?;
            return Ok(Some(text.trim().to_string()).filter(|t| !t.is_empty()));
        }

        Ok(self
            .system_prompt
            .as_ref()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()))
    }
}

impl StoreConfig {
    /// Directory used by the file backend
    pub fn dir(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("twin")
                .join("threads")
        })
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("twin")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let path = Self::config_file();
        if path.exists() {
            return Self::load_from_path(&path);
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            TwinError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text; missing sections take defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| TwinError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the graph cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_round_trips == 0 {
            return Err(TwinError::config("agent.max_round_trips must be at least 1"));
        }
        if self.search.max_results == 0 {
            return Err(TwinError::config("search.max_results must be at least 1"));
        }
        url::Url::parse(&self.llm.base_url)
            .map_err(|e| TwinError::config(format!("Invalid llm.base_url: {}", e)))?;
        url::Url::parse(&self.search.base_url)
            .map_err(|e| TwinError::config(format!("Invalid search.base_url: {}", e)))?;
        Ok(())
    }

    /// Save configuration and return the path
    pub fn save_and_get_path(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| TwinError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TwinError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| TwinError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }
}
