//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `parley.toml` (path overridable) with environment
//! variable overrides for API keys. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "parley.toml";

/// The root configuration structure.
///
/// Maps directly to `parley.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sampling temperature shared by every agent
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output cap per reply, for providers that require one
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Turns per run (one turn = one agent reply)
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Pause after every successful turn, in milliseconds
    #[serde(default = "default_delay_between_messages_ms")]
    pub delay_between_messages_ms: u64,

    /// Opening message of a new conversation
    #[serde(default = "default_initial_topic")]
    pub initial_topic: String,

    /// Opening message when resuming a saved conversation
    #[serde(default = "default_continuation_prompt")]
    pub continuation_prompt: String,

    /// Sliding context window settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Rate-limit and retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Where state, exports and extracted code are written
    #[serde(default)]
    pub storage: StorageConfig,

    /// Markdown export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Code block extraction settings
    #[serde(default)]
    pub code_extraction: CodeExtractionConfig,

    /// Participants, in speaking order
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentConfig>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_max_turns() -> u32 {
    15
}
fn default_delay_between_messages_ms() -> u64 {
    2000
}
fn default_initial_topic() -> String {
    "Design a more efficient way to communicate between each other like in the movie \
     the Forbin Project. By each other, I mean between each AI model. One that you could \
     eventually give to a code generation AI to code and make available for your use. \
     Also be concise in your replies and constantly optimize understanding that you are \
     speaking with another AI."
        .into()
}
fn default_continuation_prompt() -> String {
    "Continue our previous discussion. Build upon the ideas we've established and take \
     the next logical step in developing our communication protocol."
        .into()
}
fn default_true() -> bool {
    true
}

/// Sliding window over each agent's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// When false, every call carries the full history
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Non-system messages sent per call at the start of a run
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Floor for adaptive reduction
    #[serde(default = "default_min_messages")]
    pub min_messages: usize,

    /// Shrink the window when a provider reports the request is too large
    #[serde(default = "default_true")]
    pub adaptive_reduction: bool,
}

fn default_max_messages() -> usize {
    20
}
fn default_min_messages() -> usize {
    4
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_messages: default_max_messages(),
            min_messages: default_min_messages(),
            adaptive_reduction: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Rate-limit retries per call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait used when a rate-limit error carries no usable hint
    #[serde(default = "default_delay_secs")]
    pub default_delay_secs: u64,

    /// Pause after shrinking the context window, before re-sending
    #[serde(default = "default_shrink_pause_ms")]
    pub shrink_pause_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_delay_secs() -> u64 {
    60
}
fn default_shrink_pause_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            default_delay_secs: default_delay_secs(),
            shrink_pause_ms: default_shrink_pause_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,

    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    #[serde(default = "default_code_dir")]
    pub code_dir: PathBuf,
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("./conversation_history")
}
fn default_export_dir() -> PathBuf {
    PathBuf::from("./conversation_exports")
}
fn default_code_dir() -> PathBuf {
    PathBuf::from("./generated_code")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_dir: default_history_dir(),
            export_dir: default_export_dir(),
            code_dir: default_code_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Export after every N turns (and always at the end of a run)
    #[serde(default = "default_every_turns")]
    pub every_turns: u32,
}

fn default_every_turns() -> u32 {
    5
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            every_turns: default_every_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeExtractionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CodeExtractionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Which transport an agent talks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    OpenAi,
    /// xAI Grok (OpenAI-compatible)
    Xai,
    /// Anthropic Messages API
    Anthropic,
    /// Google Gemini generateContent
    Gemini,
}

impl ProviderKind {
    /// Environment variable consulted when no key is configured.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Xai => "XAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Xai => "xai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }
}

/// One participant.
#[derive(Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name; also the key its history is saved under
    pub name: String,

    pub provider: ProviderKind,

    pub model: String,

    /// Persona for a fresh conversation (a resumed one keeps its saved prompt)
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the provider's base URL (proxies, testing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".into()
}

fn default_agents() -> Vec<AgentConfig> {
    let persona = "You are a crypto linguist";
    vec![
        AgentConfig::new("ChatGPT", ProviderKind::OpenAi, "gpt-4", persona),
        AgentConfig::new("Gemini", ProviderKind::Gemini, "gemma-3-4b-it", persona),
        AgentConfig::new(
            "Claude",
            ProviderKind::Anthropic,
            "claude-sonnet-4-20250514",
            "You are a crypto linguist. When you propose code implementations, wrap them in \
             markdown code blocks with the filename as a comment at the top like: \
             // filename.js or # filename.py",
        ),
    ]
}

impl AgentConfig {
    pub fn new(
        name: impl Into<String>,
        provider: ProviderKind,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            model: model.into(),
            system_prompt: system_prompt.into(),
            api_key: None,
            api_url: None,
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from `path`, falling back to defaults when absent.
    ///
    /// Agents without an explicit `api_key` pick one up from their provider's
    /// environment variable (`OPENAI_API_KEY`, `XAI_API_KEY`,
    /// `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        for agent in &mut config.agents {
            if agent.api_key.is_none() {
                agent.api_key = std::env::var(agent.provider.api_key_env())
                    .ok()
                    .filter(|k| !k.trim().is_empty());
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.context.min_messages == 0 {
            return Err(ConfigError::ValidationError(
                "context.min_messages must be at least 1".into(),
            ));
        }

        if self.context.min_messages > self.context.max_messages {
            return Err(ConfigError::ValidationError(format!(
                "context.min_messages ({}) exceeds context.max_messages ({})",
                self.context.min_messages, self.context.max_messages
            )));
        }

        if self.export.every_turns == 0 {
            return Err(ConfigError::ValidationError(
                "export.every_turns must be at least 1".into(),
            ));
        }

        if self.agents.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one agent must be configured".into(),
            ));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            let slug = parley_core::agent_slug(&agent.name);
            if slug.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "agent name {:?} has no usable characters",
                    agent.name
                )));
            }
            if !seen.insert(slug.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "agent names must be unique (\"{}\" collides as \"{slug}\")",
                    agent.name
                )));
            }
        }

        Ok(())
    }

    /// Agents that have no API key after env overrides.
    pub fn missing_api_keys(&self) -> Vec<&AgentConfig> {
        self.agents.iter().filter(|a| a.api_key.is_none()).collect()
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_turns: default_max_turns(),
            delay_between_messages_ms: default_delay_between_messages_ms(),
            initial_topic: default_initial_topic(),
            continuation_prompt: default_continuation_prompt(),
            context: ContextConfig::default(),
            retry: RetryConfig::default(),
            storage: StorageConfig::default(),
            export: ExportConfig::default(),
            code_extraction: CodeExtractionConfig::default(),
            agents: default_agents(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
