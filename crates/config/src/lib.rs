//! Configuration loading, validation, and management for HRDesk.
//!
//! Loads configuration from `~/.hrdesk/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.
//! The API credential is resolved separately: environment first, then the
//! secrets store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Provider kinds the factory knows how to build.
pub const PROVIDER_KINDS: &[&str] = &["gemini", "openai"];

/// The root configuration structure.
///
/// Maps directly to `~/.hrdesk/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Knowledge base location
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Generation API settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Prompt and history settings
    #[serde(default)]
    pub chat: ChatConfig,

    /// HTTP server settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Secrets store settings
    #[serde(default)]
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_knowledge_path")]
    pub path: PathBuf,
}

fn default_knowledge_path() -> PathBuf {
    PathBuf::from("data.json")
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: default_knowledge_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// "gemini" or "openai" (any OpenAI-compatible endpoint)
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Environment variable consulted first for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Key looked up in the secrets store when the env var is unset
    #[serde(default = "default_secrets_key")]
    pub secrets_key: String,
}

fn default_provider_kind() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_secrets_key() -> String {
    "GOOGLE_API_KEY".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            model: default_model(),
            api_url: None,
            api_key_env: default_api_key_env(),
            secrets_key: default_secrets_key(),
        }
    }
}

/// How the prompt is laid out for the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Instruction, knowledge, history and question flattened into one turn
    SingleBlob,
    /// One turn per history message, then instruction + knowledge + question
    #[default]
    StructuredTurns,
}

impl std::fmt::Display for PromptMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleBlob => write!(f, "single_blob"),
            Self::StructuredTurns => write!(f, "structured_turns"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Sampling temperature in [0, 1]
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub prompt_mode: PromptMode,

    /// Messages shown in the transcript
    #[serde(default = "default_display_history_limit")]
    pub display_history_limit: usize,

    /// Prior messages sent to the model along with the new question
    #[serde(default = "default_model_history_limit")]
    pub model_history_limit: usize,

    /// Replace the built-in HR system instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_display_history_limit() -> usize {
    4
}
fn default_model_history_limit() -> usize {
    6
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            prompt_mode: PromptMode::default(),
            display_history_limit: default_display_history_limit(),
            model_history_limit: default_model_history_limit(),
            system_instruction: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Extra origins allowed by CORS (the UI itself is same-origin)
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Minutes without activity before a chat session is dropped
    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: u64,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_session_idle_minutes() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: Vec::new(),
            session_idle_minutes: default_session_idle_minutes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Defaults to `~/.hrdesk/secrets.toml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.hrdesk/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path` and apply environment overrides:
    /// - `HRDESK_KNOWLEDGE_PATH`
    /// - `HRDESK_PROVIDER`
    /// - `HRDESK_MODEL`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
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

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("HRDESK_KNOWLEDGE_PATH") {
            self.knowledge.path = PathBuf::from(path);
        }
        if let Some(kind) = lookup("HRDESK_PROVIDER") {
            self.provider.kind = kind;
        }
        if let Some(model) = lookup("HRDESK_MODEL") {
            self.provider.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".hrdesk")
    }

    /// Where the secrets store lives.
    pub fn secrets_path(&self) -> PathBuf {
        self.secrets
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("secrets.toml"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.chat.temperature) {
            return Err(ConfigError::ValidationError(
                "chat.temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if self.chat.display_history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "chat.display_history_limit must be > 0".into(),
            ));
        }

        if !PROVIDER_KINDS.contains(&self.provider.kind.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "provider.kind '{}' is not one of: {}",
                self.provider.kind,
                PROVIDER_KINDS.join(", ")
            )));
        }

        if self.gateway.session_idle_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.session_idle_minutes must be > 0".into(),
            ));
        }

        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.model must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Resolve the API key: environment variable first, secrets store second.
    pub fn resolve_api_key(&self) -> Result<ApiKey, ConfigError> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_api_key_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ApiKey, ConfigError> {
        if let Some(value) = env(&self.provider.api_key_env).filter(|v| !v.trim().is_empty()) {
            return Ok(ApiKey {
                value,
                source: KeySource::Env(self.provider.api_key_env.clone()),
            });
        }

        let secrets_path = self.secrets_path();
        let store = SecretsStore::load(&secrets_path)?;
        if let Some(value) = store.get(&self.provider.secrets_key) {
            return Ok(ApiKey {
                value: value.to_string(),
                source: KeySource::Secrets(secrets_path),
            });
        }

        Err(ConfigError::MissingCredential {
            env_var: self.provider.api_key_env.clone(),
            secrets_key: self.provider.secrets_key.clone(),
            secrets_path,
        })
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// A resolved API key. `Debug` never prints the value.
#[derive(Clone)]
pub struct ApiKey {
    value: String,
    source: KeySource,
}

impl ApiKey {
    pub fn new(value: impl Into<String>, source: KeySource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }

    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> &KeySource {
        &self.source
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Env(String),
    Secrets(PathBuf),
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env(name) => write!(f, "environment variable {name}"),
            Self::Secrets(path) => write!(f, "secrets store {}", path.display()),
        }
    }
}

/// Flat `KEY = "value"` TOML file holding credentials.
#[derive(Default)]
pub struct SecretsStore {
    values: HashMap<String, String>,
}

impl SecretsStore {
    /// A missing file is an empty store; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let table: toml::Table = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let values = table
            .into_iter()
            .filter_map(|(k, v)| match v {
                toml::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect();

        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
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

    #[error(
        "API key not configured: set the {env_var} environment variable or add {secrets_key} to {}",
        .secrets_path.display()
    )]
    MissingCredential {
        env_var: String,
        secrets_key: String,
        secrets_path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_secrets(dir: &tempfile::TempDir, content: Option<&str>) -> AppConfig {
        let path = dir.path().join("secrets.toml");
        if let Some(content) = content {
            std::fs::write(&path, content).unwrap();
        }
        AppConfig {
            secrets: SecretsConfig { path: Some(path) },
            ..AppConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider.kind, "gemini");
        assert_eq!(config.chat.display_history_limit, 4);
        assert_eq!(config.chat.model_history_limit, 6);
        assert_eq!(config.chat.prompt_mode, PromptMode::StructuredTurns);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[chat]
temperature = 0.5
prompt_mode = "single_blob"
display_history_limit = 6

[knowledge]
path = "/srv/hr/data.json"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.chat.prompt_mode, PromptMode::SingleBlob);
        assert_eq!(config.chat.display_history_limit, 6);
        assert_eq!(config.chat.model_history_limit, 6);
        assert_eq!(config.knowledge.path, PathBuf::from("/srv/hr/data.json"));
        assert_eq!(config.provider.model, "gemini-2.0-flash");
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.chat.temperature = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = AppConfig::default();
        config.provider.kind = "carrier-pigeon".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.kind, "gemini");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_overrides(|name| match name {
            "HRDESK_MODEL" => Some("gemini-1.5-pro".into()),
            "HRDESK_KNOWLEDGE_PATH" => Some("hr.json".into()),
            _ => None,
        });
        assert_eq!(config.provider.model, "gemini-1.5-pro");
        assert_eq!(config.knowledge.path, PathBuf::from("hr.json"));
        assert_eq!(config.provider.kind, "gemini");
    }

    #[test]
    fn api_key_prefers_environment() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_secrets(&dir, Some(r#"GOOGLE_API_KEY = "from-secrets""#));

        let key = config
            .resolve_api_key_with(|name| (name == "GEMINI_API_KEY").then(|| "from-env".into()))
            .unwrap();
        assert_eq!(key.expose(), "from-env");
        assert_eq!(key.source(), &KeySource::Env("GEMINI_API_KEY".into()));
    }

    #[test]
    fn api_key_falls_back_to_secrets_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_secrets(&dir, Some(r#"GOOGLE_API_KEY = "from-secrets""#));

        let key = config.resolve_api_key_with(|_| None).unwrap();
        assert_eq!(key.expose(), "from-secrets");
        assert!(matches!(key.source(), KeySource::Secrets(_)));
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_secrets(&dir, None);

        let err = config.resolve_api_key_with(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { .. }));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn blank_env_value_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_secrets(&dir, Some(r#"GOOGLE_API_KEY = "from-secrets""#));
        let key = config.resolve_api_key_with(|_| Some("  ".into())).unwrap();
        assert_eq!(key.expose(), "from-secrets");
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret", KeySource::Env("GEMINI_API_KEY".into()));
        let debug = format!("{key:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini-2.0-flash"));
        assert!(toml_str.contains("structured_turns"));
    }

    #[test]
    fn zero_session_idle_timeout_rejected() {
        let mut config = AppConfig::default();
        assert_eq!(config.gateway.session_idle_minutes, 30);
        config.gateway.session_idle_minutes = 0;
        assert!(config.validate().is_err());
    }
}
