//! Configuration loading from ferry.toml.

use runtime::{DEFAULT_MAX_TOKENS, DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_MODEL, DEFAULT_REGION};
use serde::Deserialize;
use std::path::Path;

/// Config file looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE: &str = "ferry.toml";

/// Environment variable holding the Bedrock API key.
pub const TOKEN_ENV: &str = "AWS_BEARER_TOKEN_BEDROCK";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Inference backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Conversation loop configuration.
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Bedrock backend configuration.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// Model ID to converse with.
    #[serde(default = "default_model")]
    pub model: String,

    /// AWS region of the runtime endpoint.
    #[serde(default = "default_region")]
    pub region: String,

    /// Endpoint override (e.g. a VPC endpoint or a local proxy).
    pub endpoint: Option<String>,

    /// Bedrock API key. `AWS_BEARER_TOKEN_BEDROCK` takes precedence.
    pub bearer_token: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub temperature: f32,

    /// Optional system prompt.
    pub system: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            region: default_region(),
            endpoint: None,
            bearer_token: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            system: None,
        }
    }
}

/// Conversation loop configuration.
#[derive(Debug, Deserialize)]
pub struct ChatConfig {
    /// Dispatch rounds allowed per query.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Keep the transcript between queries.
    #[serde(default)]
    pub remember: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            remember: false,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load `path` if given, else `ferry.toml` if present, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load(CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// The Bedrock API key, from the environment or the config file.
    pub fn bearer_token(&self) -> Result<String, ConfigError> {
        self.bearer_token_from(std::env::var(TOKEN_ENV).ok())
    }

    fn bearer_token_from(&self, env: Option<String>) -> Result<String, ConfigError> {
        env.filter(|t| !t.is_empty())
            .or_else(|| self.backend.bearer_token.clone())
            .ok_or(ConfigError::MissingToken)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("authentication not configured: set AWS_BEARER_TOKEN_BEDROCK or backend.bearer_token")]
    MissingToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend.model, DEFAULT_MODEL);
        assert_eq!(config.backend.region, "us-west-2");
        assert_eq!(config.backend.max_tokens, 1000);
        assert_eq!(config.backend.temperature, 0.0);
        assert_eq!(config.chat.max_tool_rounds, DEFAULT_MAX_TOOL_ROUNDS);
        assert!(!config.chat.remember);
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::parse(
            r#"
            [backend]
            model = "anthropic.claude-3-haiku-20240307-v1:0"
            region = "eu-central-1"
            endpoint = "http://localhost:9000"
            bearer_token = "from-file"
            system = "Answer in one sentence."

            [chat]
            max_tool_rounds = 2
            remember = true
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.model, "anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(config.backend.region, "eu-central-1");
        assert_eq!(config.backend.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.backend.system.as_deref(), Some("Answer in one sentence."));
        assert_eq!(config.chat.max_tool_rounds, 2);
        assert!(config.chat.remember);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Config::parse("[backend\nmodel = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_token_beats_file_token() {
        let config = Config::parse("[backend]\nbearer_token = \"from-file\"").unwrap();
        assert_eq!(
            config.bearer_token_from(Some("from-env".into())).unwrap(),
            "from-env"
        );
        assert_eq!(config.bearer_token_from(None).unwrap(), "from-file");
        assert_eq!(config.bearer_token_from(Some(String::new())).unwrap(), "from-file");
    }

    #[test]
    fn missing_token_is_error() {
        let err = Config::default().bearer_token_from(None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingToken));
    }

    #[test]
    fn missing_explicit_file_is_io_error() {
        let err = Config::resolve(Some(Path::new("/nonexistent/ferry.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
