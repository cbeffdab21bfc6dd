//! Configuration loading from files and environment.
//!
//! This module provides configuration loading from TOML, YAML and JSON files,
//! with support for environment variable substitution.

use crate::schema::GatewayConfig;
use secrecy::SecretString;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// The path to the file that was not found
        path: String,
    },

    /// IO error
    #[error("IO error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// Unsupported format
    #[error("Unsupported configuration format: {extension}")]
    UnsupportedFormat {
        /// The file extension that was not supported
        extension: String,
    },
}

/// Configuration source
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// File path
    File(String),
    /// Raw TOML string
    Toml(String),
    /// Raw YAML string
    Yaml(String),
    /// Raw JSON string
    Json(String),
    /// Default configuration
    Default,
}

/// Configuration loader
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
    env_prefix: Option<String>,
    validate: bool,
}

impl ConfigLoader {
    /// Create a new config loader
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            env_prefix: None,
            validate: true,
        }
    }

    /// Add a configuration source
    #[must_use]
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a file source
    #[must_use]
    pub fn with_file(self, path: impl Into<String>) -> Self {
        self.with_source(ConfigSource::File(path.into()))
    }

    /// Set environment variable prefix for overrides
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Skip validation of the merged configuration
    #[must_use]
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Load configuration from all sources
    ///
    /// # Errors
    /// Returns error if any source fails to load or validate
    pub async fn load(self) -> Result<GatewayConfig, ConfigError> {
        let mut config = GatewayConfig::default();

        for source in self.sources {
            let source_config = Self::load_source(&source).await?;
            config = Self::merge_configs(config, source_config);
        }

        if let Some(ref prefix) = self.env_prefix {
            config = Self::apply_env_overrides(config, prefix);
        }

        if self.validate {
            config.validate_config()?;
        }

        info!(routes = config.routes.len(), "Configuration loaded successfully");
        Ok(config)
    }

    async fn load_source(source: &ConfigSource) -> Result<GatewayConfig, ConfigError> {
        match source {
            ConfigSource::File(path) => Self::load_file(path).await,
            ConfigSource::Toml(content) => Self::parse_toml(content),
            ConfigSource::Yaml(content) => Self::parse_yaml(content),
            ConfigSource::Json(content) => Self::parse_json(content),
            ConfigSource::Default => Ok(GatewayConfig::default()),
        }
    }

    async fn load_file(path: &str) -> Result<GatewayConfig, ConfigError> {
        let path = Path::new(path);

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).await?;
        let content = Self::substitute_env_vars(&content);

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        debug!("Loading configuration from {} (format: {})", path.display(), extension);

        match extension.as_str() {
            "toml" => Self::parse_toml(&content),
            "yaml" | "yml" => Self::parse_yaml(&content),
            "json" => Self::parse_json(&content),
            ext => Err(ConfigError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }

    fn parse_toml(content: &str) -> Result<GatewayConfig, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn parse_yaml(content: &str) -> Result<GatewayConfig, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn parse_json(content: &str) -> Result<GatewayConfig, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Substitute environment variables in content
    ///
    /// Supports ${VAR} and ${VAR:-default} syntax. Unknown variables without a
    /// default are left in place.
    ///
    /// # Panics
    /// Panics if the regex is invalid (should not happen with static patterns)
    #[allow(clippy::expect_used)]
    fn substitute_env_vars(content: &str) -> String {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("valid regex");

        re.replace_all(content, |caps: &regex::Captures<'_>| {
            let var_spec = &caps[1];
            let (var_name, default) = match var_spec.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_spec, None),
            };

            match (std::env::var(var_name), default) {
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.to_string(),
                (Err(_), None) => {
                    warn!("Environment variable not found: {}", var_name);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
    }

    /// Merge two configurations (later overrides earlier)
    fn merge_configs(base: GatewayConfig, overlay: GatewayConfig) -> GatewayConfig {
        let defaults = GatewayConfig::default();
        GatewayConfig {
            server: if overlay.server.socket_addr() == defaults.server.socket_addr() {
                base.server
            } else {
                overlay.server
            },
            logging: overlay.logging,
            cache: if overlay.cache.enabled { overlay.cache } else { base.cache },
            routes: if overlay.routes.is_empty() {
                base.routes
            } else {
                overlay.routes
            },
        }
    }

    fn apply_env_overrides(mut config: GatewayConfig, prefix: &str) -> GatewayConfig {
        if let Ok(port) = std::env::var(format!("{prefix}_SERVER_PORT")) {
            match port.parse() {
                Ok(port) => config.server.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid port override"),
            }
        }

        if let Ok(host) = std::env::var(format!("{prefix}_SERVER_HOST")) {
            config.server.host = host;
        }

        if let Ok(level) = std::env::var(format!("{prefix}_LOG_LEVEL")) {
            config.logging.level = level;
        }

        if let Ok(url) = std::env::var(format!("{prefix}_CACHE_REDIS_URL")) {
            config.cache.redis_url = Some(SecretString::new(url));
        }

        config
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and validate configuration from a file, applying `API_GATEWAY_*` overrides
///
/// # Errors
/// Returns error if the file cannot be read, parsed or validated
pub async fn load_config(path: impl Into<String>) -> Result<GatewayConfig, ConfigError> {
    let path = path.into();
    info!("Loading configuration from: {}", path);
    ConfigLoader::new()
        .with_file(path)
        .with_env_prefix("API_GATEWAY")
        .load()
        .await
}
