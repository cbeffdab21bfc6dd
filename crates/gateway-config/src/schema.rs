//! Configuration schema definitions.
//!
//! This module defines all configuration types with validation and defaults.
//! Routes are constructed once at startup and are read-only afterwards.

use crate::loader::ConfigError;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[derive(Default)]
pub struct GatewayConfig {
    /// Server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingSettings,

    /// Cache configuration
    pub cache: CacheConfig,

    /// Route table (`[[route]]` entries in TOML)
    #[serde(rename = "route", alias = "routes")]
    pub routes: Vec<RouteConfig>,
}

impl GatewayConfig {
    /// Validate the configuration
    ///
    /// # Errors
    /// Returns a validation error describing the first invalid setting
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        self.cache.validate_settings()?;

        if self.routes.is_empty() {
            return Err(ConfigError::Validation("no routes found in config".to_string()));
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            route.validate_route()?;
            // `/api` and `/api/` match the same requests
            if !seen.insert(route.prefix()) {
                return Err(ConfigError::Validation(format!(
                    "route path is duplicated: {}",
                    route.path
                )));
            }
        }

        Ok(())
    }

    /// Get a route config by path
    #[must_use]
    pub fn get_route(&self, path: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|r| r.path == path)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    #[validate(length(min = 1))]
    pub host: String,

    /// Bind port
    #[validate(range(min = 1))]
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Deadline for a complete backend response (none by default)
    #[serde(default, with = "humantime_serde")]
    pub upstream_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 10 * 1024 * 1024, // 10MB
            upstream_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Get the socket address
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level
    pub level: String,

    /// Log format
    pub format: LogFormat,

    /// Write logs to this file instead of stdout
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file_path: None,
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON structured logs
    Json,
    /// Human-readable logs
    #[default]
    Pretty,
    /// Compact single-line logs
    Compact,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether response caching is enabled at all
    pub enabled: bool,

    /// Use the remote (Redis) store instead of the in-process store
    #[serde(alias = "use_remote_store")]
    pub use_redis: bool,

    /// Redis connection URL
    #[serde(skip_serializing)]
    pub redis_url: Option<SecretString>,

    /// Redis database index
    pub redis_db: i64,

    /// Prefix applied to every Redis key
    pub redis_prefix: String,

    /// Interval between expiry sweeps of the in-process store
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_redis: false,
            redis_url: None,
            redis_db: 0,
            redis_prefix: "api_gateway:".to_string(),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// In-process cache configuration, enabled
    #[must_use]
    pub fn memory() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Redis cache configuration, enabled
    #[must_use]
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            use_redis: true,
            redis_url: Some(SecretString::new(url.into())),
            ..Self::default()
        }
    }

    /// Set the Redis database index
    #[must_use]
    pub fn with_redis_db(mut self, db: i64) -> Self {
        self.redis_db = db;
        self
    }

    /// Set the Redis key prefix
    #[must_use]
    pub fn with_redis_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.redis_prefix = prefix.into();
        self
    }

    /// Set the in-process sweep interval
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    fn validate_settings(&self) -> Result<(), ConfigError> {
        if !(self.enabled && self.use_redis) {
            return Ok(());
        }

        let Some(url) = self.redis_url.as_ref() else {
            return Err(ConfigError::Validation(
                "redis URL is empty but Redis cache is enabled".to_string(),
            ));
        };

        let url = secrecy::ExposeSecret::expose_secret(url);
        if url.is_empty() {
            return Err(ConfigError::Validation(
                "redis URL is empty but Redis cache is enabled".to_string(),
            ));
        }

        // The URL itself may carry a password; never echo it back.
        url::Url::parse(url)
            .map_err(|e| ConfigError::Validation(format!("redis URL is not valid: {e}")))?;

        Ok(())
    }
}

/// A proxied route: a path prefix mapped to backends plus cache policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RouteConfig {
    /// Path prefix, unique across routes
    #[validate(length(min = 1))]
    pub path: String,

    /// Backend base URLs, selected round robin
    #[validate(length(min = 1))]
    pub backends: Vec<String>,

    /// Outbound User-Agent override
    #[serde(default)]
    pub ua_client: Option<String>,

    /// Cache TTL in seconds (0 = never cache)
    #[serde(default)]
    pub cache_ttl: u64,

    /// Enable caching for this route
    #[serde(default)]
    pub cache_enable: bool,

    /// Relative path prefixes that may be cached (empty = all)
    #[serde(default)]
    pub cache_paths: Vec<String>,

    /// Headers injected into every outbound request
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
}

impl RouteConfig {
    /// Create a route with caching disabled
    #[must_use]
    pub fn new<I, S>(path: impl Into<String>, backends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            backends: backends.into_iter().map(Into::into).collect(),
            ua_client: None,
            cache_ttl: 0,
            cache_enable: false,
            cache_paths: Vec::new(),
            custom_headers: HashMap::new(),
        }
    }

    /// Enable caching with the given TTL in seconds
    #[must_use]
    pub fn with_cache(mut self, ttl_secs: u64) -> Self {
        self.cache_enable = true;
        self.cache_ttl = ttl_secs;
        self
    }

    /// Restrict caching to these relative path prefixes
    #[must_use]
    pub fn with_cache_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cache_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Override the outbound User-Agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.ua_client = Some(ua.into());
        self
    }

    /// Add a header injected into outbound requests
    #[must_use]
    pub fn with_custom_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    /// The User-Agent override, if one is set and non-empty
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.ua_client.as_deref().filter(|ua| !ua.is_empty())
    }

    /// The path prefix without a trailing slash (`""` for the root route)
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.path.trim_end_matches('/')
    }

    fn validate_route(&self) -> Result<(), ConfigError> {
        self.validate().map_err(|e| {
            ConfigError::Validation(format!("route {:?} is not valid: {e}", self.path))
        })?;

        if !self.path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "route path must start with '/': {}",
                self.path
            )));
        }

        for backend in &self.backends {
            if backend.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "route backend is empty: {}",
                    self.path
                )));
            }

            let url = url::Url::parse(backend).map_err(|e| {
                ConfigError::Validation(format!(
                    "route {} backend is not a valid URL ({backend}): {e}",
                    self.path
                ))
            })?;

            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Validation(format!(
                    "route {} backend must use http or https: {backend}",
                    self.path
                )));
            }
        }

        Ok(())
    }
}
