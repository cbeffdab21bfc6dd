//! # Gateway Configuration
//!
//! Configuration management for the API gateway, including:
//! - Configuration schema and validation
//! - Loading from TOML/YAML/JSON files
//! - Environment variable substitution and overrides
//! - The embedded example configuration

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod example;
pub mod loader;
pub mod schema;

// Re-export main types
pub use example::{example_config, write_example_config, DEFAULT_EXAMPLE_PATH};
pub use loader::{load_config, ConfigError, ConfigLoader, ConfigSource};
pub use schema::{
    CacheConfig, GatewayConfig, LogFormat, LoggingSettings, RouteConfig, ServerConfig,
};
