//! Embedded example configuration.

use crate::loader::ConfigError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

const EXAMPLE_CONFIG: &str = include_str!("example_config.toml");

/// Default path used when no output path is given
pub const DEFAULT_EXAMPLE_PATH: &str = "./example.toml";

/// The commented example configuration
#[must_use]
pub fn example_config() -> &'static str {
    EXAMPLE_CONFIG
}

/// Write the example configuration to `path`
///
/// The path must have a `.toml` extension and its parent directory must exist.
///
/// # Errors
/// Returns an error if the path is not acceptable or the file cannot be written
pub async fn write_example_config(path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
    let path = path.as_ref();

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if extension != "toml" {
        return Err(ConfigError::UnsupportedFormat {
            extension: extension.to_string(),
        });
    }

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !fs::try_exists(&parent).await.unwrap_or(false) {
        return Err(ConfigError::FileNotFound {
            path: parent.display().to_string(),
        });
    }

    fs::write(path, EXAMPLE_CONFIG).await?;
    info!(path = %path.display(), "Example configuration written");
    Ok(path.to_path_buf())
}
