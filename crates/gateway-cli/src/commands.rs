use anyhow::{Context, Result};
use gateway_config::{load_config, write_example_config, GatewayConfig};
use gateway_server::{GatewayState, Server};
use gateway_telemetry::{init_logging, LoggingConfig};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const BIN_NAME: &str = "api-gateway";
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Load the config, set up logging from it, and serve until shutdown
pub async fn serve(path: &Path, verbose: bool) -> Result<()> {
    let config = load(path).await?;

    init_logging(&LoggingConfig::from_settings(&config.logging).with_verbose(verbose))
        .context("failed to initialize logging")?;
    info!(config = %path.display(), routes = config.routes.len(), "Configuration loaded");

    let state = GatewayState::from_config(config)
        .await
        .context("failed to build gateway state")?;
    Server::new(state).run().await?;
    Ok(())
}

/// Validate the config and probe each backend once
pub async fn check(path: &Path) -> Result<()> {
    let config = load(path).await?;
    probe_backends(&config).await;

    info!(config = %path.display(), routes = config.routes.len(), "Configuration is valid");
    println!("{} is valid", path.display());
    Ok(())
}

/// Write the example config
pub async fn gen(path: &Path) -> Result<()> {
    let written = write_example_config(path)
        .await
        .with_context(|| format!("failed to write example config to {}", path.display()))?;
    println!("Example configuration written to {}", written.display());
    Ok(())
}

pub fn version() {
    println!("{BIN_NAME} {}", env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
}

async fn load(path: &Path) -> Result<GatewayConfig> {
    load_config(path.display().to_string())
        .await
        .with_context(|| format!("invalid configuration {}", path.display()))
}

/// Unreachable backends are only reported; they are retried at runtime
async fn probe_backends(config: &GatewayConfig) {
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Skipping backend probe");
            return;
        }
    };

    for route in &config.routes {
        for backend in &route.backends {
            match client.get(backend).send().await {
                Ok(response) => info!(
                    route = %route.path,
                    backend = %backend,
                    status = response.status().as_u16(),
                    "Backend reachable"
                ),
                Err(e) => warn!(
                    route = %route.path,
                    backend = %backend,
                    error = %e,
                    "Failed to connect to backend, will retry at runtime"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[server]
port = 9000

[[route]]
path = "/api"
backends = ["http://127.0.0.1:1"]
"#;

    #[tokio::test]
    async fn test_check_accepts_valid_config_with_dead_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, VALID).unwrap();

        assert!(check(&path).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_rejects_config_without_routes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        let err = check(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("no routes"));
    }

    #[tokio::test]
    async fn test_gen_then_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.toml");

        gen(&path).await.unwrap();
        assert!(path.exists());
        assert!(load(&path).await.is_ok());
    }

    #[tokio::test]
    async fn test_gen_rejects_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        assert!(gen(&dir.path().join("example.yaml")).await.is_err());
    }
}
