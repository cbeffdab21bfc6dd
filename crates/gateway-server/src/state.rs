//! Gateway state shared across requests.

use gateway_cache::CacheManager;
use gateway_config::{GatewayConfig, RouteConfig};
use gateway_core::{GatewayError, GatewayResult};
use gateway_routing::{LoadBalancer, LoadBalancerConfig, LoadBalancerRegistry, RouteTable};
use std::sync::Arc;
use tracing::debug;

/// Everything a request needs, constructed once at startup
///
/// Cloning is cheap; all members are shared.
#[derive(Clone)]
pub struct GatewayState {
    /// Loaded configuration
    pub config: Arc<GatewayConfig>,
    /// Route table for prefix matching
    pub routes: Arc<RouteTable>,
    /// Load balancer per route
    pub balancers: Arc<LoadBalancerRegistry>,
    /// Response cache, absent when caching is disabled
    pub cache: Option<CacheManager>,
    /// Outbound HTTP client
    pub client: reqwest::Client,
}

impl GatewayState {
    /// Create a new gateway state builder
    #[must_use]
    pub fn builder() -> GatewayStateBuilder {
        GatewayStateBuilder::new()
    }

    /// Build state from configuration, connecting the configured cache store
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub async fn from_config(config: GatewayConfig) -> GatewayResult<Self> {
        let cache = CacheManager::from_config(&config.cache).await;
        let mut builder = Self::builder().config(config);
        if let Some(cache) = cache {
            builder = builder.cache(cache);
        }
        builder.build()
    }

    /// Get the load balancer for a route, creating it on first use
    #[must_use]
    pub fn balancer(&self, route: &RouteConfig) -> Arc<dyn LoadBalancer> {
        self.balancers.get_or_create(route)
    }
}

/// Builder for gateway state
#[derive(Default)]
pub struct GatewayStateBuilder {
    config: Option<GatewayConfig>,
    cache: Option<CacheManager>,
    load_balancer: Option<LoadBalancerConfig>,
    client: Option<reqwest::Client>,
}

impl GatewayStateBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the cache manager
    #[must_use]
    pub fn cache(mut self, cache: CacheManager) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the load balancer policy used for every route
    #[must_use]
    pub fn load_balancer(mut self, config: LoadBalancerConfig) -> Self {
        self.load_balancer = Some(config);
        self
    }

    /// Set the outbound HTTP client
    #[must_use]
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the gateway state
    ///
    /// # Errors
    /// Returns error if no configuration was given or the HTTP client cannot be built
    pub fn build(self) -> GatewayResult<GatewayState> {
        let config = self
            .config
            .ok_or_else(|| GatewayError::configuration("gateway configuration is required"))?;

        let client = match self.client {
            Some(client) => client,
            None => build_client(&config)?,
        };

        let routes = RouteTable::new(config.routes.iter().cloned());
        debug!(routes = routes.len(), "Route table built");

        Ok(GatewayState {
            routes: Arc::new(routes),
            balancers: Arc::new(LoadBalancerRegistry::new(
                self.load_balancer.unwrap_or_default(),
            )),
            cache: self.cache,
            client,
            config: Arc::new(config),
        })
    }
}

fn build_client(config: &GatewayConfig) -> GatewayResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.server.upstream_timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| GatewayError::internal(format!("failed to build HTTP client: {e}")))
}
