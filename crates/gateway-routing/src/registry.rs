//! Per-route load balancer registry.

use crate::load_balancer::{LoadBalancer, LoadBalancerConfig, RoundRobinBalancer};
use gateway_config::RouteConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Lazily created load balancers, one per route path
pub struct LoadBalancerRegistry {
    balancers: RwLock<HashMap<String, Arc<dyn LoadBalancer>>>,
    config: LoadBalancerConfig,
}

impl Default for LoadBalancerRegistry {
    fn default() -> Self {
        Self::new(LoadBalancerConfig::default())
    }
}

impl LoadBalancerRegistry {
    /// Create a new registry
    #[must_use]
    pub fn new(config: LoadBalancerConfig) -> Self {
        Self {
            balancers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get or create the balancer for a route
    ///
    /// Concurrent first calls for the same route observe the same instance.
    #[must_use]
    pub fn get_or_create(&self, route: &RouteConfig) -> Arc<dyn LoadBalancer> {
        {
            let balancers = self.balancers.read();
            if let Some(lb) = balancers.get(&route.path) {
                return Arc::clone(lb);
            }
        }

        let mut balancers = self.balancers.write();
        balancers
            .entry(route.path.clone())
            .or_insert_with(|| {
                debug!(
                    route = %route.path,
                    backends = route.backends.len(),
                    "Creating load balancer"
                );
                Arc::new(RoundRobinBalancer::with_config(
                    route.backends.iter().cloned(),
                    self.config.clone(),
                ))
            })
            .clone()
    }

    /// Get a balancer if one exists
    #[must_use]
    pub fn get(&self, route_path: &str) -> Option<Arc<dyn LoadBalancer>> {
        self.balancers.read().get(route_path).cloned()
    }

    /// Route paths with a balancer
    #[must_use]
    pub fn route_paths(&self) -> Vec<String> {
        self.balancers.read().keys().cloned().collect()
    }

    /// Number of balancers
    #[must_use]
    pub fn len(&self) -> usize {
        self.balancers.read().len()
    }

    /// Whether no balancer has been created yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balancers.read().is_empty()
    }
}
