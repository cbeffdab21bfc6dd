//! Route table for matching request paths to configured routes.
//!
//! Routes match on their path prefix at segment boundaries, so `/api` claims
//! `/api` and `/api/users` but not `/apix`. When prefixes nest, the longest
//! one wins. The root route `/` matches every path.

use gateway_config::RouteConfig;
use std::sync::Arc;
use tracing::debug;

/// A request path resolved to its route
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// The matched route
    pub route: &'a Arc<RouteConfig>,
    /// Request path with the route prefix removed
    pub relative_path: &'a str,
}

/// Configured routes ordered for longest-prefix matching
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Arc<RouteConfig>>,
}

impl RouteTable {
    /// Build a table from route configurations
    #[must_use]
    pub fn new<I>(routes: I) -> Self
    where
        I: IntoIterator<Item = RouteConfig>,
    {
        let mut routes: Vec<Arc<RouteConfig>> = routes.into_iter().map(Arc::new).collect();
        routes.sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()));
        Self { routes }
    }

    /// Resolve a request path to the most specific route
    #[must_use]
    pub fn match_path<'a>(&'a self, path: &'a str) -> Option<RouteMatch<'a>> {
        let matched = self.routes.iter().find_map(|route| {
            strip_route_prefix(route, path).map(|relative_path| RouteMatch {
                route,
                relative_path,
            })
        });

        if matched.is_none() {
            debug!(path = %path, "No route matched request path");
        }
        matched
    }

    /// Routes in matching order
    #[must_use]
    pub fn routes(&self) -> &[Arc<RouteConfig>] {
        &self.routes
    }

    /// Number of routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Remove a route's prefix from `path`, if the route claims it
#[must_use]
pub fn strip_route_prefix<'a>(route: &RouteConfig, path: &'a str) -> Option<&'a str> {
    let prefix = route.prefix();
    let rest = path.strip_prefix(prefix)?;

    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Whether a response on this route may be cached
///
/// Caching needs the global switch, the route's own switch and a positive TTL.
/// A non-empty `cache_paths` list further restricts caching to relative paths
/// starting with one of its entries.
#[must_use]
pub fn should_cache(route: &RouteConfig, global_enabled: bool, relative_path: &str) -> bool {
    if !global_enabled || !route.cache_enable || route.cache_ttl == 0 {
        return false;
    }

    route.cache_paths.is_empty()
        || route
            .cache_paths
            .iter()
            .any(|prefix| relative_path.starts_with(prefix.as_str()))
}
