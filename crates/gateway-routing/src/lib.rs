//! # Gateway Routing
//!
//! Routing for the API gateway, including:
//! - Longest-prefix route matching
//! - Round-robin load balancing with passive health tracking
//! - A per-route balancer registry
//! - Cache eligibility policy

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod load_balancer;
pub mod registry;
pub mod router;

pub use load_balancer::{
    BackendStatus, LoadBalancer, LoadBalancerConfig, RoundRobinBalancer, DEFAULT_FAIL_TIMEOUT,
    DEFAULT_LATENCY_WINDOW, DEFAULT_MAX_FAIL_COUNT,
};
pub use registry::LoadBalancerRegistry;
pub use router::{should_cache, strip_route_prefix, RouteMatch, RouteTable};
