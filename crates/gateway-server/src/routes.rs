//! Router assembly.

use crate::dispatcher::dispatch;
use crate::middleware::{cors_middleware, logging_middleware, request_id_middleware};
use crate::state::GatewayState;
use axum::{extract::DefaultBodyLimit, middleware, Router};

/// Create the gateway router
///
/// Every path goes to the dispatcher, which resolves the configured route by
/// longest prefix. Middleware runs outermost first: request ID, logging, CORS.
/// Request bodies are capped at `server.max_body_size`.
pub fn create_router(state: GatewayState) -> Router {
    let body_limit = state.config.server.max_body_size;

    Router::new()
        .fallback(dispatch)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(cors_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
