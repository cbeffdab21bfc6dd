//! # Gateway Server
//!
//! HTTP data plane for the API gateway, including:
//! - The request dispatcher (route match, cache, load balancing, relay)
//! - Shared gateway state
//! - Request ID, logging and CORS middleware
//! - Graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatcher;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, NO_BACKEND_MESSAGE};
pub use routes::create_router;
pub use server::{Server, ServerError};
pub use state::{GatewayState, GatewayStateBuilder};
