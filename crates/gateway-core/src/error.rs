//! Error types and handling for the gateway.
//!
//! Errors are scoped to a single inbound request: none of them is fatal to the
//! process, and each maps to the HTTP status the caller receives.

use http::StatusCode;
use thiserror::Error;

/// Result type alias using `GatewayError`
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error type covering the request lifecycle
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The load balancer could not yield a backend for the route
    #[error("no backend available for route: {route}")]
    NoHealthyBackend {
        /// Route path prefix
        route: String,
    },

    /// The backend could not be reached (connection refused, reset, timeout)
    #[error("error sending request to backend {backend}: {message}")]
    BackendUnreachable {
        /// Backend base URL
        backend: String,
        /// Error message
        message: String,
    },

    /// The backend answered but the response could not be read
    #[error("error reading response from backend {backend}: {message}")]
    BackendProtocol {
        /// Backend base URL
        backend: String,
        /// Error message
        message: String,
    },

    /// A configured backend URL (or the URL built from it) is malformed
    #[error("invalid backend URL {backend}: {message}")]
    InvalidBackendUrl {
        /// Backend base URL
        backend: String,
        /// Error message
        message: String,
    },

    /// The inbound request body could not be read
    #[error("error reading request body: {message}")]
    RequestBody {
        /// Error message
        message: String,
    },

    /// The inbound request body exceeds the configured limit
    #[error("request payload too large: exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Maximum allowed size
        limit: usize,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Internal server error
    #[error("internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoHealthyBackend { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BackendUnreachable { .. }
            | Self::BackendProtocol { .. }
            | Self::InvalidBackendUrl { .. }
            | Self::RequestBody { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error should be reported to the load balancer as a backend failure
    #[must_use]
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::BackendUnreachable { .. }
                | Self::BackendProtocol { .. }
                | Self::InvalidBackendUrl { .. }
        )
    }

    /// Get the error code for programmatic handling
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoHealthyBackend { .. } => "no_healthy_backend",
            Self::BackendUnreachable { .. } => "backend_unreachable",
            Self::BackendProtocol { .. } => "backend_protocol_error",
            Self::InvalidBackendUrl { .. } => "invalid_backend_url",
            Self::RequestBody { .. } => "request_body_error",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Create a no healthy backend error
    #[must_use]
    pub fn no_healthy_backend(route: impl Into<String>) -> Self {
        Self::NoHealthyBackend {
            route: route.into(),
        }
    }

    /// Create a backend unreachable error
    #[must_use]
    pub fn backend_unreachable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnreachable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a backend protocol error
    #[must_use]
    pub fn backend_protocol(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendProtocol {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create an invalid backend URL error
    #[must_use]
    pub fn invalid_backend_url(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBackendUrl {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a request body error
    #[must_use]
    pub fn request_body(message: impl Into<String>) -> Self {
        Self::RequestBody {
            message: message.into(),
        }
    }

    /// Create a payload too large error
    #[must_use]
    pub fn payload_too_large(limit: usize) -> Self {
        Self::PayloadTooLarge { limit }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
