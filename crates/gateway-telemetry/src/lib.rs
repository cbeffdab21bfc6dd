//! # Gateway Telemetry
//!
//! Structured logging for the API gateway built on `tracing`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

pub use logging::{init_logging, LoggingConfig, LoggingError, SpanEvents};
