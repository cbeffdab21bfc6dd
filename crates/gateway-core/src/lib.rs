//! # Gateway Core
//!
//! Shared error taxonomy for the API gateway crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;

pub use error::{GatewayError, GatewayResult};
