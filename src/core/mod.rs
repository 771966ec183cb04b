/// Core Module for the gateway
///
/// This module contains the engine binding and the error type that every
/// other layer (HTTP transport, commerce helpers) is built on.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{GatewayError, Result};
