// Core infrastructure modules
pub mod config;
pub mod core;

// Composite operations and the HTTP surface
pub mod commerce;
pub mod server;

pub use crate::config::Config;
pub use crate::core::db::{ConnectionOptions, ConnectionRegistry};
pub use crate::core::{GatewayError, Result};
pub use crate::server::{build_router, GatewayServer, GatewayState};
