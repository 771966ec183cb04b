/// Gateway Error Module
///
/// This module defines the error type shared by every layer of the gateway.
/// Engine failures keep the underlying SQLite message text so callers see
/// exactly what the engine reported.
use thiserror::Error;

/// Comprehensive error type for the gateway.
///
/// The transport layer turns every variant into the uniform
/// `{"status": "error", "message": ...}` reply; only the HTTP status code
/// differs between variants.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No active database is bound to the registry
    #[error("Not connected to database. Connect first.")]
    NotConnected,

    /// Errors raised by the SQLite engine (constraints, syntax, arity, ...)
    #[error("{0}")]
    Engine(#[from] rusqlite::Error),

    /// Schema introspection of a table that does not exist
    #[error("no such table: {0}")]
    UnknownTable(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or incomplete request payloads
    #[error("{0}")]
    InvalidRequest(String),

    /// A record looked up by a composite operation does not exist
    #[error("{0}")]
    NotFound(String),

    /// Business failure inside an in-process transaction
    #[error("{0}")]
    Transaction(String),

    /// Generic application errors for unexpected conditions
    #[error("Application error: {0}")]
    App(String),
}

impl GatewayError {
    /// Whether the error came out of the engine (or engine-level lookups)
    /// and should be reported with the failing operation as a prefix.
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            GatewayError::Engine(_) | GatewayError::UnknownTable(_) | GatewayError::Io(_)
        )
    }
}

/// Type alias for Result to use GatewayError as the error type.
pub type Result<T> = std::result::Result<T, GatewayError>;
