//! # HTTP Server Module
//!
//! Axum façade over the connection registry. Every request runs its engine
//! work on the blocking pool against the one registry shared by the whole
//! server, so a `connect` from any caller retargets every later request.
//!
//! # Endpoints
//!
//! - `/connect`, `/disconnect`, `/health` - connection switching and status
//! - `/execute` - raw SQL
//! - `/tables/*` - table management and generic row CRUD
//! - `/backup` - online backups
//! - `/products/*`, `/orders/*`, `/stats/*`, ... - commerce composite operations
//!
//! All routes are served both at the root and under `/api`.

pub mod commerce_routes;
pub mod response;
pub mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::core::db::ConnectionRegistry;
use crate::core::{GatewayError, Result};
use response::{blocking, ApiError};

/// State shared by every handler
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub registry: ConnectionRegistry,
    /// Directory used by `/backup` when the request names none
    pub backup_dir: PathBuf,
}

impl GatewayState {
    pub fn new(registry: ConnectionRegistry, backup_dir: PathBuf) -> Self {
        GatewayState {
            registry,
            backup_dir,
        }
    }

    /// Runs `f` against the registry on the blocking pool, converting a
    /// failure into an error reply for `context`.
    pub async fn run<T, F>(&self, context: &'static str, f: F) -> std::result::Result<T, ApiError>
    where
        F: FnOnce(&ConnectionRegistry) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let registry = self.registry.clone();
        blocking(move || f(&registry))
            .await?
            .map_err(|e| ApiError::from_gateway(context, e))
    }
}

/// HTTP server for the gateway
pub struct GatewayServer {
    addr: String,
    router: Router,
}

impl GatewayServer {
    /// Builds the server from configuration and a registry
    pub fn new(config: &Config, registry: ConnectionRegistry) -> Self {
        let state = Arc::new(GatewayState::new(
            registry,
            config.database.backup_dir.clone(),
        ));
        let router = build_router(state, &config.server.cors_origins);
        GatewayServer {
            addr: config.server.socket_addr(),
            router,
        }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> &str {
        &self.addr
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Start the HTTP server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .addr
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid socket address {}: {}", self.addr, e)))?;

        let listener = TcpListener::bind(addr).await?;
        info!("Database gateway listening on http://{}", addr);
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

/// Build the combined router with all endpoints
pub fn build_router(state: Arc<GatewayState>, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api = Router::new()
        .merge(routes::gateway_routes(state.clone()))
        .merge(commerce_routes::commerce_routes(state));

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_creation() {
        let server = GatewayServer::new(&Config::default(), ConnectionRegistry::default());
        assert_eq!(server.socket_addr(), "0.0.0.0:5003");
        let _router = server.router();
    }
}
