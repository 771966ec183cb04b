use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sqlgate::{config, ConnectionRegistry, GatewayServer};

/// HTTP/JSON gateway for a single-file SQLite database
#[derive(Debug, Parser)]
#[command(name = "sqlgate", version, about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Database opened at startup
    #[arg(long)]
    db_name: Option<String>,
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match config::resolve(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(name) = args.db_name {
        config.database.default_name = name;
    }

    init_logging(&config.server.log_level);
    info!("Starting sqlgate {}", env!("CARGO_PKG_VERSION"));

    let registry = ConnectionRegistry::new(config.database.connection_options());
    // The server still starts without a database; clients can connect later.
    if let Err(e) = registry.connect(None) {
        error!("Failed to open default database: {}", e);
    }

    let server = GatewayServer::new(&config, registry);
    if let Err(e) = server.start().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
