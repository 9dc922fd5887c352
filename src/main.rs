//! Cadabra server binary
//!
//! Serves the HTTP façade over a local cache store. `--db :memory:`
//! keeps the store in a throwaway tempdir.

use cadabra::cache::{Cache, CacheConfig};
use cadabra::server::{serve, AppState};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Level;

/// Cadabra: SQL-aware query result cache.
#[derive(Parser, Debug)]
#[command(name = "cadabra", version, about = "SQL-aware query result cache")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "PORT")]
    port: u16,

    /// Host to bind to.
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Storage path, or ":memory:" for a throwaway store.
    #[arg(long, default_value = ":memory:")]
    db: String,

    /// Log level: debug, info, warn, or error.
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Add permissive CORS headers to every response.
    #[arg(long, default_value_t = false, env = "CORS_ENABLED")]
    cors_enabled: bool,
}

fn log_level(name: &str) -> Level {
    match name.to_ascii_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(&cli.log_level))
        .init();

    let config = if cli.db == ":memory:" {
        CacheConfig::default()
    } else {
        CacheConfig::at_path(&cli.db)
    };
    tracing::info!(db = %cli.db, "opening cache store");
    let cache = Arc::new(Cache::open(config)?);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    let state = AppState::new(cache.clone(), cli.cors_enabled);

    tokio::select! {
        result = serve(state, addr) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            cache.close()?;
        }
    }
    Ok(())
}
