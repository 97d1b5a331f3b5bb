//! Rust Production Reverse Proxy (v1)

pub mod admin;
pub mod auth;
pub mod circuit_breaker;
pub mod config;
pub mod context;
pub mod coordination;
pub mod error;
pub mod health;
pub mod http;
pub mod introspection;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod rate_limit;
pub mod resilience;
pub mod routing;
pub mod transform;

use std::path::Path;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::loader::load_config;
use crate::config::watcher::ConfigWatcher;
use crate::http::HttpServer;
use crate::lifecycle::{signals, startup, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = Path::new("config.toml");

    if !config_path.exists() {
        let default_config = crate::config::ProxyConfig::default();
        let toml_string = toml::to_string_pretty(&default_config)?;
        std::fs::write(config_path, toml_string)?;
    }

    let config = match load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load initial configuration: {e}. exiting.");
            std::process::exit(1);
        }
    };

    observability::logging::init(&config.observability);

    tracing::info!("gatecore starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            crate::observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            );
        }
    }

    let (watcher_instance, config_updates) = ConfigWatcher::new(config_path);
    let _watcher = watcher_instance.run()?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "listening for connections");

    let shutdown = Shutdown::new(Duration::from_secs(startup::DEFAULT_DRAIN_DEADLINE_SECS));
    tokio::spawn(signals::wait_for_shutdown_signal(shutdown.clone()));

    let server = HttpServer::new(config, shutdown).await?;
    server.run(listener, config_updates).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
