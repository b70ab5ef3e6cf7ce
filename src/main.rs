// src/main.rs - E-Store Operations Server Entry Point
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

use color_eyre::eyre::{Result, WrapErr};
use config::{Config, ConfigError, Environment, File};
use std::{env, net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn, Level};

use estore_core::core::auth::DepartmentDirectory;
use estore_core::routing::{CachedRouteResolver, CityGraph};
use estore_core::storage::memory::seed_demo;
use estore_core::storage::{InMemoryStore, MemoryConfig, RecordSource};
use estore_core::transport::{create_router, ApiState};
use estore_core::{AppConfig, EngineConfig, OpsEngine};

// Global allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Load layered configuration: files under `CONFIG_DIR`, then environment
fn load_config() -> Result<AppConfig, ConfigError> {
    let config_dir = env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

    let s = Config::builder()
        .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
        .add_source(File::with_name(&format!("{config_dir}/local")).required(false))
        .add_source(Environment::with_prefix("ESTORE").separator("__"))
        .build()?;

    s.try_deserialize()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install color_eyre for better error messages
    color_eyre::install().wrap_err("Failed to install color_eyre")?;

    // Load configuration
    let config = load_config().unwrap_or_else(|_| {
        eprintln!("Failed to load config, using defaults");
        AppConfig::default()
    });

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(config.logging.level.parse::<Level>().unwrap_or(Level::INFO))
        .with_target(false);
    if config.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.pretty().init();
    }

    info!("Starting estore-core server v{}", env!("CARGO_PKG_VERSION"));

    // Backing store
    let store = Arc::new(InMemoryStore::new(MemoryConfig::default()));
    if config.server.seed_demo {
        seed_demo(&store);
    } else {
        warn!("Running with an empty store; set server.seed_demo for demo data");
    }

    // Route resolver over the registered city network
    let snapshot = store
        .analytics_snapshot()
        .await
        .wrap_err("Failed to read the city network")?;
    let graph = CityGraph::new(&snapshot.cities, &snapshot.routes);
    let resolver = Arc::new(CachedRouteResolver::new(
        graph,
        config.routing.route_cache_size,
    ));

    // Engines
    let engine = Arc::new(OpsEngine::new(
        EngineConfig::default(),
        store.clone(),
        store.clone(),
        resolver,
        Arc::new(DepartmentDirectory),
    ));

    // Router
    let app = create_router(ApiState { engine, store }, config.server.enable_cors);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .wrap_err("Invalid server address")?;
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err("Failed to bind to address")?;

    info!("Server listening on {addr}");

    // Graceful shutdown
    let shutdown_signal = async {
        let _ = signal::ctrl_c().await;
        info!("Shutdown signal received, shutting down gracefully...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .wrap_err("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
