use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use zehd_backend::config::{Command, Config};
use zehd_backend::health::HealthServer;
use zehd_backend::storage::Store;
use zehd_backend::{logging, server};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_args();

    // Handle version subcommand
    if let Some(Command::Version) = &config.command {
        println!(
            "zehd-backend {}, commit: {}, build_date: {}",
            env!("CARGO_PKG_VERSION"),
            env!("VERGEN_GIT_SHA"),
            env!("VERGEN_BUILD_TIMESTAMP"),
        );
        return Ok(());
    }

    logging::init(&config.log_format, &config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("VERGEN_GIT_SHA"),
        build_date = env!("VERGEN_BUILD_TIMESTAMP"),
        server_port = config.server_port,
        env_file = %config.env_file.display(),
        "zehd-backend starting"
    );

    let settings = match config.validate().and_then(|()| config.store_settings()) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Configuration validation failed");
            std::process::exit(1);
        }
    };

    // Start health check server
    let health_server = HealthServer::new();
    let health_server_clone = health_server.clone();
    let health_port = config.health_port;
    let (health_ready_tx, health_ready_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = health_server_clone.serve(health_port, health_ready_tx).await {
            error!(error = %e, "Health check server failed");
        }
    });
    health_ready_rx.await.ok();

    // A failed startup initialization leaves the service running degraded;
    // POST /database/exist with tables=create retries it.
    let store = Arc::new(Store::new(settings));
    match store.initialize().await {
        Ok(schema) => {
            health_server.set_ready(true);
            info!(schema = %schema, "Database ready");
        }
        Err(e) => {
            warn!(error = %e, "Unable to initialize database on startup, running degraded");
        }
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let result = tokio::select! {
        result = server::run(&config, store.clone(), health_server.clone(), shutdown_rx) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
            Ok(())
        }
    };

    health_server.set_ready(false);
    store.close().await;

    if let Err(e) = result {
        error!(error = %e, "Application error");
        std::process::exit(1);
    }

    info!("Shutdown complete");
    Ok(())
}
