//! Reviewd - Main application entry point
//!
//! Starts the HTTP API server and the background dispatch pool.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;

use reviewd::config::validation::Validate;
use reviewd::{Config, create_app, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    run_server().await
}

/// Run the HTTP server
async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = Config::load().map_err(|e| {
        std::io::Error::other(format!(
            "Failed to load configuration. Check REVIEWD__* env vars: {}",
            e
        ))
    })?;

    config
        .validate()
        .map_err(|e| std::io::Error::other(format!("Configuration validation failed: {}", e)))?;

    // Initialize tracing (after config is loaded so we can use logging config)
    init_tracing(&config.logging)?;

    tracing::info!("Starting reviewd server...");
    tracing::info!(
        "Configuration loaded: server={}:{}",
        config.server.host,
        config.server.port
    );

    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    let enable_docs = config.server.enable_docs;
    let drain_timeout = config.dispatch.cancel_grace();

    let app_handle = create_app(config).await.map_err(|e| {
        Box::new(std::io::Error::other(format!(
            "Failed to create application: {}",
            e
        )))
    })?;

    let addr = SocketAddr::new(server_host.parse()?, server_port);

    tracing::info!("Server listening on {}", addr);
    if enable_docs {
        tracing::info!("API documentation available at http://{}/docs", addr);
    } else {
        tracing::info!("API documentation disabled");
    }

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app_handle.router)
        .with_graceful_shutdown(shutdown_signal(app_handle.shutdown_token, drain_timeout))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals and cancel background tasks
async fn shutdown_signal(shutdown_token: CancellationToken, timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }

    tracing::info!("Cancelling background tasks...");
    shutdown_token.cancel();

    // Give in-flight jobs a moment to observe the token before the process exits
    tokio::time::sleep(timeout).await;
    tracing::info!("Background tasks shutdown timeout reached");
}
