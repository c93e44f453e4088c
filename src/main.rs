//! Recipe API server
//!
//! Serves the REST API (Axum) over the Sled store.
//! - Config: `.env` + `RECIPE_*` environment variables
//! - Docs: Swagger UI at `/api/docs/`, OpenAPI JSON at `/api/schema/`
//!
//! Usage:
//!   cargo run --bin load_data     # optional demo data
//!   cargo run --bin recipe_api    # start server

use tokio::net::TcpListener;
use tracing::{info, warn};

use recipe_api::config::Config;
use recipe_api::rest::create_router;
use recipe_api::storage::Storage;
use recipe_api::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let _log_guard = telemetry::init(&config.log)?;

    if config.ephemeral_secret {
        warn!("RECIPE_JWT_SECRET is not set; tokens will not survive a restart");
    }

    let storage = Storage::open(&config.db_path)?;
    info!(db = %config.db_path.display(), media = %config.media_root.display(), "storage opened");

    let addr = config.bind_addr;
    let app = create_router(storage.clone(), config);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let flushed = storage.flush().await?;
    info!(bytes = flushed, "storage flushed, bye");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("received ctrl-c, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("received SIGTERM, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
