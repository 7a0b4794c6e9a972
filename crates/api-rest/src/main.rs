//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, without the in-process daily scheduler.
//!
//! ## Intended use
//! Useful for development and for deployments where an external cron calls
//! `/api/scheduled-predictions`. The workspace's main `fairway-run` binary runs the server and
//! the scheduler concurrently.

use api_rest::{router, AppState};
use fairway_core::{BatchCredentials, CoreConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the Fairway REST API server.
///
/// # Environment Variables
/// - `FAIRWAY_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - see `fairway_core::config` for the pipeline settings
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - a pipeline setting is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("fairway_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("FAIRWAY_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting Fairway REST API on {}", addr);

    let cfg = CoreConfig::from_lookup(|name| std::env::var(name).ok())?;
    let credentials = BatchCredentials::from_lookup(|name| std::env::var(name).ok());
    let app = router(AppState::from_config(cfg, credentials));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
