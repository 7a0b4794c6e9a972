use chrono::Utc;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use fairway_core::{
    schedule::next_daily_run, BatchCredentials, CoreConfig, RunOrchestrator, RunOutcome,
};

/// Main entry point for the Fairway application
///
/// Runs the REST server and the daily scheduler concurrently:
/// - REST server on port 3000 (configurable via FAIRWAY_REST_ADDR)
/// - Scheduler firing daily at FAIRWAY_RUN_HOUR_UTC; the weekday gate decides whether a run
///   actually happens
///
/// Missing batch credentials disable the scheduler and the batch endpoint, but the proxy
/// endpoint keeps serving.
///
/// # Environment Variables
/// - `FAIRWAY_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `FAIRWAY_SCHEDULER`: set to `false` to disable the in-process scheduler
/// - `ANTHROPIC_API_KEY`, `RESEND_API_KEY`, `EMAIL_RECIPIENTS`: batch credentials
/// - `FAIRWAY_RUN_BUDGET_SECS`: upper bound on one batch run (default: 900)
///
/// # Returns
/// * `Ok(())` - If the server shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration is invalid or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fairway_run=info".parse()?)
                .add_directive("fairway_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("FAIRWAY_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = CoreConfig::from_lookup(|name| std::env::var(name).ok())?;
    let credentials = BatchCredentials::from_lookup(|name| std::env::var(name).ok());
    let scheduler_enabled = cfg.scheduler_enabled();
    let run_hour = cfg.run_hour_utc();
    let state = AppState::from_config(cfg, credentials);

    let scheduled = match (&state.batch, scheduler_enabled) {
        (Ok(orchestrator), true) => Some(orchestrator.clone()),
        (Err(e), true) => {
            tracing::warn!("scheduler disabled: {e}");
            None
        }
        (_, false) => None,
    };

    tracing::info!("++ Starting Fairway REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    let rest_server = axum::serve(listener, router(state)).into_future();

    match scheduled {
        Some(orchestrator) => {
            let (rest_result, ()) =
                tokio::join!(rest_server, run_scheduler(orchestrator, run_hour));
            rest_result?;
        }
        None => rest_server.await?,
    }

    Ok(())
}

/// Fires the pipeline once a day at `hour`:00 UTC, forever.
///
/// Each run is bounded by the orchestrator's run budget. Failures, including an expired
/// budget, are logged and do not stop the loop.
async fn run_scheduler(orchestrator: Arc<RunOrchestrator>, hour: u32) {
    loop {
        let now = Utc::now();
        let next = next_daily_run(now, hour);
        tracing::info!(next = %next.to_rfc3339(), "next scheduled run");
        tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

        match orchestrator.run(Utc::now(), false).await {
            Ok(RunOutcome::Skipped(skip)) => tracing::info!("{}", skip.message),
            Ok(RunOutcome::Delivered(summary)) => tracing::info!(
                date = %summary.date,
                sections = summary.sections,
                "scheduled run delivered"
            ),
            Err(e) => tracing::error!("scheduled run failed: {e:?}"),
        }
    }
}
