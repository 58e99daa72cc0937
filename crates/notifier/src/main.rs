//! Herald notifier binary.
//!
//! Reads newline-delimited JSON notifications from stdin, delivers them
//! through one worker per app and logs the batch totals.

use std::sync::Arc;

use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use herald_common::config::NotifierConfig;
use herald_notifier::InMemoryBatch;
use herald_notifier::ingest::{IngestEnd, ingest};
use herald_notifier::runner::AppRunner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("herald_notifier=info")),
        )
        .json()
        .init();

    tracing::info!("Herald notifier starting...");

    // Load configuration
    let config = NotifierConfig::from_env()?;
    tracing::info!(
        safe_mode_cooldown_secs = config.safe_mode_cooldown_secs,
        queue_full_retry_secs = config.queue_full_retry_secs,
        request_timeout_ms = config.request_timeout_ms,
        "Configuration loaded"
    );

    let mut runner = AppRunner::with_reqwest(&config);
    let batch = Arc::new(InMemoryBatch::new());

    let summary = ingest(
        BufReader::new(tokio::io::stdin()),
        &mut runner,
        batch.clone(),
        shutdown_signal(),
    )
    .await;

    let stats = if summary.end.drains_queues() {
        runner.finish().await
    } else {
        runner.shutdown_and_join().await
    };

    let counts = batch.counts();
    tracing::info!(
        dispatched = summary.dispatched,
        performed = stats.performed,
        abandoned = stats.abandoned,
        delivered = counts.delivered,
        failed = counts.failed,
        retryable = counts.retryable,
        "Herald notifier stopped."
    );

    match summary.end {
        IngestEnd::ReadFailed(e) => {
            Err(anyhow::Error::new(e).context("reading notifications from stdin"))
        }
        IngestEnd::Exhausted | IngestEnd::Interrupted => Ok(()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
