//! Feeds newline-delimited JSON notifications into an `AppRunner`.
//!
//! Unparseable lines are skipped. A read error or the shutdown signal ends
//! intake; the caller then stops the runner, so attempts already on the wire
//! still finish and report.

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use herald_common::error::AppError;
use herald_common::types::Notification;

use crate::reporter::BatchReporter;
use crate::runner::AppRunner;
use crate::worker::DeliveryJob;

/// Why intake stopped.
#[derive(Debug)]
pub enum IngestEnd {
    /// The reader hit end of input.
    Exhausted,
    /// The shutdown signal fired.
    Interrupted,
    /// The reader failed, e.g. on a line that is not UTF-8.
    ReadFailed(std::io::Error),
}

impl IngestEnd {
    /// Only a clean end of input lets the workers drain their queues.
    pub fn drains_queues(&self) -> bool {
        matches!(self, IngestEnd::Exhausted)
    }
}

#[derive(Debug)]
pub struct IngestSummary {
    pub dispatched: usize,
    pub end: IngestEnd,
}

pub async fn ingest<R, F>(
    reader: R,
    runner: &mut AppRunner,
    batch: Arc<dyn BatchReporter>,
    shutdown: F,
) -> IngestSummary
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let mut lines = reader.lines();
    let mut dispatched = 0usize;
    tokio::pin!(shutdown);

    let end = loop {
        let line = tokio::select! {
            biased;
            () = &mut shutdown => {
                tracing::info!("Received shutdown signal, stopping gracefully...");
                break IngestEnd::Interrupted;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break IngestEnd::Exhausted,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read notifications, stopping gracefully...");
                break IngestEnd::ReadFailed(e);
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let notification: Notification = match serde_json::from_str(&line).map_err(AppError::from)
        {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable notification");
                continue;
            }
        };

        if let Err(e) = runner
            .dispatch(DeliveryJob::new(notification, Arc::clone(&batch)))
            .await
        {
            tracing::error!(error = %e, "Could not dispatch notification");
            continue;
        }
        dispatched += 1;
    };

    IngestSummary { dispatched, end }
}
