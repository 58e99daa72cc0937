//! Per-app delivery worker.
//!
//! A worker owns one transport (one keep-alive connection pool) and one
//! `SafeModeState`, and runs its jobs strictly one after another. Shutdown
//! stops it from taking new jobs; an attempt already running always
//! finishes and reports first.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use herald_common::clock::Clock;
use herald_common::types::Notification;

use crate::delivery::{Delivery, DeliverySettings};
use crate::error::DeliveryError;
use crate::reporter::BatchReporter;
use crate::safe_mode::SafeModeState;
use crate::transport::Transport;

/// A notification plus the batch its outcome belongs to.
#[derive(Clone)]
pub struct DeliveryJob {
    pub notification: Notification,
    pub batch: Arc<dyn BatchReporter>,
}

impl DeliveryJob {
    pub fn new(notification: Notification, batch: Arc<dyn BatchReporter>) -> Self {
        Self {
            notification,
            batch,
        }
    }
}

/// What a worker did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub performed: usize,
    pub errors: usize,
    /// Jobs still queued when shutdown was requested.
    pub abandoned: usize,
}

pub struct AppWorker {
    app_id: Uuid,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    settings: DeliverySettings,
    safe_mode: SafeModeState,
}

impl AppWorker {
    pub fn new(
        app_id: Uuid,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            app_id,
            transport,
            clock,
            settings,
            safe_mode: SafeModeState::new(),
        }
    }

    pub fn safe_mode(&self) -> &SafeModeState {
        &self.safe_mode
    }

    /// Run a single job against this worker's connection and safe mode.
    pub async fn handle(&mut self, job: &DeliveryJob) -> Result<(), DeliveryError> {
        let delivery = Delivery::new(
            self.transport.as_ref(),
            self.clock.as_ref(),
            job.batch.as_ref(),
            self.settings,
        );
        delivery.perform(&job.notification, &mut self.safe_mode).await
    }

    /// Process jobs until the queue closes or shutdown is requested.
    pub async fn run(
        mut self,
        mut jobs: mpsc::Receiver<DeliveryJob>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> WorkerStats {
        let mut stats = WorkerStats::default();
        tracing::debug!(app_id = %self.app_id, "Worker started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let job = tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        // Sender dropped without signalling; treat as shutdown
                        break;
                    }
                    continue;
                }
                job = jobs.recv() => job,
            };

            let Some(job) = job else {
                break;
            };

            // Not raced against shutdown: the attempt runs to completion.
            stats.performed += 1;
            if let Err(e) = self.handle(&job).await {
                stats.errors += 1;
                tracing::warn!(
                    app_id = %self.app_id,
                    notification_id = %job.notification.id,
                    code = e.code(),
                    error = %e,
                    "Delivery failed"
                );
            }
        }

        jobs.close();
        while jobs.try_recv().is_ok() {
            stats.abandoned += 1;
        }
        if stats.abandoned > 0 {
            tracing::info!(
                app_id = %self.app_id,
                abandoned = stats.abandoned,
                "Worker stopped with queued jobs left pending"
            );
        }

        tracing::debug!(
            app_id = %self.app_id,
            performed = stats.performed,
            errors = stats.errors,
            "Worker stopped"
        );
        stats
    }
}
