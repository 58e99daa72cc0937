//! App runner — one worker per app, created on first use.
//!
//! Routing every notification of an app to the same worker is what keeps
//! an app's deliveries sequential on one connection and its safe mode
//! private to it. Different apps run in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use herald_common::clock::{Clock, SystemClock};
use herald_common::config::NotifierConfig;

use crate::delivery::DeliverySettings;
use crate::error::{RunnerError, TransportError};
use crate::transport::{ReqwestTransport, Transport};
use crate::worker::{AppWorker, DeliveryJob, WorkerStats};

/// Builds the transport a new worker will own.
pub type TransportFactory =
    Arc<dyn Fn(Uuid) -> Result<Arc<dyn Transport>, TransportError> + Send + Sync>;

struct WorkerHandle {
    jobs: mpsc::Sender<DeliveryJob>,
    join: JoinHandle<WorkerStats>,
}

pub struct AppRunner {
    clock: Arc<dyn Clock>,
    settings: DeliverySettings,
    queue_capacity: usize,
    transport_factory: TransportFactory,
    shutdown_tx: watch::Sender<bool>,
    workers: HashMap<Uuid, WorkerHandle>,
}

impl AppRunner {
    pub fn new(
        config: &NotifierConfig,
        clock: Arc<dyn Clock>,
        transport_factory: TransportFactory,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            clock,
            settings: DeliverySettings::from(config),
            queue_capacity: config.worker_queue_capacity.max(1),
            transport_factory,
            shutdown_tx,
            workers: HashMap::new(),
        }
    }

    /// Runner whose workers talk HTTP through `reqwest` on the system clock.
    pub fn with_reqwest(config: &NotifierConfig) -> Self {
        let timeout = StdDuration::from_millis(config.request_timeout_ms);
        let factory: TransportFactory = Arc::new(
            move |_app_id: Uuid| -> Result<Arc<dyn Transport>, TransportError> {
                let transport = ReqwestTransport::new(timeout)?;
                Ok(Arc::new(transport))
            },
        );
        Self::new(config, Arc::new(SystemClock), factory)
    }

    /// Queue a job on its app's worker, starting the worker if needed.
    pub async fn dispatch(&mut self, job: DeliveryJob) -> Result<(), RunnerError> {
        let app_id = job.notification.app_id;

        if !self.workers.contains_key(&app_id) {
            let handle = self.spawn_worker(app_id)?;
            self.workers.insert(app_id, handle);
        }

        let Some(handle) = self.workers.get(&app_id) else {
            return Err(RunnerError::WorkerStopped(app_id));
        };

        handle
            .jobs
            .send(job)
            .await
            .map_err(|_| RunnerError::WorkerStopped(app_id))
    }

    pub fn app_ids(&self) -> Vec<Uuid> {
        self.workers.keys().copied().collect()
    }

    /// Let every worker drain its queue, then wait for all of them.
    pub async fn finish(self) -> WorkerStats {
        let handles: Vec<_> = self
            .workers
            .into_values()
            .map(|WorkerHandle { jobs, join }| {
                drop(jobs);
                join
            })
            .collect();
        join_all(handles).await
    }

    /// Stop taking new jobs; in-flight attempts finish and report first.
    pub async fn shutdown_and_join(self) -> WorkerStats {
        // ignore send error: workers may already be gone
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = self.workers.into_values().map(|h| h.join).collect();
        join_all(handles).await
    }

    fn spawn_worker(&self, app_id: Uuid) -> Result<WorkerHandle, RunnerError> {
        let transport = (self.transport_factory)(app_id)
            .map_err(|source| RunnerError::Transport { app_id, source })?;

        let worker = AppWorker::new(app_id, transport, Arc::clone(&self.clock), self.settings);
        let (jobs, rx) = mpsc::channel(self.queue_capacity);
        let join = tokio::spawn(worker.run(rx, self.shutdown_tx.subscribe()));

        tracing::info!(app_id = %app_id, "Started delivery worker for app");
        Ok(WorkerHandle { jobs, join })
    }
}

async fn join_all(handles: Vec<JoinHandle<WorkerStats>>) -> WorkerStats {
    let mut total = WorkerStats::default();
    for handle in handles {
        match handle.await {
            Ok(stats) => {
                total.performed += stats.performed;
                total.errors += stats.errors;
                total.abandoned += stats.abandoned;
            }
            Err(e) => tracing::error!(error = %e, "Delivery worker panicked"),
        }
    }
    total
}
