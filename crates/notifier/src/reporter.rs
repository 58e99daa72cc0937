//! Batch reporting — where delivery outcomes are recorded.
//!
//! A batch receives exactly one report per notification. Persisting the
//! result is the store's business; this module only defines the interface
//! and two in-process implementations.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use herald_common::types::{DeliveryStatus, Notification};

use crate::outcome::Outcome;

/// Receives the outcome of each delivery attempt in a batch.
#[async_trait]
pub trait BatchReporter: Send + Sync {
    async fn mark_delivered(&self, notification: &Notification);

    async fn mark_failed(&self, notification: &Notification, code: Option<u16>, reason: &str);

    async fn mark_retryable(&self, notification: &Notification, retry_at: DateTime<Utc>);
}

/// Route an outcome to the matching reporter call.
pub async fn report(batch: &dyn BatchReporter, notification: &Notification, outcome: &Outcome) {
    match outcome {
        Outcome::Delivered => batch.mark_delivered(notification).await,
        Outcome::Retryable { retry_at } => batch.mark_retryable(notification, *retry_at).await,
        Outcome::Failed { code, reason } => batch.mark_failed(notification, *code, reason).await,
    }
}

/// Per-status tallies for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub delivered: usize,
    pub failed: usize,
    pub retryable: usize,
}

impl BatchCounts {
    pub fn total(&self) -> usize {
        self.delivered + self.failed + self.retryable
    }
}

#[derive(Debug, Default)]
struct BatchState {
    outcomes: HashMap<Uuid, Outcome>,
    counts: BatchCounts,
}

/// In-memory batch tracker.
///
/// The first outcome recorded for a notification is final; any later report
/// for the same id is logged and dropped.
#[derive(Debug, Default)]
pub struct InMemoryBatch {
    state: Mutex<BatchState>,
}

impl InMemoryBatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, notification: &Notification, outcome: Outcome) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = state.outcomes.get(&notification.id) {
            tracing::warn!(
                notification_id = %notification.id,
                existing = %existing.status(),
                ignored = %outcome.status(),
                "Duplicate outcome reported for notification, ignoring"
            );
            return;
        }

        match outcome.status() {
            DeliveryStatus::Delivered => state.counts.delivered += 1,
            DeliveryStatus::Failed => state.counts.failed += 1,
            DeliveryStatus::Retryable => state.counts.retryable += 1,
            DeliveryStatus::Pending => {}
        }
        state.outcomes.insert(notification.id, outcome);
    }

    pub fn outcome_for(&self, notification_id: Uuid) -> Option<Outcome> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .outcomes
            .get(&notification_id)
            .cloned()
    }

    pub fn status_of(&self, notification_id: Uuid) -> DeliveryStatus {
        self.outcome_for(notification_id)
            .map(|o| o.status())
            .unwrap_or(DeliveryStatus::Pending)
    }

    pub fn counts(&self) -> BatchCounts {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).counts
    }

    /// True once `expected` notifications have an outcome.
    pub fn is_complete(&self, expected: usize) -> bool {
        self.counts().total() >= expected
    }
}

#[async_trait]
impl BatchReporter for InMemoryBatch {
    async fn mark_delivered(&self, notification: &Notification) {
        self.record(notification, Outcome::Delivered);
    }

    async fn mark_failed(&self, notification: &Notification, code: Option<u16>, reason: &str) {
        self.record(
            notification,
            Outcome::Failed {
                code,
                reason: reason.to_string(),
            },
        );
    }

    async fn mark_retryable(&self, notification: &Notification, retry_at: DateTime<Utc>) {
        self.record(notification, Outcome::Retryable { retry_at });
    }
}

/// Reporter that only emits a structured log line per outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter;

#[async_trait]
impl BatchReporter for LoggingReporter {
    async fn mark_delivered(&self, notification: &Notification) {
        tracing::info!(
            notification_id = %notification.id,
            app_id = %notification.app_id,
            "Notification delivered"
        );
    }

    async fn mark_failed(&self, notification: &Notification, code: Option<u16>, reason: &str) {
        tracing::info!(
            notification_id = %notification.id,
            app_id = %notification.app_id,
            code,
            reason,
            "Notification failed"
        );
    }

    async fn mark_retryable(&self, notification: &Notification, retry_at: DateTime<Utc>) {
        tracing::info!(
            notification_id = %notification.id,
            app_id = %notification.app_id,
            retry_at = %retry_at,
            "Notification will be retried"
        );
    }
}
