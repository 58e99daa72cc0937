//! One delivery attempt.
//!
//! Steps:
//! 1. Check the worker's safe mode; a throttled attempt never reaches the network
//! 2. Render the toast and POST it to the device channel
//! 3. Classify the response (via `classifier::classify`)
//! 4. Engage safe mode on a 406
//! 5. Report the outcome to the batch, exactly once
//! 6. Surface only `Failed` outcomes as an error

use chrono::Duration;

use herald_common::clock::Clock;
use herald_common::config::NotifierConfig;
use herald_common::types::Notification;

use crate::classifier;
use crate::error::DeliveryError;
use crate::outcome::Outcome;
use crate::payload::OutboundRequest;
use crate::reporter::{self, BatchReporter};
use crate::safe_mode::SafeModeState;
use crate::transport::Transport;

/// Timing knobs for a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySettings {
    pub queue_full_delay: Duration,
    pub safe_mode_cooldown: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            queue_full_delay: Duration::minutes(10),
            safe_mode_cooldown: Duration::seconds(300),
        }
    }
}

impl From<&NotifierConfig> for DeliverySettings {
    fn from(config: &NotifierConfig) -> Self {
        Self {
            queue_full_delay: config.queue_full_delay(),
            safe_mode_cooldown: config.safe_mode_cooldown(),
        }
    }
}

/// Performs deliveries against one transport and reports into one batch.
pub struct Delivery<'a> {
    transport: &'a dyn Transport,
    clock: &'a dyn Clock,
    batch: &'a dyn BatchReporter,
    settings: DeliverySettings,
}

impl<'a> Delivery<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        clock: &'a dyn Clock,
        batch: &'a dyn BatchReporter,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            transport,
            clock,
            batch,
            settings,
        }
    }

    /// Deliver `notification`, honouring and updating the worker's safe mode.
    ///
    /// `Ok` covers both delivered and retryable outcomes. A transport error
    /// is returned without reporting anything to the batch.
    pub async fn perform(
        &self,
        notification: &Notification,
        safe_mode: &mut SafeModeState,
    ) -> Result<(), DeliveryError> {
        let outcome = match safe_mode.check(self.clock.now()) {
            Some(until) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    app_id = %notification.app_id,
                    safe_mode_until = %until,
                    "Safe mode active, skipping delivery"
                );
                Outcome::Retryable { retry_at: until }
            }
            None => self.perform_unsafe(notification, safe_mode).await?,
        };

        reporter::report(self.batch, notification, &outcome).await;

        match outcome {
            Outcome::Delivered | Outcome::Retryable { .. } => Ok(()),
            Outcome::Failed { code, reason } => Err(DeliveryError::Rejected { code, reason }),
        }
    }

    async fn perform_unsafe(
        &self,
        notification: &Notification,
        safe_mode: &mut SafeModeState,
    ) -> Result<Outcome, DeliveryError> {
        let request = OutboundRequest::toast(notification);

        let response = match self.transport.post(&notification.uri, &request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    notification_id = %notification.id,
                    uri = %notification.uri,
                    error = %e,
                    "Transport failure, no outcome recorded"
                );
                return Err(e.into());
            }
        };

        let provider = classifier::inspect(&response.headers, &response.body);
        tracing::debug!(
            notification_id = %notification.id,
            status = response.status,
            notification_status = ?provider.notification,
            subscription_status = ?provider.subscription,
            device_connection_status = ?provider.device_connection,
            failures = provider.failures,
            "Classifying provider response"
        );

        let verdict = classifier::classify(response.status, &response.headers, &response.body);
        let now = self.clock.now();

        if verdict.engages_safe_mode() {
            let until = safe_mode.engage(now, self.settings.safe_mode_cooldown);
            tracing::warn!(
                app_id = %notification.app_id,
                safe_mode_until = %until,
                "Provider rejected traffic, entering safe mode"
            );
        }

        Ok(verdict.into_outcome(now, self.settings.queue_full_delay))
    }
}
