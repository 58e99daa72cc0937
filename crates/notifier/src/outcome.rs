//! The classified result of one delivery attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use herald_common::types::DeliveryStatus;

/// Exactly one of these is produced for every attempt that reaches the
/// provider or is short-circuited by safe mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Delivered,
    Retryable {
        retry_at: DateTime<Utc>,
    },
    Failed {
        code: Option<u16>,
        reason: String,
    },
}

impl Outcome {
    pub fn failed(code: u16, reason: impl Into<String>) -> Self {
        Self::Failed {
            code: Some(code),
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> DeliveryStatus {
        match self {
            Outcome::Delivered => DeliveryStatus::Delivered,
            Outcome::Retryable { .. } => DeliveryStatus::Retryable,
            Outcome::Failed { .. } => DeliveryStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_is_tagged_by_status() {
        let v = serde_json::to_value(Outcome::failed(404, "Not found!")).unwrap();
        assert_eq!(v["status"], "failed");
        assert_eq!(v["code"], 404);
        assert_eq!(v["reason"], "Not found!");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Outcome::Delivered.status(), DeliveryStatus::Delivered);
        assert_eq!(
            Outcome::Retryable { retry_at: Utc::now() }.status(),
            DeliveryStatus::Retryable
        );
    }
}
