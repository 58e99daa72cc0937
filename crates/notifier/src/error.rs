use thiserror::Error;

/// Failure modes of the HTTP exchange itself, before any response exists.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Invalid notification URI: {0}")]
    InvalidUri(String),

    #[error("Request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidUri(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Error surfaced to the caller of `Delivery::perform`.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The provider answered with a status classified as a failure.
    /// Already reported to the batch.
    #[error("Delivery rejected ({}): {reason}", display_code(.code))]
    Rejected { code: Option<u16>, reason: String },

    /// No response was obtained. Nothing was reported to the batch.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Failures of the app runner itself, as opposed to a single delivery.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Could not create transport for app {app_id}: {source}")]
    Transport {
        app_id: uuid::Uuid,
        #[source]
        source: TransportError,
    },

    #[error("Worker for app {0} has stopped")]
    WorkerStopped(uuid::Uuid),
}

fn display_code(code: &Option<u16>) -> String {
    code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
}

impl DeliveryError {
    pub fn code(&self) -> Option<u16> {
        match self {
            DeliveryError::Rejected { code, .. } => *code,
            DeliveryError::Transport(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display_and_code() {
        let err = DeliveryError::Rejected {
            code: Some(412),
            reason: "Precondition Failed. Device is Disconnected for now.".into(),
        };
        assert_eq!(err.code(), Some(412));
        assert_eq!(
            err.to_string(),
            "Delivery rejected (412): Precondition Failed. Device is Disconnected for now."
        );
    }

    #[test]
    fn test_transport_error_has_no_code() {
        let err: DeliveryError = TransportError::Timeout.into();
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), "Transport error: Request timed out");
    }
}
