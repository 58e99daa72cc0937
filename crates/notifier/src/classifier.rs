//! Response classifier — maps a provider response onto a delivery verdict.
//!
//! The status code decides almost everything. Only a 200 is looked at more
//! closely: the `X-NotificationStatus` header tells a queued notification
//! apart from one the provider's queue refused.
//!
//! Classification is pure. It never touches the clock; the caller turns a
//! `Verdict` into an `Outcome` once it knows what time it is.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::outcome::Outcome;

pub const NOTIFICATION_STATUS_HEADER: &str = "x-notificationstatus";
pub const SUBSCRIPTION_STATUS_HEADER: &str = "x-subscriptionstatus";
pub const DEVICE_CONNECTION_STATUS_HEADER: &str = "x-deviceconnectionstatus";

/// Status code that puts the worker into safe mode.
pub const NOT_ACCEPTABLE: u16 = 406;

/// What the provider told us about one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Delivered,
    /// Accepted over HTTP, but the device queue was full. Try again later.
    QueueFull,
    Failed { code: u16, reason: &'static str },
}

impl Verdict {
    /// True when the provider is rejecting our traffic and we must back off.
    pub fn engages_safe_mode(&self) -> bool {
        matches!(self, Verdict::Failed { code, .. } if *code == NOT_ACCEPTABLE)
    }

    pub fn into_outcome(self, now: DateTime<Utc>, queue_full_delay: Duration) -> Outcome {
        match self {
            Verdict::Delivered => Outcome::Delivered,
            Verdict::QueueFull => Outcome::Retryable {
                retry_at: now
                    .checked_add_signed(queue_full_delay)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            },
            Verdict::Failed { code, reason } => Outcome::failed(code, reason),
        }
    }
}

/// Header and body fields the provider attaches to a response, kept for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderStatus {
    pub notification: Option<String>,
    pub subscription: Option<String>,
    pub device_connection: Option<String>,
    pub failures: u64,
}

/// Counters the provider may put in the body. Unknown or misspelled keys are
/// ignored and a missing counter reads as zero.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponseBody {
    failure: u64,
}

/// Classify a provider response.
pub fn classify(status: u16, headers: &HashMap<String, Vec<String>>, body: &[u8]) -> Verdict {
    match status {
        200 => {
            let provider = inspect(headers, body);
            match provider.notification.as_deref() {
                Some("QueueFull") => Verdict::QueueFull,
                // "Received", "Supressed"/"Suppressed", absent or anything else
                _ => Verdict::Delivered,
            }
        }
        400 => Verdict::Failed {
            code: 400,
            reason: "Bad XML or malformed notification URI",
        },
        401 => Verdict::Failed {
            code: 401,
            reason: "Unauthorized to send a notification to this app",
        },
        404 => Verdict::Failed {
            code: 404,
            reason: "Not found!",
        },
        406 => Verdict::Failed {
            code: 406,
            reason: "Per-day throttling limit reached.",
        },
        412 => Verdict::Failed {
            code: 412,
            reason: "Precondition Failed. Device is Disconnected for now.",
        },
        503 => Verdict::Failed {
            code: 503,
            reason: "Service unavailable.",
        },
        other => Verdict::Failed {
            code: other,
            reason: "Unknown error",
        },
    }
}

/// Read the provider's status headers and body counters.
pub fn inspect(headers: &HashMap<String, Vec<String>>, body: &[u8]) -> ProviderStatus {
    let parsed: ResponseBody = if body.is_empty() {
        ResponseBody::default()
    } else {
        serde_json::from_slice(body).unwrap_or_default()
    };

    ProviderStatus {
        notification: first_header(headers, NOTIFICATION_STATUS_HEADER).map(str::to_string),
        subscription: first_header(headers, SUBSCRIPTION_STATUS_HEADER).map(str::to_string),
        device_connection: first_header(headers, DEVICE_CONNECTION_STATUS_HEADER)
            .map(str::to_string),
        failures: parsed.failure,
    }
}

/// First value of a header, matched case-insensitively.
pub fn first_header<'a>(headers: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(|v| v.trim())
}
