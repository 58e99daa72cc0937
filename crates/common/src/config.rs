use std::fmt::Display;
use std::str::FromStr;

use chrono::TimeDelta;
use serde::Deserialize;

use crate::error::AppError;

/// Longest safe-mode cooldown or queue-full delay accepted (one week).
pub const MAX_DELAY_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest per-request timeout accepted (ten minutes).
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 10 * 60 * 1000;

pub const MAX_WORKER_QUEUE_CAPACITY: usize = 100_000;

/// Delivery worker configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// How long a worker stays in safe mode after the provider answers 406 (default: 300)
    pub safe_mode_cooldown_secs: u64,

    /// Delay before a queue-full notification may be retried (default: 600 = 10 min)
    pub queue_full_retry_secs: u64,

    /// Per-request HTTP timeout in milliseconds (default: 30000)
    pub request_timeout_ms: u64,

    /// Bounded job queue size for each app worker (default: 100)
    pub worker_queue_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            safe_mode_cooldown_secs: 300,
            queue_full_retry_secs: 600,
            request_timeout_ms: 30_000,
            worker_queue_capacity: 100,
        }
    }
}

impl NotifierConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Zero and out-of-range values are rejected rather than clamped.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            safe_mode_cooldown_secs: parse_bounded(
                &lookup,
                "SAFE_MODE_COOLDOWN_SECS",
                defaults.safe_mode_cooldown_secs,
                MAX_DELAY_SECS,
            )?,
            queue_full_retry_secs: parse_bounded(
                &lookup,
                "QUEUE_FULL_RETRY_SECS",
                defaults.queue_full_retry_secs,
                MAX_DELAY_SECS,
            )?,
            request_timeout_ms: parse_bounded(
                &lookup,
                "REQUEST_TIMEOUT_MS",
                defaults.request_timeout_ms,
                MAX_REQUEST_TIMEOUT_MS,
            )?,
            worker_queue_capacity: parse_bounded(
                &lookup,
                "WORKER_QUEUE_CAPACITY",
                defaults.worker_queue_capacity,
                MAX_WORKER_QUEUE_CAPACITY,
            )?,
        })
    }

    pub fn safe_mode_cooldown(&self) -> TimeDelta {
        bounded_delay(self.safe_mode_cooldown_secs)
    }

    pub fn queue_full_delay(&self) -> TimeDelta {
        bounded_delay(self.queue_full_retry_secs)
    }
}

/// Seconds as a `TimeDelta`, capped at `MAX_DELAY_SECS` for hand-built configs.
fn bounded_delay(secs: u64) -> TimeDelta {
    i64::try_from(secs.min(MAX_DELAY_SECS))
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::Config(format!(
                "{key} must be a valid {}",
                std::any::type_name::<T>()
            ))
            .into()
        }),
    }
}

fn parse_bounded<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    max: T,
) -> anyhow::Result<T>
where
    T: FromStr + PartialOrd + Default + Display + Copy,
{
    let value = parse_or(lookup, key, default)?;
    if value <= T::default() || value > max {
        return Err(
            AppError::Config(format!("{key} must be between 1 and {max}, got {value}")).into(),
        );
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn rejects(key: &str, value: &str) {
        let err = NotifierConfig::from_lookup(lookup_from(&[(key, value)]))
            .expect_err(&format!("{key}={value} should be rejected"));
        assert!(err.to_string().contains(key), "unexpected error: {err}");
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = NotifierConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.safe_mode_cooldown_secs, 300);
        assert_eq!(config.queue_full_retry_secs, 600);
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.worker_queue_capacity, 100);
        assert_eq!(config.safe_mode_cooldown(), TimeDelta::seconds(300));
        assert_eq!(config.queue_full_delay(), TimeDelta::minutes(10));
    }

    #[test]
    fn test_overrides() {
        let config = NotifierConfig::from_lookup(lookup_from(&[
            ("SAFE_MODE_COOLDOWN_SECS", "3600"),
            ("REQUEST_TIMEOUT_MS", " 5000 "),
        ]))
        .unwrap();
        assert_eq!(config.safe_mode_cooldown_secs, 3600);
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.queue_full_retry_secs, 600);
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        rejects("WORKER_QUEUE_CAPACITY", "lots");
        rejects("SAFE_MODE_COOLDOWN_SECS", "-5");
    }

    #[test]
    fn test_zero_values_are_rejected() {
        rejects("SAFE_MODE_COOLDOWN_SECS", "0");
        rejects("QUEUE_FULL_RETRY_SECS", "0");
        rejects("REQUEST_TIMEOUT_MS", "0");
        rejects("WORKER_QUEUE_CAPACITY", "0");
    }

    #[test]
    fn test_out_of_range_delays_are_rejected() {
        for key in ["SAFE_MODE_COOLDOWN_SECS", "QUEUE_FULL_RETRY_SECS"] {
            rejects(key, "604801");
            rejects(key, "9000000000000");
            rejects(key, "100000000000000000");
            rejects(key, "18446744073709551615");
        }
        rejects("REQUEST_TIMEOUT_MS", "600001");
        rejects("REQUEST_TIMEOUT_MS", "18446744073709551615");
        rejects("WORKER_QUEUE_CAPACITY", "100001");
    }

    #[test]
    fn test_upper_bounds_are_accepted() {
        let config = NotifierConfig::from_lookup(lookup_from(&[
            ("SAFE_MODE_COOLDOWN_SECS", "604800"),
            ("QUEUE_FULL_RETRY_SECS", "604800"),
            ("REQUEST_TIMEOUT_MS", "600000"),
            ("WORKER_QUEUE_CAPACITY", "100000"),
        ]))
        .unwrap();
        assert_eq!(config.safe_mode_cooldown(), TimeDelta::weeks(1));
        assert_eq!(config.queue_full_delay(), TimeDelta::weeks(1));
        assert_eq!(config.request_timeout_ms, MAX_REQUEST_TIMEOUT_MS);
        assert_eq!(config.worker_queue_capacity, MAX_WORKER_QUEUE_CAPACITY);
    }

    #[test]
    fn test_hand_built_delays_are_capped() {
        let config = NotifierConfig {
            safe_mode_cooldown_secs: u64::MAX,
            queue_full_retry_secs: 9_000_000_000_000,
            ..NotifierConfig::default()
        };
        assert_eq!(config.safe_mode_cooldown(), TimeDelta::weeks(1));
        assert_eq!(config.queue_full_delay(), TimeDelta::weeks(1));
    }
}
