//! Safe mode — per-worker throttle engaged when the provider rejects traffic.
//!
//! After a 406 the worker stops talking to the provider for a cooldown
//! period. Requests arriving inside the window are never sent, which keeps
//! us from burning the app's remaining quota.
//!
//! State is held in-memory by each worker. This is acceptable because:
//! - One app's throttle must never leak into another app's stream
//! - If the process restarts, safe mode resets and the provider re-signals if needed

use chrono::{DateTime, Duration, Utc};

/// Throttle state owned by one worker. `None` means normal operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafeModeState {
    until: Option<DateTime<Utc>>,
}

impl SafeModeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter safe mode for `cooldown` starting at `now`.
    ///
    /// A later deadline always wins, so a repeated 406 can only extend the window.
    /// A deadline past the representable range saturates at `DateTime::MAX_UTC`.
    pub fn engage(&mut self, now: DateTime<Utc>, cooldown: Duration) -> DateTime<Utc> {
        let until = now
            .checked_add_signed(cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let until = match self.until {
            Some(current) if current > until => current,
            _ => until,
        };
        self.until = Some(until);
        until
    }

    /// Returns the deadline if the worker is throttled at `now`.
    ///
    /// An expired window is cleared here, so the first check at or after the
    /// deadline returns the worker to normal operation.
    pub fn check(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.until {
            Some(until) if now < until => Some(until),
            Some(until) => {
                tracing::info!(safe_mode_until = %until, "Safe mode expired, resuming deliveries");
                self.until = None;
                None
            }
            None => None,
        }
    }

    pub fn until(&self) -> Option<DateTime<Utc>> {
        self.until
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.until.is_some_and(|until| now < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_starts_normal() {
        let mut state = SafeModeState::new();
        assert_eq!(state.until(), None);
        assert_eq!(state.check(t0()), None);
        assert!(!state.is_active(t0()));
    }

    #[test]
    fn test_engage_throttles_until_deadline() {
        let mut state = SafeModeState::new();
        let until = state.engage(t0(), Duration::seconds(300));
        assert_eq!(until, t0() + Duration::seconds(300));

        assert_eq!(state.check(t0()), Some(until));
        assert_eq!(state.check(t0() + Duration::seconds(299)), Some(until));
        assert!(state.is_active(t0() + Duration::seconds(1)));
    }

    #[test]
    fn test_expires_at_deadline_and_clears() {
        let mut state = SafeModeState::new();
        let until = state.engage(t0(), Duration::seconds(300));

        assert_eq!(state.check(until), None);
        assert_eq!(state.until(), None);
        // Going back in time does not resurrect it
        assert_eq!(state.check(t0()), None);
    }

    #[test]
    fn test_past_deadline_is_cleared_on_next_check() {
        let mut state = SafeModeState::new();
        state.engage(t0() - Duration::seconds(310), Duration::seconds(300));
        assert!(state.until().is_some());
        assert_eq!(state.check(t0()), None);
        assert!(state.until().is_none());
    }

    #[test]
    fn test_engage_never_shortens_window() {
        let mut state = SafeModeState::new();
        let long = state.engage(t0(), Duration::seconds(3600));
        let again = state.engage(t0() + Duration::seconds(10), Duration::seconds(60));
        assert_eq!(again, long);

        let later = state.engage(t0() + Duration::seconds(3590), Duration::seconds(60));
        assert_eq!(later, t0() + Duration::seconds(3650));
    }

    #[test]
    fn test_oversized_cooldown_saturates() {
        let mut state = SafeModeState::new();
        let until = state.engage(t0(), Duration::MAX);
        assert_eq!(until, DateTime::<Utc>::MAX_UTC);
        assert_eq!(state.check(t0() + Duration::days(365)), Some(until));
    }
}
