//! Refresh policy — when a schedule must be recomputed.

use chrono::TimeDelta;
use schedule_state_domain::time::Timestamp;

/// Periodic refresh plus an optional forced deadline.
///
/// The forced deadline only ever moves earlier while pending, so several
/// failures in one cycle never postpone the earliest retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    interval: TimeDelta,
    error_backoff: TimeDelta,
    last_refresh: Option<Timestamp>,
    forced_deadline: Option<Timestamp>,
}

impl RefreshPolicy {
    #[must_use]
    pub fn new(refresh_minutes: u32, error_backoff_minutes: u32) -> Self {
        Self {
            interval: TimeDelta::minutes(i64::from(refresh_minutes)),
            error_backoff: TimeDelta::minutes(i64::from(error_backoff_minutes)),
            last_refresh: None,
            forced_deadline: None,
        }
    }

    #[must_use]
    pub fn last_refresh(&self) -> Option<Timestamp> {
        self.last_refresh
    }

    #[must_use]
    pub fn forced_deadline(&self) -> Option<Timestamp> {
        self.forced_deadline
    }

    /// Whether a recompute is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        let periodic = self
            .last_refresh
            .is_none_or(|last| now - last >= self.interval);
        let forced = self.forced_deadline.is_some_and(|deadline| now >= deadline);
        periodic || forced
    }

    /// Record a completed recompute, clearing any deadline it satisfied.
    pub fn mark_refreshed(&mut self, now: Timestamp) {
        self.last_refresh = Some(self.last_refresh.map_or(now, |last| last.max(now)));
        if self.forced_deadline.is_some_and(|deadline| deadline <= now) {
            self.forced_deadline = None;
        }
    }

    /// Ask for an early retry after a failure. Returns the effective deadline.
    pub fn schedule_retry(&mut self, now: Timestamp) -> Timestamp {
        self.tighten(now + self.error_backoff)
    }

    /// Force a recompute on the next check at or after `now`.
    pub fn request_immediate(&mut self, now: Timestamp) {
        self.tighten(now);
    }

    fn tighten(&mut self, deadline: Timestamp) -> Timestamp {
        let deadline = self
            .forced_deadline
            .map_or(deadline, |pending| pending.min(deadline));
        self.forced_deadline = Some(deadline);
        deadline
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32, m: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2021, 11, 20)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn should_be_due_before_first_refresh() {
        assert!(RefreshPolicy::new(360, 5).is_due(at(0, 0)));
    }

    #[test]
    fn should_be_due_after_refresh_interval() {
        let mut policy = RefreshPolicy::new(360, 5);
        policy.mark_refreshed(at(6, 0));
        assert!(!policy.is_due(at(11, 59)));
        assert!(policy.is_due(at(12, 0)));
    }

    #[test]
    fn should_retry_after_error_backoff() {
        let mut policy = RefreshPolicy::new(360, 5);
        policy.mark_refreshed(at(8, 0));
        assert_eq!(policy.schedule_retry(at(8, 0)), at(8, 5));

        assert!(!policy.is_due(at(8, 4)));
        assert!(policy.is_due(at(8, 5)));
    }

    #[test]
    fn should_keep_earliest_pending_deadline() {
        let mut policy = RefreshPolicy::new(360, 5);
        policy.mark_refreshed(at(8, 0));
        policy.schedule_retry(at(8, 0));
        assert_eq!(policy.schedule_retry(at(8, 3)), at(8, 5));
        assert_eq!(policy.forced_deadline(), Some(at(8, 5)));
    }

    #[test]
    fn should_clear_satisfied_deadline_on_refresh() {
        let mut policy = RefreshPolicy::new(360, 5);
        policy.mark_refreshed(at(8, 0));
        policy.request_immediate(at(9, 0));
        assert!(policy.is_due(at(9, 0)));

        policy.mark_refreshed(at(9, 0));
        assert_eq!(policy.forced_deadline(), None);
        assert!(!policy.is_due(at(9, 1)));
    }

    #[test]
    fn should_keep_future_deadline_on_refresh() {
        let mut policy = RefreshPolicy::new(360, 5);
        policy.schedule_retry(at(8, 0));
        policy.mark_refreshed(at(8, 1));
        assert_eq!(policy.forced_deadline(), Some(at(8, 5)));
    }

    #[test]
    fn should_never_move_last_refresh_backwards() {
        let mut policy = RefreshPolicy::new(360, 5);
        policy.mark_refreshed(at(10, 0));
        policy.mark_refreshed(at(9, 0));
        assert_eq!(policy.last_refresh(), Some(at(10, 0)));
    }
}
