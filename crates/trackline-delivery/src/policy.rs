//! Retry backoff schedule for 5xx responses.

use std::time::Duration;

/// Default backoff schedule in milliseconds.
pub const DEFAULT_BACKOFF_MS: [u64; 6] = [100, 200, 400, 800, 1600, 3200];

/// A finite schedule of sleeps taken between retries of a single request.
///
/// Each call to [`next_sleep_time`](Self::next_sleep_time) consumes one
/// entry; when the schedule is spent the request is out of retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    sleeps: Vec<Duration>,
    cursor: usize,
}

impl RetryPolicy {
    pub fn new(sleeps: Vec<Duration>) -> Self {
        Self { sleeps, cursor: 0 }
    }

    pub fn default_backoff() -> Self {
        Self::new(
            DEFAULT_BACKOFF_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }

    /// The next sleep to take before retrying, or `None` once the
    /// schedule is exhausted.
    pub fn next_sleep_time(&mut self) -> Option<Duration> {
        let sleep = self.sleeps.get(self.cursor).copied();
        if sleep.is_some() {
            self.cursor += 1;
        }
        sleep
    }

    /// Restore the full schedule.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Number of retries remaining.
    pub fn remaining(&self) -> usize {
        self.sleeps.len().saturating_sub(self.cursor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::default_backoff()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumes_sleeps_in_order_then_exhausts() {
        let mut policy = RetryPolicy::default_backoff();

        let taken: Vec<u64> = std::iter::from_fn(|| policy.next_sleep_time())
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(taken, DEFAULT_BACKOFF_MS);
        assert_eq!(policy.next_sleep_time(), None);
        assert_eq!(policy.remaining(), 0);
    }

    #[test]
    fn reset_restores_the_schedule() {
        let mut policy = RetryPolicy::new(vec![Duration::from_millis(5)]);
        assert!(policy.next_sleep_time().is_some());
        assert_eq!(policy.next_sleep_time(), None);

        policy.reset();
        assert_eq!(policy.remaining(), 1);
        assert_eq!(policy.next_sleep_time(), Some(Duration::from_millis(5)));
    }

    #[test]
    fn empty_schedule_never_retries() {
        let mut policy = RetryPolicy::new(Vec::new());
        assert_eq!(policy.next_sleep_time(), None);
    }
}
