//! Shared pause window for outbound requests.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;

/// A time window during which no outbound requests are made.
///
/// Cloning shares the window, so pausing through one handle is visible
/// to every other handle. The window expires on its own; nothing needs
/// to tick it.
#[derive(Clone, Default)]
pub struct PauseWindow {
    until: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl PauseWindow {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.until.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a pause is currently in effect. Expired windows are
    /// cleared as a side effect.
    pub fn is_active(&self) -> bool {
        let mut until = self.lock();
        match *until {
            Some(deadline) if deadline > Utc::now() => true,
            Some(_) => {
                *until = None;
                false
            }
            None => false,
        }
    }

    /// Pause outbound requests for the given duration from now.
    pub fn pause_for(&self, duration: Duration) {
        // Durations beyond chrono's range clamp to one day.
        let span = chrono::Duration::from_std(duration)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let deadline = Utc::now() + span;
        info!(until = %deadline, "Pausing outbound requests");
        *self.lock() = Some(deadline);
    }

    /// Lift the pause immediately.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// The moment the current pause ends, if one is in effect.
    pub fn paused_until(&self) -> Option<DateTime<Utc>> {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_inactive() {
        let pause = PauseWindow::new();
        assert!(!pause.is_active());
        assert!(pause.paused_until().is_none());
    }

    #[test]
    fn pause_for_activates_until_deadline() {
        let pause = PauseWindow::new();
        pause.pause_for(Duration::from_secs(300));

        assert!(pause.is_active());
        let until = pause.paused_until().unwrap();
        assert!(until > Utc::now());
    }

    #[test]
    fn expired_window_deactivates_and_clears() {
        let pause = PauseWindow::new();
        pause.pause_for(Duration::from_millis(0));

        std::thread::sleep(Duration::from_millis(5));
        assert!(!pause.is_active());
        assert!(pause.paused_until().is_none());
    }

    #[test]
    fn clear_lifts_the_pause() {
        let pause = PauseWindow::new();
        pause.pause_for(Duration::from_secs(300));
        pause.clear();
        assert!(!pause.is_active());
    }

    #[test]
    fn clones_share_the_window() {
        let pause = PauseWindow::new();
        let clone = pause.clone();

        pause.pause_for(Duration::from_secs(300));
        assert!(clone.is_active());

        clone.clear();
        assert!(!pause.is_active());
    }
}
