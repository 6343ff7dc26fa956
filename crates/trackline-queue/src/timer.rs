//! Single-shot debounce timer for delivery scheduling.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// At most one armed countdown at a time.
///
/// Arming is an atomic claim, so concurrent callers race cleanly: one
/// arms the timer, the rest are told it was already armed. Once the
/// countdown fires, its callback runs on its own task and the timer can
/// be armed again.
#[derive(Default)]
pub struct DebounceTimer {
    armed: Arc<AtomicBool>,
    countdown: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn countdown_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.countdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Arm the timer unless it is already armed. Returns whether this
    /// call armed it.
    pub fn schedule_if_not_already<F>(&self, delay: Duration, callback: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.armed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let armed = Arc::clone(&self.armed);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            armed.store(false, Ordering::SeqCst);
            // The callback gets its own task so a late cancel() cannot
            // interrupt it mid-flight.
            tokio::spawn(callback);
        });
        *self.countdown_handle() = Some(handle);

        debug!(delay_secs = delay.as_secs_f64(), "Armed delivery timer");
        true
    }

    /// Arm the timer, replacing any countdown already ticking.
    pub fn schedule_and_cancel_previous<F>(&self, delay: Duration, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.schedule_if_not_already(delay, callback);
    }

    /// Stop the countdown if one is armed. A callback that already
    /// started is not affected.
    pub fn cancel(&self) {
        if let Some(handle) = self.countdown_handle().take() {
            handle.abort();
        }
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}
