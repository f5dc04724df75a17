//! Single-slot refresh timer.
//!
//! The scheduler owns at most one pending task. Arming always cancels the
//! previous task before spawning the new one, so a burst of credential
//! updates can never stack up overlapping refreshes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use clinic_session_domain::ExpiryWindow;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

struct ScheduledRefresh {
    handle: JoinHandle<()>,
    due_at: Instant,
    fired: Arc<AtomicBool>,
}

/// Cancellable deferred refresh task.
pub struct RefreshScheduler {
    lead_time: TimeDelta,
    pending: Mutex<Option<ScheduledRefresh>>,
}

impl RefreshScheduler {
    /// Create a scheduler that fires `lead_time` before access-token expiry.
    #[must_use]
    pub fn new(lead_time: Duration) -> Self {
        Self {
            lead_time: TimeDelta::from_std(lead_time).unwrap_or(TimeDelta::zero()),
            pending: Mutex::new(None),
        }
    }

    /// Schedule `on_due` for `max(0, access_expires_at - now - lead_time)`,
    /// replacing any pending task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&self, window: &ExpiryWindow, now: DateTime<Utc>, on_due: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.arm_after(window.refresh_delay(now, self.lead_time), on_due);
    }

    /// Schedule `on_due` after `delay`, replacing any pending task.
    pub fn arm_after<F>(&self, delay: Duration, on_due: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.handle.abort();
        }

        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let due_at = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(due_at).await;
            flag.store(true, Ordering::SeqCst);
            on_due.await;
        });

        debug!(delay = ?delay, "refresh armed");
        *pending = Some(ScheduledRefresh {
            handle,
            due_at,
            fired,
        });
    }

    /// Cancel the pending task, if any. Safe to call repeatedly.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.handle.abort();
            debug!("refresh cancelled");
        }
    }

    /// Returns true while a task is waiting for its due time.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.pending.lock().as_ref().is_some_and(|scheduled| {
            !scheduled.fired.load(Ordering::SeqCst) && !scheduled.handle.is_finished()
        })
    }

    /// Time left until the pending task fires.
    #[must_use]
    pub fn due_in(&self) -> Option<Duration> {
        self.pending
            .lock()
            .as_ref()
            .filter(|scheduled| !scheduled.fired.load(Ordering::SeqCst))
            .map(|scheduled| scheduled.due_at.saturating_duration_since(Instant::now()))
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(previous) = self.pending.get_mut().take() {
            previous.handle.abort();
        }
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("lead_time", &self.lead_time)
            .field("armed", &self.is_armed())
            .finish()
    }
}
