//! System clock adapter

use chrono::{DateTime, Utc};
use clinic_session_application::ports::Clock;

/// Wall clock backed by the system time.
///
/// Jumps in the system time are visible to expiry checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a new system clock.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
