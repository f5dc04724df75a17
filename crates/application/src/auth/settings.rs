//! Session manager tuning.

use std::time::Duration;

/// Default interval before access-token expiry at which a refresh runs.
pub const DEFAULT_LEAD_TIME: Duration = Duration::from_secs(30);

/// Default upper bound on a single token exchange.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing knobs of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// How long before access-token expiry the background refresh fires.
    pub lead_time: Duration,
    /// How long a token exchange may take before it counts as failed.
    pub exchange_timeout: Duration,
}

impl SessionSettings {
    /// Set the refresh lead time.
    #[must_use]
    pub const fn with_lead_time(mut self, lead_time: Duration) -> Self {
        self.lead_time = lead_time;
        self
    }

    /// Set the exchange timeout.
    #[must_use]
    pub const fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            lead_time: DEFAULT_LEAD_TIME,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }
}
