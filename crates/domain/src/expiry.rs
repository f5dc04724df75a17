//! Expiry tracking for issued credentials.
//!
//! A token response carries relative lifetimes (`expires_in`,
//! `refresh_expires_in`). They are converted once, at issuance time, into
//! absolute wall-clock instants so that later checks only compare instants.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Absolute expiry instants of an access/refresh token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryWindow {
    /// When the access token stops being valid.
    pub access_expires_at: DateTime<Utc>,
    /// When the refresh token stops being valid.
    pub refresh_expires_at: DateTime<Utc>,
}

impl ExpiryWindow {
    /// Computes the window for a token issued at `issued_at`.
    ///
    /// Lifetimes too large to represent saturate at the maximum instant.
    #[must_use]
    pub fn compute(issued_at: DateTime<Utc>, expires_in_secs: u64, refresh_expires_in_secs: u64) -> Self {
        Self {
            access_expires_at: offset(issued_at, expires_in_secs),
            refresh_expires_at: offset(issued_at, refresh_expires_in_secs),
        }
    }

    /// True iff `now >= access_expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.access_expires_at
    }

    /// True iff `now > refresh_expires_at`.
    #[must_use]
    pub fn is_refresh_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.refresh_expires_at
    }

    /// Whether the refresh token outlives the access token.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.refresh_expires_at >= self.access_expires_at
    }

    /// Time left before `access_expires_at - lead`, clamped at zero.
    #[must_use]
    pub fn refresh_delay(&self, now: DateTime<Utc>, lead: TimeDelta) -> std::time::Duration {
        self.access_expires_at
            .checked_sub_signed(lead)
            .and_then(|due| (due - now).to_std().ok())
            .unwrap_or(std::time::Duration::ZERO)
    }
}

fn offset(issued_at: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| issued_at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
