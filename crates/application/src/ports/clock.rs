//! Clock port for expiry decisions

use chrono::{DateTime, Utc};

/// Port for reading wall-clock time.
///
/// Every expiry decision in the session manager goes through this trait so
/// tests can move time without waiting.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
