//! Application error types

use clinic_session_domain::ExchangeFailure;
use thiserror::Error;

use crate::ports::StoreError;

/// Session-level errors.
///
/// `Clone` so a single exchange outcome can be handed to every caller that
/// joined it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The identity provider rejected the exchange, answered with garbage,
    /// or could not be reached in time.
    #[error("authentication exchange failed: {0}")]
    AuthExchangeFailed(#[from] ExchangeFailure),

    /// No credential could be obtained; the session has been cleared.
    #[error("session unavailable: {0}")]
    SessionUnavailable(String),

    /// The token store could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl SessionError {
    /// Returns true when the caller should route the user to sign in again.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::SessionUnavailable(_) | Self::Persistence(_))
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
