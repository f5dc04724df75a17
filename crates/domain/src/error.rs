//! Domain error types

use thiserror::Error;

/// Why a token exchange with the identity provider failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeFailure {
    /// The provider answered with a non-success status.
    #[error("token endpoint returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Provider error description, or the raw body.
        message: String,
    },

    /// The provider answered 2xx with a body that is not a token response.
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// The exchange did not settle within the configured timeout.
    #[error("token exchange timed out")]
    Timeout,

    /// The provider could not be reached.
    #[error("identity provider unreachable: {0}")]
    Transport(String),
}

impl ExchangeFailure {
    /// HTTP status code, when the provider answered.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
