//! Session events for the presentation layer.

use crate::auth::Credential;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// `logout()` was called.
    UserRequested,
    /// Both the refresh exchange and the fallback re-authentication failed.
    RefreshFailed,
    /// The token store could not be read or written.
    PersistenceFailure,
}

/// Events emitted as the session changes.
///
/// `LoggedOut` is the signal to route the user back to the
/// unauthenticated entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new session was established.
    Authenticated {
        /// Preview of the new access token.
        token_preview: String,
        /// Seconds until the access token expires.
        expires_in: u64,
    },
    /// The session's credential was replaced by a refresh.
    Refreshed {
        /// Preview of the new access token.
        token_preview: String,
        /// Seconds until the access token expires.
        expires_in: u64,
    },
    /// The session was destroyed.
    LoggedOut {
        /// What ended it.
        reason: LogoutReason,
    },
}

impl SessionEvent {
    /// Creates an `Authenticated` event for a credential.
    #[must_use]
    pub fn authenticated(credential: &Credential, expires_in: u64) -> Self {
        Self::Authenticated {
            token_preview: token_preview(&credential.access_token),
            expires_in,
        }
    }

    /// Creates a `Refreshed` event for a credential.
    #[must_use]
    pub fn refreshed(credential: &Credential, expires_in: u64) -> Self {
        Self::Refreshed {
            token_preview: token_preview(&credential.access_token),
            expires_in,
        }
    }
}

/// Get a preview of an access token (first 8 chars + ...).
#[must_use]
pub fn token_preview(token: &str) -> String {
    match token.char_indices().nth(8) {
        Some((cut, _)) if token.chars().count() > 12 => format!("{}...", &token[..cut]),
        _ => token.to_string(),
    }
}
