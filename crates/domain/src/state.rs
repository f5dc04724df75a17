//! Session lifecycle state.
//!
//! The phases a session moves through between login and logout:
//! - `LoggedOut`: no credential held
//! - `Authenticating`: first credential exchange in flight
//! - `Valid`: credential held, no refresh timer armed
//! - `RefreshScheduled`: credential held and a refresh timer armed
//! - `Refreshing`: refresh exchange in flight
//! - `Failed`: last exchange failed with no usable credential

use serde::{Deserialize, Serialize};

/// Current phase of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session.
    #[default]
    LoggedOut,
    /// A client-credentials or password exchange is in flight.
    Authenticating,
    /// A credential is held.
    Valid,
    /// A credential is held and a refresh timer is armed.
    RefreshScheduled,
    /// A refresh exchange is in flight.
    Refreshing,
    /// The last exchange failed.
    Failed,
}

impl SessionPhase {
    /// Returns true while a credential is held.
    #[must_use]
    pub const fn has_session(self) -> bool {
        matches!(self, Self::Valid | Self::RefreshScheduled | Self::Refreshing)
    }

    /// Short label for logs and status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LoggedOut => "logged out",
            Self::Authenticating => "authenticating",
            Self::Valid => "valid",
            Self::RefreshScheduled => "valid (refresh scheduled)",
            Self::Refreshing => "refreshing",
            Self::Failed => "failed",
        }
    }
}
