//! Credential and token-exchange types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expiry::ExpiryWindow;

/// The pair of opaque tokens that make up a session credential.
///
/// Both tokens are always present together. Storage adapters that find
/// only one of them must report "no session" instead of building a
/// partial credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token attached to outbound resource requests.
    pub access_token: String,
    /// Token used for the `refresh_token` grant.
    pub refresh_token: String,
}

impl Credential {
    /// Creates a credential from both tokens.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Builds a credential from optional halves, returning `None` when
    /// either half is missing or empty.
    #[must_use]
    pub fn from_parts(access_token: Option<String>, refresh_token: Option<String>) -> Option<Self> {
        match (access_token, refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(Self::new(access, refresh))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &crate::token_preview(&self.access_token))
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// A grant exchanged at the identity provider's token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenGrant {
    /// `grant_type=client_credentials` using the configured client secret.
    ClientCredentials,
    /// `grant_type=password`, used by the interactive login flow.
    Password {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// `grant_type=refresh_token`.
    RefreshToken(String),
}

impl TokenGrant {
    /// The `grant_type` form value for this grant.
    #[must_use]
    pub const fn grant_type(&self) -> &'static str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::Password { .. } => "password",
            Self::RefreshToken(_) => "refresh_token",
        }
    }

    /// Returns true for the refresh-token grant.
    #[must_use]
    pub const fn is_refresh(&self) -> bool {
        matches!(self, Self::RefreshToken(_))
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientCredentials => f.write_str("ClientCredentials"),
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::RefreshToken(_) => f.write_str("RefreshToken([REDACTED])"),
        }
    }
}

/// A successful token-endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// The issued credential.
    pub credential: Credential,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// Refresh token lifetime in seconds.
    pub refresh_expires_in: u64,
    /// Token type reported by the provider (usually "Bearer").
    pub token_type: String,
    /// Scopes granted by the provider.
    pub scopes: Vec<String>,
}

impl IssuedToken {
    /// Creates a bearer token response with no scopes.
    #[must_use]
    pub fn bearer(credential: Credential, expires_in: u64, refresh_expires_in: u64) -> Self {
        Self {
            credential,
            expires_in,
            refresh_expires_in,
            token_type: "Bearer".to_string(),
            scopes: Vec::new(),
        }
    }
}

/// What the token store persists between process restarts.
///
/// The expiry window is optional so that entries written without one are
/// still readable; such a session has unknown freshness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    /// The stored credential.
    pub credential: Credential,
    /// Expiry instants computed when the credential was issued.
    pub expiry: Option<ExpiryWindow>,
}

impl PersistedSession {
    /// Creates a persisted session.
    #[must_use]
    pub const fn new(credential: Credential, expiry: Option<ExpiryWindow>) -> Self {
        Self { credential, expiry }
    }
}
