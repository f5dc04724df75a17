//! Clinic session domain - core credential types
//!
//! This crate defines the domain model of the dashboard's session manager:
//! credentials, expiry windows, the session phase machine and its events.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod event;
pub mod expiry;
pub mod id;
pub mod state;

pub use auth::{Credential, IssuedToken, PersistedSession, TokenGrant};
pub use error::ExchangeFailure;
pub use event::{LogoutReason, SessionEvent, token_preview};
pub use expiry::ExpiryWindow;
pub use id::SessionId;
pub use state::SessionPhase;
