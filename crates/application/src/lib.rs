//! Clinic session application - use cases and ports
//!
//! This crate defines the application layer of the session manager:
//! - Port traits (token store, identity provider, clock)
//! - The session lifecycle (`SessionManager`, `RefreshScheduler`)
//! - Application-level error handling

pub mod auth;
pub mod error;
pub mod ports;

pub use auth::{MemoryTokenStore, RefreshScheduler, SessionManager, SessionSettings};
pub use error::{SessionError, SessionResult};
pub use ports::{Clock, IdentityClient, StoreError, TokenStore};
