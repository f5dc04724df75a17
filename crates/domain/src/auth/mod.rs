//! Authentication domain types

mod types;

pub use types::{Credential, IssuedToken, PersistedSession, TokenGrant};
