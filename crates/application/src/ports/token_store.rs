//! Token store port
//!
//! Defines the interface for durable credential persistence.

use async_trait::async_trait;
use clinic_session_domain::PersistedSession;

/// Errors that can occur during token store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Durable key-value persistence of the session credential.
///
/// The store is passive: it never talks to the network and never starts
/// timers. Only the session manager writes to it.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persists both credential fields and the expiry window.
    ///
    /// Observers never see one field updated without the other.
    ///
    /// # Errors
    /// Returns an error if the session cannot be written.
    async fn save(&self, session: &PersistedSession) -> Result<(), StoreError>;

    /// Loads the stored session.
    ///
    /// # Returns
    /// `None` when nothing is stored or when either token is missing.
    async fn load(&self) -> Result<Option<PersistedSession>, StoreError>;

    /// Removes the credential and the cached profile.
    ///
    /// # Errors
    /// Returns an error if the stored data cannot be removed.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Caches the signed-in user's profile blob.
    ///
    /// # Errors
    /// Returns an error if the profile cannot be written.
    async fn save_profile(&self, profile: &serde_json::Value) -> Result<(), StoreError>;

    /// Loads the cached profile blob, if any.
    async fn load_profile(&self) -> Result<Option<serde_json::Value>, StoreError>;

    /// Returns true when a complete credential is stored.
    async fn has_session(&self) -> Result<bool, StoreError> {
        Ok(self.load().await?.is_some())
    }
}
