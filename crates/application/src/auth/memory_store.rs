//! In-memory token store.
//!
//! Keeps the session for the lifetime of the process only. Used when no
//! durable storage is configured and as the store behind unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use clinic_session_domain::PersistedSession;
use tokio::sync::RwLock;

use crate::ports::{StoreError, TokenStore};

#[derive(Debug, Default)]
struct Slots {
    session: Option<PersistedSession>,
    profile: Option<serde_json::Value>,
}

/// Thread-safe in-memory token store.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slots: Arc<RwLock<Slots>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a session.
    #[must_use]
    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            slots: Arc::new(RwLock::new(Slots {
                session: Some(session),
                profile: None,
            })),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, session: &PersistedSession) -> Result<(), StoreError> {
        let mut slots = self.slots.write().await;
        slots.session = Some(session.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        let slots = self.slots.read().await;
        Ok(slots.session.clone())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut slots = self.slots.write().await;
        slots.session = None;
        slots.profile = None;
        Ok(())
    }

    async fn save_profile(&self, profile: &serde_json::Value) -> Result<(), StoreError> {
        let mut slots = self.slots.write().await;
        slots.profile = Some(profile.clone());
        Ok(())
    }

    async fn load_profile(&self) -> Result<Option<serde_json::Value>, StoreError> {
        let slots = self.slots.read().await;
        Ok(slots.profile.clone())
    }
}
