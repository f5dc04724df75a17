//! Test doubles for the session lifecycle tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use clinic_session_application::ports::{Clock, IdentityClient, StoreError, TokenStore};
use clinic_session_application::{MemoryTokenStore, SessionManager, SessionSettings};
use clinic_session_domain::{
    Credential, ExchangeFailure, IssuedToken, PersistedSession, TokenGrant,
};
use parking_lot::Mutex;
use tokio::time::Instant;

/// Wall clock that follows tokio's (paused) clock, plus a manual offset.
///
/// Advancing tokio time moves this clock and fires timers; `skip` moves
/// only the wall clock, which looks like a timer that is running late.
pub struct TestClock {
    base: DateTime<Utc>,
    origin: Instant,
    skew: Mutex<TimeDelta>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            base: t0(),
            origin: Instant::now(),
            skew: Mutex::new(TimeDelta::zero()),
        }
    }

    pub fn skip(&self, secs: i64) {
        *self.skew.lock() += TimeDelta::seconds(secs);
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.origin.elapsed()).unwrap();
        self.base + elapsed + *self.skew.lock()
    }
}

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Identity provider that records every grant and answers from a script.
///
/// Without a scripted answer, call `n` (1-based) issues `access-n` /
/// `refresh-n` valid for 60 s / 3600 s.
#[derive(Default)]
pub struct ScriptedIdentity {
    calls: Mutex<Vec<TokenGrant>>,
    script: Mutex<VecDeque<Result<IssuedToken, ExchangeFailure>>>,
    delay: Mutex<Duration>,
}

impl ScriptedIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, issued: IssuedToken) {
        self.script.lock().push_back(Ok(issued));
    }

    pub fn push_err(&self, failure: ExchangeFailure) {
        self.script.lock().push_back(Err(failure));
    }

    pub fn reject_with(&self, status: u16) {
        self.push_err(ExchangeFailure::Status {
            status,
            message: "invalid_grant".to_string(),
        });
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> Vec<TokenGrant> {
        self.calls.lock().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls.lock().iter().filter(|g| g.is_refresh()).count()
    }
}

pub fn issued(n: usize, expires_in: u64, refresh_expires_in: u64) -> IssuedToken {
    IssuedToken::bearer(
        Credential::new(format!("access-{n}"), format!("refresh-{n}")),
        expires_in,
        refresh_expires_in,
    )
}

#[async_trait]
impl IdentityClient for ScriptedIdentity {
    async fn exchange(&self, grant: &TokenGrant) -> Result<IssuedToken, ExchangeFailure> {
        let n = {
            let mut calls = self.calls.lock();
            calls.push(grant.clone());
            calls.len()
        };
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(issued(n, 60, 3600)))
    }
}

/// Store whose writes always fail.
pub struct BrokenStore;

#[async_trait]
impl TokenStore for BrokenStore {
    async fn save(&self, _session: &PersistedSession) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        Err(StoreError::Serialization("corrupt session file".to_string()))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn save_profile(&self, _profile: &serde_json::Value) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn load_profile(&self) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(None)
    }
}

/// In-memory store whose profile writes take `delay` to land.
pub struct SlowProfileStore {
    pub inner: MemoryTokenStore,
    pub delay: Duration,
}

#[async_trait]
impl TokenStore for SlowProfileStore {
    async fn save(&self, session: &PersistedSession) -> Result<(), StoreError> {
        self.inner.save(session).await
    }

    async fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        self.inner.load().await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }

    async fn save_profile(&self, profile: &serde_json::Value) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.save_profile(profile).await
    }

    async fn load_profile(&self) -> Result<Option<serde_json::Value>, StoreError> {
        self.inner.load_profile().await
    }
}

pub struct Harness {
    pub manager: SessionManager,
    pub store: MemoryTokenStore,
    pub identity: Arc<ScriptedIdentity>,
    pub clock: Arc<TestClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(SessionSettings::default())
    }

    pub fn with_settings(settings: SessionSettings) -> Self {
        Self::with_store(MemoryTokenStore::new(), settings)
    }

    pub fn with_store(store: MemoryTokenStore, settings: SessionSettings) -> Self {
        let identity = Arc::new(ScriptedIdentity::new());
        let clock = Arc::new(TestClock::new());
        let manager = SessionManager::new(
            Arc::new(store.clone()),
            identity.clone(),
            clock.clone(),
            settings,
        );
        Self {
            manager,
            store,
            identity,
            clock,
        }
    }

    pub async fn stored_access_token(&self) -> Option<String> {
        self.store
            .load()
            .await
            .unwrap()
            .map(|session| session.credential.access_token)
    }
}
