//! Session facade.
//!
//! `SessionManager` owns the one session of the process: its credential,
//! the credential's expiry window and the refresh timer. Everything else
//! obtains authorization through [`SessionManager::ensure_authenticated`].
//!
//! Every token exchange, whether started by a caller or by the refresh
//! timer, runs on its own task and publishes its outcome through a shared
//! `watch` channel. Callers arriving while an exchange is in flight join
//! that channel instead of starting another exchange.

use std::sync::{Arc, Weak};
use std::time::Duration;

use clinic_session_domain::{
    Credential, ExchangeFailure, ExpiryWindow, IssuedToken, LogoutReason, PersistedSession,
    SessionEvent, SessionId, SessionPhase, TokenGrant, token_preview,
};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::scheduler::RefreshScheduler;
use super::settings::SessionSettings;
use crate::error::{SessionError, SessionResult};
use crate::ports::{Clock, IdentityClient, TokenStore};

const EVENT_CAPACITY: usize = 16;

type Outcome = SessionResult<String>;
type PendingExchange = watch::Receiver<Option<Outcome>>;

#[derive(Debug, Default)]
struct SessionState {
    credential: Option<Credential>,
    expiry: Option<ExpiryWindow>,
    phase: SessionPhase,
    /// Bumped whenever the session ends. Exchanges started under an older
    /// epoch never write their result.
    epoch: u64,
}

enum Operation {
    Authenticate(TokenGrant),
    Refresh,
}

#[derive(Debug, Clone, Copy)]
enum CommitKind {
    Authenticated,
    Refreshed,
}

struct Inner {
    id: SessionId,
    store: Arc<dyn TokenStore>,
    identity: Arc<dyn IdentityClient>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    state: Mutex<SessionState>,
    scheduler: RefreshScheduler,
    pending: Mutex<Option<PendingExchange>>,
    /// Serializes store writes against store clears.
    persist: tokio::sync::Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

/// Owner of the process-wide session.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a manager with no session.
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        identity: Arc<dyn IdentityClient>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                id: SessionId::generate(),
                store,
                identity,
                clock,
                settings,
                state: Mutex::new(SessionState::default()),
                scheduler: RefreshScheduler::new(settings.lead_time),
                pending: Mutex::new(None),
                persist: tokio::sync::Mutex::new(()),
                events,
            }),
        }
    }

    /// Create a manager and restore any session left in the store.
    ///
    /// A store that cannot be read leaves the manager logged out.
    pub async fn start(
        store: Arc<dyn TokenStore>,
        identity: Arc<dyn IdentityClient>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        let manager = Self::new(store, identity, clock, settings);
        if let Err(err) = manager.rehydrate().await {
            warn!(session = %manager.id(), error = %err, "starting without a stored session");
        }
        manager
    }

    /// Load the stored session and arm its refresh.
    ///
    /// A session stored without an expiry window has unknown freshness: it
    /// counts as expired and its refresh is due immediately.
    ///
    /// # Errors
    /// Returns `SessionError::Persistence` if the store cannot be read; the
    /// session is cleared in that case.
    pub async fn rehydrate(&self) -> SessionResult<SessionPhase> {
        let inner = &self.inner;
        let loaded = match inner.store.load().await {
            Ok(loaded) => loaded,
            Err(err) => {
                error!(session = %inner.id, error = %err, "failed to read stored session");
                inner.end_session(LogoutReason::PersistenceFailure).await;
                return Err(err.into());
            }
        };

        let Some(persisted) = loaded else {
            debug!(session = %inner.id, "no stored session");
            return Ok(self.phase());
        };

        let expiry = persisted.expiry;
        {
            let mut state = inner.state.lock();
            state.credential = Some(persisted.credential);
            state.expiry = expiry;
            state.phase = SessionPhase::RefreshScheduled;
            match expiry {
                Some(window) => inner.arm_refresh(&window, state.epoch),
                None => inner.arm_refresh_now(state.epoch),
            }
        }

        info!(
            session = %inner.id,
            known_expiry = expiry.is_some(),
            "session restored from store"
        );
        Ok(SessionPhase::RefreshScheduled)
    }

    /// Obtain a new session with the client-credentials grant.
    ///
    /// Never retried automatically. A failure leaves an existing session
    /// untouched.
    ///
    /// # Errors
    /// Returns `SessionError::AuthExchangeFailed` if the provider rejects
    /// the exchange or cannot be reached.
    pub async fn authenticate(&self) -> SessionResult<String> {
        self.inner
            .run(Operation::Authenticate(TokenGrant::ClientCredentials))
            .await
    }

    /// Obtain a new session with the password grant (interactive login).
    ///
    /// # Errors
    /// Returns `SessionError::AuthExchangeFailed` if the provider rejects
    /// the credentials or cannot be reached.
    pub async fn sign_in(&self, username: &str, password: &str) -> SessionResult<String> {
        self.inner
            .run(Operation::Authenticate(TokenGrant::Password {
                username: username.to_string(),
                password: password.to_string(),
            }))
            .await
    }

    /// Renew the session.
    ///
    /// Uses the refresh grant unless the refresh token has itself expired,
    /// and falls back once to the client-credentials grant. When that also
    /// fails the session is logged out.
    ///
    /// # Errors
    /// Returns `SessionError::SessionUnavailable` when no credential could
    /// be obtained.
    pub async fn refresh_token(&self) -> SessionResult<String> {
        self.inner.run(Operation::Refresh).await
    }

    /// Return a currently valid access token, renewing or acquiring one
    /// first if needed.
    ///
    /// # Errors
    /// Returns an error when no token can be obtained; callers should route
    /// the user to the unauthenticated entry point.
    pub async fn ensure_authenticated(&self) -> SessionResult<String> {
        if let Some(token) = self.inner.current_token() {
            return Ok(token);
        }

        let operation = if self.inner.state.lock().credential.is_some() {
            Operation::Refresh
        } else {
            Operation::Authenticate(TokenGrant::ClientCredentials)
        };
        self.inner.run(operation).await
    }

    /// `Authorization` header value for an outbound resource request.
    ///
    /// # Errors
    /// Same as [`Self::ensure_authenticated`].
    pub async fn bearer_header(&self) -> SessionResult<String> {
        let token = self.ensure_authenticated().await?;
        Ok(format!("Bearer {token}"))
    }

    /// Forget the session: cancel the refresh, clear the store, emit
    /// `SessionEvent::LoggedOut`. A second call has no further effect.
    pub async fn logout(&self) {
        self.inner.end_session(LogoutReason::UserRequested).await;
    }

    /// The current credential, if any.
    #[must_use]
    pub fn get_token(&self) -> Option<Credential> {
        self.inner.state.lock().credential.clone()
    }

    /// True when there is no credential of known freshness, or its access
    /// token has reached its expiry.
    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        let now = self.inner.clock.now();
        self.inner
            .state
            .lock()
            .expiry
            .is_none_or(|window| window.is_expired(now))
    }

    /// The current expiry window, if known.
    #[must_use]
    pub fn expiry(&self) -> Option<ExpiryWindow> {
        self.inner.state.lock().expiry
    }

    /// Current phase of the session.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.inner.state.lock().phase
    }

    /// Time left until the background refresh fires.
    #[must_use]
    pub fn refresh_due_in(&self) -> Option<Duration> {
        self.inner.scheduler.due_in()
    }

    /// Subscribe to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Identifier used in this manager's log lines.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Cache the signed-in user's profile blob next to the credential.
    ///
    /// # Errors
    /// Returns `SessionUnavailable` without a session, or `Persistence` if
    /// the store fails (which also ends the session).
    pub async fn cache_profile(&self, profile: &serde_json::Value) -> SessionResult<()> {
        let persist_guard = self.inner.persist.lock().await;
        // Checked under the guard: a logout clears the store only after
        // this write has landed.
        if self.get_token().is_none() {
            return Err(SessionError::SessionUnavailable(
                "no active session".to_string(),
            ));
        }
        if let Err(err) = self.inner.store.save_profile(profile).await {
            error!(session = %self.inner.id, error = %err, "failed to cache profile");
            drop(persist_guard);
            self.inner.end_session(LogoutReason::PersistenceFailure).await;
            return Err(err.into());
        }
        Ok(())
    }

    /// The cached profile blob, if any.
    ///
    /// # Errors
    /// Returns `Persistence` if the store cannot be read.
    pub async fn cached_profile(&self) -> SessionResult<Option<serde_json::Value>> {
        Ok(self.inner.store.load_profile().await?)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("id", &self.inner.id)
            .field("phase", &self.phase())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

fn session_ended() -> SessionError {
    SessionError::SessionUnavailable("session ended during token exchange".to_string())
}

impl Inner {
    fn current_token(&self) -> Option<String> {
        let now = self.clock.now();
        let state = self.state.lock();
        match (&state.credential, &state.expiry) {
            (Some(credential), Some(window)) if !window.is_expired(now) => {
                Some(credential.access_token.clone())
            }
            _ => None,
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state.lock().epoch == epoch
    }

    fn enter_phase(&self, epoch: u64, phase: SessionPhase) {
        let mut state = self.state.lock();
        if state.epoch == epoch {
            state.phase = phase;
        }
    }

    fn arm_refresh(self: &Arc<Self>, window: &ExpiryWindow, epoch: u64) {
        let due = Self::scheduled_refresh(Arc::downgrade(self), epoch);
        self.scheduler.arm(window, self.clock.now(), due);
    }

    fn arm_refresh_now(self: &Arc<Self>, epoch: u64) {
        let due = Self::scheduled_refresh(Arc::downgrade(self), epoch);
        self.scheduler.arm_after(Duration::ZERO, due);
    }

    async fn scheduled_refresh(weak: Weak<Self>, epoch: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        {
            let mut state = inner.state.lock();
            if state.epoch != epoch {
                return;
            }
            if state.phase == SessionPhase::RefreshScheduled {
                state.phase = SessionPhase::Valid;
            }
        }

        debug!(session = %inner.id, "scheduled refresh due");
        if let Err(err) = inner.run_in(Operation::Refresh, Some(epoch)).await {
            warn!(session = %inner.id, error = %err, "scheduled refresh failed");
        }
    }

    /// Join the in-flight exchange, or start `operation` if there is none,
    /// and wait for its outcome.
    async fn run(self: &Arc<Self>, operation: Operation) -> Outcome {
        self.run_in(operation, None).await
    }

    /// Like [`Self::run`], but fails without starting anything when the
    /// session has moved past `expected`.
    async fn run_in(self: &Arc<Self>, operation: Operation, expected: Option<u64>) -> Outcome {
        let Some(mut receiver) = self.join_or_start(operation, expected) else {
            return Err(session_ended());
        };
        let settled = match receiver.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };

        settled.unwrap_or_else(|| {
            self.forget_pending(&receiver);
            Err(SessionError::SessionUnavailable(
                "token exchange was abandoned".to_string(),
            ))
        })
    }

    /// The exchange is bound to the epoch current at request time, so a
    /// logout that lands before the task first runs still invalidates it.
    fn join_or_start(
        self: &Arc<Self>,
        operation: Operation,
        expected: Option<u64>,
    ) -> Option<PendingExchange> {
        let state = self.state.lock();
        if expected.is_some_and(|epoch| epoch != state.epoch) {
            return None;
        }
        let mut pending = self.pending.lock();
        if let Some(receiver) = pending.as_ref() {
            debug!(session = %self.id, "joining in-flight token exchange");
            return Some(receiver.clone());
        }

        let epoch = state.epoch;
        let (sender, receiver) = watch::channel(None);
        *pending = Some(receiver.clone());
        drop(pending);
        drop(state);

        let inner = Arc::clone(self);
        let own = receiver.clone();
        tokio::spawn(async move {
            let outcome = inner.execute(operation, epoch).await;
            inner.forget_pending(&own);
            sender.send_replace(Some(outcome));
        });
        Some(receiver)
    }

    fn forget_pending(&self, receiver: &PendingExchange) {
        let mut pending = self.pending.lock();
        if pending
            .as_ref()
            .is_some_and(|current| current.same_channel(receiver))
        {
            *pending = None;
        }
    }

    async fn execute(self: &Arc<Self>, operation: Operation, epoch: u64) -> Outcome {
        if !self.is_current(epoch) {
            debug!(session = %self.id, "session ended before token exchange started");
            return Err(session_ended());
        }
        match operation {
            Operation::Authenticate(grant) => self.authenticate_with(grant, epoch).await,
            Operation::Refresh => self.refresh(epoch).await,
        }
    }

    async fn authenticate_with(self: &Arc<Self>, grant: TokenGrant, epoch: u64) -> Outcome {
        self.enter_phase(epoch, SessionPhase::Authenticating);
        info!(session = %self.id, grant = grant.grant_type(), "authenticating");

        match self.exchange(&grant).await {
            Ok(issued) => self.commit(issued, epoch, CommitKind::Authenticated).await,
            Err(failure) => {
                warn!(
                    session = %self.id,
                    grant = grant.grant_type(),
                    error = %failure,
                    "authentication failed"
                );
                self.settle_failed_authentication(epoch);
                Err(failure.into())
            }
        }
    }

    fn settle_failed_authentication(&self, epoch: u64) {
        let armed = self.scheduler.is_armed();
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return;
        }
        state.phase = match (&state.credential, armed) {
            (None, _) => SessionPhase::Failed,
            (Some(_), true) => SessionPhase::RefreshScheduled,
            (Some(_), false) => SessionPhase::Valid,
        };
    }

    async fn refresh(self: &Arc<Self>, epoch: u64) -> Outcome {
        let (credential, expiry) = {
            let state = self.state.lock();
            if state.epoch != epoch {
                return Err(session_ended());
            }
            (state.credential.clone(), state.expiry)
        };
        let Some(credential) = credential else {
            debug!(session = %self.id, "nothing to refresh");
            return self
                .authenticate_with(TokenGrant::ClientCredentials, epoch)
                .await;
        };

        self.enter_phase(epoch, SessionPhase::Refreshing);
        let now = self.clock.now();

        let renewed = if expiry.is_some_and(|window| window.is_refresh_expired(now)) {
            info!(session = %self.id, "refresh token expired, re-authenticating");
            self.reauthenticate().await
        } else {
            match self
                .exchange(&TokenGrant::RefreshToken(credential.refresh_token))
                .await
            {
                Ok(issued) => Ok((issued, CommitKind::Refreshed)),
                Err(failure) => {
                    warn!(
                        session = %self.id,
                        error = %failure,
                        "refresh grant failed, falling back to client credentials"
                    );
                    self.reauthenticate().await
                }
            }
        };

        match renewed {
            Ok((issued, kind)) => self.commit(issued, epoch, kind).await,
            Err(failure) => {
                error!(session = %self.id, error = %failure, "could not renew session");
                if self.is_current(epoch) {
                    self.state.lock().phase = SessionPhase::Failed;
                    self.end_session(LogoutReason::RefreshFailed).await;
                }
                Err(SessionError::SessionUnavailable(failure.to_string()))
            }
        }
    }

    async fn reauthenticate(&self) -> Result<(IssuedToken, CommitKind), ExchangeFailure> {
        self.exchange(&TokenGrant::ClientCredentials)
            .await
            .map(|issued| (issued, CommitKind::Authenticated))
    }

    async fn exchange(&self, grant: &TokenGrant) -> Result<IssuedToken, ExchangeFailure> {
        debug!(session = %self.id, grant = grant.grant_type(), "token exchange");
        tokio::time::timeout(self.settings.exchange_timeout, self.identity.exchange(grant))
            .await
            .unwrap_or(Err(ExchangeFailure::Timeout))
    }

    async fn commit(self: &Arc<Self>, issued: IssuedToken, epoch: u64, kind: CommitKind) -> Outcome {
        let persist_guard = self.persist.lock().await;
        if !self.is_current(epoch) {
            debug!(session = %self.id, "discarding exchange result for an ended session");
            return Err(session_ended());
        }

        let window = ExpiryWindow::compute(
            self.clock.now(),
            issued.expires_in,
            issued.refresh_expires_in,
        );
        if !window.is_consistent() {
            warn!(
                session = %self.id,
                expires_in = issued.expires_in,
                refresh_expires_in = issued.refresh_expires_in,
                "refresh token expires before access token"
            );
        }

        let persisted = PersistedSession::new(issued.credential.clone(), Some(window));
        if let Err(err) = self.store.save(&persisted).await {
            error!(session = %self.id, error = %err, "failed to persist session");
            drop(persist_guard);
            self.end_session(LogoutReason::PersistenceFailure).await;
            return Err(err.into());
        }

        {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                // The pending logout clears the store once the guard drops.
                return Err(session_ended());
            }
            state.credential = Some(issued.credential.clone());
            state.expiry = Some(window);
            state.phase = SessionPhase::RefreshScheduled;
            self.arm_refresh(&window, epoch);
        }
        drop(persist_guard);

        let event = match kind {
            CommitKind::Authenticated => {
                SessionEvent::authenticated(&issued.credential, issued.expires_in)
            }
            CommitKind::Refreshed => SessionEvent::refreshed(&issued.credential, issued.expires_in),
        };
        info!(
            session = %self.id,
            token = %token_preview(&issued.credential.access_token),
            expires_in = issued.expires_in,
            ?kind,
            "session credential updated"
        );
        let _ = self.events.send(event);

        Ok(issued.credential.access_token)
    }

    async fn end_session(&self, reason: LogoutReason) {
        let was_active = {
            let mut state = self.state.lock();
            let active = state.credential.is_some() || state.phase != SessionPhase::LoggedOut;
            state.epoch = state.epoch.wrapping_add(1);
            state.credential = None;
            state.expiry = None;
            state.phase = SessionPhase::LoggedOut;
            active
        };
        self.scheduler.cancel();
        self.pending.lock().take();

        let cleared = {
            let _persist_guard = self.persist.lock().await;
            self.store.clear().await
        };
        if let Err(err) = cleared {
            error!(session = %self.id, error = %err, "failed to clear stored session");
        }

        if was_active {
            info!(session = %self.id, ?reason, "session ended");
            let _ = self.events.send(SessionEvent::LoggedOut { reason });
        }
    }
}
