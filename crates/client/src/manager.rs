//! Session lifecycle manager.
//!
//! Owns the one live [`Session`], its persisted copy, and the notification
//! stream other components follow. All changes go through the transition
//! methods here; each replaces the whole session under one lock and then
//! publishes a [`SessionEvent`] if the phase changed. Navigation and
//! permission loading react to those events; this module never calls them.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use thiserror::Error;

use opsconsole_auth::{
    Account, Credential, CredentialError, Phase, RawSessionRecord, RecordError, Session,
    SessionRecord, Transition, TransitionError,
};
use opsconsole_core::Clock;
use opsconsole_events::{EventBus, InMemoryEventBus, Subscription};

use crate::api::VerificationResult;
use crate::store::{SessionStore, StoreError};

/// Phase change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionEvent {
    pub from: Phase,
    pub to: Phase,
    pub transition: Transition,
}

/// Reaction to a transition requested from a phase that does not allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantPolicy {
    /// Panic immediately.
    Panic,
    /// Log, force `Unauthenticated`, clear storage, and return an error.
    Reset,
}

impl Default for InvariantPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            InvariantPolicy::Panic
        } else {
            InvariantPolicy::Reset
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("failed to persist session: {0}")]
    Persist(#[from] StoreError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("logout was not requested")]
    LogoutNotRequested,

    /// Another transition landed while this one was waiting on storage.
    #[error("'{transition}' was overtaken; session is now '{now}'")]
    Superseded { transition: Transition, now: Phase },
}

#[derive(Debug, Default)]
struct State {
    session: Session,
    restored: bool,
    logout_requested: bool,
}

pub struct SessionManager<S> {
    store: S,
    clock: Arc<dyn Clock>,
    bus: InMemoryEventBus<SessionEvent>,
    policy: InvariantPolicy,
    state: RwLock<State>,
}

impl<S> core::fmt::Debug for SessionManager<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("phase", &self.read().session.phase())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<S> SessionManager<S> {
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            bus: InMemoryEventBus::new(),
            policy: InvariantPolicy::default(),
            state: RwLock::new(State::default()),
        }
    }

    pub fn with_invariant_policy(mut self, policy: InvariantPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn subscribe(&self) -> Subscription<SessionEvent> {
        self.bus.subscribe()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ── reads ───────────────────────────────────────────────────────────────

    /// Current phase. An authenticated session whose credential has expired
    /// is dropped to `Unauthenticated` here, before the value is returned.
    pub fn current_phase(&self) -> Phase {
        self.expire_if_due();
        self.read().session.phase()
    }

    pub fn current_account(&self) -> Option<Account> {
        self.expire_if_due();
        self.read().session.account().cloned()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.expire_if_due();
        self.read().session.credential().cloned()
    }

    pub fn session(&self) -> Session {
        self.expire_if_due();
        self.read().session.clone()
    }

    pub fn is_logout_requested(&self) -> bool {
        self.read().logout_requested
    }

    // ── transitions ─────────────────────────────────────────────────────────

    /// Rebuild the session from storage. Runs once per manager.
    ///
    /// Missing, malformed, or expired records all yield `Unauthenticated` and
    /// are wiped; none of them is an error.
    pub async fn restore(&self) -> Result<Phase, SessionError> {
        if self.read().restored {
            let from = self.read().session.phase();
            return Err(self.violation(TransitionError { from, transition: Transition::Restore }).await);
        }

        let raw = match self.store.load().await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read persisted session; starting signed out");
                if let Err(clear_err) = self.store.clear().await {
                    tracing::warn!(error = %clear_err, "failed to clear unreadable persisted session");
                }
                RawSessionRecord::default()
            }
        };

        let record = if raw.is_empty() {
            None
        } else {
            match SessionRecord::from_raw(&raw) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(error = %err, "discarding malformed persisted session");
                    None
                }
            }
        };

        let restored = Session::restore(record, self.clock.now());
        if restored.phase() == Phase::Unauthenticated && !raw.is_empty() {
            tracing::debug!("clearing stale persisted session");
            if let Err(err) = self.store.clear().await {
                tracing::warn!(error = %err, "failed to clear stale persisted session");
            }
        }

        self.write().restored = true;
        Ok(self.apply(Transition::Restore, |_| Ok(restored))?)
    }

    /// First factor accepted: wait for the OTP. The account is kept in memory
    /// only.
    pub async fn login(&self, account: Account) -> Result<(), SessionError> {
        match self.apply(Transition::Login, |s| s.login(account)) {
            Ok(_) => Ok(()),
            Err(err) => Err(self.violation(err).await),
        }
    }

    /// Second factor accepted: persist the credential, then authenticate.
    ///
    /// If the record cannot be written the session stays pending and storage
    /// is left empty.
    pub async fn complete_verification(&self, result: VerificationResult) -> Result<(), SessionError> {
        self.expect_phase(Phase::PendingVerification, Transition::CompleteVerification)
            .await?;

        let VerificationResult { token, account } = result;
        let credential = Credential::issue(token, self.clock.now())?;
        let raw = SessionRecord::new(credential.clone(), account.clone()).to_raw()?;

        if let Err(err) = self.store.save(&raw).await {
            tracing::error!(error = %err, "failed to persist session; staying in verification");
            if let Err(clear_err) = self.store.clear().await {
                tracing::error!(error = %clear_err, "failed to clear session storage after write failure");
            }
            return Err(SessionError::Persist(err));
        }

        match self.apply(Transition::CompleteVerification, |s| {
            s.complete_verification(account, credential)
        }) {
            Ok(_) => Ok(()),
            Err(err) => {
                // Cancelled or logged out while the record was being written.
                tracing::info!(now = %err.from, "verification overtaken; discarding persisted session");
                if let Err(clear_err) = self.store.clear().await {
                    tracing::error!(error = %clear_err, "failed to roll back persisted session");
                }
                Err(SessionError::Superseded {
                    transition: err.transition,
                    now: err.from,
                })
            }
        }
    }

    /// Abandon a pending verification.
    pub async fn cancel_verification(&self) -> Result<(), SessionError> {
        match self.apply(Transition::CancelVerification, |s| s.cancel_verification()) {
            Ok(_) => Ok(()),
            Err(err) => Err(self.violation(err).await),
        }
    }

    /// Mark that the user asked to log out; the confirmation UI follows.
    pub fn request_logout(&self) {
        self.write().logout_requested = true;
        tracing::debug!("logout requested");
    }

    pub fn cancel_logout(&self) {
        self.write().logout_requested = false;
        tracing::debug!("logout cancelled");
    }

    /// Perform a requested logout. Valid from every phase.
    ///
    /// Returns the credential that was active, so the caller can tell the
    /// server. A storage failure is logged; the local session is signed out
    /// regardless.
    pub async fn confirm_logout(&self) -> Result<Option<Credential>, SessionError> {
        let (requested, credential) = {
            let state = self.read();
            (state.logout_requested, state.session.credential().cloned())
        };
        if !requested {
            return Err(SessionError::LogoutNotRequested);
        }

        if let Err(err) = self.store.clear().await {
            tracing::error!(error = %err, "failed to clear persisted session on logout");
        }

        self.apply(Transition::Logout, |s| Ok(s.logout()))?;
        Ok(credential)
    }

    /// The server refused the credential: sign out locally.
    pub async fn invalidate(&self) {
        if self.read().session.phase() != Phase::Authenticated {
            return;
        }

        tracing::warn!("credential rejected by server; signing out");
        if let Err(err) = self.store.clear().await {
            tracing::error!(error = %err, "failed to clear persisted session after rejection");
        }
        let _ = self.apply(Transition::Invalidate, |s| Ok(s.invalidate()));
    }

    /// Guard for callers about to start work that only makes sense in
    /// `expected` (e.g. before a network call). Mismatches are treated like a
    /// disallowed transition.
    pub async fn expect_phase(&self, expected: Phase, transition: Transition) -> Result<(), SessionError> {
        let from = self.current_phase();
        if from == expected {
            Ok(())
        } else {
            Err(self.violation(TransitionError { from, transition }).await)
        }
    }

    // ── internals ───────────────────────────────────────────────────────────

    fn expire_if_due(&self) {
        let now = self.clock.now();
        if self.read().session.expire_if_due(now).is_none() {
            return;
        }

        tracing::info!("credential expired");
        let _ = self.apply(Transition::Expire, |s| {
            Ok(s.expire_if_due(now).unwrap_or_else(|| s.clone()))
        });
    }

    /// Replace the session with `f(current)` under one write lock, then
    /// notify subscribers if the phase changed.
    fn apply<F>(&self, transition: Transition, f: F) -> Result<Phase, TransitionError>
    where
        F: FnOnce(&Session) -> Result<Session, TransitionError>,
    {
        let (from, to) = {
            let mut state = self.write();
            let next = f(&state.session)?;
            let from = state.session.phase();
            let to = next.phase();
            state.session = next;
            if from != to || transition == Transition::Logout {
                state.logout_requested = false;
            }
            (from, to)
        };

        if from != to {
            tracing::info!(%from, %to, %transition, "session phase changed");
            if let Err(err) = self.bus.publish(SessionEvent { from, to, transition }) {
                tracing::warn!(error = ?err, "failed to publish session event");
            }
        }

        Ok(to)
    }

    async fn violation(&self, err: TransitionError) -> SessionError {
        match self.policy {
            InvariantPolicy::Panic => panic!("session invariant violated: {err}"),
            InvariantPolicy::Reset => {
                tracing::error!(error = %err, "session invariant violated; resetting to unauthenticated");
                if let Err(clear_err) = self.store.clear().await {
                    tracing::error!(error = %clear_err, "failed to clear session storage during reset");
                }
                let _ = self.apply(err.transition, |_| Ok(Session::Unauthenticated));
                SessionError::InvalidTransition(err)
            }
        }
    }
}
