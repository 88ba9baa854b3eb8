//! Permission resolution: the capability set granted to the current account.
//!
//! `has()` is called by every screen before rendering an action and again
//! before submitting a mutation, so it is a synchronous in-memory lookup. The
//! fetch itself is supplied by the caller as a future; this module only owns
//! the set, its status, and which fetch result is still allowed to land.

use std::collections::HashSet;
use std::future::IntoFuture;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use thiserror::Error;

use crate::{Capability, registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Loading,
    Ready,
    Failed,
}

/// What `has()` answers while the capability list has not arrived yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingPolicy {
    FailOpen,
    FailClosed,
}

impl LoadingPolicy {
    pub fn allows(self) -> bool {
        matches!(self, LoadingPolicy::FailOpen)
    }
}

/// Loading-window policy for the console.
///
/// Fail-open: actions render while the list loads and the server remains the
/// enforcement point for mutations. Needs product sign-off; switching to
/// `FailClosed` here is the whole change.
pub const PERMISSION_LOADING_POLICY: LoadingPolicy = LoadingPolicy::FailOpen;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing capability '{0}'")]
    Forbidden(String),
}

/// Capability entries plus load status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSet {
    entries: HashSet<Capability>,
    status: PermissionStatus,
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self {
            entries: HashSet::new(),
            status: PermissionStatus::Loading,
        }
    }
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PermissionStatus {
        self.status
    }

    pub fn has(&self, capability: &Capability, policy: LoadingPolicy) -> bool {
        match self.status {
            PermissionStatus::Loading => policy.allows(),
            PermissionStatus::Ready | PermissionStatus::Failed => self.entries.contains(capability),
        }
    }

    /// Sorted snapshot of the entries.
    pub fn entries(&self) -> Vec<Capability> {
        let mut out: Vec<Capability> = self.entries.iter().cloned().collect();
        out.sort();
        out
    }

    fn replace(&mut self, entries: impl IntoIterator<Item = Capability>) {
        self.entries = entries.into_iter().collect();
        self.status = PermissionStatus::Ready;
    }

    /// Previous entries stay usable after a failed refresh.
    fn mark_failed(&mut self) {
        self.status = PermissionStatus::Failed;
    }
}

/// Token handed out when a fetch starts; only the newest one may land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Debug, Default)]
struct Inner {
    set: PermissionSet,
    generation: u64,
    in_flight: Option<u64>,
}

/// Shared permission state for one console.
///
/// `clear()` and every new `begin_load()` advance the generation, so a fetch
/// that resolves after the session ended (or after a newer fetch started) is
/// discarded rather than resurrecting stale entries.
#[derive(Debug)]
pub struct PermissionService {
    policy: LoadingPolicy,
    inner: RwLock<Inner>,
}

impl Default for PermissionService {
    fn default() -> Self {
        Self::with_policy(PERMISSION_LOADING_POLICY)
    }
}

impl PermissionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: LoadingPolicy) -> Self {
        Self {
            policy,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn policy(&self) -> LoadingPolicy {
        self.policy
    }

    pub fn has(&self, capability: &Capability) -> bool {
        self.read().set.has(capability, self.policy)
    }

    /// Gate for mutation submits.
    pub fn require(&self, capability: &Capability) -> Result<(), AuthzError> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(AuthzError::Forbidden(capability.as_str().to_string()))
        }
    }

    pub fn status(&self) -> PermissionStatus {
        self.read().set.status()
    }

    pub fn snapshot(&self) -> PermissionSet {
        self.read().set.clone()
    }

    /// True while a fetch is outstanding.
    pub fn is_pending(&self) -> bool {
        self.read().in_flight.is_some()
    }

    /// Discard entries and return to `Loading`.
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.generation += 1;
        inner.in_flight = None;
        inner.set = PermissionSet::new();
        tracing::debug!("permission set cleared");
    }

    pub fn begin_load(&self) -> LoadTicket {
        let mut inner = self.write();
        inner.generation += 1;
        inner.in_flight = Some(inner.generation);
        LoadTicket {
            generation: inner.generation,
        }
    }

    /// Apply a fetch result. Returns `false` if the ticket was superseded and
    /// the result ignored.
    pub fn finish_load<E>(&self, ticket: LoadTicket, result: &Result<Vec<Capability>, E>) -> bool
    where
        E: core::fmt::Display,
    {
        let mut inner = self.write();
        if inner.generation != ticket.generation {
            tracing::debug!("discarding superseded permission fetch");
            return false;
        }
        inner.in_flight = None;

        match result {
            Ok(entries) => {
                for unknown in entries.iter().filter(|c| !registry::is_registered(c)) {
                    tracing::warn!(capability = %unknown, "server granted an unregistered capability");
                }
                inner.set.replace(entries.iter().cloned());
                tracing::info!(count = entries.len(), "permission set loaded");
            }
            Err(err) => {
                inner.set.mark_failed();
                tracing::warn!(error = %err, "permission fetch failed; keeping previous entries");
            }
        }
        true
    }

    /// Run `fetch` and apply its result. Errors are passed back to the caller
    /// for user-facing reporting after the set has been marked failed.
    pub async fn load<F, E>(&self, fetch: F) -> Result<(), E>
    where
        F: IntoFuture<Output = Result<Vec<Capability>, E>>,
        E: core::fmt::Display,
    {
        let ticket = self.begin_load();
        let result = fetch.into_future().await;
        self.finish_load(ticket, &result);
        result.map(|_| ())
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
