//! Session state machine (pure).
//!
//! ```text
//! Unauthenticated ──login──▶ PendingVerification ──complete_verification──▶ Authenticated
//!        ▲                        │                                            │
//!        └──── cancel / logout ───┘◀──────── logout / invalidate / expire ─────┘
//! ```
//!
//! Transitions take the current value and return a complete replacement; there
//! is no field-level mutation. Disallowed transitions return `TransitionError`
//! and leave the input untouched. IO, persistence and notification are the
//! caller's business.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Account, Credential, SessionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Unauthenticated,
    PendingVerification,
    Authenticated,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Unauthenticated => "unauthenticated",
            Phase::PendingVerification => "pending_verification",
            Phase::Authenticated => "authenticated",
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named transitions, used for errors and change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Restore,
    Login,
    CompleteVerification,
    CancelVerification,
    Logout,
    /// Server rejected the credential.
    Invalidate,
    /// Credential expiry passed while the session was live.
    Expire,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Restore => "restore",
            Transition::Login => "login",
            Transition::CompleteVerification => "complete_verification",
            Transition::CancelVerification => "cancel_verification",
            Transition::Logout => "logout",
            Transition::Invalidate => "invalidate",
            Transition::Expire => "expire",
        }
    }
}

impl core::fmt::Display for Transition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("'{transition}' is not allowed from phase '{from}'")]
pub struct TransitionError {
    pub from: Phase,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Unauthenticated,
    PendingVerification {
        account: Account,
    },
    Authenticated {
        account: Account,
        credential: Credential,
    },
}

impl Session {
    /// Rebuild the session from persisted data at startup.
    ///
    /// Only a complete record whose credential is still valid at `now` yields
    /// `Authenticated`; everything else is `Unauthenticated`. A pending
    /// verification is never persisted, so it is never restored.
    pub fn restore(record: Option<SessionRecord>, now: DateTime<Utc>) -> Self {
        match record {
            Some(SessionRecord { credential, account }) if !credential.is_expired(now) => {
                Session::Authenticated { account, credential }
            }
            _ => Session::Unauthenticated,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Session::Unauthenticated => Phase::Unauthenticated,
            Session::PendingVerification { .. } => Phase::PendingVerification,
            Session::Authenticated { .. } => Phase::Authenticated,
        }
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            Session::Unauthenticated => None,
            Session::PendingVerification { account } | Session::Authenticated { account, .. } => {
                Some(account)
            }
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Session::Authenticated { credential, .. } => Some(credential),
            _ => None,
        }
    }

    /// The record to persist for this session, if it is persistable.
    pub fn record(&self) -> Option<SessionRecord> {
        match self {
            Session::Authenticated { account, credential } => {
                Some(SessionRecord::new(credential.clone(), account.clone()))
            }
            _ => None,
        }
    }

    pub fn login(&self, account: Account) -> Result<Self, TransitionError> {
        match self {
            Session::Unauthenticated => Ok(Session::PendingVerification { account }),
            _ => Err(self.reject(Transition::Login)),
        }
    }

    pub fn complete_verification(
        &self,
        account: Account,
        credential: Credential,
    ) -> Result<Self, TransitionError> {
        match self {
            Session::PendingVerification { .. } => Ok(Session::Authenticated { account, credential }),
            _ => Err(self.reject(Transition::CompleteVerification)),
        }
    }

    pub fn cancel_verification(&self) -> Result<Self, TransitionError> {
        match self {
            Session::PendingVerification { .. } => Ok(Session::Unauthenticated),
            _ => Err(self.reject(Transition::CancelVerification)),
        }
    }

    /// Logout is valid from every phase.
    pub fn logout(&self) -> Self {
        Session::Unauthenticated
    }

    /// Drop an authenticated session whose credential the server refused.
    ///
    /// Only meaningful while authenticated; other phases are returned as-is.
    pub fn invalidate(&self) -> Self {
        match self {
            Session::Authenticated { .. } => Session::Unauthenticated,
            other => other.clone(),
        }
    }

    /// `Some(Unauthenticated)` if this is an authenticated session whose
    /// credential has expired at `now`.
    pub fn expire_if_due(&self, now: DateTime<Utc>) -> Option<Self> {
        match self {
            Session::Authenticated { credential, .. } if credential.is_expired(now) => {
                Some(Session::Unauthenticated)
            }
            _ => None,
        }
    }

    fn reject(&self, transition: Transition) -> TransitionError {
        TransitionError {
            from: self.phase(),
            transition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn account() -> Account {
        Account::new("u1")
    }

    fn cred(now: DateTime<Utc>) -> Credential {
        Credential::issue("tok", now).unwrap()
    }

    #[test]
    fn restore_without_record_is_unauthenticated() {
        assert_eq!(Session::restore(None, t0()).phase(), Phase::Unauthenticated);
    }

    #[test]
    fn restore_with_live_record_is_authenticated() {
        let record = SessionRecord::new(cred(t0()), account());
        let session = Session::restore(Some(record), t0() + Duration::days(6));
        assert_eq!(session.phase(), Phase::Authenticated);
        assert_eq!(session.account().unwrap().id.as_str(), "u1");
    }

    #[test]
    fn restore_with_expired_record_is_unauthenticated() {
        let expired = Credential::new("tok", t0() - Duration::seconds(1)).unwrap();
        let session = Session::restore(Some(SessionRecord::new(expired, account())), t0());
        assert_eq!(session, Session::Unauthenticated);
    }

    #[test]
    fn happy_path() {
        let s = Session::Unauthenticated.login(account()).unwrap();
        assert_eq!(s.phase(), Phase::PendingVerification);
        assert!(s.credential().is_none());
        assert!(s.record().is_none());

        let s = s.complete_verification(account(), cred(t0())).unwrap();
        assert_eq!(s.phase(), Phase::Authenticated);
        assert_eq!(s.credential().unwrap().token(), "tok");
        assert!(s.record().is_some());

        assert_eq!(s.logout(), Session::Unauthenticated);
    }

    #[test]
    fn verification_cannot_be_skipped() {
        let err = Session::Unauthenticated
            .complete_verification(account(), cred(t0()))
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: Phase::Unauthenticated,
                transition: Transition::CompleteVerification,
            }
        );
    }

    #[test]
    fn login_twice_is_rejected() {
        let pending = Session::Unauthenticated.login(account()).unwrap();
        let err = pending.login(account()).unwrap_err();
        assert_eq!(err.from, Phase::PendingVerification);
    }

    #[test]
    fn invalidate_leaves_pending_alone() {
        let pending = Session::Unauthenticated.login(account()).unwrap();
        assert_eq!(pending.invalidate(), pending);
    }

    #[test]
    fn expire_if_due_only_fires_past_expiry() {
        let s = Session::Authenticated {
            account: account(),
            credential: cred(t0()),
        };
        assert!(s.expire_if_due(t0() + Duration::days(6)).is_none());
        assert_eq!(
            s.expire_if_due(t0() + Duration::days(7)),
            Some(Session::Unauthenticated)
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Login,
        Complete,
        Cancel,
        Logout,
        Invalidate,
        Tick(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Login),
            Just(Op::Complete),
            Just(Op::Cancel),
            Just(Op::Logout),
            Just(Op::Invalidate),
            (0i64..10).prop_map(Op::Tick),
        ]
    }

    fn allowed(from: Phase, to: Phase) -> bool {
        use Phase::*;
        from == to
            || matches!(
                (from, to),
                (Unauthenticated, PendingVerification)
                    | (PendingVerification, Authenticated)
                    | (PendingVerification, Unauthenticated)
                    | (Authenticated, Unauthenticated)
            )
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever the operation sequence, phase changes only along
        /// Unauthenticated → PendingVerification → Authenticated → Unauthenticated
        /// or PendingVerification → Unauthenticated.
        #[test]
        fn phase_changes_follow_the_allowed_edges(ops in prop::collection::vec(op(), 1..40)) {
            let mut now = t0();
            let mut session = Session::Unauthenticated;

            for op in ops {
                let next = match op {
                    Op::Login => session.login(account()).unwrap_or_else(|_| session.clone()),
                    Op::Complete => session
                        .complete_verification(account(), cred(now))
                        .unwrap_or_else(|_| session.clone()),
                    Op::Cancel => session.cancel_verification().unwrap_or_else(|_| session.clone()),
                    Op::Logout => session.logout(),
                    Op::Invalidate => session.invalidate(),
                    Op::Tick(days) => {
                        now += Duration::days(days);
                        session.expire_if_due(now).unwrap_or_else(|| session.clone())
                    }
                };

                prop_assert!(
                    allowed(session.phase(), next.phase()),
                    "illegal edge {} -> {}", session.phase(), next.phase()
                );
                prop_assert_eq!(next.credential().is_some(), next.phase() == Phase::Authenticated);
                prop_assert_eq!(next.account().is_some(), next.phase() != Phase::Unauthenticated);
                session = next;
            }
        }
    }
}
