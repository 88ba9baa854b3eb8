//! Console composition root.
//!
//! Wires the session manager, the permission service, and the route
//! controller to one [`AuthApi`]. The three never call each other: the
//! console follows session events and reacts (load permissions on entering
//! `Authenticated`, clear them on leaving it, queue a redirect on any phase
//! change).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use opsconsole_auth::{Account, AuthzError, Capability, Phase, PermissionService, PermissionStatus};
use opsconsole_core::Clock;
use opsconsole_events::Subscription;

use crate::api::{ApiError, AuthApi};
use crate::manager::{SessionError, SessionEvent, SessionManager};
use crate::pending::{Operation, PendingOps};
use crate::routes::{self, NavItem, Route, RouteController, RouteDecision, Shell};
use crate::store::SessionStore;
use crate::verification::VerificationAttempts;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("{0} is already in progress")]
    AlreadyPending(Operation),

    #[error("not available while {actual} (needs {expected})")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error("not signed in")]
    NotAuthenticated,
}

impl ConsoleError {
    /// Wrong/expired OTP or a network failure: the user can retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConsoleError::Api(
                ApiError::WrongCode | ApiError::ExpiredCode | ApiError::Network(_) | ApiError::Unauthorized
            ) | ConsoleError::AlreadyPending(_)
        )
    }
}

pub struct Console<S, A> {
    session: SessionManager<S>,
    permissions: PermissionService,
    api: A,
    pending: PendingOps,
    attempts: Mutex<VerificationAttempts>,
    session_events: Subscription<SessionEvent>,
    load_due: AtomicBool,
    router: RouteController,
}

impl<S, A> core::fmt::Debug for Console<S, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Console")
            .field("session", &self.session)
            .field("permissions", &self.permissions.status())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl<S: SessionStore, A: AuthApi> Console<S, A> {
    pub fn new(store: S, api: A, clock: Arc<dyn Clock>) -> Self {
        Self::from_parts(SessionManager::new(store, clock), PermissionService::new(), api)
    }

    /// Build from a preconfigured manager and service (custom invariant or
    /// loading policy).
    pub fn from_parts(session: SessionManager<S>, permissions: PermissionService, api: A) -> Self {
        let session_events = session.subscribe();
        let router = RouteController::new(session.subscribe());
        Self {
            session,
            permissions,
            api,
            pending: PendingOps::new(),
            attempts: Mutex::new(VerificationAttempts::new()),
            session_events,
            load_due: AtomicBool::new(false),
            router,
        }
    }

    pub fn session(&self) -> &SessionManager<S> {
        &self.session
    }

    pub fn permissions(&self) -> &PermissionService {
        &self.permissions
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn phase(&self) -> Phase {
        let phase = self.session.current_phase();
        self.observe_session();
        phase
    }

    pub fn account(&self) -> Option<Account> {
        let account = self.session.current_account();
        self.observe_session();
        account
    }

    pub fn permission_status(&self) -> PermissionStatus {
        self.permissions.status()
    }

    pub fn is_pending(&self, op: Operation) -> bool {
        match op {
            Operation::LoadPermissions => self.pending.is_pending(op) || self.permissions.is_pending(),
            _ => self.pending.is_pending(op),
        }
    }

    /// Restore the persisted session and, if it is live, load permissions.
    pub async fn start(&self) -> Result<Phase, ConsoleError> {
        let phase = self.session.restore().await?;
        self.sync_permissions().await;
        tracing::info!(%phase, "console started");
        Ok(phase)
    }

    /// First factor. On success the session waits for the OTP.
    pub async fn submit_credentials(&self, identifier: &str, secret: &str) -> Result<(), ConsoleError> {
        let _guard = self.begin(Operation::SubmitCredentials)?;
        self.ensure_phase(Phase::Unauthenticated)?;

        let account = self.api.check_credentials(identifier, secret).await?;
        self.ensure_phase(Phase::Unauthenticated)?;

        self.session.login(account).await?;
        self.attempts().reset();
        self.observe_session();
        Ok(())
    }

    /// Second factor. A rejected code keeps the session pending and counts
    /// toward the resend offer.
    pub async fn submit_otp(&self, code: &str) -> Result<(), ConsoleError> {
        let _guard = self.begin(Operation::SubmitOtp)?;
        self.ensure_phase(Phase::PendingVerification)?;
        let account = self.session.current_account().ok_or(ConsoleError::NotAuthenticated)?;

        let result = match self.api.exchange_otp(&account.id, code).await {
            Ok(result) => result,
            Err(err) => {
                if err.is_code_rejection() {
                    let mut attempts = self.attempts();
                    attempts.record_failure();
                    tracing::info!(failures = attempts.failures(), "verification code rejected");
                }
                return Err(err.into());
            }
        };

        // Cancelled while the code was being checked.
        self.ensure_phase(Phase::PendingVerification)?;

        if result.account.id != account.id {
            tracing::warn!(pending = %account.id, verified = %result.account.id, "verified account differs from pending account");
        }

        self.session.complete_verification(result).await?;
        self.attempts().reset();
        self.sync_permissions().await;
        Ok(())
    }

    pub async fn resend_otp(&self) -> Result<(), ConsoleError> {
        let _guard = self.begin(Operation::ResendOtp)?;
        self.ensure_phase(Phase::PendingVerification)?;
        let account = self.session.current_account().ok_or(ConsoleError::NotAuthenticated)?;

        self.api.resend_otp(&account.id).await?;
        self.attempts().reset();
        tracing::info!("verification code resent");
        Ok(())
    }

    pub fn can_resend(&self) -> bool {
        self.attempts().should_offer_resend()
    }

    pub fn otp_failures(&self) -> u32 {
        self.attempts().failures()
    }

    pub async fn cancel_verification(&self) -> Result<(), ConsoleError> {
        self.ensure_phase(Phase::PendingVerification)?;
        self.session.cancel_verification().await?;
        self.attempts().reset();
        self.observe_session();
        Ok(())
    }

    pub fn request_logout(&self) {
        self.session.request_logout();
    }

    pub fn cancel_logout(&self) {
        self.session.cancel_logout();
    }

    pub fn is_logout_requested(&self) -> bool {
        self.session.is_logout_requested()
    }

    /// Sign out locally, then tell the server. The server call is best
    /// effort: its failure is logged and does not undo the local logout.
    pub async fn confirm_logout(&self) -> Result<(), ConsoleError> {
        let _guard = self.begin(Operation::Logout)?;

        let credential = self.session.confirm_logout().await?;
        self.attempts().reset();
        self.observe_session();

        if let Some(credential) = credential {
            match self.api.notify_logout(credential.token()).await {
                Ok(()) => tracing::debug!("server notified of logout"),
                Err(err) => tracing::warn!(error = %err, "failed to notify server of logout"),
            }
        }
        Ok(())
    }

    /// Re-fetch the capability list for the current session.
    pub async fn refresh_permissions(&self) -> Result<(), ConsoleError> {
        let _guard = self.begin(Operation::LoadPermissions)?;
        self.fetch_permissions().await
    }

    /// Another screen got a 401 with the current credential.
    pub async fn handle_unauthorized(&self) {
        self.session.invalidate().await;
        self.observe_session();
    }

    /// Whether the current account may perform `capability`. Always `false`
    /// without an authenticated session.
    pub fn has(&self, capability: &Capability) -> bool {
        let phase = self.session.current_phase();
        self.observe_session();
        phase == Phase::Authenticated && self.permissions.has(capability)
    }

    /// Gate for mutation submits.
    pub fn require(&self, capability: &Capability) -> Result<(), ConsoleError> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(AuthzError::Forbidden(capability.as_str().to_string()).into())
        }
    }

    /// One navigation step for `route` under the current phase.
    pub fn navigate(&self, route: &Route) -> RouteDecision {
        self.router.navigate(self.phase(), route)
    }

    /// Resolve `path` to the screen that renders, following redirects.
    pub fn open(&self, path: &str) -> (Shell, Route) {
        routes::settle(self.phase(), &Route::parse(path))
    }

    /// Redirect queued by phase changes since the last call.
    pub fn pending_navigation(&self) -> Option<Route> {
        // Reading the phase publishes a due expiry first.
        let _ = self.phase();
        self.router.take_redirect()
    }

    pub fn menu(&self) -> Vec<NavItem> {
        routes::menu(|capability| self.has(capability))
    }

    // ── internals ───────────────────────────────────────────────────────────

    fn begin(&self, op: Operation) -> Result<crate::pending::PendingGuard<'_>, ConsoleError> {
        self.pending.begin(op).ok_or_else(|| {
            tracing::debug!(operation = %op, "rejecting duplicate request");
            ConsoleError::AlreadyPending(op)
        })
    }

    fn ensure_phase(&self, expected: Phase) -> Result<(), ConsoleError> {
        let actual = self.phase();
        if actual == expected {
            Ok(())
        } else {
            Err(ConsoleError::WrongPhase { expected, actual })
        }
    }

    fn attempts(&self) -> MutexGuard<'_, VerificationAttempts> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply permission side effects of session events seen so far.
    fn observe_session(&self) {
        for event in self.session_events.drain() {
            if event.from == Phase::Authenticated {
                self.permissions.clear();
            }
            if event.to == Phase::Authenticated {
                self.load_due.store(true, Ordering::SeqCst);
            } else {
                self.load_due.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Start the load queued by entering `Authenticated`, if any. Failures
    /// leave the set `Failed` and are only logged here.
    async fn sync_permissions(&self) {
        self.observe_session();
        if !self.load_due.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.fetch_permissions().await {
            tracing::warn!(error = %err, "initial permission load failed");
        }
    }

    async fn fetch_permissions(&self) -> Result<(), ConsoleError> {
        let credential = self.session.credential().ok_or(ConsoleError::NotAuthenticated)?;
        let token = credential.token().to_string();

        match self.permissions.load(self.api.fetch_capabilities(&token)).await {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.is_unauthorized() {
                    self.handle_unauthorized().await;
                }
                Err(err.into())
            }
        }
    }
}
