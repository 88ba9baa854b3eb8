//! In-process [`AuthApi`] for tests and offline demos.
//!
//! Behaviour is configured up front and can be flipped between calls to
//! simulate outages; every call is counted so tests can assert on traffic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use opsconsole_auth::{Account, Capability};
use opsconsole_core::AccountId;

use super::{ApiError, AuthApi, VerificationResult};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub check_credentials: u32,
    pub exchange_otp: u32,
    pub resend_otp: u32,
    pub notify_logout: u32,
    pub fetch_capabilities: u32,
}

#[derive(Debug, Default)]
struct Script {
    accounts: HashMap<String, (String, Account)>,
    otp_code: String,
    otp_expired: bool,
    capabilities: Vec<Capability>,
    capabilities_error: Option<ApiError>,
    logout_error: Option<ApiError>,
    offline: bool,
    issued: u32,
    calls: CallCounts,
}

#[derive(Debug, Default)]
pub struct ScriptedAuthApi {
    script: Mutex<Script>,
}

impl ScriptedAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a login; `identifier`/`secret` pass the first factor.
    pub fn with_account(self, identifier: &str, secret: &str, account: Account) -> Self {
        self.lock()
            .accounts
            .insert(identifier.to_string(), (secret.to_string(), account));
        self
    }

    pub fn with_otp_code(self, code: &str) -> Self {
        self.lock().otp_code = code.to_string();
        self
    }

    pub fn with_capabilities(self, caps: impl IntoIterator<Item = Capability>) -> Self {
        self.set_capabilities(caps);
        self
    }

    pub fn set_capabilities(&self, caps: impl IntoIterator<Item = Capability>) {
        self.lock().capabilities = caps.into_iter().collect();
    }

    pub fn fail_capabilities(&self, error: Option<ApiError>) {
        self.lock().capabilities_error = error;
    }

    pub fn fail_logout(&self, error: Option<ApiError>) {
        self.lock().logout_error = error;
    }

    /// Next OTP exchange reports the code as expired.
    pub fn expire_otp(&self, expired: bool) {
        self.lock().otp_expired = expired;
    }

    /// Every call fails with a network error while offline.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn offline_check(script: &Script) -> Result<(), ApiError> {
    if script.offline {
        Err(ApiError::Network("connection refused".to_string()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl AuthApi for ScriptedAuthApi {
    async fn check_credentials(&self, identifier: &str, secret: &str) -> Result<Account, ApiError> {
        let mut script = self.lock();
        script.calls.check_credentials += 1;
        offline_check(&script)?;

        match script.accounts.get(identifier) {
            Some((expected, account)) if expected == secret => Ok(account.clone()),
            _ => Err(ApiError::Unauthorized),
        }
    }

    async fn exchange_otp(&self, account_id: &AccountId, code: &str) -> Result<VerificationResult, ApiError> {
        let mut script = self.lock();
        script.calls.exchange_otp += 1;
        offline_check(&script)?;

        if script.otp_expired {
            return Err(ApiError::ExpiredCode);
        }
        if code != script.otp_code {
            return Err(ApiError::WrongCode);
        }

        let account = script
            .accounts
            .values()
            .map(|(_, account)| account)
            .find(|account| &account.id == account_id)
            .cloned()
            .ok_or(ApiError::Unauthorized)?;

        script.issued += 1;
        Ok(VerificationResult {
            token: format!("tok-{}-{}", account_id, script.issued),
            account,
        })
    }

    async fn resend_otp(&self, _account_id: &AccountId) -> Result<(), ApiError> {
        let mut script = self.lock();
        script.calls.resend_otp += 1;
        offline_check(&script)?;
        script.otp_expired = false;
        Ok(())
    }

    async fn notify_logout(&self, _token: &str) -> Result<(), ApiError> {
        let mut script = self.lock();
        script.calls.notify_logout += 1;
        offline_check(&script)?;
        match &script.logout_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn fetch_capabilities(&self, _token: &str) -> Result<Vec<Capability>, ApiError> {
        let mut script = self.lock();
        script.calls.fetch_capabilities += 1;
        offline_check(&script)?;
        match &script.capabilities_error {
            Some(err) => Err(err.clone()),
            None => Ok(script.capabilities.clone()),
        }
    }
}
