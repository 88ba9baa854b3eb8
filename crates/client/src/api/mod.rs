//! External collaborator calls consumed by the session core.
//!
//! The console only needs five server interactions; they sit behind one trait
//! so the session flow can run against the real HTTP API or an in-process
//! script.

mod http;
mod scripted;

pub use http::HttpAuthApi;
pub use scripted::ScriptedAuthApi;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use opsconsole_auth::{Account, Capability};
use opsconsole_core::AccountId;

/// Successful OTP exchange: a fresh bearer token and the verified account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub token: String,
    #[serde(alias = "user")]
    pub account: Account,
}

impl core::fmt::Debug for VerificationResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VerificationResult")
            .field("token", &"<redacted>")
            .field("account", &self.account)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("verification code is incorrect")]
    WrongCode,

    #[error("verification code has expired")]
    ExpiredCode,

    #[error("API error ({0}): {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Wrong or expired OTP: counts toward the resend threshold.
    pub fn is_code_rejection(&self) -> bool {
        matches!(self, ApiError::WrongCode | ApiError::ExpiredCode)
    }
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    /// First factor: identifier + secret → account summary.
    async fn check_credentials(&self, identifier: &str, secret: &str) -> Result<Account, ApiError>;

    /// Second factor: OTP code for a pending account → credential.
    async fn exchange_otp(&self, account_id: &AccountId, code: &str) -> Result<VerificationResult, ApiError>;

    async fn resend_otp(&self, account_id: &AccountId) -> Result<(), ApiError>;

    async fn notify_logout(&self, token: &str) -> Result<(), ApiError>;

    async fn fetch_capabilities(&self, token: &str) -> Result<Vec<Capability>, ApiError>;
}

#[async_trait]
impl<T> AuthApi for std::sync::Arc<T>
where
    T: AuthApi + ?Sized,
{
    async fn check_credentials(&self, identifier: &str, secret: &str) -> Result<Account, ApiError> {
        (**self).check_credentials(identifier, secret).await
    }

    async fn exchange_otp(&self, account_id: &AccountId, code: &str) -> Result<VerificationResult, ApiError> {
        (**self).exchange_otp(account_id, code).await
    }

    async fn resend_otp(&self, account_id: &AccountId) -> Result<(), ApiError> {
        (**self).resend_otp(account_id).await
    }

    async fn notify_logout(&self, token: &str) -> Result<(), ApiError> {
        (**self).notify_logout(token).await
    }

    async fn fetch_capabilities(&self, token: &str) -> Result<Vec<Capability>, ApiError> {
        (**self).fetch_capabilities(token).await
    }
}
