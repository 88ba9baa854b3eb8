//! Persisted session record (storage boundary format).
//!
//! Three co-located fields written and cleared as a group: the bearer token,
//! its absolute expiry in epoch milliseconds, and the account summary as JSON.
//! Storage hands back whatever it finds (`RawSessionRecord`); anything that
//! does not parse into a full `SessionRecord` is treated as absent.

use chrono::DateTime;
use thiserror::Error;

use crate::{Account, Credential, CredentialError};

/// Fields as they sit in storage; any of them may be missing or garbage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSessionRecord {
    pub token: Option<String>,
    pub expires_at_ms: Option<i64>,
    pub account: Option<String>,
}

impl RawSessionRecord {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.expires_at_ms.is_none() && self.account.is_none()
    }
}

/// A complete, well-formed record. Expiry is not checked here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub credential: Credential,
    pub account: Account,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("persisted session is missing field '{0}'")]
    Missing(&'static str),

    #[error("persisted expiry {0} is not a valid timestamp")]
    InvalidExpiry(i64),

    #[error("persisted account is malformed: {0}")]
    MalformedAccount(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl SessionRecord {
    pub fn new(credential: Credential, account: Account) -> Self {
        Self { credential, account }
    }

    pub fn from_raw(raw: &RawSessionRecord) -> Result<Self, RecordError> {
        let token = raw.token.as_deref().ok_or(RecordError::Missing("token"))?;
        let expires_at_ms = raw.expires_at_ms.ok_or(RecordError::Missing("expires_at"))?;
        let account_json = raw.account.as_deref().ok_or(RecordError::Missing("account"))?;

        let expires_at = DateTime::from_timestamp_millis(expires_at_ms)
            .ok_or(RecordError::InvalidExpiry(expires_at_ms))?;
        let account: Account = serde_json::from_str(account_json)
            .map_err(|e| RecordError::MalformedAccount(e.to_string()))?;

        Ok(Self {
            credential: Credential::new(token, expires_at)?,
            account,
        })
    }

    pub fn to_raw(&self) -> Result<RawSessionRecord, RecordError> {
        let account = serde_json::to_string(&self.account)
            .map_err(|e| RecordError::MalformedAccount(e.to_string()))?;

        Ok(RawSessionRecord {
            token: Some(self.credential.token().to_string()),
            expires_at_ms: Some(self.credential.expires_at().timestamp_millis()),
            account: Some(account),
        })
    }
}
