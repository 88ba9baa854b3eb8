use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Lifetime of a credential, counted from successful verification.
pub const CREDENTIAL_TTL: Duration = Duration::days(7);

/// Bearer token paired with its absolute expiry.
///
/// The pairing is what keeps "token present iff expiry present" structural.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential has expired")]
    Expired,

    #[error("credential token is empty")]
    EmptyToken,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Result<Self, CredentialError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CredentialError::EmptyToken);
        }
        Ok(Self { token, expires_at })
    }

    /// Credential minted at `now`, valid for [`CREDENTIAL_TTL`].
    pub fn issue(token: impl Into<String>, now: DateTime<Utc>) -> Result<Self, CredentialError> {
        Self::new(token, now + CREDENTIAL_TTL)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), CredentialError> {
        if self.is_expired(now) {
            Err(CredentialError::Expired)
        } else {
            Ok(())
        }
    }
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
