//! Durable storage for the persisted session record.
//!
//! A store holds at most one record. `save` writes all three fields together
//! and `clear` removes them together; readers never see a mix of old and new
//! fields. Stores do not interpret the fields: parsing and expiry checks are
//! done by the session manager.

mod memory;
mod sqlite;

pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;

use async_trait::async_trait;
use thiserror::Error;

use opsconsole_auth::RawSessionRecord;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("session storage backend error: {0}")]
    Backend(String),

    #[error("session storage IO error: {0}")]
    Io(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        StoreError::Backend(value.to_string())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Whatever is stored; an empty record if nothing is.
    async fn load(&self) -> Result<RawSessionRecord, StoreError>;

    /// Replace the stored record with `record`, all fields at once.
    async fn save(&self, record: &RawSessionRecord) -> Result<(), StoreError>;

    /// Remove every field.
    async fn clear(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<T> SessionStore for std::sync::Arc<T>
where
    T: SessionStore + ?Sized,
{
    async fn load(&self) -> Result<RawSessionRecord, StoreError> {
        (**self).load().await
    }

    async fn save(&self, record: &RawSessionRecord) -> Result<(), StoreError> {
        (**self).save(record).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
}
