//! SQLite-backed session store.
//!
//! One table, one row (`slot = 1`). A save is a single upsert statement and a
//! clear a single delete, so the three fields always move together.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use opsconsole_auth::RawSessionRecord;

use super::{SessionStore, StoreError};

#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("failed to create {}: {e}", parent.display())))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        Self::connect_with(options).await
    }

    /// Private in-memory database; lives as long as this store.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        // A single long-lived connection: in-memory databases vanish with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session (
                slot          INTEGER PRIMARY KEY CHECK (slot = 1),
                token         TEXT NULL,
                expires_at_ms INTEGER NULL,
                account       TEXT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self) -> Result<RawSessionRecord, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT token, expires_at_ms, account
            FROM session
            WHERE slot = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(RawSessionRecord::default());
        };

        Ok(RawSessionRecord {
            token: row.try_get("token")?,
            expires_at_ms: row.try_get("expires_at_ms")?,
            account: row.try_get("account")?,
        })
    }

    async fn save(&self, record: &RawSessionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO session (slot, token, expires_at_ms, account)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT(slot)
            DO UPDATE SET
                token = excluded.token,
                expires_at_ms = excluded.expires_at_ms,
                account = excluded.account
            "#,
        )
        .bind(record.token.as_deref())
        .bind(record.expires_at_ms)
        .bind(record.account.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
