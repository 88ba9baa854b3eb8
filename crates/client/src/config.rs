//! Client configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub const API_URL_ENV: &str = "OPSCONSOLE_API_URL";
pub const SESSION_DB_ENV: &str = "OPSCONSOLE_SESSION_DB";
pub const HTTP_TIMEOUT_ENV: &str = "OPSCONSOLE_HTTP_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub session_db: PathBuf,
    pub http_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let session_db = match lookup(SESSION_DB_ENV) {
            Some(path) => PathBuf::from(path),
            None => default_session_db()?,
        };

        let http_timeout = match lookup(HTTP_TIMEOUT_ENV) {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{HTTP_TIMEOUT_ENV} must be a whole number of seconds, got {raw:?}"))?;
                anyhow::ensure!(secs > 0, "{HTTP_TIMEOUT_ENV} must be greater than zero");
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            api_url,
            session_db,
            http_timeout,
        })
    }
}

/// `{app_data_dir}/opsconsole/session.db`.
fn default_session_db() -> anyhow::Result<PathBuf> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    dir.push("opsconsole");
    dir.push("session.db");
    Ok(dir)
}
