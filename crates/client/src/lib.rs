//! `opsconsole-client`
//!
//! **Responsibility:** client-side session and authorization for the ops
//! console.
//!
//! This crate provides:
//! - The session lifecycle manager (restore, two-step login, logout, expiry)
//! - Durable session storage (SQLite) and the HTTP auth API client
//! - Route/layout resolution driven by the session phase
//! - [`Console`], which wires these to the permission service
//!
//! The server stays the authority: nothing here authenticates or authorizes
//! on its own, it only tracks what the server granted.

pub mod api;
pub mod config;
pub mod console;
pub mod manager;
pub mod pending;
pub mod routes;
pub mod store;
pub mod verification;

pub use api::{ApiError, AuthApi, HttpAuthApi, ScriptedAuthApi, VerificationResult};
pub use config::ClientConfig;
pub use console::{Console, ConsoleError};
pub use manager::{InvariantPolicy, SessionError, SessionEvent, SessionManager};
pub use pending::Operation;
pub use routes::{NavItem, Route, RouteDecision, Shell};
pub use store::{InMemorySessionStore, SessionStore, SqliteSessionStore, StoreError};
