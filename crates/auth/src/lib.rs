//! `opsconsole-auth`: client-side session and authorization model.
//!
//! This crate is intentionally decoupled from HTTP and storage: it holds the
//! session state machine, the persisted record format, and the permission set
//! every screen consults. Fetching and persisting are done by the caller.

pub mod account;
pub mod capability;
pub mod credential;
pub mod permissions;
pub mod record;
pub mod registry;
pub mod session;

pub use account::{Account, Role};
pub use capability::Capability;
pub use credential::{CREDENTIAL_TTL, Credential, CredentialError};
pub use permissions::{
    AuthzError, LoadTicket, LoadingPolicy, PERMISSION_LOADING_POLICY, PermissionService,
    PermissionSet, PermissionStatus,
};
pub use record::{RawSessionRecord, RecordError, SessionRecord};
pub use session::{Phase, Session, Transition, TransitionError};
