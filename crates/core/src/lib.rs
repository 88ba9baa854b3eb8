//! `opsconsole-core`: shared primitives for the ops console client.
//!
//! Pure types only: no IO, no async, no logging setup.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::AccountId;
