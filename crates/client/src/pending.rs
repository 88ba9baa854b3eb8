//! In-flight operation flags.
//!
//! Controls that trigger a suspending operation disable themselves while it
//! is pending; a second trigger is rejected instead of being run twice.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    SubmitCredentials,
    SubmitOtp,
    ResendOtp,
    Logout,
    LoadPermissions,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SubmitCredentials => "submit_credentials",
            Operation::SubmitOtp => "submit_otp",
            Operation::ResendOtp => "resend_otp",
            Operation::Logout => "logout",
            Operation::LoadPermissions => "load_permissions",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct PendingOps {
    active: Mutex<HashSet<Operation>>,
}

/// Clears its operation's flag when dropped, whichever way the call ends.
#[derive(Debug)]
#[must_use]
pub struct PendingGuard<'a> {
    ops: &'a PendingOps,
    op: Operation,
}

impl PendingOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `op` as running; `None` if it already is.
    pub fn begin(&self, op: Operation) -> Option<PendingGuard<'_>> {
        if self.lock().insert(op) {
            Some(PendingGuard { ops: self, op })
        } else {
            None
        }
    }

    pub fn is_pending(&self, op: Operation) -> bool {
        self.lock().contains(&op)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Operation>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.ops.lock().remove(&self.op);
    }
}
