//! In-memory session store for tests/dev.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use opsconsole_auth::RawSessionRecord;

use super::{SessionStore, StoreError};

/// Single-slot store with switchable write failures.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    slot: Mutex<RawSessionRecord>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `record`, as if left by an earlier run.
    pub fn seeded(record: RawSessionRecord) -> Self {
        Self {
            slot: Mutex::new(record),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> RawSessionRecord {
        self.lock().clone()
    }

    /// While set, `save` fails without touching the slot.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// While set, `load` fails; `snapshot` still shows the slot.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, RawSessionRecord> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> Result<RawSessionRecord, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Io("simulated read failure".to_string()));
        }
        Ok(self.snapshot())
    }

    async fn save(&self, record: &RawSessionRecord) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated write failure".to_string()));
        }
        *self.lock() = record.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.lock() = RawSessionRecord::default();
        Ok(())
    }
}
