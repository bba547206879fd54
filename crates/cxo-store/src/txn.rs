use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::state::{Changes, State, UpdateTx};
use crate::traits::{Stat, Tu, Tv};

/// Snapshot and writer bookkeeping shared by every backend.
///
/// Readers clone the current `Arc<State>` and run against it without holding
/// any lock. The single writer builds a [`Changes`] overlay on top of a
/// snapshot and swaps in a new root only after the closure succeeded and the
/// backend accepted the change set.
pub(crate) struct TxCore {
    current: RwLock<Arc<State>>,
    writer: Mutex<()>,
    closed: AtomicBool,
}

impl TxCore {
    pub(crate) fn new(state: State) -> Self {
        Self {
            current: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn snapshot(&self) -> StoreResult<Arc<State>> {
        let guard = self
            .current
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(Arc::clone(&guard))
    }

    /// Serialize writers. The guarded value is `()`, so a poisoned lock only
    /// means an earlier closure panicked before committing; it is safe to
    /// continue.
    pub(crate) fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn check_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::AlreadyClosed);
        }
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark closed. Returns `true` only for the first call.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn Tv) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.check_open()?;
        let snapshot = self.snapshot()?;
        f(&*snapshot)
    }

    /// Run a write transaction. `persist` sees the change set before it
    /// becomes visible; if it fails nothing is applied.
    pub(crate) fn update<T, E, F, P>(&self, f: F, persist: P) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Tu) -> Result<T, E>,
        E: From<StoreError>,
        P: FnOnce(&Changes) -> StoreResult<()>,
    {
        self.check_open()?;
        let _writer = self.lock_writer();
        // close() may have won the race for the writer lock
        self.check_open()?;

        let base = self.snapshot()?;
        let mut tx = UpdateTx::new(&base);
        let out = f(&mut tx)?;
        let changes = tx.into_changes();
        drop(base);

        if changes.is_empty() {
            return Ok(out);
        }

        persist(&changes)?;
        let (set, deleted, packs) = changes.summary();
        self.install(changes)?;
        debug!(set, deleted, packs, "commit applied");
        Ok(out)
    }

    fn install(&self, changes: Changes) -> StoreResult<()> {
        let mut guard = self
            .current
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        // Copies the state only while some reader still holds the old root.
        Arc::make_mut(&mut guard).apply(changes);
        Ok(())
    }

    pub(crate) fn stat(&self) -> StoreResult<Stat> {
        self.check_open()?;
        Ok(self.snapshot()?.stat())
    }
}
