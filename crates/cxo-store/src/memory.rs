use crate::error::{StoreError, StoreResult};
use crate::state::State;
use crate::traits::{Database, Stat, Tu, Tv};
use crate::txn::TxCore;

/// In-memory database.
///
/// Intended for tests and embedding. Nothing survives the process. Readers
/// never block: each view runs against an immutable snapshot that a commit
/// replaces atomically.
pub struct MemoryDb {
    core: TxCore,
}

impl MemoryDb {
    /// Create a new empty database.
    pub fn new() -> Self {
        Self {
            core: TxCore::new(State::default()),
        }
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for MemoryDb {
    fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn Tv) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.core.view(f)
    }

    fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Tu) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.core.update(f, |_| Ok(()))
    }

    fn stat(&self) -> StoreResult<Stat> {
        self.core.stat()
    }

    fn close(&self) -> StoreResult<()> {
        self.core.mark_closed();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

impl std::fmt::Debug for MemoryDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stat = self.core.snapshot().map(|s| s.stat()).unwrap_or_default();
        f.debug_struct("MemoryDb")
            .field("object_count", &stat.objects)
            .field("feed_count", &stat.feeds)
            .field("closed", &self.core.is_closed())
            .finish()
    }
}
