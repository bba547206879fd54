use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::config::DbConfig;
use crate::error::{StoreError, StoreResult};
use crate::state::State;
use crate::traits::{Database, Stat, Tu, Tv};
use crate::txn::TxCore;
use crate::wal::{CommitLog, Record};

/// Durable database backed by a single commit-log file.
///
/// The full state is held in memory; the file only ever grows by one
/// checksummed record per commit, until [`compact`](DriveDb::compact)
/// rewrites it as a single snapshot. A commit is visible to readers only
/// after its record has been written.
pub struct DriveDb {
    path: PathBuf,
    core: TxCore,
    /// `None` once closed.
    log: Mutex<Option<CommitLog>>,
}

impl DriveDb {
    /// Open or create a database at `path` with default configuration.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(path, DbConfig::default())
    }

    /// Open or create a database at `path`.
    ///
    /// Replays the commit log. A torn or corrupt tail is cut off and
    /// everything before it is kept.
    pub fn open_with(path: impl AsRef<Path>, config: DbConfig) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let (mut log, records) = CommitLog::open(&path, config.sync_mode)?;

        let replayed = records.len();
        let mut state = State::default();
        for record in records {
            match record {
                Record::Commit(changes) => state.apply(changes),
                Record::Snapshot(snapshot) => state = snapshot,
            }
        }

        if config.compact_on_open && replayed > 1 {
            log.compact(&state)?;
        }

        let stat = state.stat();
        info!(
            path = %path.display(),
            records = replayed,
            objects = stat.objects,
            feeds = stat.feeds,
            "database opened"
        );

        Ok(Self {
            path,
            core: TxCore::new(state),
            log: Mutex::new(Some(log)),
        })
    }

    /// Path of the commit-log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the commit log in bytes.
    pub fn log_len(&self) -> StoreResult<u64> {
        let guard = self.lock_log()?;
        guard
            .as_ref()
            .map(CommitLog::len)
            .ok_or(StoreError::AlreadyClosed)
    }

    /// Rewrite the commit log as one snapshot of the current state.
    ///
    /// Blocks writers for the duration; readers are unaffected.
    pub fn compact(&self) -> StoreResult<()> {
        self.core.check_open()?;
        let _writer = self.core.lock_writer();
        let state = self.core.snapshot()?;
        let mut guard = self.lock_log()?;
        let log = guard.as_mut().ok_or(StoreError::AlreadyClosed)?;
        let before = log.len();
        log.compact(&state)?;
        info!(before, after = log.len(), "commit log compacted");
        Ok(())
    }

    fn lock_log(&self) -> StoreResult<MutexGuard<'_, Option<CommitLog>>> {
        self.log
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Database for DriveDb {
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
        self.core.update(f, |changes| {
            let mut guard = self.lock_log()?;
            let log = guard.as_mut().ok_or(StoreError::AlreadyClosed)?;
            log.append(changes)
        })
    }

    fn stat(&self) -> StoreResult<Stat> {
        self.core.stat()
    }

    /// Never fails once the database is marked closed: a log that cannot be
    /// flushed is reported and dropped, since every commit already reached
    /// the file when it was made.
    fn close(&self) -> StoreResult<()> {
        if !self.core.mark_closed() {
            return Ok(());
        }
        // wait for an in-flight commit to finish writing
        let _writer = self.core.lock_writer();
        let log = match self.log.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(log) = log {
            if let Err(e) = log.sync() {
                warn!(path = %self.path.display(), error = %e, "commit log sync failed on close");
            }
        }
        debug!(path = %self.path.display(), "database closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

impl Drop for DriveDb {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for DriveDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveDb")
            .field("path", &self.path)
            .field("closed", &self.core.is_closed())
            .finish()
    }
}
