use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SyncMode;
use crate::error::{StoreError, StoreResult};
use crate::state::{Changes, State};

/// A commit log record.
#[derive(Debug, Deserialize)]
pub(crate) enum Record {
    /// One committed transaction.
    Commit(Changes),
    /// Full state; replaces everything before it.
    Snapshot(State),
}

/// Borrowed form of [`Record`]; encodes identically.
#[derive(Serialize)]
enum RecordRef<'a> {
    Commit(&'a Changes),
    Snapshot(&'a State),
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Append-only commit log.
///
/// On-disk format, repeated:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized Record)]
/// ```
///
/// A commit is durable once its whole frame is written. Recovery reads
/// front-to-back and stops at the first frame that is short or fails its CRC;
/// that frame and everything after it is a torn write and is cut off, so a
/// half-written commit is never replayed.
pub(crate) struct CommitLog {
    path: PathBuf,
    file: File,
    /// Length of the valid prefix; the next frame starts here.
    offset: u64,
    sync_mode: SyncMode,
}

impl CommitLog {
    /// Open (or create) the log and recover its valid records.
    pub(crate) fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<(Self, Vec<Record>)> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let (records, valid_len) = Self::recover(&file)?;
        let file_len = file.metadata()?.len();
        if valid_len < file_len {
            warn!(
                path = %path.display(),
                valid_len,
                file_len,
                "truncating torn tail of commit log"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), records = records.len(), "commit log recovered");
        Ok((
            Self {
                path: path.to_path_buf(),
                file,
                offset: valid_len,
                sync_mode,
            },
            records,
        ))
    }

    /// Read valid records and return them with the length of the valid prefix.
    fn recover(file: &File) -> StoreResult<(Vec<Record>, u64)> {
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let mut header = [0u8; HEADER_SIZE];
            if !read_full(&mut reader, &mut header)? {
                break;
            }
            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            if length == 0 {
                warn!(offset, "zero-length commit record; stopping recovery");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            if !read_full(&mut reader, &mut payload)? {
                warn!(offset, length, "truncated commit record; stopping recovery");
                break;
            }

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "CRC mismatch; stopping recovery"
                );
                break;
            }

            match bincode::deserialize::<Record>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(offset, error = %e, "undecodable commit record; stopping recovery");
                    break;
                }
            }
            offset += HEADER_SIZE as u64 + length as u64;
        }

        Ok((records, offset))
    }

    /// Append one committed change set. On failure the file is cut back to
    /// the previous valid length so later appends do not land behind garbage.
    pub(crate) fn append(&mut self, changes: &Changes) -> StoreResult<()> {
        let frame = encode_frame(&RecordRef::Commit(changes))?;
        let start = self.offset;

        if let Err(e) = self.write_frame(&frame) {
            warn!(error = %e, offset = start, "commit log append failed; rolling back");
            if let Err(trunc) = self.file.set_len(start) {
                warn!(error = %trunc, "commit log rollback failed");
            }
            return Err(e);
        }

        self.offset += frame.len() as u64;
        debug!(offset = start, len = frame.len(), "commit log append");
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> StoreResult<()> {
        use std::io::{Seek, SeekFrom};
        self.file.seek(SeekFrom::Start(self.offset))?;
        self.file.write_all(frame)?;
        self.file.flush()?;
        if matches!(self.sync_mode, SyncMode::EveryCommit) {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Replace the whole log with a single snapshot record.
    ///
    /// The snapshot is written to a sibling file which is then renamed over
    /// the log, so a crash leaves either the old log or the new one. The new
    /// handle is opened before the rename; once the rename succeeds the log
    /// always writes to the renamed file.
    pub(crate) fn compact(&mut self, state: &State) -> StoreResult<()> {
        let frame = encode_frame(&RecordRef::Snapshot(state))?;
        let tmp_path = self.path.with_extension("compact");
        let file = match write_snapshot(&tmp_path, &frame) {
            Ok(file) => file,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        self.file = file;
        self.offset = frame.len() as u64;
        sync_parent(&self.path)?;
        debug!(path = %self.path.display(), len = self.offset, "commit log compacted");
        Ok(())
    }

    /// Flush everything to stable storage.
    pub(crate) fn sync(&self) -> StoreResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Current length of the valid log.
    pub(crate) fn len(&self) -> u64 {
        self.offset
    }
}

fn encode_frame(record: &RecordRef<'_>) -> StoreResult<Vec<u8>> {
    let payload = bincode::serialize(record)?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization("commit record exceeds 4 GiB".into()))?;
    let crc = crc32fast::hash(&payload);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

fn write_snapshot(path: &Path, frame: &[u8]) -> StoreResult<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(frame)?;
    file.sync_all()?;
    Ok(file)
}

/// Make a rename in the log's directory durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> StoreResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> StoreResult<()> {
    Ok(())
}

/// Fill `buf` completely. Returns `false` on a clean or partial EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> StoreResult<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Tu, Tv};

    fn commit_of(data: &[u8]) -> Changes {
        let base = State::default();
        let mut tx = crate::state::UpdateTx::new(&base);
        tx.set(data).unwrap();
        tx.into_changes()
    }

    fn replay(records: Vec<Record>) -> State {
        let mut state = State::default();
        for r in records {
            match r {
                Record::Commit(c) => state.apply(c),
                Record::Snapshot(s) => state = s,
            }
        }
        state
    }

    #[test]
    fn append_and_recover_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commits.log");
        let (mut log, records) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        assert!(records.is_empty());
        log.append(&commit_of(b"one")).unwrap();
        log.append(&commit_of(b"two")).unwrap();
        drop(log);

        let (_, records) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(replay(records).stat().objects, 2);
    }

    #[test]
    fn torn_tail_is_dropped_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.log");
        let (mut log, _) = CommitLog::open(&path, SyncMode::EveryCommit).unwrap();
        log.append(&commit_of(b"complete")).unwrap();
        let good_len = log.len();
        log.append(&commit_of(b"torn")).unwrap();
        let total = log.len();
        drop(log);

        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(total - 3).unwrap();
        drop(file);

        let (log, records) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(log.len(), good_len);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
    }

    #[test]
    fn corrupt_record_stops_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.log");
        let (mut log, _) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        log.append(&commit_of(b"first")).unwrap();
        log.append(&commit_of(b"second")).unwrap();
        drop(log);

        // flip the first payload byte of the first record
        let mut bytes = fs::read(&path).unwrap();
        bytes[HEADER_SIZE] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let (log, records) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        assert!(records.is_empty());
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn append_after_recovery_continues_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("continue.log");
        let (mut log, _) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        log.append(&commit_of(b"a")).unwrap();
        drop(log);

        let (mut log, _) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        log.append(&commit_of(b"b")).unwrap();
        drop(log);

        let (_, records) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn compact_replaces_history_with_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compact.log");
        let (mut log, _) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        let mut records = Vec::new();
        for i in 0..5u8 {
            let c = commit_of(&[i]);
            log.append(&c).unwrap();
            records.push(Record::Commit(c));
        }
        let state = replay(records);
        log.compact(&state).unwrap();
        log.append(&commit_of(b"after")).unwrap();
        drop(log);

        let (_, records) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Record::Snapshot(_)));
        let state = replay(records);
        assert_eq!(state.stat().objects, 6);
        assert!(state.digests().unwrap().len() == 6);
    }

    #[test]
    fn compact_swaps_handle_to_renamed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swap.log");
        let (mut log, _) = CommitLog::open(&path, SyncMode::EveryCommit).unwrap();
        let c = commit_of(b"before");
        log.append(&c).unwrap();
        log.compact(&replay(vec![Record::Commit(c)])).unwrap();
        assert!(!path.with_extension("compact").exists());
        assert_eq!(fs::metadata(&path).unwrap().len(), log.len());

        // appends after compaction land in the file that now holds the log
        log.append(&commit_of(b"after")).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), log.len());
        log.compact(&State::default()).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), log.len());
    }

    #[test]
    fn failed_compact_keeps_old_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stuck.log");
        let (mut log, _) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        log.append(&commit_of(b"kept")).unwrap();
        let len = log.len();

        // a directory in the way of the temporary file fails the snapshot
        fs::create_dir(path.with_extension("compact")).unwrap();
        assert!(log.compact(&State::default()).is_err());
        assert_eq!(log.len(), len);

        log.append(&commit_of(b"still here")).unwrap();
        drop(log);
        let (_, records) = CommitLog::open(&path, SyncMode::OsDefault).unwrap();
        assert_eq!(records.len(), 2);
    }
}
