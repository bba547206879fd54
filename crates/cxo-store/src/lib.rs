//! Transactional storage for CXO.
//!
//! A database composes two stores behind one transaction boundary:
//!
//! - the **object store**, content-addressed blobs keyed by their
//!   [`Digest`](cxo_types::Digest);
//! - the **feed store**, one append-only chain of [`RootPack`]s per feed
//!   public key.
//!
//! # Backends
//!
//! All backends implement the [`Database`] trait:
//!
//! - [`MemoryDb`] -- nothing survives the process
//! - [`DriveDb`] -- every commit is one checksummed record in a commit log
//!
//! # Design Rules
//!
//! 1. All mutation goes through [`Database::update`]; one writer at a time.
//! 2. Readers see an immutable snapshot and never block on other readers.
//! 3. A transaction's writes become visible atomically when its closure
//!    returns `Ok`; an `Err` or a panic discards them.
//! 4. A torn commit in the log is dropped on recovery, never half-applied.
//! 5. Root packs are validated on append; history is never rewritten.

pub mod config;
pub mod drive;
pub mod error;
pub mod memory;
pub mod pack;
pub mod traits;

mod state;
mod txn;
mod wal;

pub use config::{DbConfig, SyncMode};
pub use drive::DriveDb;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryDb;
pub use pack::RootPack;
pub use traits::{Database, Stat, Tu, Tv};
