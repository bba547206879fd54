use cxo_types::{Digest, PubKey};

use crate::error::{StoreError, StoreResult};
use crate::pack::RootPack;

/// Read-only view of the object and feed stores.
///
/// A view is bound to one snapshot: everything it returns is consistent for
/// the lifetime of the enclosing [`Database::view`] or [`Database::update`]
/// call.
pub trait Tv {
    /// Stored bytes for `digest`, or `None` if absent.
    fn get(&self, digest: &Digest) -> StoreResult<Option<Vec<u8>>>;

    /// Whether `digest` is stored.
    fn contains(&self, digest: &Digest) -> StoreResult<bool>;

    /// Every stored digest, ascending.
    fn digests(&self) -> StoreResult<Vec<Digest>>;

    /// Every known feed, ascending.
    fn feeds(&self) -> StoreResult<Vec<PubKey>>;

    /// Whether the feed has been added.
    fn has_feed(&self, pk: &PubKey) -> StoreResult<bool>;

    /// The feed's root packs in `seq` order.
    ///
    /// Returns [`StoreError::FeedNotFound`] for an unknown feed.
    fn chain(&self, pk: &PubKey) -> StoreResult<Vec<RootPack>>;

    /// The feed's last root pack, or `None` while the feed is empty.
    ///
    /// Returns [`StoreError::FeedNotFound`] for an unknown feed.
    fn head(&self, pk: &PubKey) -> StoreResult<Option<RootPack>>;

    /// Read an object that must exist.
    fn require(&self, digest: &Digest) -> StoreResult<Vec<u8>> {
        self.get(digest)?
            .ok_or(StoreError::ObjectNotFound(*digest))
    }
}

/// Read-write view. Writes are buffered until the transaction commits.
pub trait Tu: Tv {
    /// Store `data` under its digest. Storing identical bytes twice is a no-op.
    fn set(&mut self, data: &[u8]) -> StoreResult<Digest>;

    /// Remove an object. Returns `true` if it was present.
    ///
    /// The store does not check whether anything still references the
    /// object; only garbage collection should call this.
    fn delete(&mut self, digest: &Digest) -> StoreResult<bool>;

    /// Register a feed with an empty chain. Adding a known feed is a no-op.
    fn add_feed(&mut self, pk: PubKey) -> StoreResult<()>;

    /// Append a root pack to a feed after validating sequence, link, payload
    /// hash and signature. A rejected pack leaves the chain unchanged.
    fn append(&mut self, pk: &PubKey, pack: RootPack) -> StoreResult<()>;
}

/// Size summary of a database.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stat {
    /// Number of stored objects.
    pub objects: usize,
    /// Sum of stored object sizes in bytes.
    pub total_bytes: u64,
    /// Number of feeds.
    pub feeds: usize,
    /// Number of root packs across all feeds.
    pub root_packs: usize,
}

/// A transactional database over an object store and a feed store.
///
/// Transactions are scoped: the caller's closure runs while the transaction
/// holds its access rights, and everything is released before the call
/// returns. Update closures run one at a time in commit order; views never
/// block on each other and never observe uncommitted writes.
pub trait Database: Send + Sync {
    /// Run `f` against a read-only snapshot.
    fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn Tv) -> Result<T, E>,
        E: From<StoreError>;

    /// Run `f` in a write transaction. Its writes commit atomically if it
    /// returns `Ok` and are discarded if it returns `Err` or panics.
    fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Tu) -> Result<T, E>,
        E: From<StoreError>;

    /// Counts over the latest committed snapshot.
    fn stat(&self) -> StoreResult<Stat>;

    /// Release resources. Idempotent; data operations fail afterwards with
    /// [`StoreError::AlreadyClosed`].
    fn close(&self) -> StoreResult<()>;

    /// Whether [`close`](Database::close) has been called.
    fn is_closed(&self) -> bool;
}
