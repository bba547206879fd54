use std::collections::{BTreeMap, BTreeSet, HashMap};

use cxo_crypto::ContentHasher;
use cxo_types::{Digest, PubKey};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::pack::RootPack;
use crate::traits::{Stat, Tu, Tv};

/// One committed version of both stores.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct State {
    objects: HashMap<Digest, Vec<u8>>,
    feeds: BTreeMap<PubKey, Vec<RootPack>>,
}

impl State {
    pub(crate) fn stat(&self) -> Stat {
        Stat {
            objects: self.objects.len(),
            total_bytes: self.objects.values().map(|b| b.len() as u64).sum(),
            feeds: self.feeds.len(),
            root_packs: self.feeds.values().map(Vec::len).sum(),
        }
    }

    /// Apply a committed change set.
    pub(crate) fn apply(&mut self, changes: Changes) {
        for (digest, data) in changes.objects {
            match data {
                Some(bytes) => {
                    self.objects.entry(digest).or_insert(bytes);
                }
                None => {
                    self.objects.remove(&digest);
                }
            }
        }
        for pk in changes.new_feeds {
            self.feeds.entry(pk).or_default();
        }
        for (pk, packs) in changes.appended {
            self.feeds.entry(pk).or_default().extend(packs);
        }
    }
}

impl Tv for State {
    fn get(&self, digest: &Digest) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.objects.get(digest).cloned())
    }

    fn contains(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(self.objects.contains_key(digest))
    }

    fn digests(&self) -> StoreResult<Vec<Digest>> {
        let mut ids: Vec<Digest> = self.objects.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn feeds(&self) -> StoreResult<Vec<PubKey>> {
        Ok(self.feeds.keys().copied().collect())
    }

    fn has_feed(&self, pk: &PubKey) -> StoreResult<bool> {
        Ok(self.feeds.contains_key(pk))
    }

    fn chain(&self, pk: &PubKey) -> StoreResult<Vec<RootPack>> {
        self.feeds
            .get(pk)
            .cloned()
            .ok_or(StoreError::FeedNotFound(*pk))
    }

    fn head(&self, pk: &PubKey) -> StoreResult<Option<RootPack>> {
        self.feeds
            .get(pk)
            .map(|chain| chain.last().cloned())
            .ok_or(StoreError::FeedNotFound(*pk))
    }
}

/// Writes buffered by an uncommitted transaction.
///
/// This is also the unit persisted by the durable backend: one `Changes`
/// value per commit.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Changes {
    /// `Some` stores the bytes, `None` deletes the object.
    objects: BTreeMap<Digest, Option<Vec<u8>>>,
    new_feeds: BTreeSet<PubKey>,
    appended: BTreeMap<PubKey, Vec<RootPack>>,
}

impl Changes {
    pub(crate) fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.new_feeds.is_empty() && self.appended.is_empty()
    }

    pub(crate) fn summary(&self) -> (usize, usize, usize) {
        let set = self.objects.values().filter(|v| v.is_some()).count();
        let deleted = self.objects.len() - set;
        let packs = self.appended.values().map(Vec::len).sum();
        (set, deleted, packs)
    }
}

/// Read-write view layering buffered [`Changes`] over a base snapshot.
pub(crate) struct UpdateTx<'a> {
    base: &'a State,
    changes: Changes,
}

impl<'a> UpdateTx<'a> {
    pub(crate) fn new(base: &'a State) -> Self {
        Self {
            base,
            changes: Changes::default(),
        }
    }

    pub(crate) fn into_changes(self) -> Changes {
        self.changes
    }

    fn known_feed(&self, pk: &PubKey) -> bool {
        self.base.feeds.contains_key(pk) || self.changes.new_feeds.contains(pk)
    }
}

impl Tv for UpdateTx<'_> {
    fn get(&self, digest: &Digest) -> StoreResult<Option<Vec<u8>>> {
        match self.changes.objects.get(digest) {
            Some(pending) => Ok(pending.clone()),
            None => self.base.get(digest),
        }
    }

    fn contains(&self, digest: &Digest) -> StoreResult<bool> {
        match self.changes.objects.get(digest) {
            Some(pending) => Ok(pending.is_some()),
            None => self.base.contains(digest),
        }
    }

    fn digests(&self) -> StoreResult<Vec<Digest>> {
        let mut ids: BTreeSet<Digest> = self.base.objects.keys().copied().collect();
        for (digest, pending) in &self.changes.objects {
            if pending.is_some() {
                ids.insert(*digest);
            } else {
                ids.remove(digest);
            }
        }
        Ok(ids.into_iter().collect())
    }

    fn feeds(&self) -> StoreResult<Vec<PubKey>> {
        let mut pks: BTreeSet<PubKey> = self.base.feeds.keys().copied().collect();
        pks.extend(self.changes.new_feeds.iter().copied());
        Ok(pks.into_iter().collect())
    }

    fn has_feed(&self, pk: &PubKey) -> StoreResult<bool> {
        Ok(self.known_feed(pk))
    }

    fn chain(&self, pk: &PubKey) -> StoreResult<Vec<RootPack>> {
        if !self.known_feed(pk) {
            return Err(StoreError::FeedNotFound(*pk));
        }
        let mut chain = self.base.feeds.get(pk).cloned().unwrap_or_default();
        if let Some(appended) = self.changes.appended.get(pk) {
            chain.extend(appended.iter().cloned());
        }
        Ok(chain)
    }

    fn head(&self, pk: &PubKey) -> StoreResult<Option<RootPack>> {
        if !self.known_feed(pk) {
            return Err(StoreError::FeedNotFound(*pk));
        }
        let pending = self.changes.appended.get(pk).and_then(|p| p.last());
        let committed = self.base.feeds.get(pk).and_then(|c| c.last());
        Ok(pending.or(committed).cloned())
    }
}

impl Tu for UpdateTx<'_> {
    fn set(&mut self, data: &[u8]) -> StoreResult<Digest> {
        let digest = ContentHasher::OBJECT.hash(data);
        if !self.contains(&digest)? {
            self.changes.objects.insert(digest, Some(data.to_vec()));
        }
        Ok(digest)
    }

    fn delete(&mut self, digest: &Digest) -> StoreResult<bool> {
        let existed = self.contains(digest)?;
        if self.base.objects.contains_key(digest) {
            self.changes.objects.insert(*digest, None);
        } else {
            self.changes.objects.remove(digest);
        }
        Ok(existed)
    }

    fn add_feed(&mut self, pk: PubKey) -> StoreResult<()> {
        if !self.known_feed(&pk) {
            self.changes.new_feeds.insert(pk);
        }
        Ok(())
    }

    fn append(&mut self, pk: &PubKey, pack: RootPack) -> StoreResult<()> {
        let head = self.head(pk)?;
        pack.verify_append(pk, head.as_ref())?;
        self.changes.appended.entry(*pk).or_default().push(pack);
        Ok(())
    }
}
