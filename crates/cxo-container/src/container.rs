use std::sync::Arc;

use cxo_crypto::SigningKey;
use cxo_refs::{collect_garbage, Engine, GcReport, Root, Visit};
use cxo_schema::{Dynamic, Record, Registry};
use cxo_store::{Database, RootPack, Stat};
use cxo_types::{Digest, PubKey};
use tracing::{debug, info};

use crate::config::ContainerConfig;
use crate::error::ContainerResult;

/// Entry point for applications: a database, the registry describing what
/// is stored in it, and the engine that connects the two.
///
/// Every method runs in its own transaction.
pub struct Container<D: Database> {
    db: D,
    engine: Engine,
    config: ContainerConfig,
}

impl<D: Database> Container<D> {
    pub fn new(db: D, registry: Arc<Registry>) -> ContainerResult<Self> {
        Self::with_config(db, registry, ContainerConfig::default())
    }

    pub fn with_config(
        db: D,
        registry: Arc<Registry>,
        config: ContainerConfig,
    ) -> ContainerResult<Self> {
        config.validate()?;
        let engine = Engine::new(registry, config.refs_degree)?;
        Ok(Self { db, engine, config })
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.engine.registry()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    // ---- Objects ----

    /// Save `record` and everything it references. Digests of saved
    /// references are written back into `record`.
    pub fn save(&self, schema: &str, record: &mut Record) -> ContainerResult<Digest> {
        self.db
            .update(|tx| Ok(self.engine.save(tx, schema, record)?))
    }

    pub fn load(&self, schema: &str, digest: &Digest) -> ContainerResult<Record> {
        self.db
            .view(|tx| Ok(self.engine.load(tx, schema, digest)?))
    }

    pub fn resolve_dynamic(&self, dynamic: &Dynamic) -> ContainerResult<Option<Record>> {
        self.db
            .view(|tx| Ok(self.engine.resolve_dynamic(tx, dynamic)?))
    }

    // ---- Feeds ----

    pub fn add_feed(&self, pk: PubKey) -> ContainerResult<()> {
        self.db.update(|tx| Ok(tx.add_feed(pk)?))
    }

    pub fn feeds(&self) -> ContainerResult<Vec<PubKey>> {
        Ok(self.db.view(|tx| tx.feeds())?)
    }

    /// Save every pending reference of `root`, then sign and append it as
    /// the next root pack of the key's feed, all in one transaction. The
    /// feed must have been added.
    ///
    /// If the call fails, digests already written into `root` may name
    /// objects that were never committed; publish it again to store them.
    pub fn publish(&self, key: &SigningKey, root: &mut Root) -> ContainerResult<RootPack> {
        let pk = key.pub_key();
        let gc = self.config.gc_on_publish;
        let pack = self.db.update(|tx| -> ContainerResult<RootPack> {
            for dynamic in &mut root.refs {
                self.engine.save_dynamic(tx, dynamic)?;
            }
            let head = tx.head(&pk)?;
            let pack = RootPack::following(head.as_ref(), root.encode()?).sign(key);
            tx.append(&pk, pack.clone())?;
            if gc {
                collect_garbage(&self.engine, tx)?;
            }
            Ok(pack)
        })?;
        info!(feed = %pk, seq = pack.seq, hash = %pack.hash.short_hex(), "root published");
        Ok(pack)
    }

    /// Append a root pack produced elsewhere. The pack is validated exactly
    /// as a local one is, and its payload must decode as a [`Root`].
    pub fn append(&self, pk: &PubKey, pack: RootPack) -> ContainerResult<()> {
        let seq = pack.seq;
        Root::decode(&pack.root)?;
        self.db
            .update(|tx| -> ContainerResult<()> { Ok(tx.append(pk, pack)?) })?;
        debug!(feed = %pk, seq, "root pack appended");
        Ok(())
    }

    /// The feed's head root, or `None` while the feed is empty.
    pub fn last_root(&self, pk: &PubKey) -> ContainerResult<Option<Root>> {
        let head = self.db.view(|tx| tx.head(pk))?;
        Ok(head.map(|pack| Root::decode(&pack.root)).transpose()?)
    }

    pub fn last_pack(&self, pk: &PubKey) -> ContainerResult<Option<RootPack>> {
        Ok(self.db.view(|tx| tx.head(pk))?)
    }

    pub fn chain(&self, pk: &PubKey) -> ContainerResult<Vec<RootPack>> {
        Ok(self.db.view(|tx| tx.chain(pk))?)
    }

    /// Everything reachable from the feed's head root. Dangling references
    /// are included as [`Visit::Missing`]; an undecodable object fails the
    /// call.
    pub fn walk_root(&self, pk: &PubKey) -> ContainerResult<Vec<Visit>> {
        self.db.view(|tx| {
            let Some(head) = tx.head(pk)? else {
                return Ok(Vec::new());
            };
            let root = Root::decode(&head.root)?;
            let visits = self
                .engine
                .walk(tx, root.entry_points())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(visits)
        })
    }

    // ---- Maintenance ----

    pub fn collect_garbage(&self) -> ContainerResult<GcReport> {
        self.db
            .update(|tx| Ok(collect_garbage(&self.engine, tx)?))
    }

    pub fn stat(&self) -> ContainerResult<Stat> {
        Ok(self.db.stat()?)
    }

    /// Close the database. Safe to call more than once.
    pub fn close(&self) -> ContainerResult<()> {
        Ok(self.db.close()?)
    }

    pub fn is_closed(&self) -> bool {
        self.db.is_closed()
    }
}

impl<D: Database + std::fmt::Debug> std::fmt::Debug for Container<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("db", &self.db)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
