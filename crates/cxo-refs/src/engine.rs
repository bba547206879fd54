use std::sync::Arc;

use cxo_schema::{Dynamic, Kind, Record, Ref, Refs, Registry, Schema, Value};
use cxo_store::{Tu, Tv};
use cxo_types::Digest;
use tracing::debug;

use crate::error::{RefError, RefResult};
use crate::tree;
use crate::walk::Walk;

/// Saves, resolves and walks object graphs described by a [`Registry`].
///
/// Every operation runs inside a transaction view supplied by the caller;
/// the engine holds no store handle of its own.
#[derive(Clone, Debug)]
pub struct Engine {
    registry: Arc<Registry>,
    degree: usize,
}

impl Engine {
    /// Default number of items per Refs tree node.
    pub const DEFAULT_DEGREE: usize = 16;

    /// Create an engine. `degree` is the Refs tree arity and must be at
    /// least 2.
    pub fn new(registry: Arc<Registry>, degree: usize) -> RefResult<Self> {
        if degree < 2 {
            return Err(RefError::InvalidDegree(degree));
        }
        Ok(Self { registry, degree })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    // -------------------------------------------------------------------
    // Save
    // -------------------------------------------------------------------

    /// Persist `record` as an object of schema `schema` and return its
    /// digest.
    ///
    /// Pending references are saved first, depth-first, and their digests
    /// are written back into `record`, so after a successful save every
    /// reference in it is stored. Identical sub-graphs map to the same
    /// objects.
    pub fn save<T: Tu + ?Sized>(
        &self,
        tu: &mut T,
        schema: &str,
        record: &mut Record,
    ) -> RefResult<Digest> {
        let schema = self.registry.require(schema)?;
        self.save_record(tu, &schema, record)
    }

    /// Save the target of a pending dynamic reference. Stored and empty
    /// references are left as they are.
    pub fn save_dynamic<T: Tu + ?Sized>(&self, tu: &mut T, dynamic: &mut Dynamic) -> RefResult<()> {
        if !dynamic.is_pending() {
            return Ok(());
        }
        let schema = self.registry.require(dynamic.schema())?;
        if let Some(value) = dynamic.value_mut() {
            let digest = self.save_record(tu, &schema, value)?;
            dynamic.set_digest(digest);
        }
        Ok(())
    }

    fn save_record<T: Tu + ?Sized>(
        &self,
        tu: &mut T,
        schema: &Schema,
        record: &mut Record,
    ) -> RefResult<Digest> {
        self.save_children(tu, schema, record)?;
        let bytes = self.registry.encode(schema.name(), record)?;
        let digest = tu.set(&bytes)?;
        debug!(schema = schema.name(), digest = %digest.short_hex(), "object saved");
        Ok(digest)
    }

    /// Save everything the fields of `record` point at. Nested structs are
    /// part of the same object, so only their references are followed.
    fn save_children<T: Tu + ?Sized>(
        &self,
        tu: &mut T,
        schema: &Schema,
        record: &mut Record,
    ) -> RefResult<()> {
        for (field, (_, value)) in schema.fields().iter().zip(record.fields_mut()) {
            if field.skip {
                continue;
            }
            match (&field.kind, value) {
                (Kind::Ref(target), Value::Ref(r)) => self.save_ref(tu, target, r)?,
                (Kind::Refs(target), Value::Refs(refs)) => self.save_refs(tu, target, refs)?,
                (Kind::Dynamic, Value::Dynamic(d)) => self.save_dynamic(tu, d)?,
                (Kind::Struct(name), Value::Struct(nested)) => {
                    let nested_schema = self.registry.require(name)?;
                    self.save_children(tu, &nested_schema, nested)?;
                }
                // kind mismatches are reported by the encoder
                _ => {}
            }
        }
        Ok(())
    }

    fn save_ref<T: Tu + ?Sized>(&self, tu: &mut T, target: &str, r: &mut Ref) -> RefResult<()> {
        if !r.is_pending() {
            return Ok(());
        }
        let schema = self.registry.require(target)?;
        if let Some(value) = r.value_mut() {
            let digest = self.save_record(tu, &schema, value)?;
            r.set_digest(digest);
        }
        Ok(())
    }

    fn save_refs<T: Tu + ?Sized>(&self, tu: &mut T, target: &str, refs: &mut Refs) -> RefResult<()> {
        if !refs.is_dirty() {
            return Ok(());
        }
        let schema = self.registry.require(target)?;
        for (index, item) in refs.items_mut().iter_mut().enumerate() {
            if item.is_empty() {
                return Err(RefError::EmptyElement { index });
            }
            if !item.is_pending() {
                continue;
            }
            if let Some(value) = item.value_mut() {
                let digest = self.save_record(tu, &schema, value)?;
                item.set_digest(digest);
            }
        }
        let root = tree::build(tu, self.degree, &refs.digests())?;
        refs.set_root(root);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Resolve
    // -------------------------------------------------------------------

    /// Fetch and decode the object at `digest` as schema `schema`.
    ///
    /// Fails with [`RefError::Missing`] if the object is absent and with a
    /// schema error if it does not decode. Refs fields come back loaded
    /// (element digests only); single references are left unresolved.
    pub fn load<T: Tv + ?Sized>(&self, tv: &T, schema: &str, digest: &Digest) -> RefResult<Record> {
        let bytes = tv.get(digest)?.ok_or_else(|| RefError::Missing {
            digest: *digest,
            expected: schema.to_owned(),
        })?;
        let mut record = self.registry.decode(schema, &bytes)?;
        let schema = self.registry.require(schema)?;
        self.load_children(tv, &schema, &mut record)?;
        Ok(record)
    }

    fn load_children<T: Tv + ?Sized>(
        &self,
        tv: &T,
        schema: &Schema,
        record: &mut Record,
    ) -> RefResult<()> {
        for (field, (_, value)) in schema.fields().iter().zip(record.fields_mut()) {
            if field.skip {
                continue;
            }
            match (&field.kind, value) {
                (Kind::Refs(_), Value::Refs(refs)) => self.load_refs(tv, refs)?,
                (Kind::Struct(name), Value::Struct(nested)) => {
                    let nested_schema = self.registry.require(name)?;
                    self.load_children(tv, &nested_schema, nested)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Resolve a single reference whose field declares schema `schema`.
    /// Empty references resolve to `None`.
    pub fn resolve_ref<T: Tv + ?Sized>(
        &self,
        tv: &T,
        schema: &str,
        r: &Ref,
    ) -> RefResult<Option<Record>> {
        if r.digest().is_zero() {
            return Ok(r.value().cloned());
        }
        self.load(tv, schema, &r.digest()).map(Some)
    }

    /// Resolve a dynamic reference by the schema name it carries, looked up
    /// now rather than when the reference was saved. Empty references
    /// resolve to `None` and their digest is never read.
    pub fn resolve_dynamic<T: Tv + ?Sized>(
        &self,
        tv: &T,
        dynamic: &Dynamic,
    ) -> RefResult<Option<Record>> {
        if dynamic.is_empty() {
            return Ok(None);
        }
        if dynamic.digest().is_zero() {
            return Ok(dynamic.value().cloned());
        }
        self.load(tv, dynamic.schema(), &dynamic.digest()).map(Some)
    }

    /// Load a reference in place, keeping the decoded value attached.
    pub fn attach_ref<T: Tv + ?Sized>(&self, tv: &T, schema: &str, r: &mut Ref) -> RefResult<()> {
        if r.digest().is_zero() || r.value().is_some() {
            return Ok(());
        }
        let value = self.load(tv, schema, &r.digest())?;
        r.attach(value);
        Ok(())
    }

    /// Fill in the element digests of a stored collection.
    pub fn load_refs<T: Tv + ?Sized>(&self, tv: &T, refs: &mut Refs) -> RefResult<()> {
        if refs.is_loaded() {
            return Ok(());
        }
        let digests = tree::elements(tv, &refs.root())?;
        refs.set_loaded(digests);
        Ok(())
    }

    /// Resolve every element of a collection, in order.
    pub fn resolve_refs<T: Tv + ?Sized>(
        &self,
        tv: &T,
        schema: &str,
        refs: &Refs,
    ) -> RefResult<Vec<Record>> {
        let digests = if refs.is_loaded() {
            refs.digests()
        } else {
            tree::elements(tv, &refs.root())?
        };
        digests
            .iter()
            .map(|d| self.load(tv, schema, d))
            .collect()
    }

    // -------------------------------------------------------------------
    // Refs paging
    // -------------------------------------------------------------------

    /// Number of elements, read from the stored root node when the
    /// collection is not loaded.
    pub fn refs_len<T: Tv + ?Sized>(&self, tv: &T, refs: &Refs) -> RefResult<u64> {
        if refs.is_loaded() {
            return Ok(refs.len() as u64);
        }
        tree::len(tv, &refs.root())
    }

    /// Digest of element `index`.
    pub fn refs_get<T: Tv + ?Sized>(&self, tv: &T, refs: &Refs, index: u64) -> RefResult<Digest> {
        if refs.is_loaded() {
            return refs
                .items()
                .get(index as usize)
                .map(Ref::digest)
                .ok_or(RefError::IndexOutOfRange {
                    index,
                    len: refs.len() as u64,
                });
        }
        tree::get(tv, &refs.root(), index)
    }

    /// Digests of up to `count` elements starting at `start`.
    pub fn refs_range<T: Tv + ?Sized>(
        &self,
        tv: &T,
        refs: &Refs,
        start: u64,
        count: u64,
    ) -> RefResult<Vec<Digest>> {
        if refs.is_loaded() {
            let items = refs.items();
            let from = (start as usize).min(items.len());
            let to = (start.saturating_add(count) as usize).min(items.len());
            return Ok(items[from..to].iter().map(Ref::digest).collect());
        }
        tree::range(tv, &refs.root(), start, count)
    }

    /// Canonical hash of the collection's element sequence. Independent of
    /// the tree degree; pending elements must be saved first.
    pub fn refs_hash<T: Tv + ?Sized>(&self, tv: &T, refs: &Refs) -> RefResult<Digest> {
        if !refs.root().is_zero() {
            return Ok(tree::load_node(tv, &refs.root())?.hash);
        }
        Ok(tree::canonical_hash(&refs.digests()))
    }

    // -------------------------------------------------------------------
    // Walk
    // -------------------------------------------------------------------

    /// Lazily walk everything reachable from `roots`, given as
    /// `(schema, digest)` pairs.
    pub fn walk<'a, T: Tv + ?Sized>(
        &'a self,
        tv: &'a T,
        roots: impl IntoIterator<Item = (String, Digest)>,
    ) -> Walk<'a, T> {
        Walk::new(self, tv, roots.into_iter().collect())
    }
}
