use std::collections::HashSet;

use cxo_schema::{Kind, Record, Schema, Value};
use cxo_store::Tv;
use cxo_types::Digest;
use tracing::warn;

use crate::engine::Engine;
use crate::error::RefResult;
use crate::tree;

/// One step of a [`Walk`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Visit {
    /// An object that decoded under its expected schema.
    Object { digest: Digest, schema: String },
    /// A node of a stored Refs tree.
    Node { digest: Digest },
    /// A reference whose target is absent from the store.
    Missing { digest: Digest, expected: String },
}

impl Visit {
    pub fn digest(&self) -> Digest {
        match self {
            Self::Object { digest, .. } | Self::Node { digest } | Self::Missing { digest, .. } => {
                *digest
            }
        }
    }

    /// Whether the digest is present in the store.
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Missing { .. })
    }
}

#[derive(Clone, Debug)]
enum Pending {
    Object { digest: Digest, schema: String },
    /// Refs tree node whose elements are objects of `schema`.
    Node { digest: Digest, schema: String },
}

impl Pending {
    fn digest(&self) -> Digest {
        match self {
            Self::Object { digest, .. } | Self::Node { digest, .. } => *digest,
        }
    }
}

/// Lazy depth-first walk over everything reachable from a set of roots.
///
/// Each digest is yielded at most once. A dangling reference is yielded as
/// [`Visit::Missing`] and the walk goes on; an object that fails to decode
/// is yielded as an error and its children are skipped. The walk reads
/// through the view it was created with, so it sees one consistent
/// snapshot. [`restart`](Walk::restart) begins again from the roots.
pub struct Walk<'a, T: Tv + ?Sized> {
    engine: &'a Engine,
    tv: &'a T,
    roots: Vec<(String, Digest)>,
    stack: Vec<Pending>,
    seen: HashSet<Digest>,
}

impl<'a, T: Tv + ?Sized> Walk<'a, T> {
    pub(crate) fn new(engine: &'a Engine, tv: &'a T, roots: Vec<(String, Digest)>) -> Self {
        let mut walk = Self {
            engine,
            tv,
            roots,
            stack: Vec::new(),
            seen: HashSet::new(),
        };
        walk.restart();
        walk
    }

    /// Forget everything visited and start again from the roots.
    pub fn restart(&mut self) {
        self.seen.clear();
        self.stack = self
            .roots
            .iter()
            .rev()
            .filter(|(_, d)| !d.is_zero())
            .map(|(schema, digest)| Pending::Object {
                digest: *digest,
                schema: schema.clone(),
            })
            .collect();
    }

    /// Digests yielded so far.
    pub fn seen(&self) -> &HashSet<Digest> {
        &self.seen
    }

    fn visit(&mut self, pending: Pending) -> RefResult<Visit> {
        match pending {
            Pending::Object { digest, schema } => {
                let Some(bytes) = self.tv.get(&digest)? else {
                    warn!(digest = %digest.short_hex(), schema = %schema, "dangling reference");
                    return Ok(Visit::Missing {
                        digest,
                        expected: schema,
                    });
                };
                let record = self.engine.registry().decode(&schema, &bytes)?;
                let layout = self.engine.registry().require(&schema)?;
                let mut children = Vec::new();
                self.children(&layout, &record, &mut children)?;
                self.push_all(children);
                Ok(Visit::Object { digest, schema })
            }
            Pending::Node { digest, schema } => {
                let Some(bytes) = self.tv.get(&digest)? else {
                    warn!(digest = %digest.short_hex(), schema = %schema, "dangling refs node");
                    return Ok(Visit::Missing {
                        digest,
                        expected: format!("refs<{schema}>"),
                    });
                };
                let node = tree::decode_node(&digest, &bytes)?;
                let children = node
                    .items
                    .iter()
                    .map(|d| {
                        if node.is_leaf() {
                            Pending::Object {
                                digest: *d,
                                schema: schema.clone(),
                            }
                        } else {
                            Pending::Node {
                                digest: *d,
                                schema: schema.clone(),
                            }
                        }
                    })
                    .collect();
                self.push_all(children);
                Ok(Visit::Node { digest })
            }
        }
    }

    /// References held by `record`, in field order.
    fn children(&self, schema: &Schema, record: &Record, out: &mut Vec<Pending>) -> RefResult<()> {
        for (field, (_, value)) in schema.fields().iter().zip(record.fields()) {
            if field.skip {
                continue;
            }
            match (&field.kind, value) {
                (Kind::Ref(target), Value::Ref(r)) if !r.digest().is_zero() => {
                    out.push(Pending::Object {
                        digest: r.digest(),
                        schema: target.clone(),
                    });
                }
                (Kind::Refs(target), Value::Refs(refs)) if !refs.root().is_zero() => {
                    out.push(Pending::Node {
                        digest: refs.root(),
                        schema: target.clone(),
                    });
                }
                (Kind::Dynamic, Value::Dynamic(d)) if !d.is_empty() && !d.digest().is_zero() => {
                    out.push(Pending::Object {
                        digest: d.digest(),
                        schema: d.schema().to_owned(),
                    });
                }
                (Kind::Struct(name), Value::Struct(nested)) => {
                    let nested_schema = self.engine.registry().require(name)?;
                    self.children(&nested_schema, nested, out)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn push_all(&mut self, children: Vec<Pending>) {
        // reversed so the first child is visited first
        self.stack.extend(
            children
                .into_iter()
                .rev()
                .filter(|p| !self.seen.contains(&p.digest())),
        );
    }
}

impl<T: Tv + ?Sized> Iterator for Walk<'_, T> {
    type Item = RefResult<Visit>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(pending) = self.stack.pop() {
            if !self.seen.insert(pending.digest()) {
                continue;
            }
            return Some(self.visit(pending));
        }
        None
    }
}
