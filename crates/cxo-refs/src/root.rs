use cxo_schema::{Dynamic, SchemaError};
use cxo_types::Digest;
use serde::{Deserialize, Serialize};

use crate::error::{RefError, RefResult};

/// Payload carried in a root pack: the entry points of one published
/// version of an object graph, plus an opaque application descriptor.
///
/// The dynamic references of a feed's head root are what garbage
/// collection keeps alive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Root {
    pub refs: Vec<Dynamic>,
    pub descriptor: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct Wire {
    refs: Vec<(String, Digest)>,
    descriptor: Vec<u8>,
}

impl Root {
    pub fn new(refs: Vec<Dynamic>) -> Self {
        Self {
            refs,
            descriptor: Vec::new(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: impl Into<Vec<u8>>) -> Self {
        self.descriptor = descriptor.into();
        self
    }

    /// `(schema, digest)` of every non-empty reference, in order.
    pub fn entry_points(&self) -> impl Iterator<Item = (String, Digest)> + '_ {
        self.refs
            .iter()
            .filter(|d| !d.is_empty() && !d.digest().is_zero())
            .map(|d| (d.schema().to_owned(), d.digest()))
    }

    /// Encode for storage in a root pack. Every reference must already be
    /// saved (or empty).
    pub fn encode(&self) -> RefResult<Vec<u8>> {
        let mut refs = Vec::with_capacity(self.refs.len());
        for (i, d) in self.refs.iter().enumerate() {
            if d.is_pending() {
                return Err(SchemaError::UnsavedReference(format!(
                    "root ref {i} ({})",
                    d.schema()
                ))
                .into());
            }
            refs.push((d.schema().to_owned(), d.digest()));
        }
        let wire = Wire {
            refs,
            descriptor: self.descriptor.clone(),
        };
        bincode::serialize(&wire).map_err(|e| RefError::CorruptRoot(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> RefResult<Self> {
        let wire: Wire =
            bincode::deserialize(bytes).map_err(|e| RefError::CorruptRoot(e.to_string()))?;
        let mut refs = Vec::with_capacity(wire.refs.len());
        for (schema, digest) in wire.refs {
            if schema.is_empty() != digest.is_zero() {
                return Err(RefError::CorruptRoot(format!(
                    "half-empty reference {schema:?} {digest}"
                )));
            }
            refs.push(if schema.is_empty() {
                Dynamic::empty()
            } else {
                Dynamic::stored(schema, digest)
            });
        }
        Ok(Self {
            refs,
            descriptor: wire.descriptor,
        })
    }
}
