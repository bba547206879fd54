use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use cxo_types::Digest;
use tracing::{debug, info};

use crate::codec::{self, Reader};
use crate::error::{SchemaError, SchemaResult};
use crate::kind::Kind;
use crate::schema::Schema;
use crate::value::{Record, Value};

/// Name and fingerprint index of registered schemas.
///
/// Share it as an `Arc<Registry>` between the containers and engines that
/// use it. Schemas may be registered until the registry is frozen, which
/// happens explicitly through [`freeze`](Registry::freeze) or implicitly on
/// the first [`decode`](Registry::decode).
///
/// A nested struct kind must name a schema that is already registered, so
/// registration is leaf-first. Reference targets are looked up only when a
/// reference is resolved.
#[derive(Debug, Default)]
pub struct Registry {
    schemas: RwLock<Schemas>,
    frozen: AtomicBool,
}

#[derive(Debug, Default)]
struct Schemas {
    by_name: BTreeMap<String, Arc<Schema>>,
    by_fingerprint: HashMap<Digest, String>,
}

impl Registry {
    /// Create an empty, unfrozen registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from schemas registered in order.
    pub fn from_schemas(schemas: impl IntoIterator<Item = Schema>) -> SchemaResult<Self> {
        let registry = Self::new();
        for schema in schemas {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    /// Add a schema.
    ///
    /// Fails with [`SchemaError::Frozen`] once frozen, and with a mismatch
    /// error for duplicate names, fingerprint conflicts, or an invalid
    /// description.
    pub fn register(&self, schema: Schema) -> SchemaResult<()> {
        if self.is_frozen() {
            return Err(SchemaError::Frozen(schema.name().to_owned()));
        }

        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        // re-check under the lock; freeze() takes the same lock
        if self.is_frozen() {
            return Err(SchemaError::Frozen(schema.name().to_owned()));
        }
        if schemas.by_name.contains_key(schema.name()) {
            return Err(SchemaError::DuplicateName(schema.name().to_owned()));
        }
        validate(&schemas, &schema)?;

        let fingerprint = schema.fingerprint();
        if let Some(existing) = schemas.by_fingerprint.get(&fingerprint) {
            return Err(SchemaError::FingerprintConflict {
                name: schema.name().to_owned(),
                existing: existing.clone(),
                fingerprint,
            });
        }

        debug!(
            schema = schema.name(),
            fingerprint = %fingerprint.short_hex(),
            fields = schema.fields().len(),
            "schema registered"
        );
        let name = schema.name().to_owned();
        schemas.by_fingerprint.insert(fingerprint, name.clone());
        schemas.by_name.insert(name, Arc::new(schema));
        Ok(())
    }

    /// Forbid further registration. Idempotent.
    pub fn freeze(&self) {
        let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
        if !self.frozen.swap(true, Ordering::AcqRel) {
            info!(schemas = schemas.by_name.len(), "schema registry frozen");
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Schema registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<Arc<Schema>> {
        self.read().by_name.get(name).cloned()
    }

    /// Name of the schema with this fingerprint.
    pub fn lookup_fingerprint(&self, fingerprint: &Digest) -> Option<String> {
        self.read().by_fingerprint.get(fingerprint).cloned()
    }

    /// Schema registered under `name`, or [`SchemaError::UnknownSchema`].
    pub fn require(&self, name: &str) -> SchemaResult<Arc<Schema>> {
        self.lookup(name)
            .ok_or_else(|| SchemaError::UnknownSchema(name.to_owned()))
    }

    /// Registered names, ascending.
    pub fn names(&self) -> Vec<String> {
        self.read().by_name.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().by_name.is_empty()
    }

    /// Encode `record` as an object of schema `name`.
    pub fn encode(&self, name: &str, record: &Record) -> SchemaResult<Vec<u8>> {
        let schema = self.require(name)?;
        let mut out = Vec::new();
        codec::encode_record(self, &schema, record, &mut out)?;
        Ok(out)
    }

    /// Decode an object of schema `name`. Freezes the registry.
    pub fn decode(&self, name: &str, bytes: &[u8]) -> SchemaResult<Record> {
        self.freeze();
        let schema = self.require(name)?;
        let mut reader = Reader::new(bytes);
        let record = codec::decode_record(self, &schema, &mut reader)?;
        reader.finish()?;
        Ok(record)
    }

    /// A record of schema `name` with every field at its zero value.
    pub fn zero_record(&self, name: &str) -> SchemaResult<Record> {
        match codec::zero_value(self, &Kind::Struct(name.to_owned()))? {
            Value::Struct(record) => Ok(record),
            other => Err(SchemaError::TypeMismatch {
                field: name.to_owned(),
                expected: "struct".into(),
                found: other.type_name().into(),
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Schemas> {
        // entries are only ever inserted whole, so a poisoned lock still
        // guards a consistent map
        self.schemas.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(schemas: &Schemas, schema: &Schema) -> SchemaResult<()> {
    let invalid = |reason: String| SchemaError::InvalidSchema {
        schema: schema.name().to_owned(),
        reason,
    };

    if schema.name().is_empty() {
        return Err(invalid("empty schema name".into()));
    }
    let mut seen = std::collections::HashSet::new();
    for field in schema.fields() {
        if field.name.is_empty() {
            return Err(invalid("empty field name".into()));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(invalid(format!("duplicate field {}", field.name)));
        }
        validate_kind(schemas, schema.name(), &field.kind)
            .map_err(|reason| invalid(format!("field {}: {reason}", field.name)))?;
    }
    Ok(())
}

fn validate_kind(schemas: &Schemas, own: &str, kind: &Kind) -> Result<(), String> {
    match kind {
        Kind::List(elem) => {
            if elem.contains_reference() {
                return Err(format!("{kind} holds references; use refs<..>"));
            }
            validate_kind(schemas, own, elem)
        }
        Kind::Struct(target) => {
            if target == own {
                return Err("struct cannot contain itself inline".into());
            }
            if !schemas.by_name.contains_key(target) {
                return Err(format!("nested schema {target} is not registered"));
            }
            Ok(())
        }
        Kind::Ref(target) | Kind::Refs(target) if target.is_empty() => {
            Err(format!("{kind} has no target schema"))
        }
        _ => Ok(()),
    }
}
