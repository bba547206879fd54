//! In-memory values described by schemas.
//!
//! A stored object is always a [`Record`]. Reference fields hold a
//! [`Ref`], [`Refs`] or [`Dynamic`], each of which is either *pending* (holds
//! a value that has not been saved yet) or *stored* (holds the digest of a
//! saved object, and optionally the value it was loaded into).

use cxo_types::Digest;

use crate::error::{SchemaError, SchemaResult};
use crate::kind::Kind;

/// A field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Struct(Record),
    Ref(Ref),
    Refs(Refs),
    Dynamic(Dynamic),
}

impl Value {
    /// Short name of the value's variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::U8(_) => "u8",
            Self::U16(_) => "u16",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::I8(_) => "i8",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Struct(_) => "struct",
            Self::Ref(_) => "ref",
            Self::Refs(_) => "refs",
            Self::Dynamic(_) => "dynamic",
        }
    }

    /// Whether this value can be stored in a field of `kind`. Struct and
    /// list contents are checked by the codec, not here.
    pub fn fits(&self, kind: &Kind) -> bool {
        matches!(
            (kind, self),
            (Kind::Bool, Self::Bool(_))
                | (Kind::U8, Self::U8(_))
                | (Kind::U16, Self::U16(_))
                | (Kind::U32, Self::U32(_))
                | (Kind::U64, Self::U64(_))
                | (Kind::I8, Self::I8(_))
                | (Kind::I16, Self::I16(_))
                | (Kind::I32, Self::I32(_))
                | (Kind::I64, Self::I64(_))
                | (Kind::F32, Self::F32(_))
                | (Kind::F64, Self::F64(_))
                | (Kind::String, Self::String(_))
                | (Kind::Bytes, Self::Bytes(_))
                | (Kind::List(_), Self::List(_))
                | (Kind::Struct(_), Self::Struct(_))
                | (Kind::Ref(_), Self::Ref(_))
                | (Kind::Refs(_), Self::Refs(_))
                | (Kind::Dynamic, Self::Dynamic(_))
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Ref> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_reference_mut(&mut self) -> Option<&mut Ref> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_refs(&self) -> Option<&Refs> {
        match self {
            Self::Refs(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_refs_mut(&mut self) -> Option<&mut Refs> {
        match self {
            Self::Refs(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_dynamic(&self) -> Option<&Dynamic> {
        match self {
            Self::Dynamic(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dynamic_mut(&mut self) -> Option<&mut Dynamic> {
        match self {
            Self::Dynamic(d) => Some(d),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::$variant(v)
            }
        })*
    };
}

impl_from! {
    bool => Bool,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec<u8> => Bytes,
    Record => Struct,
    Ref => Ref,
    Refs => Refs,
    Dynamic => Dynamic,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

/// Field values in schema order, each tagged with its field name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (builder style).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Append a field.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Replace an existing field's value. Returns the old value, or `None`
    /// (and leaves the record unchanged) if there is no such field.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.get_mut(name)
            .map(|slot| std::mem::replace(slot, value.into()))
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [(String, Value)] {
        &mut self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Single optional reference to an object of the field's declared schema.
#[derive(Clone, Debug, Default)]
pub struct Ref {
    digest: Digest,
    value: Option<Box<Record>>,
}

impl Ref {
    /// The empty reference.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A reference to a value that has not been saved yet.
    pub fn pending(value: Record) -> Self {
        Self {
            digest: Digest::zero(),
            value: Some(Box::new(value)),
        }
    }

    /// A reference to an already stored object.
    pub fn stored(digest: Digest) -> Self {
        Self {
            digest,
            value: None,
        }
    }

    /// Empty means no digest and no value.
    pub fn is_empty(&self) -> bool {
        self.digest.is_zero() && self.value.is_none()
    }

    /// Holds a value but no digest yet.
    pub fn is_pending(&self) -> bool {
        self.digest.is_zero() && self.value.is_some()
    }

    /// Digest of the target; zero while empty or pending.
    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// Record the digest the target was saved under.
    pub fn set_digest(&mut self, digest: Digest) {
        self.digest = digest;
    }

    /// The loaded or pending target value.
    pub fn value(&self) -> Option<&Record> {
        self.value.as_deref()
    }

    /// Edit the target value in place. The digest is cleared, so the edit
    /// is saved as a new object.
    pub fn value_mut(&mut self) -> Option<&mut Record> {
        if self.value.is_some() {
            self.digest = Digest::zero();
        }
        self.value.as_deref_mut()
    }

    /// Point at a new value; the digest is cleared until the next save.
    pub fn set_value(&mut self, value: Record) {
        self.digest = Digest::zero();
        self.value = Some(Box::new(value));
    }

    /// Keep `value` as the loaded form of the stored target.
    pub fn attach(&mut self, value: Record) {
        self.value = Some(Box::new(value));
    }

    /// Make the reference empty.
    pub fn clear(&mut self) {
        self.digest = Digest::zero();
        self.value = None;
    }
}

impl PartialEq for Ref {
    /// Stored references compare by digest; pending ones by value.
    fn eq(&self, other: &Self) -> bool {
        if self.digest.is_zero() && other.digest.is_zero() {
            self.value == other.value
        } else {
            self.digest == other.digest
        }
    }
}

/// Ordered collection of references to objects of one schema.
///
/// `root` is the digest of the stored tree that holds the element digests.
/// It is zero for an empty collection and after any mutation, until the
/// collection is saved again. A decoded collection knows only its root until
/// its elements are loaded.
#[derive(Clone, Debug)]
pub struct Refs {
    root: Digest,
    items: Vec<Ref>,
    loaded: bool,
}

impl Refs {
    /// An empty collection.
    pub fn new() -> Self {
        Self {
            root: Digest::zero(),
            items: Vec::new(),
            loaded: true,
        }
    }

    /// A collection of values that have not been saved yet.
    pub fn from_values(values: impl IntoIterator<Item = Record>) -> Self {
        Self {
            items: values.into_iter().map(Ref::pending).collect(),
            ..Self::new()
        }
    }

    /// A collection of already stored objects.
    pub fn from_digests(digests: impl IntoIterator<Item = Digest>) -> Self {
        Self {
            items: digests.into_iter().map(Ref::stored).collect(),
            ..Self::new()
        }
    }

    /// A collection known only by the digest of its stored tree.
    pub fn unloaded(root: Digest) -> Self {
        Self {
            root,
            items: Vec::new(),
            loaded: root.is_zero(),
        }
    }

    /// Digest of the stored tree; zero when empty or modified since saving.
    pub fn root(&self) -> Digest {
        self.root
    }

    /// Record the digest of the stored tree.
    pub fn set_root(&mut self, root: Digest) {
        self.root = root;
    }

    /// Whether the element list is in memory.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Fill in the element digests of a stored collection.
    pub fn set_loaded(&mut self, digests: Vec<Digest>) {
        self.items = digests.into_iter().map(Ref::stored).collect();
        self.loaded = true;
    }

    /// Whether the collection has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.root.is_zero() && !self.items.is_empty()
    }

    /// Number of loaded elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_zero() && self.items.is_empty()
    }

    pub fn items(&self) -> &[Ref] {
        &self.items
    }

    /// Mutable access to the loaded elements. The root is cleared, so any
    /// change made through the slice is saved.
    pub fn items_mut(&mut self) -> &mut [Ref] {
        if self.loaded {
            self.root = Digest::zero();
        }
        &mut self.items
    }

    /// Element digests, in order. Pending elements contribute zero.
    pub fn digests(&self) -> Vec<Digest> {
        self.items.iter().map(Ref::digest).collect()
    }

    /// Append a value. The collection must be loaded.
    pub fn push(&mut self, value: Record) -> SchemaResult<()> {
        self.touch()?;
        self.items.push(Ref::pending(value));
        Ok(())
    }

    /// Append a stored object. The collection must be loaded.
    pub fn push_digest(&mut self, digest: Digest) -> SchemaResult<()> {
        self.touch()?;
        self.items.push(Ref::stored(digest));
        Ok(())
    }

    /// Remove and return the element at `index`, or `None` past the end.
    pub fn remove(&mut self, index: usize) -> SchemaResult<Option<Ref>> {
        if !self.loaded {
            return Err(SchemaError::NotLoaded(self.root));
        }
        if index >= self.items.len() {
            return Ok(None);
        }
        self.root = Digest::zero();
        Ok(Some(self.items.remove(index)))
    }

    fn touch(&mut self) -> SchemaResult<()> {
        if !self.loaded {
            return Err(SchemaError::NotLoaded(self.root));
        }
        self.root = Digest::zero();
        Ok(())
    }
}

impl Default for Refs {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Refs {
    fn eq(&self, other: &Self) -> bool {
        if self.root.is_zero() && other.root.is_zero() {
            self.items == other.items
        } else {
            self.root == other.root
        }
    }
}

/// Reference that carries the schema name of its target.
#[derive(Clone, Debug, Default)]
pub struct Dynamic {
    schema: String,
    digest: Digest,
    value: Option<Box<Record>>,
}

impl Dynamic {
    /// The empty dynamic reference.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A value of schema `schema` that has not been saved yet.
    pub fn pending(schema: impl Into<String>, value: Record) -> Self {
        Self {
            schema: schema.into(),
            digest: Digest::zero(),
            value: Some(Box::new(value)),
        }
    }

    /// A stored object of schema `schema`.
    pub fn stored(schema: impl Into<String>, digest: Digest) -> Self {
        Self {
            schema: schema.into(),
            digest,
            value: None,
        }
    }

    /// Empty means no schema name, no digest and no value. The digest of an
    /// empty dynamic reference is never resolved.
    pub fn is_empty(&self) -> bool {
        self.schema.is_empty() && self.digest.is_zero() && self.value.is_none()
    }

    pub fn is_pending(&self) -> bool {
        self.digest.is_zero() && self.value.is_some()
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    pub fn set_digest(&mut self, digest: Digest) {
        self.digest = digest;
    }

    pub fn value(&self) -> Option<&Record> {
        self.value.as_deref()
    }

    /// Like [`Ref::value_mut`], editing clears the digest.
    pub fn value_mut(&mut self) -> Option<&mut Record> {
        if self.value.is_some() {
            self.digest = Digest::zero();
        }
        self.value.as_deref_mut()
    }

    /// Keep `value` as the loaded form of the stored target.
    pub fn attach(&mut self, value: Record) {
        self.value = Some(Box::new(value));
    }
}

impl PartialEq for Dynamic {
    fn eq(&self, other: &Self) -> bool {
        if self.schema != other.schema {
            return false;
        }
        if self.digest.is_zero() && other.digest.is_zero() {
            self.value == other.value
        } else {
            self.digest == other.digest
        }
    }
}
