use std::fmt;

use serde::{Deserialize, Serialize};

/// Structural type of a schema field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    /// Variable-length list of one element kind. Reference kinds are not
    /// allowed as elements; use [`Kind::Refs`] for collections of objects.
    List(Box<Kind>),
    /// Nested struct, encoded inline, described by a registered schema.
    Struct(String),
    /// Single reference to an object of the named schema.
    Ref(String),
    /// Ordered collection of references to objects of the named schema.
    Refs(String),
    /// Reference carrying its own schema name.
    Dynamic,
}

impl Kind {
    /// Shorthand for `Kind::List(Box::new(elem))`.
    pub fn list(elem: Kind) -> Self {
        Self::List(Box::new(elem))
    }

    /// Shorthand for `Kind::Ref(schema.into())`.
    pub fn reference(schema: impl Into<String>) -> Self {
        Self::Ref(schema.into())
    }

    /// Shorthand for `Kind::Refs(schema.into())`.
    pub fn references(schema: impl Into<String>) -> Self {
        Self::Refs(schema.into())
    }

    /// Whether values of this kind point at other objects.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Ref(_) | Self::Refs(_) | Self::Dynamic)
    }

    /// Whether this kind is, or contains, a reference kind.
    pub fn contains_reference(&self) -> bool {
        match self {
            Self::List(elem) => elem.contains_reference(),
            other => other.is_reference(),
        }
    }

    /// Schema name of what a reference kind points at; the nested schema
    /// for a struct kind.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Struct(s) | Self::Ref(s) | Self::Refs(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::U8 => f.write_str("u8"),
            Self::U16 => f.write_str("u16"),
            Self::U32 => f.write_str("u32"),
            Self::U64 => f.write_str("u64"),
            Self::I8 => f.write_str("i8"),
            Self::I16 => f.write_str("i16"),
            Self::I32 => f.write_str("i32"),
            Self::I64 => f.write_str("i64"),
            Self::F32 => f.write_str("f32"),
            Self::F64 => f.write_str("f64"),
            Self::String => f.write_str("string"),
            Self::Bytes => f.write_str("bytes"),
            Self::List(elem) => write!(f, "list<{elem}>"),
            Self::Struct(s) => write!(f, "struct<{s}>"),
            Self::Ref(s) => write!(f, "ref<{s}>"),
            Self::Refs(s) => write!(f, "refs<{s}>"),
            Self::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// One named, typed field of a schema.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: Kind,
    /// Excluded from encoding and hashing; decodes as the kind's zero value.
    #[serde(default)]
    pub skip: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
            skip: false,
        }
    }

    pub fn skipped(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            skip: true,
            ..Self::new(name, kind)
        }
    }
}
