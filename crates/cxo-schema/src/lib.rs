//! Schemas, the schema registry, and the value codec for CXO objects.
//!
//! A [`Schema`] is an explicit, ordered description of a struct: each
//! [`Field`] has a name, a [`Kind`], and an optional skip flag. Reference
//! kinds ([`Kind::Ref`], [`Kind::Refs`], [`Kind::Dynamic`]) tell the
//! reference engine which fields point at other objects.
//!
//! The [`Registry`] indexes schemas by name and by structural fingerprint,
//! and encodes/decodes [`Record`]s with a deterministic little-endian codec.
//! It freezes on first decode.

mod codec;
pub mod error;
pub mod kind;
pub mod registry;
pub mod schema;
pub mod value;

pub use error::{SchemaError, SchemaResult};
pub use kind::{Field, Kind};
pub use registry::Registry;
pub use schema::{Schema, SchemaBuilder};
pub use value::{Dynamic, Record, Ref, Refs, Value};
