use std::fmt;

use cxo_crypto::ContentHasher;
use cxo_types::Digest;
use serde::{Deserialize, Serialize};

use crate::kind::{Field, Kind};

/// Named, ordered list of fields. Field order is the encoding order.
///
/// Built explicitly with [`Schema::builder`]:
///
/// ```
/// use cxo_schema::{Kind, Schema};
///
/// let user = Schema::builder("cxo.User")
///     .field("Name", Kind::String)
///     .field("Age", Kind::U32)
///     .skip_field("Hidden", Kind::Bytes)
///     .build();
/// assert_eq!(user.fields().len(), 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
}

impl Schema {
    /// Start describing a schema called `name`.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fields, including skipped ones, in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Position of a field by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Fields that are encoded (everything not marked skip).
    pub fn persisted_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.skip)
    }

    /// Persisted fields that hold references.
    pub fn reference_fields(&self) -> impl Iterator<Item = &Field> {
        self.persisted_fields().filter(|f| f.kind.is_reference())
    }

    /// Structural fingerprint over the persisted fields.
    ///
    /// Deterministic and order-sensitive; the schema's own name is not part
    /// of it, so two registries describing the same layout agree.
    pub fn fingerprint(&self) -> Digest {
        let mut buf = Vec::new();
        for field in self.persisted_fields() {
            let kind = field.kind.to_string();
            buf.extend_from_slice(&(field.name.len() as u32).to_le_bytes());
            buf.extend_from_slice(field.name.as_bytes());
            buf.extend_from_slice(&(kind.len() as u32).to_le_bytes());
            buf.extend_from_slice(kind.as_bytes());
        }
        ContentHasher::SCHEMA.hash(&buf)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "struct {}", self.name)?;
        for field in &self.fields {
            let skip = if field.skip { " (skip)" } else { "" };
            writeln!(f, "  {} {}{}", field.name, field.kind, skip)?;
        }
        Ok(())
    }
}

/// Builder returned by [`Schema::builder`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<Field>,
}

impl SchemaBuilder {
    /// Append a persisted field.
    pub fn field(mut self, name: impl Into<String>, kind: Kind) -> Self {
        self.fields.push(Field::new(name, kind));
        self
    }

    /// Append a field that is neither encoded nor hashed.
    pub fn skip_field(mut self, name: impl Into<String>, kind: Kind) -> Self {
        self.fields.push(Field::skipped(name, kind));
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            name: self.name,
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> Schema {
        Schema::builder(name)
            .field("Name", Kind::String)
            .field("Age", Kind::U32)
            .build()
    }

    #[test]
    fn fingerprint_ignores_schema_name() {
        assert_eq!(user("cxo.User").fingerprint(), user("other.User").fingerprint());
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        let swapped = Schema::builder("cxo.User")
            .field("Age", Kind::U32)
            .field("Name", Kind::String)
            .build();
        assert_ne!(user("cxo.User").fingerprint(), swapped.fingerprint());
    }

    #[test]
    fn fingerprint_ignores_skipped_fields() {
        let with_hidden = Schema::builder("cxo.User")
            .field("Name", Kind::String)
            .field("Age", Kind::U32)
            .skip_field("Hidden", Kind::Bytes)
            .build();
        assert_eq!(with_hidden.fingerprint(), user("cxo.User").fingerprint());
    }

    #[test]
    fn fingerprint_sees_reference_targets() {
        let a = Schema::builder("g").field("Leader", Kind::reference("cxo.User")).build();
        let b = Schema::builder("g").field("Leader", Kind::reference("cxo.Developer")).build();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn reference_fields_skip_plain_ones() {
        let group = Schema::builder("cxo.Group")
            .field("Name", Kind::String)
            .field("Leader", Kind::reference("cxo.User"))
            .field("Members", Kind::references("cxo.User"))
            .field("Curator", Kind::Dynamic)
            .build();
        let names: Vec<_> = group.reference_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Leader", "Members", "Curator"]);
        assert_eq!(group.index_of("Members"), Some(2));
    }

    #[test]
    fn display_lists_fields() {
        let text = user("cxo.User").to_string();
        assert!(text.starts_with("struct cxo.User\n"));
        assert!(text.contains("Age u32"));
    }
}
