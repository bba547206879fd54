//! Deterministic binary encoding of records.
//!
//! Fields are written in schema order with no tags or names; skipped fields
//! are not written at all. Everything is little-endian:
//!
//! | Kind | Encoding |
//! |---|---|
//! | `bool` | 1 byte, `0` or `1` |
//! | integers, floats | fixed width (floats by bit pattern) |
//! | `string`, `bytes` | `u32` length, then the bytes |
//! | `list<T>` | `u32` count, then each element |
//! | `struct<S>` | the fields of `S`, inline |
//! | `ref<S>` | 32-byte digest, zero when empty |
//! | `refs<S>` | 32-byte digest of the stored tree, zero when empty |
//! | `dynamic` | `u32` name length, name, 32-byte digest |
//!
//! Decoding is strict: the bytes must describe exactly one value.

use cxo_types::Digest;

use crate::error::{SchemaError, SchemaResult};
use crate::kind::Kind;
use crate::registry::Registry;
use crate::schema::Schema;
use crate::value::{Dynamic, Record, Ref, Refs, Value};

pub(crate) fn encode_record(
    registry: &Registry,
    schema: &Schema,
    record: &Record,
    out: &mut Vec<u8>,
) -> SchemaResult<()> {
    if record.len() != schema.fields().len() {
        return Err(SchemaError::ArityMismatch {
            schema: schema.name().to_owned(),
            expected: schema.fields().len(),
            actual: record.len(),
        });
    }
    for (field, (name, value)) in schema.fields().iter().zip(record.fields()) {
        if field.name != *name {
            return Err(SchemaError::FieldName {
                schema: schema.name().to_owned(),
                expected: field.name.clone(),
                found: name.clone(),
            });
        }
        if field.skip {
            continue;
        }
        encode_value(registry, &field.name, &field.kind, value, out)?;
    }
    Ok(())
}

fn encode_value(
    registry: &Registry,
    field: &str,
    kind: &Kind,
    value: &Value,
    out: &mut Vec<u8>,
) -> SchemaResult<()> {
    match (kind, value) {
        (Kind::Bool, Value::Bool(v)) => out.push(u8::from(*v)),
        (Kind::U8, Value::U8(v)) => out.push(*v),
        (Kind::U16, Value::U16(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (Kind::U32, Value::U32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (Kind::U64, Value::U64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (Kind::I8, Value::I8(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (Kind::I16, Value::I16(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (Kind::I32, Value::I32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (Kind::I64, Value::I64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (Kind::F32, Value::F32(v)) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
        (Kind::F64, Value::F64(v)) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
        (Kind::String, Value::String(s)) => put_bytes(field, s.as_bytes(), out)?,
        (Kind::Bytes, Value::Bytes(b)) => put_bytes(field, b, out)?,
        (Kind::List(elem), Value::List(items)) => {
            put_len(field, items.len(), out)?;
            for item in items {
                encode_value(registry, field, elem, item, out)?;
            }
        }
        (Kind::Struct(name), Value::Struct(record)) => {
            let nested = registry.require(name)?;
            encode_record(registry, &nested, record, out)?;
        }
        (Kind::Ref(_), Value::Ref(r)) => {
            if r.is_pending() {
                return Err(SchemaError::UnsavedReference(field.to_owned()));
            }
            out.extend_from_slice(r.digest().as_bytes());
        }
        (Kind::Refs(_), Value::Refs(refs)) => {
            if refs.is_dirty() {
                return Err(SchemaError::UnsavedReference(field.to_owned()));
            }
            out.extend_from_slice(refs.root().as_bytes());
        }
        (Kind::Dynamic, Value::Dynamic(d)) => {
            if d.is_pending() {
                return Err(SchemaError::UnsavedReference(field.to_owned()));
            }
            if d.schema().is_empty() != d.digest().is_zero() {
                return Err(SchemaError::Malformed(format!(
                    "field {field}: dynamic reference needs both a schema name and a digest"
                )));
            }
            put_bytes(field, d.schema().as_bytes(), out)?;
            out.extend_from_slice(d.digest().as_bytes());
        }
        (kind, value) => {
            return Err(SchemaError::TypeMismatch {
                field: field.to_owned(),
                expected: kind.to_string(),
                found: value.type_name().to_owned(),
            })
        }
    }
    Ok(())
}

fn put_len(field: &str, len: usize, out: &mut Vec<u8>) -> SchemaResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| SchemaError::Malformed(format!("field {field}: length {len} exceeds u32")))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn put_bytes(field: &str, bytes: &[u8], out: &mut Vec<u8>) -> SchemaResult<()> {
    put_len(field, bytes.len(), out)?;
    out.extend_from_slice(bytes);
    Ok(())
}

/// Cursor over encoded bytes.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fail unless every byte has been consumed.
    pub(crate) fn finish(&self) -> SchemaResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(SchemaError::TrailingBytes(n)),
        }
    }

    fn take(&mut self, n: usize) -> SchemaResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(SchemaError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> SchemaResult<[u8; N]> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N)?);
        Ok(arr)
    }

    fn read_len(&mut self) -> SchemaResult<usize> {
        Ok(u32::from_le_bytes(self.array()?) as usize)
    }

    fn bytes(&mut self) -> SchemaResult<&'a [u8]> {
        let len = self.read_len()?;
        self.take(len)
    }

    fn string(&mut self, field: &str) -> SchemaResult<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| SchemaError::Malformed(format!("field {field}: invalid UTF-8")))
    }

    fn digest(&mut self) -> SchemaResult<Digest> {
        Ok(Digest::from_hash(self.array()?))
    }
}

pub(crate) fn decode_record(
    registry: &Registry,
    schema: &Schema,
    reader: &mut Reader<'_>,
) -> SchemaResult<Record> {
    let mut record = Record::new();
    for field in schema.fields() {
        let value = if field.skip {
            zero_value(registry, &field.kind)?
        } else {
            decode_value(registry, &field.name, &field.kind, reader)?
        };
        record.push(field.name.clone(), value);
    }
    Ok(record)
}

fn decode_value(
    registry: &Registry,
    field: &str,
    kind: &Kind,
    r: &mut Reader<'_>,
) -> SchemaResult<Value> {
    let value = match kind {
        Kind::Bool => match r.array::<1>()?[0] {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => {
                return Err(SchemaError::Malformed(format!(
                    "field {field}: invalid bool byte {other}"
                )))
            }
        },
        Kind::U8 => Value::U8(r.array::<1>()?[0]),
        Kind::U16 => Value::U16(u16::from_le_bytes(r.array()?)),
        Kind::U32 => Value::U32(u32::from_le_bytes(r.array()?)),
        Kind::U64 => Value::U64(u64::from_le_bytes(r.array()?)),
        Kind::I8 => Value::I8(i8::from_le_bytes(r.array()?)),
        Kind::I16 => Value::I16(i16::from_le_bytes(r.array()?)),
        Kind::I32 => Value::I32(i32::from_le_bytes(r.array()?)),
        Kind::I64 => Value::I64(i64::from_le_bytes(r.array()?)),
        Kind::F32 => Value::F32(f32::from_bits(u32::from_le_bytes(r.array()?))),
        Kind::F64 => Value::F64(f64::from_bits(u64::from_le_bytes(r.array()?))),
        Kind::String => Value::String(r.string(field)?),
        Kind::Bytes => Value::Bytes(r.bytes()?.to_vec()),
        Kind::List(elem) => {
            let count = r.read_len()?;
            // no preallocation: `count` is untrusted
            let mut items = Vec::new();
            for _ in 0..count {
                items.push(decode_value(registry, field, elem, r)?);
            }
            Value::List(items)
        }
        Kind::Struct(name) => {
            let nested = registry.require(name)?;
            Value::Struct(decode_record(registry, &nested, r)?)
        }
        Kind::Ref(_) => Value::Ref(Ref::stored(r.digest()?)),
        Kind::Refs(_) => Value::Refs(Refs::unloaded(r.digest()?)),
        Kind::Dynamic => {
            let schema = r.string(field)?;
            let digest = r.digest()?;
            if schema.is_empty() != digest.is_zero() {
                return Err(SchemaError::Malformed(format!(
                    "field {field}: dynamic reference needs both a schema name and a digest"
                )));
            }
            if schema.is_empty() {
                Value::Dynamic(Dynamic::empty())
            } else {
                Value::Dynamic(Dynamic::stored(schema, digest))
            }
        }
    };
    Ok(value)
}

/// The value a skipped field decodes to.
pub(crate) fn zero_value(registry: &Registry, kind: &Kind) -> SchemaResult<Value> {
    Ok(match kind {
        Kind::Bool => Value::Bool(false),
        Kind::U8 => Value::U8(0),
        Kind::U16 => Value::U16(0),
        Kind::U32 => Value::U32(0),
        Kind::U64 => Value::U64(0),
        Kind::I8 => Value::I8(0),
        Kind::I16 => Value::I16(0),
        Kind::I32 => Value::I32(0),
        Kind::I64 => Value::I64(0),
        Kind::F32 => Value::F32(0.0),
        Kind::F64 => Value::F64(0.0),
        Kind::String => Value::String(String::new()),
        Kind::Bytes => Value::Bytes(Vec::new()),
        Kind::List(_) => Value::List(Vec::new()),
        Kind::Struct(name) => {
            let nested = registry.require(name)?;
            let mut record = Record::new();
            for field in nested.fields() {
                record.push(field.name.clone(), zero_value(registry, &field.kind)?);
            }
            Value::Struct(record)
        }
        Kind::Ref(_) => Value::Ref(Ref::empty()),
        Kind::Refs(_) => Value::Refs(Refs::new()),
        Kind::Dynamic => Value::Dynamic(Dynamic::empty()),
    })
}
