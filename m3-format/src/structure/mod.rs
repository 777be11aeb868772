//! Resolved structure descriptions and the records they decode into

mod record;
mod value;


use std::fmt::Write as _;
use std::sync::Arc;

pub use record::Record;
pub use value::{REFERENCE_STRUCTURES, Reference, Value};

use crate::error::{DecodeError, ValidationError};
use crate::field::Field;
use crate::schema::StructureHistory;

/// Offset listing of a field sequence, one field per line
pub fn layout_listing(fields: &[Field]) -> String {
    let mut out = String::new();
    let mut offset = 0;
    for field in fields {
        let _ = writeln!(
            out,
            "{offset:#06x}  {:<40} {:<28} {:>4}",
            field.name(),
            field.type_name(),
            field.size()
        );
        offset += field.size();
    }
    let _ = write!(out, "{offset:#06x}  (end)");
    out
}

/// One revision of a structure resolved under one dialect
#[derive(Debug)]
pub struct StructureDescription {
    history: Arc<StructureHistory>,
    version: u32,
    fields: Vec<Field>,
    size: usize,
}

/// Descriptions are equal when they describe the same revision of the same history
impl PartialEq for StructureDescription {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.history, &other.history) && self.version == other.version
    }
}

impl StructureDescription {
    pub(crate) fn new(history: Arc<StructureHistory>, version: u32, fields: Vec<Field>) -> Self {
        let size = fields.iter().map(Field::size).sum();
        Self {
            history,
            version,
            fields,
            size,
        }
    }

    pub fn history(&self) -> &Arc<StructureHistory> {
        &self.history
    }

    pub fn name(&self) -> &str {
        self.history.name()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// `NAMEV<version>`, the form used in field types
    pub fn full_name(&self) -> String {
        format!("{}V{}", self.name(), self.version)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Size of one record in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_primitive(&self) -> bool {
        self.history.is_primitive()
    }

    pub fn is_reference(&self) -> bool {
        REFERENCE_STRUCTURES.contains(&self.name())
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Field at a dotted path through nested structures
    pub fn field_at_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Field> {
        let (first, rest) = path.split_first()?;
        let field = self.field(first.as_ref())?;
        if rest.is_empty() {
            Some(field)
        } else {
            field.as_structure()?.description.field_at_path(rest)
        }
    }

    /// Offset listing of this description
    pub fn layout(&self) -> String {
        layout_listing(&self.fields)
    }

    /// New record holding every field's default
    pub fn instantiate(self: &Arc<Self>) -> Record {
        let values = self.fields.iter().map(Field::default_value).collect();
        Record::from_parts(self.clone(), values)
    }

    /// Default element of a section of this structure: a bare value for
    /// primitives, a record otherwise
    pub fn default_value(self: &Arc<Self>) -> Value {
        match (self.is_primitive(), self.fields.first()) {
            (true, Some(field)) => field.default_value(),
            _ => Value::Record(self.instantiate()),
        }
    }

    /// Decode one record starting at `offset`
    pub fn decode_record(self: &Arc<Self>, buf: &[u8], offset: usize) -> Result<Record, DecodeError> {
        self.decode_record_at(buf, offset, self.name())
    }

    pub(crate) fn decode_record_at(
        self: &Arc<Self>,
        buf: &[u8],
        offset: usize,
        path: &str,
    ) -> Result<Record, DecodeError> {
        self.check_len(buf, offset, self.size, path)?;
        let mut values = Vec::with_capacity(self.fields.len());
        let mut at = offset;
        for field in &self.fields {
            values.push(field.decode(buf, at, path)?);
            at += field.size();
        }
        Ok(Record::from_parts(self.clone(), values))
    }

    /// Decode `count` consecutive elements from the start of `buf`.
    ///
    /// Primitive structures yield bare numerals, everything else yields
    /// [`Value::Record`]s.
    pub fn decode_many(self: &Arc<Self>, buf: &[u8], count: usize) -> Result<Vec<Value>, DecodeError> {
        let name = self.name();
        self.check_len(buf, 0, self.size * count, name)?;

        let scalar = match (self.is_primitive(), self.fields.as_slice()) {
            (true, [field]) => Some(field),
            _ => None,
        };
        (0..count)
            .map(|i| match scalar {
                Some(field) => field.decode(buf, i * self.size, name),
                None => self
                    .decode_record_at(buf, i * self.size, name)
                    .map(Value::Record),
            })
            .collect()
    }

    fn check_len(&self, buf: &[u8], offset: usize, needed: usize, path: &str) -> Result<(), DecodeError> {
        if buf.len() < offset + needed {
            return Err(DecodeError::BufferTooShort {
                path: path.to_string(),
                offset,
                needed,
                available: buf.len().saturating_sub(offset),
            });
        }
        Ok(())
    }

    /// Encode a sequence of section elements into `size * len` bytes
    pub fn encode(&self, values: &[Value]) -> Result<Vec<u8>, ValidationError> {
        let mut buf = vec![0u8; self.size * values.len()];
        for (i, value) in values.iter().enumerate() {
            let offset = i * self.size;
            match (self.is_primitive(), value) {
                (_, Value::Record(record)) => {
                    self.check_record(record, self.name())?;
                    self.encode_record_into(record, &mut buf, offset, self.name())?;
                }
                (true, value) if self.fields.len() == 1 => {
                    self.fields[0].encode(value, &mut buf, offset, self.name())?;
                }
                (_, value) => {
                    return Err(ValidationError::WrongType {
                        path: format!("{}[{i}]", self.name()),
                        expected: "record",
                        actual: value.kind_name(),
                    });
                }
            }
        }
        Ok(buf)
    }

    pub(crate) fn encode_record_into(
        &self,
        record: &Record,
        buf: &mut [u8],
        offset: usize,
        path: &str,
    ) -> Result<(), ValidationError> {
        if record.values().len() != self.fields.len() {
            return Err(ValidationError::FieldCount {
                path: path.to_string(),
                expected: self.fields.len(),
                actual: record.values().len(),
            });
        }
        let mut at = offset;
        for (field, value) in self.fields.iter().zip(record.values()) {
            field.encode(value, buf, at, path)?;
            at += field.size();
        }
        Ok(())
    }

    fn check_record(&self, record: &Record, path: &str) -> Result<(), ValidationError> {
        if record.description().as_ref() != self {
            return Err(ValidationError::TypeMismatch {
                path: path.to_string(),
                expected: self.full_name(),
                actual: record.description().full_name(),
            });
        }
        Ok(())
    }

    /// Check that `value` is a valid element of a section of this structure
    pub fn validate_value(&self, value: &Value, path: &str) -> Result<(), ValidationError> {
        match value {
            Value::Record(record) => {
                self.check_record(record, path)?;
                record.validate(path)
            }
            value if self.is_primitive() && self.fields.len() == 1 => {
                self.fields[0].validate(value, path)
            }
            value => Err(ValidationError::WrongType {
                path: path.to_string(),
                expected: "record",
                actual: value.kind_name(),
            }),
        }
    }
}
