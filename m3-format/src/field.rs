//! Field codecs
//!
//! A [`Field`] is one named, fixed-size slot of a structure description.
//! Fields are laid out back to back with no padding; each variant knows its
//! wire size and how to decode, encode and validate its value.
//!
//! Decoding assumes the caller has already checked that the buffer holds
//! the whole record, so individual fields never bounds-check.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{DecodeError, ValidationError};
use crate::structure::{StructureDescription, Value};

/// Named mask over the bits of an integer field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMask {
    name: String,
    mask: u64,
}

impl BitMask {
    pub fn new(name: &str, mask: i64) -> Self {
        Self {
            name: name.to_string(),
            mask: mask as u64,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }
}

/// Integer of 8, 16 or 32 bits
#[derive(Debug, Clone)]
pub struct IntField {
    pub signed: bool,
    pub bits: u8,
    pub default: i64,
    pub expected: Option<i64>,
    pub masks: Vec<BitMask>,
}

impl IntField {
    pub fn size(&self) -> usize {
        self.bits as usize / 8
    }

    /// Smallest value the field can hold
    pub fn min(&self) -> i64 {
        if self.signed {
            -(1i64 << (self.bits - 1))
        } else {
            0
        }
    }

    /// Largest value the field can hold
    pub fn max(&self) -> i64 {
        if self.signed {
            (1i64 << (self.bits - 1)) - 1
        } else {
            (1i64 << self.bits) - 1
        }
    }

    pub fn mask(&self, name: &str) -> Option<u64> {
        self.masks.iter().find(|m| m.name == name).map(|m| m.mask)
    }

    fn read(&self, buf: &[u8]) -> i64 {
        match (self.bits, self.signed) {
            (8, false) => buf[0] as i64,
            (8, true) => buf[0] as i8 as i64,
            (16, false) => LittleEndian::read_u16(buf) as i64,
            (16, true) => LittleEndian::read_i16(buf) as i64,
            (_, false) => LittleEndian::read_u32(buf) as i64,
            (_, true) => LittleEndian::read_i32(buf) as i64,
        }
    }

    fn write(&self, value: i64, buf: &mut [u8]) {
        match self.bits {
            8 => buf[0] = value as u8,
            16 => LittleEndian::write_u16(buf, value as u16),
            _ => LittleEndian::write_u32(buf, value as u32),
        }
    }

    fn check_range(&self, value: i64, path: impl FnOnce() -> String) -> Result<(), ValidationError> {
        if value < self.min() || value > self.max() {
            return Err(ValidationError::OutOfRange {
                path: path(),
                value,
                min: self.min(),
                max: self.max(),
            });
        }
        Ok(())
    }
}

/// 32-bit IEEE float
#[derive(Debug, Clone)]
pub struct FloatField {
    pub default: f32,
    pub expected: Option<f32>,
}

/// One byte mapped onto `-1.0..=1.0`
#[derive(Debug, Clone)]
pub struct Fixed8Field {
    pub default: f32,
}

impl Fixed8Field {
    pub fn to_float(byte: u8) -> f32 {
        byte as f32 / 255.0 * 2.0 - 1.0
    }

    pub fn to_byte(value: f32) -> u8 {
        (((value + 1.0) / 2.0) * 255.0).round().clamp(0.0, 255.0) as u8
    }
}

/// Fixed-size block of raw bytes
#[derive(Debug, Clone)]
pub struct BytesField {
    pub size: usize,
    pub default: Vec<u8>,
    pub expected: Option<Vec<u8>>,
}

/// Nested structure, optionally a reference into another section
#[derive(Debug, Clone)]
pub struct StructureField {
    pub description: Arc<StructureDescription>,
    /// Structure type (with revision suffix) the reference points at
    pub ref_to: Option<String>,
}

impl StructureField {
    pub fn is_reference(&self) -> bool {
        self.description.is_reference()
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Int(IntField),
    Float(FloatField),
    Fixed8(Fixed8Field),
    Bytes(BytesField),
    Structure(StructureField),
}

/// One named, typed slot of a structure description
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    kind: FieldKind,
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Wire size in bytes
    pub fn size(&self) -> usize {
        match &self.kind {
            FieldKind::Int(f) => f.size(),
            FieldKind::Float(_) => 4,
            FieldKind::Fixed8(_) => 1,
            FieldKind::Bytes(f) => f.size,
            FieldKind::Structure(f) => f.description.size(),
        }
    }

    /// Schema-level type name, used in layout listings
    pub fn type_name(&self) -> String {
        match &self.kind {
            FieldKind::Int(f) => format!("{}int{}", if f.signed { "" } else { "u" }, f.bits),
            FieldKind::Float(_) => "float".to_string(),
            FieldKind::Fixed8(_) => "fixed8".to_string(),
            FieldKind::Bytes(f) => format!("bytes[{}]", f.size),
            FieldKind::Structure(f) => f.description.full_name(),
        }
    }

    pub fn as_structure(&self) -> Option<&StructureField> {
        match &self.kind {
            FieldKind::Structure(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.as_structure().is_some_and(StructureField::is_reference)
    }

    /// Mask of a named bit, for integer fields that declare bits
    pub fn bit_mask(&self, bit: &str) -> Option<u64> {
        match &self.kind {
            FieldKind::Int(f) => f.mask(bit),
            _ => None,
        }
    }

    pub fn default_value(&self) -> Value {
        match &self.kind {
            FieldKind::Int(f) => Value::Int(f.default),
            FieldKind::Float(f) => Value::Float(f.default),
            FieldKind::Fixed8(f) => Value::Float(f.default),
            FieldKind::Bytes(f) => Value::Bytes(f.default.clone()),
            FieldKind::Structure(f) => Value::Record(f.description.instantiate()),
        }
    }

    /// Decode the field at `offset`; `parent` prefixes the path in errors
    pub fn decode(&self, buf: &[u8], offset: usize, parent: &str) -> Result<Value, DecodeError> {
        let bytes = &buf[offset..];
        let unexpected = |expected: String, actual: String| DecodeError::UnexpectedValue {
            path: join(parent, &self.name),
            expected,
            actual,
        };

        match &self.kind {
            FieldKind::Int(f) => {
                let value = f.read(bytes);
                if let Some(expected) = f.expected {
                    if value != expected {
                        return Err(unexpected(expected.to_string(), value.to_string()));
                    }
                }
                Ok(Value::Int(value))
            }
            FieldKind::Float(f) => {
                let value = LittleEndian::read_f32(bytes);
                if let Some(expected) = f.expected {
                    if value != expected {
                        return Err(unexpected(expected.to_string(), value.to_string()));
                    }
                }
                Ok(Value::Float(value))
            }
            FieldKind::Fixed8(_) => Ok(Value::Float(Fixed8Field::to_float(bytes[0]))),
            FieldKind::Bytes(f) => {
                let value = bytes[..f.size].to_vec();
                if let Some(expected) = &f.expected {
                    if &value != expected {
                        return Err(unexpected(hex::encode(expected), hex::encode(&value)));
                    }
                }
                Ok(Value::Bytes(value))
            }
            FieldKind::Structure(f) => f
                .description
                .decode_record_at(buf, offset, &join(parent, &self.name))
                .map(Value::Record),
        }
    }

    /// Encode `value` at `offset`; the buffer must hold the whole record
    pub fn encode(
        &self,
        value: &Value,
        buf: &mut [u8],
        offset: usize,
        parent: &str,
    ) -> Result<(), ValidationError> {
        let path = || join(parent, &self.name);

        match (&self.kind, value) {
            (FieldKind::Int(f), Value::Int(v)) => {
                f.check_range(*v, path)?;
                f.write(*v, &mut buf[offset..]);
            }
            (FieldKind::Float(_), Value::Float(v)) => {
                LittleEndian::write_f32(&mut buf[offset..], *v);
            }
            (FieldKind::Fixed8(_), Value::Float(v)) => {
                buf[offset] = Fixed8Field::to_byte(*v);
            }
            (FieldKind::Bytes(f), Value::Bytes(bytes)) => {
                if bytes.len() != f.size {
                    return Err(ValidationError::WrongLength {
                        path: path(),
                        expected: f.size,
                        actual: bytes.len(),
                    });
                }
                buf[offset..offset + f.size].copy_from_slice(bytes);
            }
            (FieldKind::Structure(f), Value::Record(record)) => {
                if record.description() != &f.description {
                    return Err(ValidationError::TypeMismatch {
                        path: path(),
                        expected: f.description.full_name(),
                        actual: record.description().full_name(),
                    });
                }
                f.description.encode_record_into(record, buf, offset, &path())?;
            }
            (_, value) => return Err(self.wrong_type(value, path())),
        }
        Ok(())
    }

    /// Check that `value` fits this field; nested records are checked recursively
    pub fn validate(&self, value: &Value, parent: &str) -> Result<(), ValidationError> {
        let path = || join(parent, &self.name);

        match (&self.kind, value) {
            (FieldKind::Int(f), Value::Int(v)) => f.check_range(*v, path),
            (FieldKind::Float(_), Value::Float(_)) => Ok(()),
            (FieldKind::Fixed8(_), Value::Float(v)) => {
                if (-1.0..=1.0).contains(v) {
                    Ok(())
                } else {
                    Err(ValidationError::Fixed8OutOfRange {
                        path: path(),
                        value: *v,
                    })
                }
            }
            (FieldKind::Bytes(f), Value::Bytes(bytes)) => {
                if bytes.len() == f.size {
                    Ok(())
                } else {
                    Err(ValidationError::WrongLength {
                        path: path(),
                        expected: f.size,
                        actual: bytes.len(),
                    })
                }
            }
            (FieldKind::Structure(f), Value::Record(record)) => {
                if record.description() != &f.description {
                    return Err(ValidationError::TypeMismatch {
                        path: path(),
                        expected: f.description.full_name(),
                        actual: record.description().full_name(),
                    });
                }
                record.validate(&path())
            }
            (_, value) => Err(self.wrong_type(value, path())),
        }
    }

    fn wrong_type(&self, value: &Value, path: String) -> ValidationError {
        let expected = match &self.kind {
            FieldKind::Int(_) => "integer",
            FieldKind::Float(_) | FieldKind::Fixed8(_) => "float",
            FieldKind::Bytes(_) => "bytes",
            FieldKind::Structure(_) => "record",
        };
        ValidationError::WrongType {
            path,
            expected,
            actual: value.kind_name(),
        }
    }
}
