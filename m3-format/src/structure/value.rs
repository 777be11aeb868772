use serde::{Serialize, Serializer};

use super::Record;
use crate::error::ValidationError;

/// Structures that serve as references into another section
pub const REFERENCE_STRUCTURES: &[&str] = &["Reference", "SmallReference"];

/// Decoded value of one field, or one element of a primitive section
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f32),
    Bytes(Vec<u8>),
    Record(Record),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::Record(_) => "record",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
}

/// Floats compare by bit pattern so NaN payloads survive equality checks
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

impl_from_int!(i8, u8, i16, u16, i32, u32, i64);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Bytes(v) => serializer.serialize_str(&hex::encode(v)),
            Value::Record(r) => r.serialize(serializer),
        }
    }
}

/// Contents of a `Reference` / `SmallReference` record.
///
/// `index` is a position in the section list; `entries` is the element
/// count of the target section. `flags` only exists in the 12-byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Reference {
    pub entries: u32,
    pub index: u32,
    pub flags: u32,
}

impl Reference {
    pub const NULL: Reference = Reference {
        entries: 0,
        index: 0,
        flags: 0,
    };

    pub fn new(entries: u32, index: u32) -> Self {
        Self {
            entries,
            index,
            flags: 0,
        }
    }

    /// Points at nothing
    pub fn is_null(&self) -> bool {
        self.entries == 0 && self.index == 0
    }

    pub fn from_record(record: &Record) -> Result<Self, ValidationError> {
        let flags = match record.get("flags") {
            Some(_) => record.int("flags")? as u32,
            None => 0,
        };
        Ok(Self {
            entries: record.int("entries")? as u32,
            index: record.int("index")? as u32,
            flags,
        })
    }

    /// Store this reference into a reference record
    pub(crate) fn store(&self, record: &mut Record) -> Result<(), ValidationError> {
        record.set("entries", self.entries)?;
        record.set("index", self.index)?;
        if record.get("flags").is_some() {
            record.set("flags", self.flags)?;
        }
        Ok(())
    }
}
