use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::{Reference, StructureDescription, Value};
use crate::error::ValidationError;
use crate::field::Field;

/// Decoded instance of a structure description.
///
/// Holds one value per field, in field order. Records are plain data: they
/// can be edited freely and are only checked against their description when
/// validated or encoded.
#[derive(Debug, Clone)]
pub struct Record {
    description: Arc<StructureDescription>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn from_parts(description: Arc<StructureDescription>, values: Vec<Value>) -> Self {
        Self {
            description,
            values,
        }
    }

    pub fn description(&self) -> &Arc<StructureDescription> {
        &self.description
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Field descriptors paired with their values
    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.description.fields().iter().zip(self.values.iter())
    }

    /// Whether this record is a `Reference` / `SmallReference`
    pub fn is_reference(&self) -> bool {
        self.description.is_reference()
    }

    fn path(&self, name: &str) -> String {
        format!("{}.{}", self.description.name(), name)
    }

    fn unknown(&self, name: &str) -> ValidationError {
        ValidationError::UnknownField {
            path: self.path(name),
        }
    }

    fn wrong_type(&self, name: &str, expected: &'static str, value: &Value) -> ValidationError {
        ValidationError::WrongType {
            path: self.path(name),
            expected,
            actual: value.kind_name(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.description.field_index(name)?;
        self.values.get(index)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        let index = self.description.field_index(name)?;
        self.values.get_mut(index)
    }

    /// Replace the value of a field. Types are checked on validation.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ValidationError> {
        let index = self
            .description
            .field_index(name)
            .ok_or_else(|| self.unknown(name))?;
        self.values[index] = value.into();
        Ok(())
    }

    pub fn int(&self, name: &str) -> Result<i64, ValidationError> {
        let value = self.get(name).ok_or_else(|| self.unknown(name))?;
        value
            .as_int()
            .ok_or_else(|| self.wrong_type(name, "integer", value))
    }

    pub fn float(&self, name: &str) -> Result<f32, ValidationError> {
        let value = self.get(name).ok_or_else(|| self.unknown(name))?;
        value
            .as_float()
            .ok_or_else(|| self.wrong_type(name, "float", value))
    }

    pub fn bytes(&self, name: &str) -> Result<&[u8], ValidationError> {
        let value = self.get(name).ok_or_else(|| self.unknown(name))?;
        value
            .as_bytes()
            .ok_or_else(|| self.wrong_type(name, "bytes", value))
    }

    pub fn record(&self, name: &str) -> Result<&Record, ValidationError> {
        let value = self.get(name).ok_or_else(|| self.unknown(name))?;
        value
            .as_record()
            .ok_or_else(|| self.wrong_type(name, "record", value))
    }

    pub fn record_mut(&mut self, name: &str) -> Result<&mut Record, ValidationError> {
        let index = self
            .description
            .field_index(name)
            .ok_or_else(|| self.unknown(name))?;
        let path = self.path(name);
        match &mut self.values[index] {
            Value::Record(record) => Ok(record),
            other => Err(ValidationError::WrongType {
                path,
                expected: "record",
                actual: other.kind_name(),
            }),
        }
    }

    /// Value of a reference field
    pub fn reference(&self, name: &str) -> Result<Reference, ValidationError> {
        Reference::from_record(self.record(name)?)
    }

    fn mask(&self, field: &str, bit: &str) -> Result<u64, ValidationError> {
        let descriptor = self
            .description
            .field(field)
            .ok_or_else(|| self.unknown(field))?;
        descriptor
            .bit_mask(bit)
            .ok_or_else(|| ValidationError::UnknownBit {
                path: self.path(field),
                bit: bit.to_string(),
            })
    }

    /// Test a named bit of an integer field
    pub fn bit(&self, field: &str, bit: &str) -> Result<bool, ValidationError> {
        let mask = self.mask(field, bit)?;
        Ok(self.int(field)? as u64 & mask != 0)
    }

    /// Set or clear a named bit of an integer field
    pub fn set_bit(&mut self, field: &str, bit: &str, on: bool) -> Result<(), ValidationError> {
        let mask = self.mask(field, bit)?;
        let current = self.int(field)? as u64;
        let next = if on { current | mask } else { current & !mask };
        self.set(field, Value::Int(next as i64))
    }

    /// Value at a field path such as `["model", "entries"]`
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let value = self.get(first.as_ref())?;
        if rest.is_empty() {
            Some(value)
        } else {
            value.as_record()?.lookup(rest)
        }
    }

    pub fn lookup_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut Value> {
        let (first, rest) = path.split_first()?;
        let value = self.get_mut(first.as_ref())?;
        if rest.is_empty() {
            Some(value)
        } else {
            value.as_record_mut()?.lookup_mut(rest)
        }
    }

    /// Check every value against its field; `path` prefixes error paths
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        let fields = self.description.fields();
        if fields.len() != self.values.len() {
            return Err(ValidationError::FieldCount {
                path: path.to_string(),
                expected: fields.len(),
                actual: self.values.len(),
            });
        }
        for (field, value) in self.iter() {
            field.validate(value, path)?;
        }
        Ok(())
    }

    /// Every reference field reachable from this record, with its field path
    pub fn reference_fields(&self) -> Vec<(Vec<String>, Reference)> {
        let mut found = Vec::new();
        let mut prefix = Vec::new();
        self.collect_references(&mut prefix, &mut found);
        found
    }

    fn collect_references(&self, prefix: &mut Vec<String>, found: &mut Vec<(Vec<String>, Reference)>) {
        for (field, value) in self.iter() {
            let Value::Record(nested) = value else {
                continue;
            };
            prefix.push(field.name().to_string());
            if nested.is_reference() {
                if let Ok(reference) = Reference::from_record(nested) {
                    found.push((prefix.clone(), reference));
                }
            } else {
                nested.collect_references(prefix, found);
            }
            prefix.pop();
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.description == other.description && self.values == other.values
    }
}

/// Serialized as a map of field name to value
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.name(), value)?;
        }
        map.end()
    }
}
