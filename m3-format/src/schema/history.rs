//! Structure histories: every revision of one named structure

use std::collections::BTreeMap;

use super::literal::{parse_float, parse_hex_bytes, parse_int};
use super::xml::{FieldElement, StructureElement};
use crate::error::SchemaError;
use crate::field::BitMask;

/// Structures whose sections hold bare numerals instead of records
pub const PRIMITIVE_STRUCTURES: &[&str] =
    &["CHAR", "U8__", "I16_", "U16_", "I32_", "U32_", "FLAG", "REAL"];

/// Split a field type name into structure name and revision.
///
/// `"BONEV1"` is revision 1 of `BONE`; a name without a `V<digits>` suffix
/// (`"VEC3"`) is revision 0.
pub fn split_type_name(type_name: &str) -> (&str, u32) {
    if let Some(pos) = type_name.rfind('V') {
        let (name, suffix) = (&type_name[..pos], &type_name[pos + 1..]);
        if !name.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(version) = suffix.parse() {
                return (name, version);
            }
        }
    }
    (type_name, 0)
}

/// Field as declared in the schema, before it is resolved for a revision
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldSpecKind,
    /// First revision containing the field (inclusive)
    pub since: Option<u32>,
    /// Last revision containing the field (inclusive)
    pub till: Option<u32>,
}

/// Intermediate, language-neutral field descriptor
#[derive(Debug, Clone)]
pub enum FieldSpecKind {
    Int {
        signed: bool,
        bits: u8,
        default: Option<i64>,
        expected: Option<i64>,
        masks: Vec<BitMask>,
    },
    Float {
        default: Option<f32>,
        expected: Option<f32>,
    },
    Fixed8 {
        default: Option<f32>,
    },
    Bytes {
        size: usize,
        default: Option<Vec<u8>>,
        expected: Option<Vec<u8>>,
    },
    Structure {
        type_name: String,
        ref_to: Option<String>,
    },
}

impl FieldSpec {
    /// Whether the field is part of the given revision
    pub fn applies_to(&self, version: u32) -> bool {
        self.since.is_none_or(|since| since <= version)
            && self.till.is_none_or(|till| version <= till)
    }

    /// Build a field descriptor from its schema element.
    ///
    /// `is_defined` answers whether a structure name was declared earlier;
    /// structure-typed fields must only use those.
    pub(crate) fn from_element(
        structure: &str,
        element: &FieldElement,
        is_defined: impl Fn(&str) -> bool,
    ) -> Result<Self, SchemaError> {
        let invalid = |literal: &str| SchemaError::InvalidLiteral {
            structure: structure.to_string(),
            field: element.name.clone(),
            literal: literal.to_string(),
        };
        let int_literal = |text: &Option<String>| -> Result<Option<i64>, SchemaError> {
            text.as_deref()
                .map(|t| parse_int(t).ok_or_else(|| invalid(t)))
                .transpose()
        };
        let float_literal = |text: &Option<String>| -> Result<Option<f32>, SchemaError> {
            text.as_deref()
                .map(|t| parse_float(t).ok_or_else(|| invalid(t)))
                .transpose()
        };

        let int = |signed: bool, bits: u8| -> Result<FieldSpecKind, SchemaError> {
            let masks = element
                .bits
                .iter()
                .flat_map(|b| b.bits.iter())
                .map(|bit| {
                    let mask = parse_int(&bit.mask).ok_or_else(|| invalid(&bit.mask))?;
                    Ok(BitMask::new(&bit.name, mask))
                })
                .collect::<Result<Vec<_>, SchemaError>>()?;
            Ok(FieldSpecKind::Int {
                signed,
                bits,
                default: int_literal(&element.default_value)?,
                expected: int_literal(&element.expected_value)?,
                masks,
            })
        };

        let bytes = |size: usize| -> Result<FieldSpecKind, SchemaError> {
            let block = |text: &Option<String>| {
                text.as_deref()
                    .map(|t| parse_hex_bytes(t, size).ok_or_else(|| invalid(t)))
                    .transpose()
            };
            Ok(FieldSpecKind::Bytes {
                size,
                default: block(&element.default_value)?,
                expected: block(&element.expected_value)?,
            })
        };

        let kind = match element.kind.as_str() {
            "int8" => int(true, 8)?,
            "uint8" => int(false, 8)?,
            "int16" => int(true, 16)?,
            "uint16" => int(false, 16)?,
            "int32" => int(true, 32)?,
            "uint32" => int(false, 32)?,
            "float" => FieldSpecKind::Float {
                default: float_literal(&element.default_value)?,
                expected: float_literal(&element.expected_value)?,
            },
            "fixed8" => FieldSpecKind::Fixed8 {
                default: float_literal(&element.default_value)?,
            },
            "tag" => bytes(4)?,
            "bytes" => {
                let size = element.size.ok_or_else(|| SchemaError::MissingSize {
                    structure: structure.to_string(),
                    field: element.name.clone(),
                })?;
                bytes(size)?
            }
            type_name => {
                let (name, _) = split_type_name(type_name);
                if !is_defined(name) {
                    return Err(SchemaError::UndefinedStructure {
                        name: type_name.to_string(),
                    });
                }
                FieldSpecKind::Structure {
                    type_name: type_name.to_string(),
                    ref_to: element.ref_to.clone(),
                }
            }
        };

        Ok(Self {
            name: element.name.clone(),
            kind,
            since: element.since_version,
            till: element.till_version,
        })
    }
}

/// All known revisions of one named structure.
///
/// Immutable once built; the registry resolves revisions into
/// [`StructureDescription`](crate::StructureDescription)s on demand.
#[derive(Debug)]
pub struct StructureHistory {
    name: String,
    primitive: bool,
    summary: Option<String>,
    sizes: BTreeMap<u32, usize>,
    fields: Vec<FieldSpec>,
}

impl StructureHistory {
    pub fn new(
        name: impl Into<String>,
        sizes: BTreeMap<u32, usize>,
        fields: Vec<FieldSpec>,
    ) -> Self {
        let name = name.into();
        Self {
            primitive: PRIMITIVE_STRUCTURES.contains(&name.as_str()),
            name,
            summary: None,
            sizes,
            fields,
        }
    }

    pub(crate) fn from_element(
        element: &StructureElement,
        is_defined: impl Fn(&str) -> bool,
    ) -> Result<Self, SchemaError> {
        let fields = element
            .fields
            .fields
            .iter()
            .map(|f| FieldSpec::from_element(&element.name, f, &is_defined))
            .collect::<Result<Vec<_>, _>>()?;
        let sizes = element
            .versions
            .versions
            .iter()
            .map(|v| (v.number, v.size))
            .collect();

        let mut history = Self::new(element.name.clone(), sizes, fields);
        history.summary = element
            .description
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Ok(history)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flat numeric structure (sections hold bare numerals)
    pub fn is_primitive(&self) -> bool {
        self.primitive
    }

    /// Free-text description from the schema, if any
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Declared revisions in ascending order
    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.sizes.keys().copied()
    }

    pub fn latest_version(&self) -> Option<u32> {
        self.sizes.keys().next_back().copied()
    }

    /// Declared byte size of a revision
    pub fn size(&self, version: u32) -> Option<usize> {
        self.sizes.get(&version).copied()
    }

    /// Every declared field across all revisions
    pub fn all_fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Ordered field set of one revision
    pub fn fields_for(&self, version: u32) -> impl Iterator<Item = &FieldSpec> + '_ {
        self.fields.iter().filter(move |f| f.applies_to(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_type_name() {
        assert_eq!(split_type_name("BONEV1"), ("BONE", 1));
        assert_eq!(split_type_name("MD34V11"), ("MD34", 11));
        assert_eq!(split_type_name("VEC3"), ("VEC3", 0));
        assert_eq!(split_type_name("Reference"), ("Reference", 0));
        assert_eq!(split_type_name("SEQSV"), ("SEQSV", 0));
        assert_eq!(split_type_name("V2"), ("V2", 0));
    }

    #[test]
    fn test_field_range() {
        let spec = |since, till| FieldSpec {
            name: "f".to_string(),
            kind: FieldSpecKind::Float {
                default: None,
                expected: None,
            },
            since,
            till,
        };
        assert!(spec(None, None).applies_to(0));
        assert!(spec(Some(23), None).applies_to(23));
        assert!(!spec(Some(23), None).applies_to(20));
        assert!(spec(None, Some(20)).applies_to(20));
        assert!(!spec(None, Some(20)).applies_to(21));
        assert!(spec(Some(2), Some(4)).applies_to(3));
    }
}
