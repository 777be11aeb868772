//! Structure registry
//!
//! The registry is built once from an XML schema document and answers
//! "what does revision N of structure X look like" for the rest of the
//! crate. Histories are immutable after construction; resolved
//! descriptions and synthesized vertex layouts are cached behind locks so
//! a registry can be shared between threads behind an `Arc`.
//!
//! Every declared revision is resolved while the registry is built, so a
//! schema whose declared sizes disagree with its fields fails before any
//! file is touched.

mod dialect;
mod history;
mod literal;
mod vertex;
mod xml;


use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hashbrown::HashMap;
use tracing::debug;

pub use dialect::Dialect;
pub use history::{FieldSpec, FieldSpecKind, PRIMITIVE_STRUCTURES, StructureHistory, split_type_name};
pub use vertex::{
    VERTEX_BONE_LOOKUP, VERTEX_BONE_WEIGHTS, VERTEX_COLOR, VERTEX_FORMAT_PREFIX, VERTEX_NORMAL,
    VERTEX_POSITION, VERTEX_TANGENT, VERTEX_UV0, VERTEX_UV1, VERTEX_UV2, VERTEX_UV3, VERTEX_UV4,
    parse_vertex_format_name, vertex_format_name,
};

use crate::error::{M3Error, SchemaError};
use crate::field::{
    BytesField, Field, FieldKind, Fixed8Field, FloatField, IntField, StructureField,
};
use crate::structure::{StructureDescription, layout_listing};

/// Schema shipped with the crate
pub const BUNDLED_SCHEMA: &str = include_str!("../../schema/structures.xml");

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DescriptionKey {
    name: String,
    version: u32,
    dialect: Dialect,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Name → history map plus caches of resolved descriptions
#[derive(Debug)]
pub struct Registry {
    histories: HashMap<String, Arc<StructureHistory>>,
    order: Vec<String>,
    vertex_formats: RwLock<HashMap<u32, Arc<StructureHistory>>>,
    descriptions: RwLock<HashMap<DescriptionKey, Arc<StructureDescription>>>,
}

impl Registry {
    /// Registry over the schema bundled with this crate.
    ///
    /// The bundled schema is a reference subset: its `MODL` revisions only
    /// carry the structures it declares, so files from other writers need a
    /// complete schema through [`from_path`](Self::from_path).
    pub fn bundled() -> Result<Self, SchemaError> {
        Self::from_xml(BUNDLED_SCHEMA)
    }

    /// Load a schema document from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, M3Error> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::from_xml(&text)?)
    }

    /// Build a registry from schema XML text
    pub fn from_xml(text: &str) -> Result<Self, SchemaError> {
        let document = xml::parse_document(text)?;

        let mut histories: HashMap<String, Arc<StructureHistory>> = HashMap::new();
        let mut order = Vec::with_capacity(document.structures.len());

        for element in &document.structures {
            if histories.contains_key(&element.name) {
                return Err(SchemaError::DuplicateStructure {
                    name: element.name.clone(),
                });
            }
            let history = StructureHistory::from_element(element, |name| {
                histories.contains_key(name) || parse_vertex_format_name(name).is_some()
            })?;
            order.push(element.name.clone());
            histories.insert(element.name.clone(), Arc::new(history));
        }

        let registry = Self {
            histories,
            order,
            vertex_formats: RwLock::new(HashMap::new()),
            descriptions: RwLock::new(HashMap::new()),
        };

        for name in &registry.order {
            let history = registry.history(name)?;
            for version in history.versions() {
                registry.description(name, version, Dialect::PRIMARY)?;
            }
        }

        debug!(
            structures = registry.order.len(),
            "structure registry built"
        );
        Ok(registry)
    }

    /// Whether a structure of this name is declared (or is a vertex layout)
    pub fn contains(&self, name: &str) -> bool {
        self.histories.contains_key(name) || parse_vertex_format_name(name).is_some()
    }

    /// Declared structure names in schema order
    pub fn structure_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    /// History of a structure; `VertexFormat0x...` names are synthesized
    pub fn history(&self, name: &str) -> Result<Arc<StructureHistory>, SchemaError> {
        if let Some(history) = self.histories.get(name) {
            return Ok(history.clone());
        }
        match parse_vertex_format_name(name) {
            Some(flags) => self.vertex_history(flags),
            None => Err(SchemaError::UnknownStructure(name.to_string())),
        }
    }

    /// Per-vertex record layout for a vertex flag word
    pub fn vertex_format(&self, flags: u32) -> Result<Arc<StructureDescription>, SchemaError> {
        self.description(&vertex_format_name(flags), 0, Dialect::PRIMARY)
    }

    fn vertex_history(&self, flags: u32) -> Result<Arc<StructureHistory>, SchemaError> {
        if let Some(history) = read(&self.vertex_formats).get(&flags) {
            return Ok(history.clone());
        }

        let specs = vertex::vertex_field_specs(flags);
        let mut size = 0;
        for spec in &specs {
            size += self.resolve_field(spec, Dialect::PRIMARY)?.size();
        }
        let history = Arc::new(StructureHistory::new(
            vertex_format_name(flags),
            BTreeMap::from([(0, size)]),
            specs,
        ));
        debug!(flags = format_args!("{flags:#x}"), size, "synthesized vertex format");

        Ok(write(&self.vertex_formats)
            .entry(flags)
            .or_insert(history)
            .clone())
    }

    /// Resolved description of one revision of a structure under a dialect
    pub fn description(
        &self,
        name: &str,
        version: u32,
        dialect: Dialect,
    ) -> Result<Arc<StructureDescription>, SchemaError> {
        let key = DescriptionKey {
            name: name.to_string(),
            version,
            dialect,
        };
        if let Some(description) = read(&self.descriptions).get(&key) {
            return Ok(description.clone());
        }

        // Resolved without holding the lock; nested fields recurse into here.
        let history = self.history(name)?;
        let declared = history
            .size(version)
            .ok_or_else(|| SchemaError::UnknownVersion {
                name: name.to_string(),
                version,
            })?;

        let fields = history
            .fields_for(version)
            .map(|spec| self.resolve_field(spec, dialect))
            .collect::<Result<Vec<_>, _>>()?;
        let computed: usize = fields.iter().map(Field::size).sum();

        if dialect == Dialect::PRIMARY && computed != declared {
            return Err(SchemaError::SizeMismatch {
                structure: name.to_string(),
                version,
                declared,
                computed,
                layout: layout_listing(&fields),
            });
        }

        let description = Arc::new(StructureDescription::new(history, version, fields));
        Ok(write(&self.descriptions)
            .entry(key)
            .or_insert(description)
            .clone())
    }

    /// Description for a field type name such as `"BONEV1"` or `"VEC3"`,
    /// after dialect substitution
    pub fn description_for_type(
        &self,
        type_name: &str,
        dialect: Dialect,
    ) -> Result<Arc<StructureDescription>, SchemaError> {
        let (name, version) = split_type_name(type_name);
        self.description(dialect.substitute(name), version, dialect)
    }

    fn resolve_field(&self, spec: &FieldSpec, dialect: Dialect) -> Result<Field, SchemaError> {
        let kind = match &spec.kind {
            FieldSpecKind::Int {
                signed,
                bits,
                default,
                expected,
                masks,
            } => FieldKind::Int(IntField {
                signed: *signed,
                bits: *bits,
                default: default.unwrap_or(0),
                expected: *expected,
                masks: masks.clone(),
            }),
            FieldSpecKind::Float { default, expected } => FieldKind::Float(FloatField {
                default: default.unwrap_or(0.0),
                expected: *expected,
            }),
            FieldSpecKind::Fixed8 { default } => FieldKind::Fixed8(Fixed8Field {
                default: default.unwrap_or(0.0),
            }),
            FieldSpecKind::Bytes {
                size,
                default,
                expected,
            } => FieldKind::Bytes(BytesField {
                size: *size,
                default: default.clone().unwrap_or_else(|| vec![0; *size]),
                expected: expected.clone(),
            }),
            FieldSpecKind::Structure { type_name, ref_to } => {
                FieldKind::Structure(StructureField {
                    description: self.description_for_type(type_name, dialect)?,
                    ref_to: ref_to.clone(),
                })
            }
        };
        Ok(Field::new(spec.name.clone(), kind))
    }
}
