//! Section list: the in-memory form of an M3 container file
//!
//! A file is a header section followed by payload sections and an index
//! table. Sections live in an ordered list and are addressed by position
//! on disk, but the list hands out [`SectionId`]s so edits that insert or
//! remove sections do not invalidate handles.
//!
//! References are tracked as back-pointers: every section knows which
//! reference fields ([`ReferenceSite`]s) point at it, and
//! [`SectionList::resolve`] writes current positions and lengths back into
//! those fields.

mod factor;
mod header;
mod load;
mod references;
mod save;
mod section;

#[cfg(test)]
mod tests;

use std::cell::RefCell;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use factor::FactorOptions;
pub use header::{ALIGNMENT, FileHeader, IndexEntry, PAD_BYTE, padded_len};
pub use load::LoadOptions;
pub use section::{ReferenceSite, Section, SectionId};

use crate::error::{ContainerError, Result, SchemaError};
use crate::schema::{Dialect, Registry};
use crate::structure::{Record, Value};

pub(crate) trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Ordered sections of one container plus the registry that describes them
pub struct SectionList {
    registry: Arc<Registry>,
    dialect: Dialect,
    path: Option<PathBuf>,
    sections: Vec<Section>,
    source: RefCell<Option<Box<dyn ReadSeek>>>,
    next_id: u32,
    linked: bool,
}

impl std::fmt::Debug for SectionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionList")
            .field("dialect", &self.dialect)
            .field("path", &self.path)
            .field("sections", &self.sections.len())
            .field("open", &self.source.borrow().is_some())
            .finish()
    }
}

impl SectionList {
    /// Empty container holding only a default header section
    pub fn new(registry: Arc<Registry>, dialect: Dialect) -> Result<Self> {
        let header_name = dialect.header_tag();
        let history = registry.history(header_name)?;
        let version = history
            .latest_version()
            .ok_or_else(|| SchemaError::UnknownVersion {
                name: header_name.to_string(),
                version: 0,
            })?;
        let description = registry.description(header_name, version, dialect)?;
        let header = Value::Record(description.instantiate());

        let mut list = Self::empty(registry, dialect, None);
        let id = list.allocate_id();
        list.push_section(Section::with_content(id, description, vec![header]));
        list.linked = true;
        Ok(list)
    }

    fn empty(registry: Arc<Registry>, dialect: Dialect, path: Option<PathBuf>) -> Self {
        Self {
            registry,
            dialect,
            path,
            sections: Vec::new(),
            source: RefCell::new(None),
            next_id: 0,
            linked: false,
        }
    }

    fn allocate_id(&mut self) -> SectionId {
        let id = SectionId(self.next_id);
        self.next_id += 1;
        id
    }

    fn push_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// File this list was loaded from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Whether a lazily loaded list still holds its file handle
    pub fn is_open(&self) -> bool {
        self.source.borrow().is_some()
    }

    pub fn section(&self, position: usize) -> Result<&Section> {
        self.sections.get(position).ok_or_else(|| {
            ContainerError::SectionOutOfRange {
                position,
                len: self.sections.len(),
            }
            .into()
        })
    }

    fn section_mut(&mut self, position: usize) -> Result<&mut Section> {
        let len = self.sections.len();
        self.sections
            .get_mut(position)
            .ok_or_else(|| ContainerError::SectionOutOfRange { position, len }.into())
    }

    /// Current position of a section
    pub fn position(&self, id: SectionId) -> Result<usize> {
        self.sections
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ContainerError::UnknownSection(id).into())
    }

    pub fn section_by_id(&self, id: SectionId) -> Result<&Section> {
        self.section(self.position(id)?)
    }

    /// Identity of the header section
    pub fn header_id(&self) -> Result<SectionId> {
        Ok(self.section(0)?.id)
    }

    /// Decoded records of the section at `position`
    pub fn entries(&self, position: usize) -> Result<&[Value]> {
        Ok(self.materialize(position)?.as_slice())
    }

    /// Mutable records of a section; decodes it first if needed
    pub fn entries_mut(&mut self, position: usize) -> Result<&mut Vec<Value>> {
        self.materialize(position)?;
        let section = self.section_mut(position)?;
        section.raw.take();
        section
            .content
            .get_mut()
            .ok_or_else(|| ContainerError::SectionOutOfRange { position, len: 0 }.into())
    }

    /// Replace one record after validating it against the section's description
    pub fn set_entry(&mut self, position: usize, record: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let section = self.section(position)?;
        let path = format!("{}[{record}]", section.name());
        section.description.validate_value(&value, &path)?;

        let entries = self.entries_mut(position)?;
        let slot = entries
            .get_mut(record)
            .ok_or(ContainerError::RecordOutOfRange {
                section: position,
                record,
            })?;
        *slot = value;
        Ok(())
    }

    /// The header record (section 0)
    pub fn header(&self) -> Result<&Record> {
        self.entries(0)?
            .first()
            .and_then(Value::as_record)
            .ok_or_else(|| ContainerError::RecordOutOfRange { section: 0, record: 0 }.into())
    }

    /// Root model record reached through the header's `model` reference
    pub fn model(&self) -> Result<&Record> {
        let reference = self.header()?.reference("model")?;
        if reference.is_null() {
            return Err(ContainerError::MissingModel.into());
        }
        self.get(&reference)?
            .first()
            .and_then(Value::as_record)
            .ok_or_else(|| ContainerError::MissingModel.into())
    }
}
