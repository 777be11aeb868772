//! Reading containers from disk or memory

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use hashbrown::HashSet;
use tracing::{debug, info};

use super::header::{FileHeader, IndexEntry};
use super::section::{ReferenceSite, Section};
use super::{ReadSeek, SectionList};
use crate::error::{ContainerError, DecodeError, Result};
use crate::schema::{Dialect, Registry};
use crate::structure::Value;

/// How a container is read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Keep the file open and decode sections on first access
    pub lazy: bool,
}

impl LoadOptions {
    pub fn lazy() -> Self {
        Self { lazy: true }
    }
}

impl SectionList {
    /// Load a container file.
    ///
    /// Eager loads decode every section, link reference back-pointers and
    /// close the file before returning. Lazy loads only read the index and
    /// keep the file open until [`close`](Self::close) or drop.
    pub fn load(registry: Arc<Registry>, path: impl AsRef<Path>, options: LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut list = if options.lazy {
            let reader = BufReader::new(File::open(path)?);
            Self::from_reader(registry, Box::new(reader), options)?
        } else {
            let bytes = std::fs::read(path)?;
            Self::from_reader(registry, Box::new(Cursor::new(bytes)), options)?
        };

        list.path = Some(path.to_path_buf());
        info!(
            path = %path.display(),
            dialect = %list.dialect,
            sections = list.len(),
            lazy = options.lazy,
            "loaded container"
        );
        Ok(list)
    }

    /// Decode a container held in memory
    pub fn from_bytes(registry: Arc<Registry>, bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::from_reader(registry, Box::new(Cursor::new(bytes.into())), LoadOptions::default())
    }

    fn from_reader(
        registry: Arc<Registry>,
        mut reader: Box<dyn ReadSeek>,
        options: LoadOptions,
    ) -> Result<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        if file_len < FileHeader::SIZE as u64 {
            return Err(DecodeError::TooSmall.into());
        }

        let mut prefix = [0u8; FileHeader::SIZE];
        reader.seek(SeekFrom::Start(0))?;
        reader.read_exact(&mut prefix)?;
        let header = FileHeader::from_bytes(&prefix).ok_or(DecodeError::TooSmall)?;

        let header_name = header.name();
        let dialect = Dialect::from_header_tag(&header_name)
            .ok_or_else(|| DecodeError::UnknownHeaderTag(header_name.clone()))?;

        let entries = read_index(reader.as_mut(), &header, file_len)?;

        let mut list = Self::empty(registry, dialect, None);
        for (index, entry) in entries.into_iter().enumerate() {
            if !entry.has_valid_tag() {
                return Err(DecodeError::InvalidTag {
                    index,
                    tag: entry.tag,
                }
                .into());
            }
            let name = entry.name();
            if index == 0 && name != dialect.header_tag() {
                return Err(DecodeError::MissingHeaderSection {
                    expected: dialect.header_tag().to_string(),
                    found: name,
                }
                .into());
            }
            let description = list.registry.description(&name, entry.version, dialect)?;
            let end = entry.offset as u64 + (description.size() * entry.repetitions as usize) as u64;
            if end > file_len {
                return Err(DecodeError::BufferTooShort {
                    path: format!("{name}@{index}"),
                    offset: entry.offset as usize,
                    needed: (end - entry.offset as u64) as usize,
                    available: file_len.saturating_sub(entry.offset as u64) as usize,
                }
                .into());
            }
            let id = list.allocate_id();
            list.push_section(Section::indexed(id, description, entry));
        }
        if list.is_empty() {
            return Err(DecodeError::MissingHeaderSection {
                expected: dialect.header_tag().to_string(),
                found: "nothing".to_string(),
            }
            .into());
        }

        *list.source.borrow_mut() = Some(reader);
        if !options.lazy {
            list.materialize_all()?;
            list.link_references()?;
            list.close();
        }
        Ok(list)
    }

    /// Release the file handle of a lazily loaded list.
    ///
    /// Sections decoded so far stay available; the rest fail with
    /// [`ContainerError::SourceClosed`].
    pub fn close(&mut self) {
        if self.source.get_mut().take().is_some() {
            debug!("closed container source");
        }
    }

    /// Raw bytes of a section, read from the source on first use
    pub(crate) fn raw_bytes(&self, position: usize) -> Result<&[u8]> {
        let section = self.section(position)?;
        if let Some(raw) = section.raw.get() {
            return Ok(raw.as_slice());
        }
        let Some(entry) = section.index_entry else {
            return Err(ContainerError::SourceClosed.into());
        };

        let mut buf = vec![0u8; section.byte_len()];
        {
            let mut source = self.source.borrow_mut();
            let reader = source.as_mut().ok_or(ContainerError::SourceClosed)?;
            reader.seek(SeekFrom::Start(entry.offset as u64))?;
            reader.read_exact(&mut buf)?;
        }
        Ok(section.raw.get_or_init(|| buf).as_slice())
    }

    /// Decoded content of a section, decoding it exactly once
    pub(crate) fn materialize(&self, position: usize) -> Result<&Vec<Value>> {
        let section = self.section(position)?;
        if let Some(content) = section.content.get() {
            return Ok(content);
        }

        let raw = self.raw_bytes(position)?;
        let values = section.description.decode_many(raw, section.len())?;
        debug!(
            position,
            section = section.name(),
            records = values.len(),
            "decoded section"
        );
        Ok(section.content.get_or_init(|| values))
    }

    /// Decode every section that has not been decoded yet
    pub fn materialize_all(&self) -> Result<()> {
        for position in 0..self.sections.len() {
            self.materialize(position)?;
        }
        Ok(())
    }

    /// Build back-pointers from the reference values of decoded records.
    ///
    /// Sections pointed at from more than one place were shared by the
    /// writer and are marked as such.
    pub(crate) fn link_references(&mut self) -> Result<()> {
        self.materialize_all()?;

        let len = self.sections.len();
        let mut links: Vec<(usize, ReferenceSite)> = Vec::new();
        for section in &self.sections {
            let content = section.content.get().map(Vec::as_slice).unwrap_or_default();
            for (record, value) in content.iter().enumerate() {
                let Value::Record(record_value) = value else {
                    continue;
                };
                for (path, reference) in record_value.reference_fields() {
                    if reference.is_null() {
                        continue;
                    }
                    let site = ReferenceSite::new(section.id, record, path);
                    let target = reference.index as usize;
                    if target >= len {
                        return Err(DecodeError::DanglingReference {
                            site: format!("{}[{record}].{}", section.name(), site.field_path()),
                            index: reference.index,
                            len,
                        }
                        .into());
                    }
                    links.push((target, site));
                }
            }
        }

        let mut seen = HashSet::new();
        for (target, site) in links {
            if seen.insert(site.clone()) {
                self.sections[target].sites.push(site);
            }
        }
        for section in self.sections.iter_mut().filter(|s| s.sites.len() > 1) {
            section.share_current_sites();
        }
        self.linked = true;
        Ok(())
    }

    /// Link back-pointers once for lists that came from a file
    pub(crate) fn ensure_linked(&mut self) -> Result<()> {
        if !self.linked {
            self.link_references()?;
        }
        Ok(())
    }
}

fn read_index(reader: &mut dyn ReadSeek, header: &FileHeader, file_len: u64) -> Result<Vec<IndexEntry>> {
    let count = header.index_size as usize;
    let needed = count * IndexEntry::SIZE;
    if header.index_offset as u64 + needed as u64 > file_len {
        return Err(DecodeError::BufferTooShort {
            path: "index".to_string(),
            offset: header.index_offset as usize,
            needed,
            available: file_len.saturating_sub(header.index_offset as u64) as usize,
        }
        .into());
    }

    let mut table = vec![0u8; needed];
    reader.seek(SeekFrom::Start(header.index_offset as u64))?;
    reader.read_exact(&mut table)?;

    Ok(table
        .chunks_exact(IndexEntry::SIZE)
        .filter_map(IndexEntry::from_bytes)
        .collect())
}
