//! Writing containers

use std::path::Path;

use tracing::{debug, info};

use super::header::{IndexEntry, PAD_BYTE, padded_len};
use super::SectionList;
use crate::error::{ContainerError, Result};
use crate::structure::Value;

impl SectionList {
    /// Encode the list into container bytes.
    ///
    /// Index entries are regenerated from the current sections and the
    /// header's `indexOffset`/`indexSize` updated to match. Reference fields
    /// are written as they are; call [`resolve`](Self::resolve) after
    /// structural edits.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.materialize_all()?;

        let mut entries = Vec::with_capacity(self.sections.len());
        let mut offset = 0usize;
        for section in &self.sections {
            entries.push(IndexEntry {
                tag: IndexEntry::tag_for(section.name())?,
                offset: offset as u32,
                repetitions: section.len() as u32,
                version: section.description.version(),
            });
            offset += padded_len(section.byte_len());
        }
        let index_offset = offset;

        let header_tag = IndexEntry::tag_for(self.dialect.header_tag())?;
        let index_size = entries.len();
        let header = self
            .entries_mut(0)?
            .first_mut()
            .and_then(Value::as_record_mut)
            .ok_or(ContainerError::RecordOutOfRange {
                section: 0,
                record: 0,
            })?;
        header.set("tag", header_tag.to_vec())?;
        header.set("indexOffset", index_offset as u32)?;
        header.set("indexSize", index_size as u32)?;

        let mut out = Vec::with_capacity(index_offset + index_size * IndexEntry::SIZE);
        for (position, (section, entry)) in self.sections.iter().zip(&entries).enumerate() {
            if out.len() as u64 != entry.offset as u64 {
                return Err(ContainerError::OffsetMismatch {
                    position,
                    tag: section.name().to_string(),
                    expected: entry.offset as u64,
                    actual: out.len() as u64,
                }
                .into());
            }
            let content = section.content().unwrap_or_default();
            out.extend_from_slice(&section.description.encode(content)?);
            out.resize(entry.offset as usize + padded_len(section.byte_len()), PAD_BYTE);
            debug!(
                position,
                section = section.name(),
                offset = entry.offset,
                records = entry.repetitions,
                "wrote section"
            );
        }
        for entry in &entries {
            out.extend_from_slice(&entry.to_bytes());
        }

        for (section, entry) in self.sections.iter_mut().zip(entries) {
            section.index_entry = Some(entry);
        }
        Ok(out)
    }

    /// Encode the list and write it to `path`
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        info!(
            path = %path.display(),
            sections = self.sections.len(),
            bytes = bytes.len(),
            "saved container"
        );
        Ok(())
    }
}
