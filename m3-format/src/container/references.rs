//! Reference bookkeeping: building linked sections, resolving positions
//! and dropping sections that ended up empty

use hashbrown::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::section::{ReferenceSite, Section, SectionId};
use super::SectionList;
use crate::error::{ContainerError, DecodeError, Result, ValidationError};
use crate::schema::split_type_name;
use crate::structure::{Record, Reference, Value};

impl SectionList {
    /// Records a reference points at; null references yield nothing
    pub fn get(&self, reference: &Reference) -> Result<&[Value]> {
        if reference.is_null() {
            return Ok(&[]);
        }
        self.entries(reference.index as usize)
    }

    /// Text of a `CHAR` section, up to its terminator
    pub fn string(&self, reference: &Reference) -> Result<String> {
        let bytes: Vec<u8> = self
            .get(reference)?
            .iter()
            .filter_map(Value::as_int)
            .take_while(|&c| c != 0)
            .map(|c| c as u8)
            .collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reference record at a site
    fn site_record_mut(&mut self, site: &ReferenceSite) -> Result<&mut Record> {
        let position = self.position(site.owner)?;
        let entries = self.entries_mut(position)?;
        let value = entries
            .get_mut(site.record)
            .ok_or(ContainerError::RecordOutOfRange {
                section: position,
                record: site.record,
            })?;
        value
            .as_record_mut()
            .and_then(|record| record.lookup_mut(&site.path))
            .and_then(Value::as_record_mut)
            .filter(|record| record.is_reference())
            .ok_or_else(|| {
                ContainerError::NotAReference {
                    path: site.to_string(),
                }
                .into()
            })
    }

    /// Check that a field path of `owner`'s records is a reference and
    /// return its split path and `refTo` type
    fn reference_field(&self, owner: usize, field_path: &str) -> Result<(Vec<String>, Option<String>)> {
        let path: Vec<String> = field_path.split('.').map(str::to_string).collect();
        let description = &self.section(owner)?.description;
        let field = description
            .field_at_path(&path)
            .and_then(|f| f.as_structure())
            .filter(|f| f.is_reference())
            .ok_or_else(|| ContainerError::NotAReference {
                path: format!("{}.{field_path}", description.name()),
            })?;
        Ok((path, field.ref_to.clone()))
    }

    fn check_record(&self, owner: usize, record: usize) -> Result<()> {
        if record >= self.entries(owner)?.len() {
            return Err(ContainerError::RecordOutOfRange {
                section: owner,
                record,
            }
            .into());
        }
        Ok(())
    }

    /// Create an empty section for the reference field `field_path` of record
    /// `record` in section `owner`.
    ///
    /// The new section's structure comes from the field's `refTo`; `version`
    /// overrides the revision named there. The section is appended unless
    /// `insert_at` gives a position (which may not precede the header).
    pub fn section_for_reference(
        &mut self,
        owner: SectionId,
        record: usize,
        field_path: &str,
        version: Option<u32>,
        insert_at: Option<usize>,
    ) -> Result<SectionId> {
        let owner_position = self.position(owner)?;
        self.check_record(owner_position, record)?;
        let (path, ref_to) = self.reference_field(owner_position, field_path)?;
        let ref_to = ref_to.ok_or_else(|| ContainerError::NotAReference {
            path: field_path.to_string(),
        })?;

        let (name, declared) = split_type_name(&ref_to);
        let description = self
            .registry
            .description(name, version.unwrap_or(declared), self.dialect)?;

        let position = insert_at.unwrap_or(self.sections.len());
        if position == 0 || position > self.sections.len() {
            return Err(ContainerError::SectionOutOfRange {
                position,
                len: self.sections.len(),
            }
            .into());
        }

        let id = self.allocate_id();
        let mut section = Section::with_content(id, description, Vec::new());
        section.sites.push(ReferenceSite::new(owner, record, path));
        debug!(
            section = section.name(),
            position,
            owner = %owner,
            field = field_path,
            "created referenced section"
        );
        self.sections.insert(position, section);
        Ok(id)
    }

    /// Create a `CHAR` section holding `text` plus terminator for a string reference.
    ///
    /// `CHAR` is a signed byte, so only ASCII text is accepted.
    pub fn section_for_string(
        &mut self,
        owner: SectionId,
        record: usize,
        field_path: &str,
        text: &str,
    ) -> Result<SectionId> {
        if !text.is_ascii() {
            let owner_name = self.section_by_id(owner)?.name();
            return Err(ValidationError::NotAscii {
                path: format!("{owner_name}[{record}].{field_path}"),
                text: text.to_string(),
            }
            .into());
        }
        let id = self.section_for_reference(owner, record, field_path, None, None)?;
        let position = self.position(id)?;
        let entries = self.entries_mut(position)?;
        entries.extend(text.bytes().map(|b| Value::Int(b as i64)));
        entries.push(Value::Int(0));
        Ok(id)
    }

    /// Point an additional reference field at an existing section
    pub fn attach_reference(
        &mut self,
        owner: SectionId,
        record: usize,
        field_path: &str,
        target: SectionId,
    ) -> Result<()> {
        let owner_position = self.position(owner)?;
        self.check_record(owner_position, record)?;
        let (path, _) = self.reference_field(owner_position, field_path)?;
        let target_position = self.position(target)?;
        self.sections[target_position]
            .sites
            .push(ReferenceSite::new(owner, record, path));
        Ok(())
    }

    /// Write each section's position and length into every reference field
    /// pointing at it.
    ///
    /// Fails if a reference field is registered on two sections, or if a
    /// section has referrers beyond the one owner (or the set it was shared
    /// with).
    pub fn resolve(&mut self) -> Result<()> {
        self.ensure_linked()?;
        self.check_owners()?;

        let mut updates = Vec::new();
        for (position, section) in self.sections.iter().enumerate() {
            for site in &section.sites {
                updates.push((site.clone(), position as u32, section.len() as u32));
            }
        }

        let count = updates.len();
        for (site, index, entries) in updates {
            let record = self.site_record_mut(&site)?;
            let mut reference = Reference::from_record(record)?;
            reference.entries = entries;
            reference.index = index;
            reference.store(record)?;
        }
        debug!(references = count, "resolved references");
        Ok(())
    }

    fn check_owners(&self) -> Result<()> {
        let mut seen: HashMap<&ReferenceSite, usize> = HashMap::new();
        for (position, section) in self.sections.iter().enumerate() {
            for site in &section.sites {
                if let Some(first) = seen.insert(site, position) {
                    return Err(ContainerError::ReferenceResolvedTwice {
                        site: site.to_string(),
                        first,
                        second: position,
                    }
                    .into());
                }
            }
        }
        for (position, section) in self.sections.iter().enumerate() {
            if section.has_extra_owners() {
                return Err(ContainerError::MultipleOwners {
                    position,
                    name: section.name().to_string(),
                    owners: section.sites.len(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Validate every record, then drop empty sections and null the
    /// references that pointed at them
    pub fn validate(&mut self) -> Result<()> {
        self.ensure_linked()?;

        for position in 0..self.sections.len() {
            let description = self.sections[position].description.clone();
            for (i, value) in self.entries(position)?.iter().enumerate() {
                description.validate_value(value, &format!("{}[{i}]", description.name()))?;
            }
        }

        let empty: Vec<(usize, SectionId)> = self
            .sections
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, s)| s.is_empty())
            .map(|(position, s)| (position, s.id))
            .collect();
        if empty.is_empty() {
            return Ok(());
        }

        for &(position, id) in &empty {
            let section = &self.sections[position];
            warn!(
                section = section.name(),
                position,
                id = %id,
                "dropping empty section"
            );
            for site in section.sites.clone() {
                let record = self.site_record_mut(&site)?;
                let flags = Reference::from_record(record)?.flags;
                Reference { flags, ..Reference::NULL }.store(record)?;
            }
        }

        let removed: HashSet<SectionId> = empty.into_iter().map(|(_, id)| id).collect();
        self.remove_sections(&removed);
        self.resolve()
    }

    /// Remove sections and every back-pointer owned by them
    pub(crate) fn remove_sections(&mut self, removed: &HashSet<SectionId>) {
        let before = self.sections.len();
        let header = self.sections.first().map(|s| s.id);
        self.sections
            .retain(|s| Some(s.id) == header || !removed.contains(&s.id));
        for section in &mut self.sections {
            section.sites.retain(|site| !removed.contains(&site.owner));
            section
                .shared_with
                .retain(|site| !removed.contains(&site.owner));
        }
        info!(
            removed = before - self.sections.len(),
            remaining = self.sections.len(),
            "removed sections"
        );
    }

    /// Vertex records of the model, decoded with the layout its
    /// `vertexFlags` select
    pub fn vertices(&self) -> Result<Vec<Record>> {
        let model = self.model()?;
        let flags = model.int("vertexFlags")? as u32;
        let reference = model.reference("vertices")?;
        let format = self.registry.vertex_format(flags)?;
        if reference.is_null() || format.size() == 0 {
            return Ok(Vec::new());
        }

        let position = reference.index as usize;
        let section = self.section(position)?;
        let bytes = match section.raw() {
            Some(raw) => raw.to_vec(),
            None if section.is_loaded() => section.description.encode(self.entries(position)?)?,
            None => self.raw_bytes(position)?.to_vec(),
        };
        if bytes.len() % format.size() != 0 {
            return Err(DecodeError::BufferTooShort {
                path: format.name().to_string(),
                offset: bytes.len() - bytes.len() % format.size(),
                needed: format.size(),
                available: bytes.len() % format.size(),
            }
            .into());
        }

        let records = format
            .decode_many(&bytes, bytes.len() / format.size())?
            .into_iter()
            .filter_map(|value| match value {
                Value::Record(record) => Some(record),
                _ => None,
            })
            .collect();
        Ok(records)
    }
}
