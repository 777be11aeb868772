use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use hashbrown::HashSet;

use super::header::IndexEntry;
use crate::structure::{StructureDescription, Value};

/// Stable identity of a section, independent of its position in the list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub(crate) u32);

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reference field pointing at a section: record `record` of section
/// `owner`, reached through the nested field names in `path`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceSite {
    pub owner: SectionId,
    pub record: usize,
    pub path: Vec<String>,
}

impl ReferenceSite {
    pub fn new(owner: SectionId, record: usize, path: Vec<String>) -> Self {
        Self {
            owner,
            record,
            path,
        }
    }

    pub fn field_path(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for ReferenceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}].{}", self.owner, self.record, self.field_path())
    }
}

/// Run of records sharing one description.
///
/// Content is decoded on first access; loaded sections also keep the raw
/// bytes they were decoded from until the content is edited.
#[derive(Debug)]
pub struct Section {
    pub(crate) id: SectionId,
    pub(crate) description: Arc<StructureDescription>,
    pub(crate) index_entry: Option<IndexEntry>,
    pub(crate) sites: Vec<ReferenceSite>,
    /// Referrers the section was shared with by factoring or by the file it came from
    pub(crate) shared_with: HashSet<ReferenceSite>,
    pub(crate) raw: OnceCell<Vec<u8>>,
    pub(crate) content: OnceCell<Vec<Value>>,
}

impl Section {
    /// Section backed by an index entry, decoded on demand
    pub(crate) fn indexed(
        id: SectionId,
        description: Arc<StructureDescription>,
        entry: IndexEntry,
    ) -> Self {
        Self {
            id,
            description,
            index_entry: Some(entry),
            sites: Vec::new(),
            shared_with: HashSet::new(),
            raw: OnceCell::new(),
            content: OnceCell::new(),
        }
    }

    /// In-memory section with known content
    pub(crate) fn with_content(
        id: SectionId,
        description: Arc<StructureDescription>,
        content: Vec<Value>,
    ) -> Self {
        Self {
            id,
            description,
            index_entry: None,
            sites: Vec::new(),
            shared_with: HashSet::new(),
            raw: OnceCell::new(),
            content: OnceCell::from(content),
        }
    }

    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn description(&self) -> &Arc<StructureDescription> {
        &self.description
    }

    pub fn name(&self) -> &str {
        self.description.name()
    }

    /// Index entry this section was last loaded from or saved as
    pub fn index_entry(&self) -> Option<&IndexEntry> {
        self.index_entry.as_ref()
    }

    /// Reference fields pointing at this section
    pub fn sites(&self) -> &[ReferenceSite] {
        &self.sites
    }

    /// May be the target of more than one reference
    pub fn is_shared(&self) -> bool {
        !self.shared_with.is_empty()
    }

    /// Allow every current referrer to keep pointing here
    pub(crate) fn share_current_sites(&mut self) {
        self.shared_with = self.sites.iter().cloned().collect();
    }

    /// Whether the referrers break the one-owner rule: more than one, and
    /// at least one the section was not shared with
    pub(crate) fn has_extra_owners(&self) -> bool {
        self.sites.len() > 1 && self.sites.iter().any(|site| !self.shared_with.contains(site))
    }

    pub fn is_loaded(&self) -> bool {
        self.content.get().is_some()
    }

    /// Decoded content, if it has been decoded
    pub fn content(&self) -> Option<&[Value]> {
        self.content.get().map(Vec::as_slice)
    }

    /// Number of records, known without decoding
    pub fn len(&self) -> usize {
        match (self.content.get(), &self.index_entry) {
            (Some(content), _) => content.len(),
            (None, Some(entry)) => entry.repetitions as usize,
            (None, None) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of a loaded section, while its content is unedited
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.get().map(Vec::as_slice)
    }

    /// Byte size of the payload before padding
    pub fn byte_len(&self) -> usize {
        self.description.size() * self.len()
    }
}
