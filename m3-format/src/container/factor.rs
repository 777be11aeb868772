//! Merging structurally equal sections

use hashbrown::{HashMap, HashSet};
use tracing::info;

use super::section::{Section, SectionId};
use super::SectionList;
use crate::error::{ContainerError, Result};
use crate::structure::{Record, Reference, Value};

/// Controls for [`SectionList::factor_sections`]
#[derive(Debug, Clone, Default)]
pub struct FactorOptions {
    /// Sections that are never merged, neither as survivor nor as duplicate
    pub exclude: HashSet<SectionId>,
}

impl FactorOptions {
    pub fn exclude(mut self, ids: impl IntoIterator<Item = SectionId>) -> Self {
        self.exclude.extend(ids);
        self
    }
}

/// Pairwise structural comparison of sections.
///
/// References compare by recursing into their targets. A pair that is
/// reached again while it is still being compared is assumed equal.
struct Comparer<'a> {
    sections: &'a [Section],
    memo: HashMap<(usize, usize), bool>,
    active: HashSet<(usize, usize)>,
}

impl<'a> Comparer<'a> {
    fn new(sections: &'a [Section]) -> Self {
        Self {
            sections,
            memo: HashMap::new(),
            active: HashSet::new(),
        }
    }

    fn sections_equal(&mut self, a: usize, b: usize) -> bool {
        if a == b {
            return true;
        }
        let key = (a.min(b), a.max(b));
        if let Some(&equal) = self.memo.get(&key) {
            return equal;
        }
        if !self.active.insert(key) {
            return true;
        }

        let sections = self.sections;
        let (Some(first), Some(second)) = (sections.get(a), sections.get(b)) else {
            self.active.remove(&key);
            return false;
        };
        let equal = match (first.content(), second.content()) {
            (Some(x), Some(y)) => {
                first.description == second.description
                    && x.len() == y.len()
                    && x.iter().zip(y).all(|(p, q)| self.values_equal(p, q))
            }
            _ => false,
        };

        self.active.remove(&key);
        self.memo.insert(key, equal);
        equal
    }

    fn values_equal(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Record(x), Value::Record(y)) => self.records_equal(x, y),
            (x, y) => x == y,
        }
    }

    fn records_equal(&mut self, a: &Record, b: &Record) -> bool {
        if a.description() != b.description() {
            return false;
        }
        if a.is_reference() {
            return match (Reference::from_record(a), Reference::from_record(b)) {
                (Ok(x), Ok(y)) if x.is_null() || y.is_null() => x.is_null() && y.is_null(),
                (Ok(x), Ok(y)) => self.sections_equal(x.index as usize, y.index as usize),
                _ => false,
            };
        }
        a.values().len() == b.values().len()
            && a
                .values()
                .iter()
                .zip(b.values())
                .all(|(x, y)| self.values_equal(x, y))
    }
}

impl SectionList {
    /// Targets of every `STRUCT.field` reference (e.g. `"ATVL.unknown0"`),
    /// for use as [`FactorOptions::exclude`]
    pub fn referenced_sections(&mut self, field: &str) -> Result<Vec<SectionId>> {
        let (structure, path) = field
            .split_once('.')
            .ok_or_else(|| ContainerError::NotAReference {
                path: field.to_string(),
            })?;
        self.ensure_linked()?;

        let owners: HashSet<SectionId> = self
            .sections
            .iter()
            .filter(|s| s.name() == structure)
            .map(|s| s.id)
            .collect();
        Ok(self
            .sections
            .iter()
            .filter(|s| {
                s.sites
                    .iter()
                    .any(|site| owners.contains(&site.owner) && site.field_path() == path)
            })
            .map(|s| s.id)
            .collect())
    }

    /// Merge sections with equal content and retarget the references to them.
    ///
    /// Each class of equal sections collapses onto its first member, which
    /// becomes shared. Returns the number of sections removed.
    pub fn factor_sections(&mut self, options: &FactorOptions) -> Result<usize> {
        self.resolve()?;

        let mut classes: Vec<Vec<usize>> = Vec::new();
        {
            let mut comparer = Comparer::new(&self.sections);
            for position in 1..self.sections.len() {
                if options.exclude.contains(&self.sections[position].id) {
                    continue;
                }
                let found = classes
                    .iter()
                    .position(|class| comparer.sections_equal(class[0], position));
                match found {
                    Some(class) => classes[class].push(position),
                    None => classes.push(vec![position]),
                }
            }
        }

        let mut removed = HashSet::new();
        for class in classes.iter().filter(|class| class.len() > 1) {
            let keep = class[0];
            for &duplicate in &class[1..] {
                let sites = std::mem::take(&mut self.sections[duplicate].sites);
                self.sections[keep].sites.extend(sites);
                removed.insert(self.sections[duplicate].id);
            }
            self.sections[keep].share_current_sites();
        }

        let count = removed.len();
        if count > 0 {
            self.remove_sections(&removed);
            self.resolve()?;
        }
        info!(
            removed = count,
            classes = classes.iter().filter(|c| c.len() > 1).count(),
            "factored sections"
        );
        Ok(count)
    }
}
