//! Core place record and its deduplicated type table.
//!
//! Mirrors the `Place`/`AdminArea` split in the teacher crate: a plain
//! data struct carrying every column the primary store needs, built up by
//! the hierarchy builder and consumed read-only by the search core.

use serde::{Deserialize, Serialize};

/// A single place in the finalized hierarchy.
///
/// `my_index`/`last_child_index` are the nested-set interval assigned by
/// `HierarchyBuilder::finalize` (see `import::hierarchy`); they are `0`
/// until a place has been through finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Stable integer id, assigned by depth-first traversal at finalize time.
    pub id: i64,
    /// Id in the upstream relational source (e.g. OSM id).
    pub source_id: i64,
    /// Primary display name.
    pub name: String,
    /// Secondary name (e.g. brand, or the original name when `name` was
    /// overridden by a house number).
    pub name_extra: Option<String>,
    /// Localized (English) name.
    pub name_en: Option<String>,
    pub phone: Option<String>,
    pub postal_code: Option<String>,
    pub website: Option<String>,
    /// Id of the parent place, or `0` for a root.
    pub parent: i64,
    pub type_id: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub box_id: u32,
    /// Lower is better. Derived from importance (0..1000 scale) with a
    /// fallback from the source's `rank_search` column.
    pub search_rank: i32,
    /// Nested-set left index. `0` until finalized.
    pub my_index: i64,
    /// Nested-set right index. Equals `my_index` for a leaf.
    pub last_child_index: i64,
}

impl Place {
    /// True once this place has been assigned a nested-set index.
    pub fn is_indexed(&self) -> bool {
        self.my_index > 0
    }

    /// True if `other` lies within this place's nested-set interval.
    pub fn contains(&self, other: &Place) -> bool {
        self.my_index < other.my_index && other.my_index <= self.last_child_index
    }

    /// Names worth feeding through the expander when building the trie:
    /// `name`, `name_extra`, `name_en`, in that order, skipping empties.
    pub fn indexable_names(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        if let Some(extra) = self.name_extra.as_deref() {
            if !extra.is_empty() {
                names.push(extra);
            }
        }
        if let Some(en) = self.name_en.as_deref() {
            if !en.is_empty() {
                names.push(en);
            }
        }
        names
    }
}

/// Deduplicated (id, name) type table. A place has exactly one type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeTable {
    names: Vec<String>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a type name, returning its stable id. Repeated calls with
    /// the same name return the same id.
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(pos) = self.names.iter().position(|n| n == name) {
            return pos as u32;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u32
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_table_dedupes() {
        let mut table = TypeTable::new();
        let a = table.intern("building_house");
        let b = table.intern("road");
        let c = table.intern("building_house");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn contains_respects_nested_set_interval() {
        let mut parent = sample_place(1);
        parent.my_index = 1;
        parent.last_child_index = 5;
        let mut child = sample_place(2);
        child.my_index = 3;
        child.last_child_index = 3;
        let mut outside = sample_place(3);
        outside.my_index = 6;
        outside.last_child_index = 6;

        assert!(parent.contains(&child));
        assert!(!parent.contains(&outside));
        assert!(!parent.contains(&parent.clone()));
    }

    fn sample_place(source_id: i64) -> Place {
        Place {
            id: source_id,
            source_id,
            name: "test".into(),
            name_extra: None,
            name_en: None,
            phone: None,
            postal_code: None,
            website: None,
            parent: 0,
            type_id: 0,
            latitude: 0.0,
            longitude: 0.0,
            box_id: 0,
            search_rank: 500,
            my_index: 0,
            last_child_index: 0,
        }
    }
}
