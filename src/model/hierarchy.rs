//! The nested-set hierarchy table: `(place_id, last_subobject_id)`,
//! present only for places that have descendants.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Maps a place's `my_index` to its `last_child_index`. Leaves (places
/// with no descendants) have no entry — looking one up tells a caller
/// whether to treat the id as a leaf or recurse into its interval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HierarchyTable {
    entries: HashMap<i64, i64>,
}

impl HierarchyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, my_index: i64, last_child_index: i64) {
        if last_child_index > my_index {
            self.entries.insert(my_index, last_child_index);
        }
    }

    /// `last_subobject` for `my_index`, or `None` if it's a leaf.
    pub fn last_subobject(&self, my_index: i64) -> Option<i64> {
        self.entries.get(&my_index).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.entries.iter().map(|(&k, &v)| (k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_has_no_entry() {
        let mut table = HierarchyTable::new();
        table.insert(1, 3);
        table.insert(2, 2); // leaf: last_child_index == my_index, not inserted
        assert_eq!(table.last_subobject(1), Some(3));
        assert_eq!(table.last_subobject(2), None);
        assert_eq!(table.len(), 1);
    }
}
