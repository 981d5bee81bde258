//! The normalized-name trie.
//!
//! No crate in the pack provides an off-the-shelf compressed trie, so
//! this is newly authored in the teacher's plain-struct style. Rather
//! than a pointer-linked node tree, keys are kept as a sorted,
//! deduplicated string table: stable id assignment falls out of sort
//! order (so identical input always produces identical ids across
//! builds, per spec.md S6), and prefix lookup is two binary searches —
//! the same O(log n) shape a trie's root-to-prefix-node walk gives, and
//! the layout mmaps directly via `bincode`, mirroring `GeometryResolver`'s
//! raw-bytes mmap technique in the teacher's geometry resolver.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trie {
    keys: Vec<String>,
}

impl Trie {
    /// Build from an arbitrary (possibly unsorted, possibly duplicate)
    /// set of normalized strings.
    pub fn build(mut keys: Vec<String>) -> Self {
        keys.sort_unstable();
        keys.dedup();
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn id_of(&self, key: &str) -> Option<u32> {
        self.keys.binary_search_by(|k| k.as_str().cmp(key)).ok().map(|i| i as u32)
    }

    pub fn key_of(&self, id: u32) -> Option<&str> {
        self.keys.get(id as usize).map(String::as_str)
    }

    /// Every `(id, key)` whose key starts with `prefix`, in ascending key
    /// order (spec.md S4.4 step 2: "every trie key matching the prefix").
    pub fn prefix_matches(&self, prefix: &str) -> impl Iterator<Item = (u32, &str)> {
        if prefix.is_empty() {
            return (0..self.keys.len()).map(|i| (i as u32, self.keys[i].as_str()));
        }
        let start = self.keys.partition_point(|k| k.as_str() < prefix);
        let upper = prefix_upper_bound(prefix);
        let end = match &upper {
            Some(upper) => self.keys.partition_point(|k| k.as_str() < upper.as_str()),
            None => self.keys.len(),
        };
        (start..end).map(|i| (i as u32, self.keys[i].as_str()))
    }
}

/// The lexicographically smallest string that is NOT prefixed by
/// `prefix`, i.e. the exclusive upper bound of the prefix range.
/// `None` if every string of length `prefix.len()` is prefixed by it
/// (only possible if `prefix` is made entirely of `char::MAX`).
fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        if let Some(incremented) = char::from_u32(last as u32 + 1) {
            chars.push(incremented);
            return Some(chars.into_iter().collect());
        }
    }
    None
}
