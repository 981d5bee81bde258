//! Persists a finalized place forest to the four on-disk artifacts plus
//! the metadata row (spec.md S4.3).
//!
//! Primary store, hierarchy table and type dictionary are flat
//! `bincode`-serialized files rather than `geonlp-primary.sqlite` - no
//! example in the pack embeds SQLite, and `bincode` is already the
//! idiomatic choice for a private on-disk format here (see DESIGN.md).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::expander::Expander;
use crate::expander::rule::{MAX_NAME_LEN, MAX_VARIANTS, MAX_COMMAS};
use crate::model::{HierarchyTable, Place, TypeTable};

use super::bbox_rtree::{assign_boxes, BoxTable};
use super::postings::PostingsStore;
use super::trie::Trie;

pub const STORE_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Meta {
    pub version: u32,
    pub postal_country_parser: Option<String>,
}

fn primary_path(dir: &Path) -> PathBuf {
    dir.join("object_primary.bin")
}
fn hierarchy_path(dir: &Path) -> PathBuf {
    dir.join("hierarchy.bin")
}
fn type_path(dir: &Path) -> PathBuf {
    dir.join("type.bin")
}
fn meta_path(dir: &Path) -> PathBuf {
    dir.join("meta.bin")
}
fn trie_path(dir: &Path) -> PathBuf {
    dir.join("geonlp-normalized.trie")
}
fn boxes_path(dir: &Path) -> PathBuf {
    dir.join("boxes.bin")
}
fn postings_path(dir: &Path) -> PathBuf {
    dir.join("geonlp-normalized-id.kch")
}

/// Write every artifact for `places` into `dir`, expanding names through
/// `expander`. Consumes `places` since box assignment mutates `box_id` in
/// place before the primary store is serialized.
pub fn write_index(
    dir: &Path,
    mut places: Vec<Place>,
    hierarchy: &HierarchyTable,
    types: &TypeTable,
    expander: &impl Expander,
    postal_country_parser: Option<String>,
) -> Result<()> {
    fs::create_dir_all(dir)?;

    info!(count = places.len(), "assigning bounding boxes");
    let boxes = assign_boxes(&mut places);

    info!("building normalized-name trie");
    let trie_keys = collect_trie_keys(&places, expander);
    let trie = Trie::build(trie_keys);

    info!(keys = trie.len(), "writing postings store");
    let postings_dir = postings_path(dir);
    if postings_dir.exists() {
        fs::remove_dir_all(&postings_dir)?;
    }
    let postings = PostingsStore::open(&postings_dir)?;
    write_postings(&postings, &trie, &places, expander)?;
    postings.flush()?;

    fs::write(primary_path(dir), bincode::serialize(&places)?)?;
    fs::write(hierarchy_path(dir), bincode::serialize(hierarchy)?)?;
    fs::write(type_path(dir), bincode::serialize(types)?)?;
    fs::write(boxes_path(dir), bincode::serialize(&BoxTable(boxes))?)?;
    fs::write(trie_path(dir), bincode::serialize(&trie)?)?;
    fs::write(
        meta_path(dir),
        bincode::serialize(&Meta {
            version: STORE_VERSION,
            postal_country_parser,
        })?,
    )?;

    info!(dir = %dir.display(), "index written");
    Ok(())
}

/// Every name/name_extra/name_en of every kept place, expanded and
/// filtered by the sanity checks of spec.md S4.1.
fn collect_trie_keys(places: &[Place], expander: &impl Expander) -> Vec<String> {
    let mut keys = Vec::new();
    for place in places {
        for name in place.indexable_names() {
            if is_suspicious(name) {
                continue;
            }
            let variants = expander.expand(name);
            if variants.len() > MAX_VARIANTS {
                continue;
            }
            keys.extend(variants);
        }
    }
    keys
}

fn is_suspicious(name: &str) -> bool {
    if name.len() > MAX_NAME_LEN {
        let digit_or_space = name.chars().filter(|c| c.is_ascii_digit() || c.is_whitespace()).count();
        if digit_or_space * 2 > name.len() {
            return true;
        }
    }
    name.chars().filter(|&c| c == ',').count() > MAX_COMMAS
}

fn write_postings(
    postings: &PostingsStore,
    trie: &Trie,
    places: &[Place],
    expander: &impl Expander,
) -> Result<()> {
    use hashbrown::HashMap;

    let mut by_key: HashMap<u32, Vec<i64>> = HashMap::new();
    for place in places {
        for name in place.indexable_names() {
            if is_suspicious(name) {
                continue;
            }
            for variant in expander.expand(name) {
                if let Some(id) = trie.id_of(&variant) {
                    by_key.entry(id).or_default().push(place.id);
                }
            }
        }
    }

    for (key, ids) in by_key {
        postings.put(key, ids)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expander::RuleExpander;
    use crate::model::HierarchyTable;

    fn place(id: i64, name: &str) -> Place {
        Place {
            id,
            source_id: id,
            name: name.to_string(),
            name_extra: None,
            name_en: None,
            phone: None,
            postal_code: None,
            website: None,
            parent: 0,
            type_id: 0,
            latitude: 48.85,
            longitude: 2.35,
            box_id: 0,
            search_rank: 500,
            my_index: id,
            last_child_index: id,
        }
    }

    #[test]
    fn write_index_produces_every_artifact() {
        let dir = std::env::temp_dir().join(format!(
            "geonlp-writer-test-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let places = vec![place(1, "Paris")];
        let expander = RuleExpander::new();
        write_index(&dir, places, &HierarchyTable::new(), &TypeTable::new(), &expander, None).unwrap();

        assert!(primary_path(&dir).exists());
        assert!(hierarchy_path(&dir).exists());
        assert!(type_path(&dir).exists());
        assert!(meta_path(&dir).exists());
        assert!(trie_path(&dir).exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
