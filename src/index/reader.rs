//! Opens the four on-disk artifacts read-only, with the lifecycle rules
//! of spec.md S5: idempotent `load`, `drop` closes everything, a reader
//! with nothing loaded returns empty results without error.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{GeonlpError, Result};
use crate::model::{HierarchyTable, Place, TypeTable};

use super::bbox_rtree::{BoxIndex, BoxTable};
use super::postings::PostingsStore;
use super::trie::Trie;
use super::writer::{Meta, STORE_VERSION};

struct Loaded {
    path: PathBuf,
    places: Vec<Place>,
    hierarchy: HierarchyTable,
    types: TypeTable,
    trie: Arc<Trie>,
    boxes: BoxIndex,
    postings: PostingsStore,
    meta: Meta,
}

/// A single reader handle. Each handle owns its own postings cursor and
/// primary-store snapshot; two handles never share mutable state
/// (spec.md S5).
#[derive(Default)]
pub struct GeonlpReader {
    loaded: Option<Loaded>,
}

impl GeonlpReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: re-loading the currently-open path is a no-op.
    /// Loading a different path first drops the old handles.
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        if let Some(loaded) = &self.loaded {
            if loaded.path == dir {
                return Ok(());
            }
        }
        self.drop_handles();

        let meta: Meta = bincode::deserialize(&fs::read(dir.join("meta.bin")).map_err(|_| {
            GeonlpError::StoreMissing(dir.join("meta.bin"))
        })?)?;
        if meta.version != STORE_VERSION {
            return Err(GeonlpError::VersionMismatch {
                found: meta.version,
                expected: STORE_VERSION,
            });
        }

        let places: Vec<Place> = bincode::deserialize(&fs::read(dir.join("object_primary.bin"))?)?;
        let hierarchy: HierarchyTable = bincode::deserialize(&fs::read(dir.join("hierarchy.bin"))?)?;
        let types: TypeTable = bincode::deserialize(&fs::read(dir.join("type.bin"))?)?;
        let trie: Trie = {
            let file = fs::File::open(dir.join("geonlp-normalized.trie"))?;
            // The trie is the one artifact large enough to be worth mapping
            // rather than copied into the heap; the mmap is dropped at the
            // end of this block once the owned `Trie` has been decoded out
            // of it.
            let mmap = unsafe { memmap2::Mmap::map(&file)? };
            bincode::deserialize(&mmap[..])?
        };
        let BoxTable(boxes) = bincode::deserialize(&fs::read(dir.join("boxes.bin"))?)?;
        let postings = PostingsStore::open(&dir.join("geonlp-normalized-id.kch"))?;

        info!(dir = %dir.display(), places = places.len(), "index loaded");

        self.loaded = Some(Loaded {
            path: dir.to_path_buf(),
            places,
            hierarchy,
            types,
            trie: Arc::new(trie),
            boxes: BoxIndex::build(boxes),
            postings,
            meta,
        });
        Ok(())
    }

    fn drop_handles(&mut self) {
        if let Some(loaded) = self.loaded.take() {
            info!(dir = %loaded.path.display(), "index dropped");
        }
    }

    pub fn drop(&mut self) {
        self.drop_handles();
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn places(&self) -> &[Place] {
        self.loaded.as_ref().map(|l| l.places.as_slice()).unwrap_or(&[])
    }

    pub fn place_by_my_index(&self, my_index: i64) -> Option<&Place> {
        self.loaded
            .as_ref()
            .and_then(|l| l.places.binary_search_by_key(&my_index, |p| p.my_index).ok().map(|i| &l.places[i]))
    }

    pub fn place_by_id(&self, id: i64) -> Option<&Place> {
        self.loaded.as_ref().and_then(|l| l.places.iter().find(|p| p.id == id))
    }

    pub fn hierarchy(&self) -> Option<&HierarchyTable> {
        self.loaded.as_ref().map(|l| &l.hierarchy)
    }

    pub fn types(&self) -> Option<&TypeTable> {
        self.loaded.as_ref().map(|l| &l.types)
    }

    pub fn trie(&self) -> Option<Arc<Trie>> {
        self.loaded.as_ref().map(|l| Arc::clone(&l.trie))
    }

    pub fn boxes(&self) -> Option<&BoxIndex> {
        self.loaded.as_ref().map(|l| &l.boxes)
    }

    pub fn postings(&self) -> Option<&PostingsStore> {
        self.loaded.as_ref().map(|l| &l.postings)
    }

    pub fn meta(&self) -> Option<&Meta> {
        self.loaded.as_ref().map(|l| &l.meta)
    }
}

impl Drop for GeonlpReader {
    fn drop(&mut self) {
        if self.loaded.is_some() {
            warn!("GeonlpReader dropped without an explicit drop() call");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expander::RuleExpander;
    use crate::index::writer::write_index;
    use crate::model::HierarchyTable;

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("geonlp-reader-test-{tag}-{nanos}"))
    }

    #[test]
    fn reload_same_path_is_a_no_op() {
        let dir = scratch_dir("reload");
        let places = vec![];
        write_index(&dir, places, &HierarchyTable::new(), &TypeTable::new(), &RuleExpander::new(), None).unwrap();

        let mut reader = GeonlpReader::new();
        reader.load(&dir).unwrap();
        assert!(reader.load(&dir).is_ok());
        assert!(reader.is_loaded());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unloaded_reader_has_no_places() {
        let reader = GeonlpReader::new();
        assert!(reader.places().is_empty());
        assert!(!reader.is_loaded());
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let dir = scratch_dir("version");
        write_index(&dir, vec![], &HierarchyTable::new(), &TypeTable::new(), &RuleExpander::new(), None).unwrap();
        fs::write(
            dir.join("meta.bin"),
            bincode::serialize(&Meta {
                version: STORE_VERSION + 1,
                postal_country_parser: None,
            })
            .unwrap(),
        )
        .unwrap();

        let mut reader = GeonlpReader::new();
        let err = reader.load(&dir).unwrap_err();
        assert!(matches!(err, GeonlpError::VersionMismatch { .. }));

        let _ = fs::remove_dir_all(&dir);
    }
}
