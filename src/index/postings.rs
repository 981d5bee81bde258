//! The postings store: trie-key id -> sorted place-id array.
//!
//! Persisted in a `sled::Db` (already a teacher dependency, used there for
//! a similar ordered-KV role). Keys are stored big-endian so `sled`'s
//! byte-lexicographic ordering matches numeric ascending order (spec.md
//! S6: "keys ... stored in ascending order"); posting VALUES stay
//! little-endian per spec.md S9's binary-posting-format note, since those
//! are the bytes the search hot path range-scans without decoding.

use std::path::Path;

use crate::error::Result;

#[derive(Debug)]
pub struct PostingsStore {
    db: sled::Db,
}

impl PostingsStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::Config::new()
            .path(path)
            .mode(sled::Mode::LowThroughput)
            .open()?;
        Ok(Self { db })
    }

    /// Replace the posting list for `key` with `place_ids`, sorted and
    /// deduplicated (spec.md invariant: "strictly ascending, duplicate-free").
    pub fn put(&self, key: u32, mut place_ids: Vec<i64>) -> Result<()> {
        place_ids.sort_unstable();
        place_ids.dedup();
        let mut value = Vec::with_capacity(place_ids.len() * 4);
        for id in &place_ids {
            value.extend_from_slice(&(*id as u32).to_le_bytes());
        }
        self.db.insert(key.to_be_bytes(), value)?;
        Ok(())
    }

    pub fn get(&self, key: u32) -> Result<Vec<i64>> {
        match self.db.get(key.to_be_bytes())? {
            Some(bytes) => Ok(decode_postings(&bytes)),
            None => Ok(Vec::new()),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

fn decode_postings(bytes: &[u8]) -> Vec<i64> {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes(chunk.try_into().expect("chunks_exact(4)")) as i64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_sorts_and_dedupes() {
        let dir = tempfile_dir();
        let store = PostingsStore::open(dir.path()).unwrap();
        store.put(7, vec![30, 10, 20, 10]).unwrap();
        assert_eq!(store.get(7).unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn missing_key_returns_empty() {
        let dir = tempfile_dir();
        let store = PostingsStore::open(dir.path()).unwrap();
        assert_eq!(store.get(999).unwrap(), Vec::<i64>::new());
    }

    fn tempfile_dir() -> TempPath {
        TempPath::new()
    }

    /// Minimal self-cleaning temp dir, avoiding a dependency on `tempfile`
    /// (not in this crate's dependency set) for test-only scratch space.
    struct TempPath(std::path::PathBuf);

    impl TempPath {
        fn new() -> Self {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system clock before epoch")
                .as_nanos();
            let mut base = std::env::temp_dir();
            base.push(format!("geonlp-postings-test-{}-{nanos}", std::process::id()));
            Self(base)
        }

        fn path(&self) -> &std::path::Path {
            &self.0
        }
    }

    impl Drop for TempPath {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
}
