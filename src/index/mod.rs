//! On-disk index artifacts: writer, reader, and the trie/postings/R-tree
//! structures they share.

pub mod bbox_rtree;
pub mod postings;
pub mod reader;
pub mod trie;
pub mod writer;

pub use bbox_rtree::{BoxIndex, BoxTable};
pub use postings::PostingsStore;
pub use reader::GeonlpReader;
pub use trie::Trie;
pub use writer::{write_index, Meta, STORE_VERSION};
