//! Import-time pipeline: turns a stream of source rows into the finalized
//! place forest the Index Writer persists.

mod config;
mod hierarchy;
mod source;

pub use config::ImportConfig;
pub use hierarchy::HierarchyBuilder;
pub use source::{InMemorySource, PlaceSource, SourceRow};
