//! Forward-geocoding search core, nearby search, and result assembly
//! (spec.md S4.4-S4.6).

pub mod assemble;
pub mod core;
pub mod levels;
pub mod nearby;

pub use assemble::{assemble, GeoResult};
pub use core::{search, Candidate, SearchConfig};
pub use levels::project_levels;
pub use nearby::{search_corridor, search_point, NearbyMatch, NearbySource};
