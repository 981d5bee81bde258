//! Import-time configuration. Kept as an explicit struct rather than
//! process-wide state, per the priority/skip type lists being "config,
//! not global storage accessible from unrelated code".

use hashbrown::HashSet;

#[derive(Debug, Clone, Default)]
pub struct ImportConfig {
    /// Types kept even when a place has no name.
    pub priority_types: HashSet<String>,
    /// Types dropped even when a place does have a name.
    pub skip_types: HashSet<String>,
    /// GeoJSON polygon restricting which source rows are ingested, if any.
    pub boundary: Option<geojson::GeoJson>,
    pub verbose: bool,
}

impl ImportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority_types(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.priority_types = types.into_iter().collect();
        self
    }

    pub fn with_skip_types(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.skip_types = types.into_iter().collect();
        self
    }
}
