//! The relational source the importer ingests from is out of scope (it's
//! an external collaborator, per spec.md S1); `PlaceSource` is the
//! concrete, testable seam the Hierarchy Builder pulls rows through.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// One raw row as read from the upstream relational source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    pub place_id: i64,
    pub linked_place_id: Option<i64>,
    pub parent_place_id: i64,
    pub country_code: Option<String>,
    pub class: String,
    /// Raw `type` column. `"yes"` or empty means "use `class` as the type".
    pub r#type: String,
    pub names: HashMap<String, String>,
    pub extra: HashMap<String, String>,
    pub housenumber: Option<String>,
    pub postcode: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub search_rank: i32,
    pub osm_type: Option<String>,
    pub osm_id: Option<i64>,
}

impl SourceRow {
    /// `class` when `type` is absent or the literal `"yes"`, else `class_type`.
    pub fn derived_type(&self) -> String {
        if self.r#type.is_empty() || self.r#type == "yes" {
            self.class.clone()
        } else {
            format!("{}_{}", self.class, self.r#type)
        }
    }
}

/// An upstream source of place rows. The importer's connectivity to a real
/// relational database is out of scope; this trait is the seam a concrete
/// adapter (SQL driver, test fixture, JSON dump) plugs into.
pub trait PlaceSource {
    /// Stream every primary and linked row the importer should ingest.
    fn rows(&mut self) -> Box<dyn Iterator<Item = SourceRow> + '_>;

    /// Fetch a single row by id, used to resolve a missing parent.
    fn fetch_by_id(&mut self, place_id: i64) -> Option<SourceRow>;

    /// Fetch an admin-rank-4 node to re-parent a country's orphan roots under.
    fn admin_node_for_country(&mut self, country_code: &str) -> Option<SourceRow>;
}

/// The simplest `PlaceSource`: an in-memory vector, used by tests and by
/// the importer's `--from-json` path.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    rows: Vec<SourceRow>,
}

impl InMemorySource {
    pub fn new(rows: Vec<SourceRow>) -> Self {
        Self { rows }
    }
}

impl PlaceSource for InMemorySource {
    fn rows(&mut self) -> Box<dyn Iterator<Item = SourceRow> + '_> {
        Box::new(self.rows.clone().into_iter())
    }

    fn fetch_by_id(&mut self, place_id: i64) -> Option<SourceRow> {
        self.rows.iter().find(|r| r.place_id == place_id).cloned()
    }

    fn admin_node_for_country(&mut self, country_code: &str) -> Option<SourceRow> {
        self.rows.iter().find(|r| {
            r.country_code.as_deref() == Some(country_code)
                && r.extra.get("admin_level").map(String::as_str) == Some("4")
        }).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(place_id: i64, class: &str, ty: &str) -> SourceRow {
        SourceRow {
            place_id,
            linked_place_id: None,
            parent_place_id: 0,
            country_code: None,
            class: class.to_string(),
            r#type: ty.to_string(),
            names: HashMap::new(),
            extra: HashMap::new(),
            housenumber: None,
            postcode: None,
            latitude: 0.0,
            longitude: 0.0,
            search_rank: 500,
            osm_type: None,
            osm_id: None,
        }
    }

    #[test]
    fn derived_type_falls_back_to_class() {
        assert_eq!(row(1, "place", "yes").derived_type(), "place");
        assert_eq!(row(1, "place", "").derived_type(), "place");
        assert_eq!(row(1, "place", "city").derived_type(), "place_city");
    }

    #[test]
    fn in_memory_source_fetches_by_id() {
        let mut source = InMemorySource::new(vec![row(10, "place", "city")]);
        assert!(source.fetch_by_id(10).is_some());
        assert!(source.fetch_by_id(99).is_none());
    }
}
