//! Turns a flat stream of source rows into a finalized, nested-set-indexed
//! forest.
//!
//! Grounded in the teacher's `pip::boundary` style ("data describes
//! geometry, ids link structure"), generalized into an arena+id ownership
//! model: nodes never hold references to each other, only ids resolved
//! through `nodes`. This lets duplicate-collapse rewrite a survivor's
//! child list without invalidating anything else pointing at the
//! merged-away id.

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::{GeonlpError, Result};
use crate::model::{Place, TypeTable};

use super::config::ImportConfig;
use super::source::{PlaceSource, SourceRow};

#[derive(Debug, Clone)]
struct Node {
    place: Place,
    raw_type: String,
    children: Vec<i64>,
    dropped: bool,
}

impl Node {
    /// Fails `keep()` per spec.md S4.2: not in the priority list and has
    /// no name, or is in the skip list, or its type has disallowed chars.
    fn fails_keep(&self, config: &ImportConfig) -> bool {
        let no_name = self.place.name.is_empty();
        let not_priority = !config.priority_types.contains(&self.raw_type);
        let in_skip = config.skip_types.contains(&self.raw_type);
        let bad_chars = self
            .raw_type
            .chars()
            .any(|c| !(c.is_ascii_lowercase() || c == '_' || c == '-'));
        (no_name && not_priority) || in_skip || bad_chars
    }

    /// The merge key duplicate siblings are grouped by (spec.md S3): name,
    /// name_extra, postal_code, coarsened type, and - for priority types
    /// only - the place id itself (so priority duplicates never merge).
    fn duplicate_key(&self, config: &ImportConfig) -> (String, String, String, String, Option<i64>) {
        let id_if_priority = config.priority_types.contains(&self.raw_type).then_some(self.place.id);
        (
            self.place.name.clone(),
            self.place.name_extra.clone().unwrap_or_default(),
            self.place.postal_code.clone().unwrap_or_default(),
            self.raw_type.clone(),
            id_if_priority,
        )
    }
}

pub struct HierarchyBuilder {
    nodes: HashMap<i64, Node>,
    root_ids: Vec<i64>,
    /// child ids waiting on a parent id not yet ingested.
    orphans_by_parent: HashMap<i64, Vec<i64>>,
    missing_parents: HashSet<i64>,
    config: ImportConfig,
    types: TypeTable,
}

impl HierarchyBuilder {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            nodes: HashMap::new(),
            root_ids: Vec::new(),
            orphans_by_parent: HashMap::new(),
            missing_parents: HashSet::new(),
            config,
            types: TypeTable::new(),
        }
    }

    /// Step 1/2 combined: dispatch a row to primary or linked ingestion
    /// based on whether `linked_place_id` is set.
    pub fn ingest_row(&mut self, row: SourceRow) -> Result<()> {
        if row.linked_place_id.is_some() {
            self.ingest_linked(row)
        } else {
            self.ingest_primary(row)
        }
    }

    /// Step 1: ingest a primary row (spec.md S4.2).
    pub fn ingest_primary(&mut self, row: SourceRow) -> Result<()> {
        if self.nodes.contains_key(&row.place_id) {
            return Err(GeonlpError::DuplicateId(row.place_id));
        }

        let raw_type = row.derived_type();
        let type_id = self.types.intern(&raw_type);

        let (name, name_extra) = match &row.housenumber {
            Some(hn) if !hn.is_empty() => (hn.clone(), row.names.get("name").cloned()),
            _ => (
                row.names.get("name").cloned().unwrap_or_default(),
                row.extra.get("brand").cloned(),
            ),
        };

        let place = Place {
            id: row.place_id,
            source_id: row.osm_id.unwrap_or(row.place_id),
            name,
            name_extra,
            name_en: row.names.get("en").cloned(),
            phone: row.extra.get("phone").cloned(),
            postal_code: row.postcode.clone(),
            website: row.extra.get("website").cloned(),
            parent: row.parent_place_id,
            type_id,
            latitude: row.latitude,
            longitude: row.longitude,
            box_id: 0,
            search_rank: row.search_rank,
            my_index: 0,
            last_child_index: 0,
        };

        let id = place.id;
        self.nodes.insert(
            id,
            Node {
                place,
                raw_type,
                children: Vec::new(),
                dropped: false,
            },
        );

        self.attach(id, row.parent_place_id);
        Ok(())
    }

    fn attach(&mut self, child: i64, parent: i64) {
        if parent == 0 {
            self.root_ids.push(child);
            return;
        }
        if self.nodes.contains_key(&parent) {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.push(child);
            }
        } else {
            self.orphans_by_parent.entry(parent).or_default().push(child);
            self.missing_parents.insert(parent);
        }
    }

    /// Step 2: merge a linked row's names/extras into its host. Missing
    /// host is logged and skipped, not fatal (spec.md S4.2 step 2).
    pub fn ingest_linked(&mut self, row: SourceRow) -> Result<()> {
        let host_id = row.linked_place_id.expect("ingest_linked requires linked_place_id");
        let Some(node) = self.nodes.get_mut(&host_id) else {
            warn!(host_id, "linked row references missing host; skipping");
            return Ok(());
        };

        if let Some(name) = row.names.get("name") {
            if node.place.name.is_empty() {
                node.place.name = name.clone();
            }
        }
        if node.place.name_en.is_none() {
            node.place.name_en = row.names.get("en").cloned();
        }
        if node.place.name_extra.is_none() {
            node.place.name_extra = row.extra.get("brand").cloned();
        }
        if node.place.phone.is_none() {
            node.place.phone = row.extra.get("phone").cloned();
        }
        if node.place.website.is_none() {
            node.place.website = row.extra.get("website").cloned();
        }
        if node.place.postal_code.is_none() {
            node.place.postal_code = row.postcode.clone();
        }
        Ok(())
    }

    /// Step 3: resolve every referenced-but-missing parent by pulling it
    /// from `source`, iteratively, until none remain. Fatal if the source
    /// doesn't have one.
    pub fn fetch_missing_parents(&mut self, source: &mut impl PlaceSource) -> Result<()> {
        while let Some(&parent_id) = self.missing_parents.iter().next() {
            self.missing_parents.remove(&parent_id);
            if self.nodes.contains_key(&parent_id) {
                continue;
            }
            match source.fetch_by_id(parent_id) {
                Some(row) => {
                    self.ingest_primary(row)?;
                    if let Some(waiting) = self.orphans_by_parent.remove(&parent_id) {
                        for child in waiting {
                            if let Some(node) = self.nodes.get_mut(&parent_id) {
                                node.children.push(child);
                            }
                        }
                    }
                }
                None => return Err(GeonlpError::MissingHost(parent_id)),
            }
        }
        Ok(())
    }

    /// Step 5: re-parent orphan roots of a known country under that
    /// country's admin-rank-4 node.
    pub fn set_country(&mut self, source: &mut impl PlaceSource) -> Result<()> {
        let orphan_countries: HashSet<String> = self
            .root_ids
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter_map(|node| {
                // roots only carry a country code via their place's source row;
                // we approximate via the type string prefix "place_country".
                (node.raw_type == "place_country").then(|| node.place.name.clone())
            })
            .collect();

        for code in orphan_countries {
            let Some(admin_row) = source.admin_node_for_country(&code) else {
                continue;
            };
            if !self.nodes.contains_key(&admin_row.place_id) {
                self.ingest_primary(admin_row.clone())?;
            }
            let admin_id = admin_row.place_id;
            self.root_ids.retain(|&id| {
                let is_country_root = self
                    .nodes
                    .get(&id)
                    .is_some_and(|n| n.raw_type == "place_country" && n.place.name == code);
                if is_country_root {
                    if let Some(node) = self.nodes.get_mut(&admin_id) {
                        node.children.push(id);
                    }
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.place.parent = admin_id;
                    }
                }
                !is_country_root
            });
        }
        Ok(())
    }

    /// Step 4: drop children failing `keep()` (promoting their own
    /// children in their place) then collapse duplicate siblings.
    pub fn cleanup(&mut self) -> Result<()> {
        let roots = self.root_ids.clone();
        for root in roots {
            self.cleanup_subtree(root);
        }
        Ok(())
    }

    fn cleanup_subtree(&mut self, id: i64) {
        let children = self.nodes.get(&id).map(|n| n.children.clone()).unwrap_or_default();

        let mut promoted = Vec::new();
        for child in children {
            self.cleanup_subtree(child);
            let fails = self.nodes.get(&child).is_some_and(|n| n.fails_keep(&self.config));
            if fails {
                debug!(child, "dropping place failing keep(), promoting its children");
                if let Some(node) = self.nodes.get_mut(&child) {
                    node.dropped = true;
                }
                let grandchildren = self.nodes.get(&child).map(|n| n.children.clone()).unwrap_or_default();
                for grandchild in &grandchildren {
                    if let Some(node) = self.nodes.get_mut(grandchild) {
                        node.place.parent = id;
                    }
                }
                promoted.extend(grandchildren);
            } else {
                promoted.push(child);
            }
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = promoted;
        }

        self.collapse_duplicates(id);
    }

    fn collapse_duplicates(&mut self, parent: i64) {
        let Some(children) = self.nodes.get(&parent).map(|n| n.children.clone()) else {
            return;
        };

        let mut groups: HashMap<(String, String, String, String, Option<i64>), Vec<i64>> = HashMap::new();
        for child in &children {
            if let Some(node) = self.nodes.get(child) {
                groups.entry(node.duplicate_key(&self.config)).or_default().push(*child);
            }
        }

        let mut survivors = Vec::new();
        for (_, mut ids) in groups {
            ids.sort_unstable();
            let survivor = ids[0];
            for dup in &ids[1..] {
                let dup_children = self.nodes.get(dup).map(|n| n.children.clone()).unwrap_or_default();
                for dup_child in &dup_children {
                    if let Some(node) = self.nodes.get_mut(dup_child) {
                        node.place.parent = survivor;
                    }
                }
                if let Some(node) = self.nodes.get_mut(&survivor) {
                    node.children.extend(dup_children);
                }
                if let Some(node) = self.nodes.get_mut(dup) {
                    node.dropped = true;
                }
            }
            survivors.push(survivor);
        }

        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children = survivors;
        }
    }

    /// Step 6: depth-first, assign `my_index` from 1, propagate
    /// `last_child_index` on return, roots get `parent = 0`.
    pub fn finalize(&mut self) -> Result<()> {
        let roots = self.root_ids.clone();
        let mut next_index = 1i64;
        for root in roots {
            if let Some(node) = self.nodes.get_mut(&root) {
                node.place.parent = 0;
            }
            self.finalize_subtree(root, &mut next_index);
        }
        Ok(())
    }

    fn finalize_subtree(&mut self, id: i64, next_index: &mut i64) -> i64 {
        let my_index = *next_index;
        *next_index += 1;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.place.my_index = my_index;
        }

        let children = self.nodes.get(&id).map(|n| n.children.clone()).unwrap_or_default();
        let mut last = my_index;
        for child in children {
            last = self.finalize_subtree(child, next_index);
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.place.last_child_index = last;
        }
        last
    }

    /// Step 7: every kept place has `my_index > 0`, and every parent
    /// chain terminates at 0 without a cycle.
    pub fn check_indexing(&self) -> Result<()> {
        for (id, node) in &self.nodes {
            if node.dropped {
                continue;
            }
            if node.place.my_index <= 0 {
                return Err(GeonlpError::IndexCheckFailed(format!(
                    "place {id} kept but never assigned a nested-set index"
                )));
            }

            let mut visited = HashSet::new();
            let mut cursor = node.place.parent;
            while cursor != 0 {
                if !visited.insert(cursor) {
                    return Err(GeonlpError::Cycle(*id));
                }
                match self.nodes.get(&cursor) {
                    Some(parent_node) => cursor = parent_node.place.parent,
                    None => {
                        return Err(GeonlpError::IndexCheckFailed(format!(
                            "place {id}'s parent chain references unknown place {cursor}"
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    /// Consume the builder, returning every kept place and the interned
    /// type table, ready for the Index Writer.
    ///
    /// Reassigns `id`/`parent` from the upstream source's id space into the
    /// depth-first traversal order `finalize` established (spec.md S3: "all
    /// place ids are assigned by a depth-first traversal of the finalized
    /// hierarchy starting at 1"). `source_id` keeps the original upstream
    /// identifier untouched.
    pub fn into_parts(self) -> (Vec<Place>, TypeTable) {
        let old_to_new: HashMap<i64, i64> =
            self.nodes.iter().map(|(&old_id, node)| (old_id, node.place.my_index)).collect();

        let mut places: Vec<Place> = self
            .nodes
            .into_values()
            .filter(|n| !n.dropped)
            .map(|n| {
                let mut place = n.place;
                place.parent = if place.parent == 0 {
                    0
                } else {
                    old_to_new.get(&place.parent).copied().unwrap_or(0)
                };
                place.id = place.my_index;
                place
            })
            .collect();
        places.sort_by_key(|p| p.my_index);
        (places, self.types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::source::InMemorySource;

    fn row(id: i64, parent: i64, name: &str) -> SourceRow {
        SourceRow {
            place_id: id,
            linked_place_id: None,
            parent_place_id: parent,
            country_code: None,
            class: "place".to_string(),
            r#type: "city".to_string(),
            names: HashMap::from([("name".to_string(), name.to_string())]),
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
    fn duplicate_insert_is_fatal() {
        let mut builder = HierarchyBuilder::new(ImportConfig::new());
        builder.ingest_primary(row(1, 0, "A")).unwrap();
        let err = builder.ingest_primary(row(1, 0, "A")).unwrap_err();
        assert!(matches!(err, GeonlpError::DuplicateId(1)));
    }

    #[test]
    fn linked_row_missing_host_is_not_fatal() {
        let mut builder = HierarchyBuilder::new(ImportConfig::new());
        let mut linked = row(2, 0, "ignored");
        linked.linked_place_id = Some(999);
        assert!(builder.ingest_row(linked).is_ok());
    }

    #[test]
    fn finalize_assigns_nested_set_per_scenario_1() {
        // A(10,parent=0), B(20,parent=10), C(30,parent=20) -> A=(1,3) B=(2,3) C=(3,3)
        let mut builder = HierarchyBuilder::new(ImportConfig::new());
        builder.ingest_primary(row(10, 0, "A")).unwrap();
        builder.ingest_primary(row(20, 10, "B")).unwrap();
        builder.ingest_primary(row(30, 20, "C")).unwrap();
        builder.cleanup().unwrap();
        builder.finalize().unwrap();
        builder.check_indexing().unwrap();

        let (places, _) = builder.into_parts();
        let by_source_id: HashMap<i64, &Place> = places.iter().map(|p| (p.source_id, p)).collect();
        assert_eq!((by_source_id[&10].my_index, by_source_id[&10].last_child_index), (1, 3));
        assert_eq!((by_source_id[&20].my_index, by_source_id[&20].last_child_index), (2, 3));
        assert_eq!((by_source_id[&30].my_index, by_source_id[&30].last_child_index), (3, 3));

        // `id`/`parent` are reassigned into depth-first order, not left as
        // the upstream source ids (spec.md S3).
        assert_eq!(by_source_id[&10].id, 1);
        assert_eq!(by_source_id[&20].id, 2);
        assert_eq!(by_source_id[&30].id, 3);
        assert_eq!(by_source_id[&20].parent, 1);
        assert_eq!(by_source_id[&30].parent, 2);
    }

    #[test]
    fn duplicate_collapse_reparents_surviving_children() {
        // root(1) -> {dup_a(2), dup_b(3)} (same name, merge), dup_b has a
        // child(4) that must end up parented under dup_a once dup_b is
        // dropped, not left pointing at the extinguished id.
        let mut builder = HierarchyBuilder::new(ImportConfig::new());
        builder.ingest_primary(row(1, 0, "root")).unwrap();
        let mut dup_a = row(2, 1, "Main");
        dup_a.r#type = "house".to_string();
        dup_a.postcode = Some("12345".to_string());
        let mut dup_b = row(3, 1, "Main");
        dup_b.r#type = "house".to_string();
        dup_b.postcode = Some("12345".to_string());
        builder.ingest_primary(dup_a).unwrap();
        builder.ingest_primary(dup_b).unwrap();
        builder.ingest_primary(row(4, 3, "child of dup_b")).unwrap();
        builder.cleanup().unwrap();
        builder.finalize().unwrap();
        builder.check_indexing().unwrap();

        let (places, _) = builder.into_parts();
        let by_source_id: HashMap<i64, &Place> = places.iter().map(|p| (p.source_id, p)).collect();
        assert!(!by_source_id.contains_key(&3), "dup_b should have been dropped");
        assert_eq!(by_source_id[&4].parent, by_source_id[&2].id);
    }

    #[test]
    fn fetch_missing_parents_resolves_iteratively() {
        let mut builder = HierarchyBuilder::new(ImportConfig::new());
        builder.ingest_primary(row(30, 20, "C")).unwrap();
        let mut source = InMemorySource::new(vec![row(10, 0, "A"), row(20, 10, "B")]);
        builder.fetch_missing_parents(&mut source).unwrap();
        builder.finalize().unwrap();
        let (places, _) = builder.into_parts();
        assert_eq!(places.len(), 3);
    }

    #[test]
    fn duplicate_siblings_collapse_per_scenario_2() {
        let mut builder = HierarchyBuilder::new(ImportConfig::new());
        builder.ingest_primary(row(1, 0, "root")).unwrap();
        let mut a = row(2, 1, "Main");
        a.r#type = "house".to_string();
        a.postcode = Some("12345".to_string());
        let mut b = row(3, 1, "Main");
        b.r#type = "house".to_string();
        b.postcode = Some("12345".to_string());
        builder.ingest_primary(a).unwrap();
        builder.ingest_primary(b).unwrap();
        builder.cleanup().unwrap();
        builder.finalize().unwrap();
        let (places, _) = builder.into_parts();
        let remaining: Vec<_> = places.iter().filter(|p| p.name == "Main").collect();
        assert_eq!(remaining.len(), 1);
    }
}
