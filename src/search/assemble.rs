//! Result Assembler (spec.md S4.6): turns raw candidate ids into
//! display-ready results, applies the postal-code filter, and does the
//! final tie-break sort + truncate.

use hashbrown::{HashMap, HashSet};
use serde::Serialize;

use crate::expander::Expander;
use crate::model::{Place, TypeTable};

use super::core::{Candidate, SearchConfig};

#[derive(Debug, Clone, Serialize)]
pub struct GeoResult {
    pub id: i64,
    pub title: String,
    pub full_address: String,
    pub types: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub admin_levels: usize,
    pub levels_resolved: usize,
    pub search_rank: i32,
}

/// Leaf-first parent chain, stopping at a root, a missing parent, or a
/// repeated id (cycle guard - degrades gracefully per spec.md S7 rather
/// than erroring, since a corrupt chain should never reach this path).
fn walk_chain<'a>(places_by_id: &HashMap<i64, &'a Place>, id: i64) -> Vec<&'a Place> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut current = id;
    loop {
        let Some(&place) = places_by_id.get(&current) else { break };
        if !visited.insert(current) {
            break;
        }
        chain.push(place);
        if place.parent == 0 {
            break;
        }
        current = place.parent;
    }
    chain
}

fn display_name(place: &Place, preferred_language: &str) -> String {
    if preferred_language == "en" {
        if let Some(en) = place.name_en.as_deref() {
            if !en.is_empty() {
                return en.to_string();
            }
        }
    }
    if let Some(extra) = place.name_extra.as_deref() {
        if !extra.is_empty() && extra != place.name {
            return format!("{extra}, {}", place.name);
        }
    }
    place.name.clone()
}

/// Build display-ready results from raw candidates: parent-link walk for
/// `full_address`/`title`, language preference, type lookup, and the
/// postal-code filter, followed by the final `(search_rank, address_len,
/// address)` sort and `max_results` truncation.
pub fn assemble(
    places_by_id: &HashMap<i64, &Place>,
    types: &TypeTable,
    candidates: &[Candidate],
    postal_code_filter: Option<&str>,
    expander: &impl Expander,
    config: &SearchConfig,
) -> Vec<GeoResult> {
    let mut results = Vec::new();

    for candidate in candidates {
        let Some(&place) = places_by_id.get(&candidate.id) else { continue };

        if let Some(wanted) = postal_code_filter {
            let normalized_wanted = expander.normalize_postalcode(wanted);
            let stored_matches = place
                .postal_code
                .as_deref()
                .is_some_and(|stored| expander.normalize_postalcode(stored) == normalized_wanted);
            if !stored_matches {
                continue;
            }
        }

        let chain = walk_chain(places_by_id, candidate.id);
        let names: Vec<String> = chain
            .iter()
            .map(|p| display_name(p, &config.preferred_result_language))
            .collect();
        let full_address = names.join(", ");
        let title_levels = config.levels_in_title.max(1).min(names.len().max(1));
        let title = names[..title_levels.min(names.len())].join(", ");
        let type_names: Vec<String> = types.name(place.type_id).into_iter().map(str::to_string).collect();

        results.push(GeoResult {
            id: place.id,
            title,
            full_address,
            types: type_names,
            latitude: place.latitude,
            longitude: place.longitude,
            postal_code: place.postal_code.clone(),
            phone: place.phone.clone(),
            website: place.website.clone(),
            admin_levels: chain.len(),
            levels_resolved: candidate.levels_resolved,
            search_rank: place.search_rank,
        });
    }

    results.sort_by(|a, b| {
        a.search_rank
            .cmp(&b.search_rank)
            .then_with(|| a.full_address.len().cmp(&b.full_address.len()))
            .then_with(|| a.full_address.cmp(&b.full_address))
    });
    if config.max_results > 0 {
        results.truncate(config.max_results);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expander::RuleExpander;

    fn place(id: i64, parent: i64, name: &str, search_rank: i32, postal: Option<&str>) -> Place {
        Place {
            id,
            source_id: id,
            name: name.to_string(),
            name_extra: None,
            name_en: None,
            phone: None,
            postal_code: postal.map(str::to_string),
            website: None,
            parent,
            type_id: 0,
            latitude: 0.0,
            longitude: 0.0,
            box_id: 0,
            search_rank,
            my_index: id,
            last_child_index: id,
        }
    }

    #[test]
    fn full_address_walks_parent_chain_leaf_first() {
        let france = place(1, 0, "France", 100, None);
        let paris = place(2, 1, "Paris", 50, None);
        let places_by_id: HashMap<i64, &Place> = HashMap::from([(1, &france), (2, &paris)]);

        let candidates = vec![Candidate { id: 2, levels_resolved: 2 }];
        let results = assemble(
            &places_by_id,
            &TypeTable::new(),
            &candidates,
            None,
            &RuleExpander::new(),
            &SearchConfig::default(),
        );

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].full_address, "Paris, France");
        assert_eq!(results[0].admin_levels, 2);
    }

    #[test]
    fn postal_code_filter_rejects_mismatches() {
        let paris = place(2, 0, "Paris", 50, Some("75002"));
        let places_by_id: HashMap<i64, &Place> = HashMap::from([(2, &paris)]);
        let candidates = vec![Candidate { id: 2, levels_resolved: 1 }];

        let results = assemble(
            &places_by_id,
            &TypeTable::new(),
            &candidates,
            Some("75001"),
            &RuleExpander::new(),
            &SearchConfig::default(),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn final_sort_is_by_rank_then_length_then_address() {
        let a = place(1, 0, "Albertville", 10, None);
        let b = place(2, 0, "Albi", 10, None);
        let places_by_id: HashMap<i64, &Place> = HashMap::from([(1, &a), (2, &b)]);
        let candidates = vec![
            Candidate { id: 1, levels_resolved: 1 },
            Candidate { id: 2, levels_resolved: 1 },
        ];

        let results = assemble(
            &places_by_id,
            &TypeTable::new(),
            &candidates,
            None,
            &RuleExpander::new(),
            &SearchConfig::default(),
        );
        assert_eq!(results[0].id, 2); // "Albi" is shorter than "Albertville"
    }
}
