//! Projects a parse's labeled variant lists onto the ordered hierarchy
//! levels the search core walks (spec.md S4.4).

use crate::expander::{Parse, HIERARCHY_LABELS};

/// One level's candidate variants.
pub type Level = Vec<String>;

/// Project `parse` onto `[country, country_region, ..., house]`, skipping
/// missing labels. A "primitive" parse (labels `h-0, h-1, ...`) is
/// projected in its own natural ascending order instead.
pub fn project_levels(parse: &Parse) -> Vec<Level> {
    let mut primitive: Vec<(usize, &Vec<String>)> = parse
        .labels
        .iter()
        .filter_map(|(label, variants)| {
            label.strip_prefix("h-").and_then(|n| n.parse::<usize>().ok()).map(|i| (i, variants))
        })
        .collect();

    if !primitive.is_empty() {
        primitive.sort_by_key(|(i, _)| *i);
        return primitive.into_iter().map(|(_, v)| v.clone()).collect();
    }

    HIERARCHY_LABELS
        .iter()
        .filter(|&&label| label != "postal_code")
        .filter_map(|&label| parse.get(label).map(|v| v.to_vec()))
        .collect()
}
