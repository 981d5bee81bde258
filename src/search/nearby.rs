//! Point and corridor nearby search (spec.md S4.5).
//!
//! Reuses `rstar::AABB` envelope queries the same way the teacher's
//! `AdminSpatialIndex` does, and a planar local approximation (grounded in
//! the coordinate handling of the teacher's geometry resolver) rather
//! than exact great-circle distance, matching the spec's stated geometry
//! model.

use hashbrown::{HashMap, HashSet};
use rstar::AABB;

use crate::expander::Expander;
use crate::index::BoxIndex;
use crate::model::{Place, TypeTable};

use super::core::SearchConfig;

pub const METERS_PER_LAT_DEGREE: f64 = 111_000.0;

pub fn meters_per_lon_degree(lat_deg: f64) -> f64 {
    (std::f64::consts::PI / 180.0 * 6_378_137.0 * lat_deg.to_radians().cos()).max(1000.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyMatch {
    pub id: i64,
    pub distance_m: f64,
}

/// Read-only view the nearby search reads candidates from.
pub struct NearbySource<'a> {
    pub boxes: &'a BoxIndex,
    pub places: &'a [Place],
    pub types: &'a TypeTable,
}

impl<'a> NearbySource<'a> {
    fn places_by_box(&self) -> HashMap<u32, Vec<&'a Place>> {
        let mut by_box: HashMap<u32, Vec<&Place>> = HashMap::new();
        for place in self.places {
            by_box.entry(place.box_id).or_default().push(place);
        }
        by_box
    }
}

fn to_xy(lat: f64, lon: f64, d_lat: f64, d_lon: f64) -> (f64, f64) {
    (lat * d_lat, lon * d_lon)
}

/// Clamped-projection distance from `p` to segment `a`-`b`, and the
/// fractional position `t` along the segment of the closest point.
fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = (a.0 + t * dx, a.1 + t * dy);
    let dist = ((p.0 - closest.0).powi(2) + (p.1 - closest.1).powi(2)).sqrt();
    (dist, t)
}

/// Planar distance between two lat/lon points, in meters.
pub fn planar_distance_m(lat: f64, lon: f64, ref_lat: f64, ref_lon: f64) -> f64 {
    let d_lat = METERS_PER_LAT_DEGREE;
    let d_lon = meters_per_lon_degree(ref_lat);
    let (x, y) = to_xy(lat - ref_lat, lon - ref_lon, d_lat, d_lon);
    (x * x + y * y).sqrt()
}

fn type_matches(types: &TypeTable, place: &Place, type_variants: &[String]) -> bool {
    if type_variants.is_empty() {
        return true;
    }
    match types.name(place.type_id) {
        Some(name) => type_variants.iter().any(|t| t == name),
        None => false,
    }
}

fn name_matches(expander: &impl Expander, place: &Place, name_variants: &[String]) -> bool {
    if name_variants.is_empty() {
        return true;
    }
    for name in place.indexable_names() {
        for expansion in expander.expand(name) {
            for variant in name_variants {
                if expansion.starts_with(variant.as_str()) || expansion.contains(&format!(" {variant}")) {
                    return true;
                }
            }
        }
    }
    false
}

/// Point entry point (spec.md S4.5).
pub fn search_point(
    source: &NearbySource,
    expander: &impl Expander,
    name_variants: &[String],
    type_variants: &[String],
    lat: f64,
    lon: f64,
    radius_m: f64,
    config: &SearchConfig,
) -> Vec<NearbyMatch> {
    let d_lat = METERS_PER_LAT_DEGREE;
    let d_lon = meters_per_lon_degree(lat);
    let lat_pad = radius_m / d_lat;
    let lon_pad = radius_m / d_lon;
    let envelope = AABB::from_corners([lat - lat_pad, lon - lon_pad], [lat + lat_pad, lon + lon_pad]);

    let box_ids = source.boxes.overlapping(envelope);
    let by_box = source.places_by_box();

    let mut matches: Vec<NearbyMatch> = Vec::new();
    for box_id in box_ids {
        let Some(candidates) = by_box.get(&box_id) else { continue };
        for place in candidates {
            if !type_matches(source.types, place, type_variants) {
                continue;
            }
            let distance = planar_distance_m(place.latitude, place.longitude, lat, lon);
            if distance > radius_m {
                continue;
            }
            if !name_matches(expander, place, name_variants) {
                continue;
            }
            matches.push(NearbyMatch { id: place.id, distance_m: distance });
        }
    }

    matches.sort_by(|a, b| a.distance_m.partial_cmp(&b.distance_m).unwrap());
    if config.max_results > 0 {
        matches.truncate(config.max_results);
    }
    matches
}

/// Corridor entry point: a polyline of `(lat, lon)` points. `skip_points`
/// subsamples the polyline before building per-segment envelopes (every
/// `skip_points + 1`-th vertex is used as a segment boundary), matching
/// spec.md S4.5's corridor signature.
pub fn search_corridor(
    source: &NearbySource,
    expander: &impl Expander,
    name_variants: &[String],
    type_variants: &[String],
    lat: &[f64],
    lon: &[f64],
    radius_m: f64,
    skip_points: usize,
    config: &SearchConfig,
) -> Vec<NearbyMatch> {
    assert_eq!(lat.len(), lon.len(), "corridor lat/lon must be the same length");
    if lat.len() < 2 {
        return Vec::new();
    }

    let stride = skip_points + 1;
    let vertices: Vec<(f64, f64)> = lat
        .iter()
        .zip(lon.iter())
        .step_by(stride)
        .map(|(&la, &lo)| (la, lo))
        .collect();

    let by_box = source.places_by_box();
    let mut processed_boxes: HashSet<u32> = HashSet::new();
    let mut best: HashMap<i64, f64> = HashMap::new();
    let mut cumulative_length_m = 0.0;

    for pair in vertices.windows(2) {
        let (a_lat, a_lon) = pair[0];
        let (b_lat, b_lon) = pair[1];

        let mid_lat = (a_lat + b_lat) / 2.0;
        let d_lat = METERS_PER_LAT_DEGREE;
        let d_lon = meters_per_lon_degree(mid_lat);
        let lat_pad = radius_m / d_lat;
        let lon_pad = radius_m / d_lon;
        let min_lat = a_lat.min(b_lat) - lat_pad;
        let max_lat = a_lat.max(b_lat) + lat_pad;
        let min_lon = a_lon.min(b_lon) - lon_pad;
        let max_lon = a_lon.max(b_lon) + lon_pad;
        let envelope = AABB::from_corners([min_lat, min_lon], [max_lat, max_lon]);

        let a_xy = to_xy(a_lat, a_lon, d_lat, d_lon);
        let b_xy = to_xy(b_lat, b_lon, d_lat, d_lon);
        let segment_length_m = ((b_xy.0 - a_xy.0).powi(2) + (b_xy.1 - a_xy.1).powi(2)).sqrt();

        for box_id in source.boxes.overlapping(envelope) {
            if !processed_boxes.insert(box_id) {
                continue;
            }
            let Some(candidates) = by_box.get(&box_id) else { continue };
            for place in candidates {
                if !type_matches(source.types, place, type_variants) {
                    continue;
                }
                let place_xy = to_xy(place.latitude, place.longitude, d_lat, d_lon);
                let (distance, t) = segment_distance(place_xy, a_xy, b_xy);
                if distance > radius_m {
                    continue;
                }
                if !name_matches(expander, place, name_variants) {
                    continue;
                }
                let along_route = cumulative_length_m + t * segment_length_m;
                best.entry(place.id)
                    .and_modify(|d| *d = d.min(along_route))
                    .or_insert(along_route);
            }
        }

        cumulative_length_m += segment_length_m;
    }

    let mut matches: Vec<NearbyMatch> = best
        .into_iter()
        .map(|(id, distance_m)| NearbyMatch { id, distance_m })
        .collect();
    matches.sort_by(|a, b| a.distance_m.partial_cmp(&b.distance_m).unwrap());
    if config.max_results > 0 {
        matches.truncate(config.max_results);
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expander::RuleExpander;
    use crate::index::{bbox_rtree::assign_boxes, BoxIndex};
    use crate::model::TypeTable;

    fn place(id: i64, lat: f64, lon: f64, type_id: u32, name: &str) -> Place {
        Place {
            id,
            source_id: id,
            name: name.to_string(),
            name_extra: None,
            name_en: None,
            phone: None,
            postal_code: None,
            website: None,
            parent: 0,
            type_id,
            latitude: lat,
            longitude: lon,
            box_id: 0,
            search_rank: 500,
            my_index: id,
            last_child_index: id,
        }
    }

    #[test]
    fn point_search_respects_radius_and_type() {
        let mut types = TypeTable::new();
        let cafe = types.intern("cafe");
        let bakery = types.intern("bakery");

        let mut places = vec![
            place(1, 48.8566, 2.3522, cafe, "Cafe Near"),
            place(2, 49.0, 3.0, cafe, "Cafe Far"),
            place(3, 48.8567, 2.3523, bakery, "Bakery Near"),
        ];
        let boxes = assign_boxes(&mut places);
        let box_index = BoxIndex::build(boxes);
        let source = NearbySource { boxes: &box_index, places: &places, types: &types };
        let expander = RuleExpander::new();

        let results = search_point(
            &source,
            &expander,
            &[],
            &["cafe".to_string()],
            48.8566,
            2.3522,
            500.0,
            &SearchConfig { max_results: 0, ..Default::default() },
        );

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
        assert!(results[0].distance_m <= 500.0);
    }

    #[test]
    fn zero_radius_only_matches_exact_point() {
        let mut types = TypeTable::new();
        let t = types.intern("poi");
        let mut places = vec![place(1, 10.0, 20.0, t, "Exact")];
        let boxes = assign_boxes(&mut places);
        let box_index = BoxIndex::build(boxes);
        let source = NearbySource { boxes: &box_index, places: &places, types: &types };
        let expander = RuleExpander::new();

        let results = search_point(&source, &expander, &[], &[], 10.0, 20.0, 0.0, &SearchConfig::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].distance_m, 0.0);
    }
}
