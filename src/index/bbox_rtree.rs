//! Bounding-box table and R-tree, grounded in the teacher's
//! `AdminSpatialIndex` (`pip::index`): an `RTreeObject` wrapper plus a
//! flat table keyed by the same id the tree's envelopes carry.

use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::model::{rounded_cell, BoundingBox, Place};

#[derive(Debug, Clone, Copy)]
struct IndexedBox {
    box_id: u32,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Assigns each place a `box_id` by rounding its coordinates to a 0.01deg
/// cell (spec.md S4.3) and returns the deduplicated box table.
pub fn assign_boxes(places: &mut [Place]) -> Vec<BoundingBox> {
    use hashbrown::HashMap;

    let mut by_cell: HashMap<(i64, i64), BoundingBox> = HashMap::new();
    let mut cell_of: Vec<(i64, i64)> = Vec::with_capacity(places.len());
    let mut next_id = 0u32;

    for place in places.iter() {
        let cell = rounded_cell(place.latitude, place.longitude);
        cell_of.push(cell);
        by_cell
            .entry(cell)
            .and_modify(|b| b.expand(place.latitude, place.longitude))
            .or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                BoundingBox::point(id, place.latitude, place.longitude)
            });
    }

    for (place, cell) in places.iter_mut().zip(cell_of.iter()) {
        place.box_id = by_cell[cell].box_id;
    }

    let mut boxes: Vec<BoundingBox> = by_cell.into_values().collect();
    boxes.sort_by_key(|b| b.box_id);
    boxes
}

/// R-tree over the bounding-box table, queried by envelope overlap during
/// nearby search (spec.md S4.5 step 1).
#[derive(Debug)]
pub struct BoxIndex {
    tree: RTree<IndexedBox>,
    boxes: hashbrown::HashMap<u32, BoundingBox>,
}

impl BoxIndex {
    pub fn build(boxes: Vec<BoundingBox>) -> Self {
        let indexed: Vec<IndexedBox> = boxes
            .iter()
            .map(|b| IndexedBox {
                box_id: b.box_id,
                envelope: AABB::from_corners([b.min_lat, b.min_lon], [b.max_lat, b.max_lon]),
            })
            .collect();
        let by_id = boxes.into_iter().map(|b| (b.box_id, b)).collect();
        Self {
            tree: RTree::bulk_load(indexed),
            boxes: by_id,
        }
    }

    /// Every box whose envelope overlaps `envelope`.
    pub fn overlapping(&self, envelope: AABB<[f64; 2]>) -> Vec<u32> {
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|b| b.box_id)
            .collect()
    }

    pub fn get(&self, box_id: u32) -> Option<&BoundingBox> {
        self.boxes.get(&box_id)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// Serializable snapshot of the box table, as persisted by the Index
/// Writer (the R-tree itself is rebuilt from this at load time).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxTable(pub Vec<BoundingBox>);
