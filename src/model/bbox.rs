//! Bounding boxes shared by places whose coordinates round to the same
//! 0.01deg x 0.01deg cell, and the rounding that assigns a `box_id`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub box_id: u32,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn point(box_id: u32, lat: f64, lon: f64) -> Self {
        Self {
            box_id,
            min_lat: lat,
            max_lat: lat,
            min_lon: lon,
            max_lon: lon,
        }
    }

    pub fn expand(&mut self, lat: f64, lon: f64) {
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }
}

/// Round `lat*100`/`lon*100` to integers, producing the key that groups
/// places into the same box (spec.md S4.3: "boxes are formed by
/// rounding lat*100 and lon*100 to integers").
pub fn rounded_cell(lat: f64, lon: f64) -> (i64, i64) {
    ((lat * 100.0).round() as i64, (lon * 100.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_cell_for_nearby_points() {
        assert_eq!(rounded_cell(48.8566, 2.3522), rounded_cell(48.8564, 2.3523));
    }

    #[test]
    fn different_cell_across_boundary() {
        assert_ne!(rounded_cell(48.850, 2.350), rounded_cell(48.860, 2.350));
    }

    #[test]
    fn expand_widens_envelope() {
        let mut b = BoundingBox::point(1, 10.0, 20.0);
        b.expand(12.0, 18.0);
        assert_eq!(b.min_lat, 10.0);
        assert_eq!(b.max_lat, 12.0);
        assert_eq!(b.min_lon, 18.0);
        assert_eq!(b.max_lon, 20.0);
    }
}
