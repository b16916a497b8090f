use std::{collections::BTreeMap, f64::consts::PI};

use anyhow::Result;
use geo::{Area, Geometry, LineString};

use crate::geom;

/// Shape-regularity scores for a district geometry, by metric name.
pub trait CompactnessScorer {
    fn scores(&self, geometry: &Geometry<f64>) -> Result<BTreeMap<String, f64>>;
}

/// Polsby-Popper: 4πA / P², 1 for a circle and near 0 for a sliver.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolsbyPopper;

fn ring_length(ring: &LineString<f64>) -> f64 {
    ring.lines().map(|line| line.dx().hypot(line.dy())).sum()
}

impl CompactnessScorer for PolsbyPopper {
    fn scores(&self, geometry: &Geometry<f64>) -> Result<BTreeMap<String, f64>> {
        let areal = geom::areal_parts(geometry);
        let area = areal.unsigned_area();
        let perimeter: f64 = areal.iter()
            .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
            .map(ring_length)
            .sum();

        let score = if perimeter > 0.0 { 4.0 * PI * area / (perimeter * perimeter) } else { 0.0 };
        Ok(BTreeMap::from([("PolsbyPopper".to_string(), score)]))
    }
}
