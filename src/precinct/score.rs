use anyhow::Result;
use geo::{Area, BooleanOps, Geometry, MultiPolygon, Polygon, Relate, Validation};
use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    config::ScoreConfig,
    error::ScoreError,
    geom,
    io::feature_geometry,
    precinct::{add_totals, Totals},
};

/// Relative slack allowed between an overlap area and the precinct area
/// before the intersection is treated as a topology failure.
const OVERLAP_TOLERANCE: f64 = 1e-6;

/// A district clipped to one tile, prepared once and reused for every
/// precinct in that tile.
#[derive(Debug, Clone)]
pub struct TileOverlap {
    /// District ∩ tile.
    part: MultiPolygon<f64>,
    /// The tile lies entirely within the district.
    tile_within: bool,
}

impl TileOverlap {
    /// Clip a district to a tile. When the tile is inside the district the
    /// clipped part is the tile itself and no intersection is computed.
    pub fn new(district: &Geometry<f64>, tile: &Polygon<f64>) -> Self {
        if geom::is_empty(district) {
            return Self { part: MultiPolygon(vec![]), tile_within: false };
        }
        if tile.relate(district).is_within() {
            return Self { part: MultiPolygon(vec![tile.clone()]), tile_within: true };
        }
        let part = geom::areal_parts(district).intersection(&MultiPolygon(vec![tile.clone()]));
        Self { part, tile_within: false }
    }

    /// Use an already-clipped district part.
    pub fn from_part(part: MultiPolygon<f64>, tile: &Polygon<f64>) -> Self {
        let tile_within = !part.0.is_empty() && tile.relate(&part).is_within();
        Self { part, tile_within }
    }

    #[inline] pub fn part(&self) -> &MultiPolygon<f64> { &self.part }

    #[inline] pub fn tile_within(&self) -> bool { self.tile_within }

    #[inline] pub fn is_empty(&self) -> bool { self.part.0.is_empty() }

    /// Weighted contribution of one precinct feature to the district.
    pub fn score(&self, feature: &Value, config: &ScoreConfig) -> Result<Totals> {
        let empty = Map::new();
        let properties = feature.get("properties").and_then(Value::as_object).unwrap_or(&empty);

        let fields = scored_fields(properties, config);
        let zeros = || fields.iter().map(|(name, _)| (name.clone(), 0.0)).collect::<Totals>();

        let geometry = match feature_geometry(feature)? {
            Some(geometry) if !geom::is_empty(&geometry) => geometry,
            _ => return Ok(zeros()),
        };
        if self.is_empty() {
            return Ok(zeros());
        }

        let is_point = geom::is_puntal(&geometry);
        let basis = if is_point {
            1.0
        } else {
            properties.get(&config.fraction_field).and_then(Value::as_f64).unwrap_or(0.0)
        };
        if basis == 0.0 {
            return Ok(zeros());
        }

        let fraction = if self.tile_within {
            // Precincts are clipped to tile edges, so a tile inside the
            // district means every precinct in it is inside too.
            basis
        } else if is_point {
            if geometry.relate(&self.part).is_within() { basis } else { 0.0 }
        } else {
            let (overlap, area) = overlap_area(geom::areal_parts(&geometry), &self.part, properties)?;
            if area == 0.0 {
                return Ok(zeros());
            }
            basis * overlap / area
        };

        Ok(fields.into_iter()
            .map(|(name, value)| (name, config.round(value * fraction)))
            .collect())
    }
}

/// Attributes of a feature to score, with their values. Without an
/// explicit field list every numeric property except the fraction is used.
fn scored_fields(properties: &Map<String, Value>, config: &ScoreConfig) -> Vec<(String, f64)> {
    match &config.fields {
        Some(names) => names.iter()
            .filter_map(|name| properties.get(name).map(|v| (name.clone(), v.as_f64().unwrap_or(0.0))))
            .collect(),
        None => properties.iter()
            .filter(|(name, _)| **name != config.fraction_field)
            .filter_map(|(name, v)| v.as_f64().map(|value| (name.clone(), value)))
            .collect(),
    }
}

/// Intersection area, or None if the result cannot be trusted: a
/// self-intersecting ring shows up as a non-finite area or as more overlap
/// than the precinct has area. A bow-tie cancels to zero shoelace area while
/// its intersection does not.
fn checked_overlap(precinct: &MultiPolygon<f64>, part: &MultiPolygon<f64>) -> Option<(f64, f64)> {
    let area = precinct.unsigned_area();
    let overlap = precinct.intersection(part).unsigned_area();
    let sane = area.is_finite()
        && overlap.is_finite()
        && !(area == 0.0 && overlap > 0.0)
        && overlap <= area * (1.0 + OVERLAP_TOLERANCE) + f64::EPSILON;
    sane.then_some((overlap.min(area), area))
}

/// Rebuild a precinct's rings by unioning it onto nothing, which splits
/// self-intersections into simple polygons.
fn heal(precinct: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![]).union(precinct)
}

/// Overlap and precinct area, healing an invalid precinct once if the first
/// intersection fails.
fn overlap_area(
    precinct: MultiPolygon<f64>,
    part: &MultiPolygon<f64>,
    properties: &Map<String, Value>,
) -> Result<(f64, f64)> {
    if let Some(result) = checked_overlap(&precinct, part) {
        return Ok(result);
    }

    let name = precinct_name(properties);
    if precinct.is_valid() {
        return Err(ScoreError::Topology { precinct: name }.into());
    }

    warn!(precinct = %name, "repairing invalid precinct geometry");
    let healed = heal(&precinct);
    match checked_overlap(&healed, part) {
        Some((overlap, area)) if area > 0.0 => Ok((overlap, area)),
        _ => Err(ScoreError::Topology { precinct: name }.into()),
    }
}

fn precinct_name(properties: &Map<String, Value>) -> String {
    ["GEOID", "NAME", "name"].iter()
        .find_map(|key| properties.get(*key))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "<unnamed>".to_string())
}

/// Weighted single-district totals for one precinct within one tile.
///
/// `district_part` is the district clipped to the tile.
pub fn score_precinct(
    district_part: &MultiPolygon<f64>,
    feature: &Value,
    tile: &Polygon<f64>,
    config: &ScoreConfig,
) -> Result<Totals> {
    TileOverlap::from_part(district_part.clone(), tile).score(feature, config)
}

/// Weighted totals for a district over every precinct of one tile.
pub fn score_district_over_tile(
    district: &Geometry<f64>,
    precincts: &[Value],
    tile: &Polygon<f64>,
    config: &ScoreConfig,
) -> Result<Totals> {
    let mut totals = Totals::new();
    if geom::is_empty(district) || tile.relate(district).is_disjoint() {
        return Ok(totals);
    }

    let overlap = TileOverlap::new(district, tile);
    for feature in precincts {
        add_totals(&mut totals, &overlap.score(feature, config)?, config);
    }
    Ok(totals)
}
