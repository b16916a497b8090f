use std::{fmt::Write, path::Path};

use anyhow::{Context, Result};
use geo::Geometry;
use tracing::info;

use crate::{
    config::ScoreConfig,
    error::ScoreError,
    geom,
    io::{feature_geometry, read_features},
    plan::{calculate_gap, DistrictSummary, Upload},
    precinct::{add_totals, load_tile_precincts, score_district_over_tile, Totals},
    store::ObjectStore,
    tile::{enumerate_tiles, TileCache, TileId},
};

/// Score one district in a single pass over every tile it touches.
///
/// Returns the totals, the tiles that held precincts, and a log of the
/// work done.
pub fn score_district(
    store: &dyn ObjectStore,
    geometry: &Geometry<f64>,
    prefix: &str,
    config: &ScoreConfig,
) -> Result<(Totals, Vec<TileId>, String)> {
    let mut totals = Totals::new();
    let mut tiles = Vec::new();
    let mut output = String::new();
    let mut cache = TileCache::new(config.tile_cache_size);

    for tile in enumerate_tiles(geometry, config.tile_zoom) {
        let precincts = load_tile_precincts(store, prefix, tile)?;
        if precincts.is_empty() {
            continue;
        }
        let bounds = cache.bounds(tile);
        let subtotals = score_district_over_tile(geometry, &precincts, &bounds, config)
            .with_context(|| format!("[plan::score] Failed to score tile {tile}"))?;
        add_totals(&mut totals, &subtotals, config);
        tiles.push(tile);
        let _ = writeln!(output, "Scored {} precincts in tile {tile}", precincts.len());
    }

    Ok((totals, tiles, output))
}

/// Read district geometries from a GeoJSON plan file, with a one-line
/// description of what was read.
pub fn read_plan(plan_path: &Path) -> Result<(Vec<Geometry<f64>>, String)> {
    let name = plan_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let display = plan_path.display().to_string();

    let extension = plan_path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase());
    if !matches!(extension.as_deref(), Some("geojson" | "json")) {
        return Err(ScoreError::UnsupportedPlan(display).into());
    }

    let bytes = std::fs::read(plan_path).with_context(|| format!("[plan::score] Failed to read {display}"))?;
    let malformed = |reason: String| ScoreError::MalformedPlan { path: display.clone(), reason };

    let features = read_features(&bytes).map_err(|e| malformed(format!("{e:#}")))?;
    if features.is_empty() {
        return Err(malformed("no district features".into()).into());
    }

    let mut geometries = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        match feature_geometry(feature).map_err(|e| malformed(format!("feature {i}: {e:#}")))? {
            Some(geometry) if !geom::areal_parts(&geometry).0.is_empty() => geometries.push(geometry),
            _ => return Err(malformed(format!("feature {i} has no polygon geometry")).into()),
        }
    }

    let summary = format!("{} features in {}-byte {name}", geometries.len(), bytes.len());
    Ok((geometries, summary))
}

/// Score every district of a plan file in one go and summarize the plan.
///
/// Bad plan files fail before any tile is read.
pub fn score_plan(
    store: &dyn ObjectStore,
    upload: &Upload,
    plan_path: &Path,
    prefix: &str,
    config: &ScoreConfig,
) -> Result<(Upload, String)> {
    let (geometries, summary) = read_plan(plan_path)?;
    let mut output = format!("{summary}\n");
    info!(upload = %upload.id, districts = geometries.len(), "scoring plan");

    let mut scored = upload.clone();
    scored.districts.clear();
    for (index, geometry) in geometries.iter().enumerate() {
        let (totals, tiles, log) = score_district(store, geometry, prefix, config)
            .with_context(|| format!("[plan::score] Failed to score district {index}"))?;
        output.push_str(&log);
        scored.districts.push(Some(DistrictSummary { totals, tiles, compactness: None }));
    }

    Ok((calculate_gap(&scored), output))
}
