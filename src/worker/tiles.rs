use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    config::ScoreConfig,
    plan::Upload,
    precinct::{load_tile_precincts, score_district_over_tile, Totals},
    store::{district_geometries_prefix, upload_tile_key, Acl, ObjectStore, PutOptions},
    tile::{tile_bounds, tile_from_key, TileId},
    worker::load_geometry,
};

/// District totals over one tile, keyed by geometry key, or the message of
/// whatever stopped the tile from being scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TileTotals {
    Scored(BTreeMap<String, Totals>),
    Failed(String),
}

/// Stored outcome of scoring every district of an upload over one tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileResult {
    pub upload: Upload,
    /// Partition key the tile was read from.
    pub key: String,
    pub tile_key: String,
    pub geoms_prefix: String,
    pub totals: TileTotals,
    pub precinct_count: usize,
}

fn score_all_districts(
    store: &dyn ObjectStore,
    precincts: &[Value],
    geoms_prefix: &str,
    tile: TileId,
    config: &ScoreConfig,
) -> Result<BTreeMap<String, Totals>> {
    let bounds = tile_bounds(tile);
    let mut totals = BTreeMap::new();
    for geometry_key in store.list(geoms_prefix)? {
        let district = load_geometry(store, &geometry_key)?;
        let subtotals = score_district_over_tile(&district, precincts, &bounds, config)
            .with_context(|| format!("[worker::tiles] Failed to score {geometry_key} over tile {tile}"))?;
        totals.insert(geometry_key, subtotals);
    }
    Ok(totals)
}

/// Score every district geometry of an upload over the tile whose
/// partition lives at `partition_key`, and store the totals.
///
/// Failures past locating the tile are recorded in the stored result
/// rather than returned.
pub fn run_tile(store: &dyn ObjectStore, upload: &Upload, partition_key: &str, config: &ScoreConfig) -> Result<TileResult> {
    let prefix = upload.model.as_ref()
        .map(|model| model.key_prefix.as_str())
        .ok_or_else(|| anyhow!("[worker::tiles] Upload {} has no model", upload.id))?;
    let tile = tile_from_key(prefix, partition_key)?;
    let tile_key = upload_tile_key(&upload.id, tile);
    let geoms_prefix = district_geometries_prefix(&upload.id);

    let mut precinct_count = 0;
    let scored = load_tile_precincts(store, prefix, tile).and_then(|precincts| {
        precinct_count = precincts.len();
        score_all_districts(store, &precincts, &geoms_prefix, tile, config)
    });
    let totals = match scored {
        Ok(totals) => TileTotals::Scored(totals),
        Err(err) => {
            warn!(%tile, upload = %upload.id, "tile failed: {err:#}");
            TileTotals::Failed(format!("{err:#}"))
        }
    };

    let result = TileResult {
        upload: upload.clone(),
        key: partition_key.to_string(),
        tile_key: tile_key.clone(),
        geoms_prefix,
        totals,
        precinct_count,
    };
    let options = PutOptions { content_type: Some("text/plain".into()), content_encoding: None, acl: Acl::PublicRead };
    store.put(&tile_key, &serde_json::to_vec(&result)?, &options)
        .with_context(|| format!("[worker::tiles] Failed to write tile result {tile_key}"))?;
    info!(%tile, upload = %upload.id, precincts = precinct_count, "scored tile");

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::{
        plan::Model,
        store::{district_geometry_key, MemStore},
    };

    fn upload() -> Upload {
        let model = Model { key_prefix: "data/XX/001".into(), ..Model::default() };
        Upload { model: Some(model), ..Upload::new("ID", "uploads/ID/upload/plan.geojson") }
    }

    fn store() -> MemStore {
        let store = MemStore::new();
        let partition = json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"Voters": 10, "PlanScore:Fraction": 1.0},
                "geometry": {"type": "Polygon", "coordinates": [[[0.01, 0.01], [0.03, 0.01], [0.03, 0.03], [0.01, 0.03], [0.01, 0.01]]]}},
            {"type": "Feature", "properties": {"Voters": 3}, "geometry": {"type": "Point", "coordinates": [0.05, 0.05]}},
        ]});
        store.put("data/XX/001/12/2048/2047.geojson", &serde_json::to_vec(&partition).unwrap(), &PutOptions::default()).unwrap();

        let districts = [
            "POLYGON ((-1 -1,1 -1,1 1,-1 1,-1 -1))",
            "POLYGON ((0.02 0,0.04 0,0.04 0.04,0.02 0.04,0.02 0))",
        ];
        for (index, wkt) in districts.iter().enumerate() {
            store.put(&district_geometry_key("ID", index as i64), wkt.as_bytes(), &PutOptions::default()).unwrap();
        }
        store
    }

    #[test]
    fn scores_every_district_over_one_tile() {
        let store = store();
        let result = run_tile(&store, &upload(), "data/XX/001/12/2048/2047.geojson", &ScoreConfig::default()).unwrap();

        assert_eq!(result.tile_key, "uploads/ID/tiles/12/2048/2047.json");
        assert_eq!(result.geoms_prefix, "uploads/ID/geometries/");
        assert_eq!(result.precinct_count, 2);

        let TileTotals::Scored(totals) = &result.totals else { panic!("tile failed: {:?}", result.totals) };
        assert_eq!(totals.keys().collect::<Vec<_>>(), ["uploads/ID/geometries/0.wkt", "uploads/ID/geometries/1.wkt"]);
        assert_eq!(totals["uploads/ID/geometries/0.wkt"]["Voters"], 13.0);
        assert_eq!(totals["uploads/ID/geometries/1.wkt"]["Voters"], 5.0);

        let stored: TileResult = serde_json::from_slice(&store.get(&result.tile_key).unwrap().unwrap().body).unwrap();
        assert_eq!(stored, result);
        assert_eq!(store.options(&result.tile_key).unwrap().acl, Acl::PublicRead);
    }

    #[test]
    fn failures_are_recorded_as_text() {
        let store = store();
        store.put("uploads/ID/geometries/2.wkt", b"POLYGON ((oops", &PutOptions::default()).unwrap();

        let result = run_tile(&store, &upload(), "data/XX/001/12/2048/2047.geojson", &ScoreConfig::default()).unwrap();
        let TileTotals::Failed(message) = &result.totals else { panic!("expected a failure") };
        assert!(message.contains("uploads/ID/geometries/2.wkt"), "{message}");
        assert_eq!(result.precinct_count, 2);
        assert!(store.exists("uploads/ID/tiles/12/2048/2047.json").unwrap());
    }

    #[test]
    fn missing_partition_scores_zero_precincts() {
        let store = store();
        let result = run_tile(&store, &upload(), "data/XX/001/12/9/9.geojson", &ScoreConfig::default()).unwrap();
        assert_eq!(result.precinct_count, 0);
        let TileTotals::Scored(totals) = &result.totals else { panic!("tile failed") };
        assert!(totals.values().all(|totals| totals.is_empty()));
    }

    #[test]
    fn partition_key_must_sit_under_the_model() {
        let store = store();
        assert!(run_tile(&store, &upload(), "data/YY/12/2048/2047.geojson", &ScoreConfig::default()).is_err());
        assert!(run_tile(&store, &Upload::new("ID", "k"), "data/XX/001/12/2048/2047.geojson", &ScoreConfig::default()).is_err());
    }
}
