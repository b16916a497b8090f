use std::{cell::RefCell, collections::{BTreeMap, VecDeque}, sync::Arc};

use anyhow::{Context, Result};
use geo::{BooleanOps, Geometry, MultiPolygon, Polygon, Relate};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    config::ScoreConfig,
    geom,
    partial::{scrunch, unscrunch, Continuation, Scrunched},
    plan::Upload,
    precinct::{add_totals, load_tile_precincts, score_district_over_tile, tile_metadata, Totals},
    store::ObjectStore,
    tile::{enumerate_tiles, TileCache, TileId},
};

/// Precinct features loaded from one tile partition, waiting to be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecinctBatch {
    pub tile: TileId,
    pub precincts: Vec<Value>,
}

/// One unit of work done by [`Partial::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A tile partition was fetched and queued for scoring. `bytes` is the
    /// stored partition size, `None` when the tile has no partition.
    Loaded { tile: TileId, precincts: usize, bytes: Option<u64> },
    /// A queued batch was scored into the totals.
    Scored { tile: TileId, precincts: usize },
    /// Both queues were already empty.
    Exhausted,
}

/// Resumable scoring state for one district.
///
/// Precinct batches are drained before the next tile is loaded. Totals are
/// final exactly when both queues are empty.
pub struct Partial {
    pub index: i64,
    pub totals: Totals,
    /// Computed once per district, then carried through continuations.
    pub compactness: Option<BTreeMap<String, f64>>,
    pub precincts: VecDeque<PrecinctBatch>,
    pub tiles: VecDeque<TileId>,
    pub geometry_key: String,
    pub upload: Upload,
    pub bucket: Option<String>,
    pub prefix: String,
    pub start_time: f64,
    /// Precinct features scored so far.
    pub scored: u64,
    /// Tiles whose partitions held precincts, in load order.
    pub loaded: Vec<TileId>,
    geometry: Geometry<f64>,
    config: ScoreConfig,
    cache: RefCell<TileCache>,
}

impl Partial {
    /// Start or resume a district from a trigger payload.
    ///
    /// A payload without a tile queue starts fresh with every tile the
    /// geometry touches. `now` stands in for a missing start time.
    pub fn from_payload(payload: Continuation, geometry: Geometry<f64>, config: &ScoreConfig, now: f64) -> Result<Self> {
        let start_time = payload.start_time.or(payload.upload.start_time).unwrap_or(now);
        let mut partial = Self {
            index: payload.index,
            totals: Totals::new(),
            compactness: None,
            precincts: VecDeque::new(),
            tiles: VecDeque::new(),
            geometry_key: payload.geometry_key,
            upload: payload.upload,
            bucket: payload.bucket,
            prefix: payload.prefix,
            start_time,
            scored: payload.scored,
            loaded: Vec::new(),
            geometry,
            config: config.clone(),
            cache: RefCell::new(TileCache::new(config.tile_cache_size)),
        };

        match restore::<VecDeque<TileId>>(payload.tiles.as_ref(), "tiles")? {
            None => {
                partial.tiles = enumerate_tiles(&partial.geometry, config.tile_zoom).into();
                debug!(index = partial.index, tiles = partial.tiles.len(), "starting district");
            }
            Some(tiles) => {
                partial.tiles = tiles;
                partial.totals = restore(payload.totals.as_ref(), "totals")?.unwrap_or_default();
                partial.precincts = restore(payload.precincts.as_ref(), "precincts")?.unwrap_or_default();
                partial.loaded = restore(payload.loaded.as_ref(), "loaded")?.unwrap_or_default();
            }
        }
        partial.compactness = restore(payload.compactness.as_ref(), "compactness")?;

        Ok(partial)
    }

    /// Snapshot everything needed to resume in another invocation.
    pub fn to_payload(&self) -> Result<Continuation> {
        Ok(Continuation {
            index: self.index,
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            upload: self.upload.clone(),
            geometry_key: self.geometry_key.clone(),
            totals: Some(pack(&self.totals)?),
            compactness: Some(pack(&self.compactness)?),
            precincts: Some(pack(&self.precincts)?),
            tiles: Some(pack(&self.tiles)?),
            scored: self.scored,
            loaded: Some(pack(&self.loaded)?),
            start_time: Some(self.start_time),
        })
    }

    #[inline] pub fn geometry(&self) -> &Geometry<f64> { &self.geometry }

    #[inline] pub fn config(&self) -> &ScoreConfig { &self.config }

    fn bounds(&self, tile: TileId) -> Arc<Polygon<f64>> {
        self.cache.borrow_mut().bounds(tile)
    }

    /// Whether the tile lies entirely inside the district.
    pub fn contains_tile(&self, tile: TileId) -> bool {
        !geom::is_empty(&self.geometry) && self.bounds(tile).relate(&self.geometry).is_within()
    }

    /// The part of the district inside a tile; empty when they only touch.
    pub fn tile_geometry(&self, tile: TileId) -> MultiPolygon<f64> {
        let bounds = MultiPolygon(vec![(*self.bounds(tile)).clone()]);
        geom::areal_parts(&self.geometry).intersection(&bounds)
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool { self.precincts.is_empty() && self.tiles.is_empty() }

    /// Do one unit of work: score the oldest loaded batch or, when none is
    /// loaded, fetch the next tile.
    pub fn advance(&mut self, store: &dyn ObjectStore) -> Result<Step> {
        if let Some(batch) = self.precincts.pop_front() {
            let bounds = self.bounds(batch.tile);
            let subtotals = score_district_over_tile(&self.geometry, &batch.precincts, &bounds, &self.config)
                .with_context(|| format!("[partial] Failed to score district {} over tile {}", self.index, batch.tile))?;
            add_totals(&mut self.totals, &subtotals, &self.config);
            self.scored += batch.precincts.len() as u64;
            debug!(index = self.index, tile = %batch.tile, precincts = batch.precincts.len(), "scored batch");
            return Ok(Step::Scored { tile: batch.tile, precincts: batch.precincts.len() });
        }

        let Some(tile) = self.tiles.pop_front() else {
            return Ok(Step::Exhausted);
        };
        let bytes = tile_metadata(store, &self.prefix, tile)?;
        let precincts = load_tile_precincts(store, &self.prefix, tile)?;
        let count = precincts.len();
        debug!(index = self.index, %tile, precincts = count, bytes = ?bytes, "loaded tile");
        if count > 0 {
            self.loaded.push(tile);
            self.precincts.push_back(PrecinctBatch { tile, precincts });
        }
        Ok(Step::Loaded { tile, precincts: count, bytes })
    }
}

fn pack<T: Serialize>(value: &T) -> Result<Scrunched> {
    scrunch(&serde_json::to_value(value)?)
}

/// Decode an optional snapshot field; absent or null means `None`.
fn restore<T: DeserializeOwned>(field: Option<&Scrunched>, name: &str) -> Result<Option<T>> {
    let Some(field) = field else { return Ok(None) };
    match unscrunch(field)? {
        Value::Null => Ok(None),
        value => serde_json::from_value(value)
            .map(Some)
            .with_context(|| format!("[partial] Bad snapshot field '{name}'")),
    }
}
