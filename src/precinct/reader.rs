use std::{borrow::Cow, io::Read};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde_json::Value;
use tracing::debug;

use crate::{io::read_features, store::{tile_key, ObjectStore}, tile::TileId};

/// Load the precinct features of one tile partition.
///
/// A missing partition means no precincts overlap the tile and yields an
/// empty list. Compression is taken from the object's content encoding,
/// never from its key.
pub fn load_tile_precincts(store: &dyn ObjectStore, prefix: &str, tile: TileId) -> Result<Vec<Value>> {
    let key = tile_key(prefix, tile);
    let Some(object) = store.get(&key)
        .with_context(|| format!("[precinct::reader] Failed to fetch tile partition {key}"))? else {
        debug!(%tile, %key, "no partition for tile");
        return Ok(Vec::new());
    };

    let body: Cow<[u8]> = if object.is_gzip() {
        let mut decoded = Vec::new();
        GzDecoder::new(&object.body[..]).read_to_end(&mut decoded)
            .with_context(|| format!("[precinct::reader] Failed to gunzip {key}"))?;
        Cow::Owned(decoded)
    } else {
        Cow::Borrowed(&object.body[..])
    };

    let features = read_features(&body)
        .with_context(|| format!("[precinct::reader] Bad tile partition {key}"))?;
    debug!(%tile, precincts = features.len(), bytes = object.body.len(), "loaded tile partition");
    Ok(features)
}

/// Size in bytes of a tile partition, if it exists.
pub fn tile_metadata(store: &dyn ObjectStore, prefix: &str, tile: TileId) -> Result<Option<u64>> {
    let key = tile_key(prefix, tile);
    Ok(store.head(&key)
        .with_context(|| format!("[precinct::reader] Failed to stat tile partition {key}"))?
        .map(|meta| meta.size))
}
