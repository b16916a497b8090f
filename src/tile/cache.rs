use std::{num::NonZeroUsize, sync::Arc};

use geo::Polygon;
use lru::LruCache;

use crate::tile::{tile_bounds, TileId};

/// Small LRU of tile bounding polygons. Tiles repeat across precinct batches
/// of the same district, so a handful of entries covers the working set.
pub struct TileCache {
    entries: LruCache<TileId, Arc<Polygon<f64>>>,
}

impl TileCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: LruCache::new(capacity) }
    }

    /// Bounding polygon of a tile, built on first use.
    pub fn bounds(&mut self, tile: TileId) -> Arc<Polygon<f64>> {
        self.entries.get_or_insert(tile, || Arc::new(tile_bounds(tile))).clone()
    }

    #[inline] pub fn len(&self) -> usize { self.entries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    #[inline] pub fn contains(&self, tile: &TileId) -> bool { self.entries.contains(tile) }
}

impl Default for TileCache {
    fn default() -> Self { Self::new(16) }
}
