mod cache;
mod tile;

pub use cache::TileCache;
pub use tile::{
    enumerate_tiles, tile_bounds, tile_contains, tile_disjoint, tile_for_location, tile_from_key,
    tile_overlaps, TileId, MAX_LATITUDE, MAX_ZOOM,
};
