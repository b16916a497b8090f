use std::{f64::consts::PI, fmt, str::FromStr};

use anyhow::{anyhow, Context, Result};
use geo::{coord, Geometry, LineString, Polygon, Relate};
use serde::{Deserialize, Serialize};

use crate::geom;

/// Latitude limit of the spherical mercator square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Deepest zoom a tile id may carry.
pub const MAX_ZOOM: u8 = 30;

/// A (zoom, column, row) cell of the spherical-mercator tile pyramid.
/// Rows count southward from the top-left corner of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TileId {
    pub zoom: u8,
    pub column: u32,
    pub row: u32,
}

impl TileId {
    #[inline]
    pub fn new(zoom: u8, column: u32, row: u32) -> Self { Self { zoom, column, row } }

    /// Number of tiles along one side of the world at this zoom.
    #[inline]
    fn world_size(zoom: u8) -> f64 { 2.0_f64.powi(zoom as i32) }

    /// Geographic (west, south, east, north) of this tile in degrees.
    pub fn lonlat_bounds(&self) -> (f64, f64, f64, f64) {
        let n = Self::world_size(self.zoom);
        let west = column_to_lon(self.column as f64, n);
        let east = column_to_lon(self.column as f64 + 1.0, n);
        let north = row_to_lat(self.row as f64, n);
        let south = row_to_lat(self.row as f64 + 1.0, n);
        (west, south, east, north)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.column, self.row)
    }
}

impl FromStr for TileId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('/');
        let (Some(z), Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
            return Err(anyhow!("[tile] Expected tile id as zoom/column/row, got '{s}'"));
        };
        let tile = Self {
            zoom: z.parse().with_context(|| format!("[tile] Bad zoom in '{s}'"))?,
            column: x.parse().with_context(|| format!("[tile] Bad column in '{s}'"))?,
            row: y.parse().with_context(|| format!("[tile] Bad row in '{s}'"))?,
        };
        if tile.zoom > MAX_ZOOM {
            return Err(anyhow!("[tile] Zoom {} in '{s}' is deeper than {MAX_ZOOM}", tile.zoom));
        }
        let side = 1u32 << tile.zoom;
        if tile.column >= side || tile.row >= side {
            return Err(anyhow!("[tile] '{s}' lies outside the {side}x{side} grid at zoom {}", tile.zoom));
        }
        Ok(tile)
    }
}

impl TryFrom<String> for TileId {
    type Error = anyhow::Error;
    fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<TileId> for String {
    fn from(tile: TileId) -> Self { tile.to_string() }
}

/// Convert a tile column edge to longitude.
#[inline]
fn column_to_lon(x: f64, n: f64) -> f64 { x / n * 360.0 - 180.0 }

/// Convert a tile row edge to latitude (inverse mercator).
#[inline]
fn row_to_lat(y: f64, n: f64) -> f64 { (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees() }

/// Convert longitude to a tile column at a given zoom level.
fn lon_to_column(lon: f64, zoom: u8) -> u32 {
    let n = TileId::world_size(zoom);
    let x = ((lon + 180.0) / 360.0 * n).floor();
    x.clamp(0.0, n - 1.0) as u32
}

/// Convert latitude to a tile row at a given zoom level.
fn lat_to_row(lat: f64, zoom: u8) -> u32 {
    let n = TileId::world_size(zoom);
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();
    y.clamp(0.0, n - 1.0) as u32
}

/// The tile containing a geographic location at a zoom level.
pub fn tile_for_location(lat: f64, lon: f64, zoom: u8) -> TileId {
    TileId::new(zoom, lon_to_column(lon, zoom), lat_to_row(lat, zoom))
}

/// Geographic bounding polygon of a tile: a closed ring NW, NE, SE, SW, NW.
pub fn tile_bounds(tile: TileId) -> Polygon<f64> {
    let (w, s, e, n) = tile.lonlat_bounds();
    Polygon::new(
        LineString::from(vec![
            coord! { x: w, y: n },
            coord! { x: e, y: n },
            coord! { x: e, y: s },
            coord! { x: w, y: s },
            coord! { x: w, y: n },
        ]),
        vec![],
    )
}

/// True if the tile fully encloses the geometry.
pub fn tile_contains(tile: TileId, geometry: &Geometry<f64>) -> bool {
    !geom::is_empty(geometry) && tile_bounds(tile).relate(geometry).is_contains()
}

/// True if the tile and geometry share no points at all.
pub fn tile_disjoint(tile: TileId, geometry: &Geometry<f64>) -> bool {
    geom::is_empty(geometry) || tile_bounds(tile).relate(geometry).is_disjoint()
}

/// True if the tile and geometry share interior points (not just an edge).
pub fn tile_overlaps(tile: TileId, geometry: &Geometry<f64>) -> bool {
    if geom::is_empty(geometry) { return false }
    tile_bounds(tile).relate(geometry).matches("T********").unwrap_or(false)
}

/// Every tile at `zoom` whose bounds intersect the geometry's envelope,
/// ordered by row, then by column.
pub fn enumerate_tiles(geometry: &Geometry<f64>, zoom: u8) -> Vec<TileId> {
    let Some(envelope) = geom::envelope(geometry) else { return Vec::new() };

    let nw = tile_for_location(envelope.max().y, envelope.min().x, zoom);
    let se = tile_for_location(envelope.min().y, envelope.max().x, zoom);

    (nw.row..=se.row)
        .flat_map(|row| (nw.column..=se.column).map(move |column| TileId::new(zoom, column, row)))
        .collect()
}

/// Recover a tile id from a partition key such as `data/XX/12/656/1582.geojson`.
pub fn tile_from_key(prefix: &str, key: &str) -> Result<TileId> {
    let rel = key.strip_prefix(prefix)
        .ok_or_else(|| anyhow!("[tile] Key '{key}' is not under prefix '{prefix}'"))?
        .trim_start_matches('/');
    let zxy = rel.rsplit_once('.').map_or(rel, |(stem, _)| stem);
    zxy.parse()
}
