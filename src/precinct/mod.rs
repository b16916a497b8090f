mod reader;
mod score;
mod totals;

pub use reader::{load_tile_precincts, tile_metadata};
pub use score::{score_district_over_tile, score_precinct, TileOverlap};
pub use totals::{add_totals, Totals};
