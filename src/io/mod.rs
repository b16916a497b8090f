mod geojson;
mod wkt;

pub(crate) use geojson::{feature_geometry, read_features};
pub use wkt::{read_wkt, write_wkt};
