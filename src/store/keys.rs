use crate::tile::TileId;

/// Key of a precinct tile partition under a model prefix.
pub fn tile_key(prefix: &str, tile: TileId) -> String {
    format!("{}/{tile}.geojson", prefix.trim_end_matches('/'))
}

/// Key of the WKT geometry for one district of an upload.
pub fn district_geometry_key(upload_id: &str, index: i64) -> String {
    format!("uploads/{upload_id}/geometries/{index}.wkt")
}

/// Prefix under which every district geometry of an upload is stored.
pub fn district_geometries_prefix(upload_id: &str) -> String {
    format!("uploads/{upload_id}/geometries/")
}

/// Key of the per-tile totals of every district of an upload.
pub fn upload_tile_key(upload_id: &str, tile: TileId) -> String {
    format!("uploads/{upload_id}/tiles/{tile}.json")
}

/// Key of the finished result for one district of an upload.
pub fn district_result_key(upload_id: &str, index: i64) -> String {
    format!("uploads/{upload_id}/districts/{index}.json")
}

/// Key of the upload index, rewritten when the plan summary is computed.
pub fn upload_index_key(upload_id: &str) -> String {
    format!("uploads/{upload_id}/index.json")
}
