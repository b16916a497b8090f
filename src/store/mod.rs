mod keys;
mod source;

pub use keys::{
    district_geometries_prefix, district_geometry_key, district_result_key, tile_key, upload_index_key,
    upload_tile_key,
};
pub use source::{Acl, DiskStore, MemStore, ObjectMeta, ObjectStore, PutOptions, StoredObject};
