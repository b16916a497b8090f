mod geom;

pub(crate) use geom::{areal_parts, envelope, is_empty, is_puntal};
