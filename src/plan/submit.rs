use anyhow::{Context, Result};
use geo::Geometry;
use tracing::info;

use crate::{
    io::write_wkt,
    partial::Continuation,
    plan::{Progress, Upload},
    store::{district_geometry_key, upload_index_key, ObjectStore, PutOptions},
    worker::Dispatcher,
};

/// Fan a plan out into one scoring job per district.
///
/// Stores each district's WKT, writes the pending upload index, and
/// dispatches a first-invocation payload per district. Returns the upload
/// as written.
pub fn submit_plan(
    store: &dyn ObjectStore,
    dispatcher: &dyn Dispatcher,
    upload: &Upload,
    geometries: &[Geometry<f64>],
    prefix: &str,
    now: f64,
) -> Result<Upload> {
    let mut upload = upload.clone().with_districts(geometries.len());
    upload.start_time = Some(now);
    upload.progress = Some(Progress { completed: 0, total: geometries.len() });
    upload.message = Some("Scoring this plan.".into());

    let text = PutOptions { content_type: Some("text/plain".into()), ..PutOptions::default() };
    for (index, geometry) in geometries.iter().enumerate() {
        let key = district_geometry_key(&upload.id, index as i64);
        store.put(&key, write_wkt(geometry).as_bytes(), &text)
            .with_context(|| format!("[plan::submit] Failed to write {key}"))?;
    }

    let index_key = upload_index_key(&upload.id);
    store.put(&index_key, &serde_json::to_vec_pretty(&upload)?, &PutOptions::public_json())
        .with_context(|| format!("[plan::submit] Failed to write {index_key}"))?;

    for index in 0..geometries.len() as i64 {
        let mut payload = Continuation::start(index, prefix, upload.clone(), district_geometry_key(&upload.id, index));
        payload.start_time = Some(now);
        dispatcher.dispatch(&payload)?;
    }
    info!(upload = %upload.id, districts = geometries.len(), "submitted plan");

    Ok(upload)
}
