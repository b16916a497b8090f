use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::{
    plan::{calculate_gap, DistrictResult, Progress, Upload},
    store::{district_result_key, upload_index_key, ObjectStore, PutOptions},
};

/// True once every district slot of the upload has a stored result.
pub fn plan_is_complete(store: &dyn ObjectStore, upload: &Upload) -> Result<bool> {
    if upload.districts.is_empty() {
        return Ok(false);
    }
    for index in 0..upload.districts.len() as i64 {
        if !store.exists(&district_result_key(&upload.id, index))? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Gather every district result into the upload, summarize the plan, and
/// write the upload index.
pub fn finish_plan(store: &dyn ObjectStore, upload: &Upload) -> Result<Upload> {
    let mut upload = upload.clone();
    let total = upload.districts.len();

    for (index, slot) in upload.districts.iter_mut().enumerate() {
        let key = district_result_key(&upload.id, index as i64);
        let object = store.get(&key)?
            .ok_or_else(|| anyhow!("[plan::finish] Missing district result {key}"))?;
        let result: DistrictResult = serde_json::from_slice(&object.body)
            .with_context(|| format!("[plan::finish] Bad district result {key}"))?;
        *slot = Some(result.summary());
    }

    let mut upload = calculate_gap(&upload);
    upload.progress = Some(Progress { completed: total, total });
    upload.message = Some("Finished scoring this plan.".into());

    let key = upload_index_key(&upload.id);
    let body = serde_json::to_vec_pretty(&upload)?;
    store.put(&key, &body, &PutOptions::public_json())
        .with_context(|| format!("[plan::finish] Failed to write {key}"))?;
    info!(upload = %upload.id, districts = total, "finished plan");

    Ok(upload)
}
