use std::time::Duration;

use anyhow::{Context, Result};
use geo::Geometry;
use tracing::{debug, info};

use crate::{
    compactness::CompactnessScorer,
    config::ScoreConfig,
    error::ScoreError,
    io::read_wkt,
    partial::{Continuation, Partial, Step},
    plan::{finish_plan, plan_is_complete, DistrictResult},
    store::{district_result_key, ObjectStore, PutOptions},
    worker::{Dispatcher, Invocation, QueueDispatcher},
};

/// Everything a district invocation talks to.
pub struct Env<'a> {
    pub store: &'a dyn ObjectStore,
    pub dispatcher: &'a dyn Dispatcher,
    pub invocation: &'a dyn Invocation,
    pub compactness: &'a dyn CompactnessScorer,
    pub config: &'a ScoreConfig,
}

/// How a district invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Out of time; one continuation was dispatched.
    Suspended { index: i64, units: usize },
    /// The district result was written.
    Finished { index: i64, result_key: String, plan_complete: bool },
}

/// Read and parse a district's WKT geometry.
pub fn load_geometry(store: &dyn ObjectStore, key: &str) -> Result<Geometry<f64>> {
    let object = store.get(key)
        .with_context(|| format!("[worker] Failed to fetch district geometry {key}"))?
        .ok_or_else(|| ScoreError::MissingGeometry(key.to_string()))?;
    let text = std::str::from_utf8(&object.body)
        .with_context(|| format!("[worker] District geometry {key} is not UTF-8"))?;
    read_wkt(text).with_context(|| format!("[worker] Bad district geometry {key}"))
}

/// Run one invocation of a district's scoring.
///
/// Always does at least one unit of work. Between units, if the remaining
/// budget is under the safety margin, the snapshot is dispatched as a
/// continuation and the invocation ends.
pub fn run_district(payload: Continuation, env: &Env) -> Result<Outcome> {
    let now = env.invocation.now();
    let start_time = payload.start_time.or(payload.upload.start_time).unwrap_or(now);
    let elapsed = now - start_time;
    if elapsed > env.config.overdue_after_secs {
        return Err(ScoreError::Overdue { elapsed, limit: env.config.overdue_after_secs }.into());
    }

    let index = payload.index;
    info!(index, upload = %payload.upload.id, resumed = payload.is_continuation(), "scoring district");

    let geometry = load_geometry(env.store, &payload.geometry_key)?;
    let mut partial = Partial::from_payload(payload, geometry, env.config, now)?;

    if partial.compactness.is_none() {
        partial.compactness = Some(env.compactness.scores(partial.geometry())
            .context("[worker] Failed to compute compactness")?);
    }

    let margin = Duration::from_millis(env.config.safety_margin_ms);
    let mut units = 0;
    loop {
        let step = partial.advance(env.store)?;
        if step == Step::Exhausted {
            break;
        }
        units += 1;
        debug!(index, ?step, "advanced district");

        if !partial.is_exhausted() && env.invocation.remaining() < margin {
            env.dispatcher.dispatch(&partial.to_payload()?)
                .with_context(|| format!("[worker] Failed to dispatch continuation for district {index}"))?;
            info!(index, units, tiles_left = partial.tiles.len(), batches_left = partial.precincts.len(), "suspending district");
            return Ok(Outcome::Suspended { index, units });
        }
    }

    let result_key = post_score_results(env.store, &partial)?;
    let plan_complete = plan_is_complete(env.store, &partial.upload)?;
    if plan_complete {
        finish_plan(env.store, &partial.upload)?;
    }
    info!(index, units, precincts = partial.scored, plan_complete, "finished district");

    Ok(Outcome::Finished { index, result_key, plan_complete })
}

/// Write a finished district's result. Returns its key.
pub fn post_score_results(store: &dyn ObjectStore, partial: &Partial) -> Result<String> {
    let result = DistrictResult {
        index: partial.index,
        totals: partial.totals.clone(),
        compactness: partial.compactness.clone().unwrap_or_default(),
        precincts: partial.scored,
        tiles: partial.loaded.clone(),
        upload: partial.upload.clone(),
    };
    let key = district_result_key(&partial.upload.id, partial.index);
    let body = serde_json::to_vec_pretty(&result)?;
    store.put(&key, &body, &PutOptions::public_json())
        .with_context(|| format!("[worker] Failed to write district result {key}"))?;
    Ok(key)
}

/// Run queued payloads until the queue is empty, including continuations
/// they dispatch back onto it.
pub fn drain_queue(queue: &QueueDispatcher, env: &Env) -> Result<Vec<Outcome>> {
    let mut outcomes = Vec::new();
    while let Some(payload) = queue.pop()? {
        outcomes.push(run_district(payload, env)?);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, collections::BTreeMap};

    use serde_json::json;

    use crate::{
        error::score_error,
        plan::Upload,
        store::{Acl, MemStore},
        tile::TileId,
    };

    const DISTRICT: &str = "POLYGON ((-0.0002360 0.0004532,-0.0006812 0.0002467,-0.0006356 -0.0003486,-0.0000268 -0.0004693,-0.0000187 -0.0000214,-0.0002360 0.0004532))";

    struct Clock {
        remaining: Duration,
        now: f64,
    }

    impl Invocation for Clock {
        fn remaining(&self) -> Duration { self.remaining }
        fn now(&self) -> f64 { self.now }
    }

    #[derive(Default)]
    struct Reock {
        calls: Cell<usize>,
    }

    impl CompactnessScorer for Reock {
        fn scores(&self, _: &Geometry<f64>) -> Result<BTreeMap<String, f64>> {
            self.calls.set(self.calls.get() + 1);
            Ok(BTreeMap::from([("Reock".to_string(), -1.0)]))
        }
    }

    fn store() -> MemStore {
        let store = MemStore::new();
        store.put("geom.wkt", DISTRICT.as_bytes(), &PutOptions::default()).unwrap();
        store
    }

    fn add_tiles(store: &MemStore) {
        for (zxy, y) in [("12/2047/2047", 0.0001), ("12/2047/2048", -0.0001)] {
            let body = serde_json::to_vec(&json!({"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"Voters": 2}, "geometry": {"type": "Point", "coordinates": [-0.0003, y]}}
            ]})).unwrap();
            store.put(&format!("data/XX/{zxy}.geojson"), &body, &PutOptions::default()).unwrap();
        }
    }

    fn payload(value: serde_json::Value) -> Continuation {
        serde_json::from_value(value).unwrap()
    }

    fn first_payload() -> Continuation {
        payload(json!({"index": -1, "bucket": "bucket-name", "prefix": "data/XX",
            "upload": {"id": "ID", "key": "uploads/ID/upload/file.geojson"}, "geometry_key": "geom.wkt"}))
    }

    fn run(store: &MemStore, queue: &QueueDispatcher, scorer: &Reock, clock: &Clock, payload: Continuation) -> Result<Outcome> {
        let config = ScoreConfig::default();
        let env = Env { store, dispatcher: queue, invocation: clock, compactness: scorer, config: &config };
        run_district(payload, &env)
    }

    fn plenty() -> Clock { Clock { remaining: Duration::from_secs(600), now: 0.0 } }

    #[test]
    fn first_invocation_scores_and_posts() {
        let (store, queue, scorer) = (store(), QueueDispatcher::new(), Reock::default());
        let outcome = run(&store, &queue, &scorer, &plenty(), first_payload()).unwrap();

        assert_eq!(outcome, Outcome::Finished { index: -1, result_key: "uploads/ID/districts/-1.json".into(), plan_complete: false });
        assert!(queue.is_empty());
        assert_eq!(scorer.calls.get(), 1);

        let result: DistrictResult = serde_json::from_slice(&store.get("uploads/ID/districts/-1.json").unwrap().unwrap().body).unwrap();
        assert_eq!(result.index, -1);
        assert!(result.totals.is_empty());
        assert_eq!(result.compactness["Reock"], -1.0);
        assert_eq!(result.precincts, 0);
        assert!(result.tiles.is_empty());
    }

    #[test]
    fn out_of_time_hands_off() {
        let (store, queue, scorer) = (store(), QueueDispatcher::new(), Reock::default());
        add_tiles(&store);
        let clock = Clock { remaining: Duration::ZERO, now: 0.0 };

        let outcome = run(&store, &queue, &scorer, &clock, first_payload()).unwrap();
        assert_eq!(outcome, Outcome::Suspended { index: -1, units: 1 });
        assert_eq!(queue.len(), 1);
        assert!(!store.exists("uploads/ID/districts/-1.json").unwrap());

        let next = queue.pop().unwrap().unwrap();
        let wire = serde_json::to_string(&next).unwrap();
        assert!(wire.contains(r#""index":-1"#));
        assert!(wire.contains(r#""id":"ID""#));
        assert!(wire.contains("bucket-name"));
        assert!(wire.contains("data/XX"));
        assert!(next.is_continuation());
    }

    #[test]
    fn continuation_keeps_compactness() {
        let (store, queue, scorer) = (store(), QueueDispatcher::new(), Reock::default());
        add_tiles(&store);
        let resumed = payload(json!({"index": -1, "bucket": "bucket-name", "prefix": "data/XX", "totals": {},
            "precincts": [], "tiles": ["12/2047/2048"], "compactness": {"Reock": -1},
            "upload": {"id": "ID", "key": "uploads/ID/upload/file.geojson"}, "geometry_key": "geom.wkt"}));

        let outcome = run(&store, &queue, &scorer, &plenty(), resumed).unwrap();
        assert!(matches!(outcome, Outcome::Finished { .. }));
        assert_eq!(scorer.calls.get(), 0, "compactness is not recomputed");
        assert!(queue.is_empty());

        let result: DistrictResult = serde_json::from_slice(&store.get("uploads/ID/districts/-1.json").unwrap().unwrap().body).unwrap();
        assert_eq!(result.totals["Voters"], 2.0);
        assert_eq!(result.tiles, vec![TileId::new(12, 2047, 2048)]);
    }

    #[test]
    fn overdue_chain_fails_without_side_effects() {
        // No geometry stored: the guard must fire before anything is read.
        let (store, queue, scorer) = (MemStore::new(), QueueDispatcher::new(), Reock::default());
        let overdue = payload(json!({"index": -1, "bucket": "bucket-name", "prefix": "data/XX",
            "upload": {"id": "ID", "key": "uploads/ID/upload/file.geojson", "start_time": 1}, "geometry_key": "geom.wkt"}));
        let clock = Clock { remaining: Duration::ZERO, now: 100_000.0 };

        let err = run(&store, &queue, &scorer, &clock, overdue).unwrap_err();
        let Some(ScoreError::Overdue { elapsed, limit }) = score_error(&err) else { panic!("expected overdue, got {err:#}") };
        assert_eq!(*elapsed, 99_999.0);
        assert_eq!(*limit, 3_600.0);
        assert!(!score_error(&err).unwrap().is_retryable());
        assert!(queue.is_empty());
        assert!(store.is_empty());
        assert_eq!(scorer.calls.get(), 0);
    }

    #[test]
    fn missing_geometry_is_reported() {
        let (store, queue, scorer) = (MemStore::new(), QueueDispatcher::new(), Reock::default());
        let err = run(&store, &queue, &scorer, &plenty(), first_payload()).unwrap_err();
        assert!(matches!(score_error(&err), Some(ScoreError::MissingGeometry(key)) if key == "geom.wkt"));
    }

    #[test]
    fn last_district_finishes_plan() {
        let (store, queue, scorer) = (store(), QueueDispatcher::new(), Reock::default());
        let last = payload(json!({"index": 0, "prefix": "data/XX",
            "upload": {"id": "ID", "key": "uploads/ID/upload/file.geojson", "districts": [null]}, "geometry_key": "geom.wkt"}));

        let outcome = run(&store, &queue, &scorer, &plenty(), last).unwrap();
        assert_eq!(outcome, Outcome::Finished { index: 0, result_key: "uploads/ID/districts/0.json".into(), plan_complete: true });

        let index: Upload = serde_json::from_slice(&store.get("uploads/ID/index.json").unwrap().unwrap().body).unwrap();
        assert_eq!(index.completed(), 1);
        assert_eq!(index.message.as_deref(), Some("Finished scoring this plan."));
    }

    #[test]
    fn posts_expected_result() {
        let store = MemStore::new();
        let done = payload(json!({"index": -1, "totals": {"Voters": 1}, "compactness": {}, "precincts": [], "tiles": [],
            "upload": {"id": "ID", "key": "uploads/ID/upload/file.geojson", "districts": [null, null], "start_time": -1},
            "geometry_key": "uploads/ID/geometries/-1.wkt"}));
        let partial = Partial::from_payload(done, read_wkt("POINT (0 0)").unwrap(), &ScoreConfig::default(), 0.0).unwrap();

        let key = post_score_results(&store, &partial).unwrap();
        assert_eq!(key, "uploads/ID/districts/-1.json");

        let body = store.get(&key).unwrap().unwrap().body;
        assert_eq!(std::str::from_utf8(&body).unwrap(), r#"{
  "index": -1,
  "totals": {
    "Voters": 1.0
  },
  "compactness": {},
  "precincts": 0,
  "tiles": [],
  "upload": {
    "id": "ID",
    "key": "uploads/ID/upload/file.geojson",
    "model": null,
    "districts": [
      null,
      null
    ],
    "summary": {},
    "progress": null,
    "start_time": -1.0,
    "message": null
  }
}"#);
        let options = store.options(&key).unwrap();
        assert_eq!(options.content_type.as_deref(), Some("text/json"));
        assert_eq!(options.acl, Acl::PublicRead);
    }
}
