use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{partial::Scrunched, plan::Upload};

/// Trigger payload for one district-scoring invocation.
///
/// A first invocation carries only the district reference; continuations
/// add the scrunched snapshot fields. Omitted snapshot fields mean "start
/// fresh".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Continuation {
    pub index: i64,
    #[serde(default)]
    pub bucket: Option<String>,
    /// Prefix of the tile partitions to score against.
    #[serde(default)]
    pub prefix: String,
    pub upload: Upload,
    pub geometry_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<Scrunched>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compactness: Option<Scrunched>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precincts: Option<Scrunched>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Scrunched>,
    /// Precinct features scored by earlier invocations.
    #[serde(default)]
    pub scored: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded: Option<Scrunched>,
    /// When this district's scoring began, in unix seconds. Falls back to
    /// the upload's start time.
    #[serde(default)]
    pub start_time: Option<f64>,
}

impl Continuation {
    /// A first-invocation payload.
    pub fn start(index: i64, prefix: impl Into<String>, upload: Upload, geometry_key: impl Into<String>) -> Self {
        Self {
            index,
            bucket: None,
            prefix: prefix.into(),
            upload,
            geometry_key: geometry_key.into(),
            totals: None,
            compactness: None,
            precincts: None,
            tiles: None,
            scored: 0,
            loaded: None,
            start_time: None,
        }
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("[partial::payload] Failed to parse continuation payload")
    }

    /// Whether this payload resumes earlier work.
    #[inline]
    pub fn is_continuation(&self) -> bool { self.tiles.is_some() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_first_invocation() {
        let payload = Continuation::from_json_bytes(br#"{"index": -1, "bucket": "bucket-name",
            "upload": {"id": "ID", "key": "uploads/ID/upload/file.geojson"}, "geometry_key": "geom.wkt"}"#).unwrap();
        assert_eq!(payload.index, -1);
        assert_eq!(payload.bucket.as_deref(), Some("bucket-name"));
        assert_eq!(payload.prefix, "");
        assert!(!payload.is_continuation());
        assert_eq!(payload.start_time, None);
    }

    #[test]
    fn reads_literal_snapshot_fields() {
        let payload: Continuation = serde_json::from_value(json!({"index": -1, "prefix": "data/XX",
            "totals": {}, "tiles": ["12/2047/2048"], "compactness": {"Reock": -1},
            "upload": {"id": "ID", "key": "k"}, "geometry_key": "geom.wkt"})).unwrap();
        assert!(payload.is_continuation());
        assert_eq!(payload.tiles, Some(Scrunched::Literal(json!(["12/2047/2048"]))));
    }

    #[test]
    fn fresh_payload_omits_snapshot() {
        let payload = Continuation::start(3, "data/XX", Upload::new("ID", "k"), "uploads/ID/geometries/3.wkt");
        let value = serde_json::to_value(&payload).unwrap();
        let object = value.as_object().unwrap();
        for absent in ["totals", "compactness", "precincts", "tiles", "loaded"] {
            assert!(!object.contains_key(absent), "{absent} should be omitted");
        }
        assert_eq!(value["prefix"], "data/XX");
    }
}
