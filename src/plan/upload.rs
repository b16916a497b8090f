use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{precinct::Totals, tile::TileId};

/// Modeled election data a plan is scored against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Model {
    pub state: String,
    pub house: String,
    pub seats: u32,
    /// Storage prefix of the model's tile partitions.
    pub key_prefix: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// Per-district entry of an upload, filled in as districts finish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistrictSummary {
    pub totals: Totals,
    #[serde(default)]
    pub tiles: Vec<TileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compactness: Option<BTreeMap<String, f64>>,
}

/// A submitted plan and everything learned about it so far.
///
/// Field order is the wire order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Upload {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub model: Option<Model>,
    /// One slot per district; `None` until that district is scored.
    #[serde(default)]
    pub districts: Vec<Option<DistrictSummary>>,
    #[serde(default)]
    pub summary: BTreeMap<String, f64>,
    #[serde(default)]
    pub progress: Option<Progress>,
    /// Unix seconds when scoring started.
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Upload {
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self { id: id.into(), key: key.into(), ..Self::default() }
    }

    /// Same upload with `district_count` empty district slots.
    pub fn with_districts(mut self, district_count: usize) -> Self {
        self.districts = vec![None; district_count];
        self
    }

    /// Number of districts that have a summary.
    pub fn completed(&self) -> usize { self.districts.iter().flatten().count() }
}

/// Stored result of one finished district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictResult {
    pub index: i64,
    pub totals: Totals,
    #[serde(default)]
    pub compactness: BTreeMap<String, f64>,
    /// Precinct features scored.
    pub precincts: u64,
    /// Tiles that contributed precincts, in load order.
    pub tiles: Vec<TileId>,
    pub upload: Upload,
}

impl DistrictResult {
    pub fn summary(&self) -> DistrictSummary {
        DistrictSummary {
            totals: self.totals.clone(),
            tiles: self.tiles.clone(),
            compactness: Some(self.compactness.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_upload_fills_defaults() {
        let upload: Upload = serde_json::from_value(json!({"id": "ID", "key": "uploads/ID/upload/file.geojson"})).unwrap();
        assert_eq!(upload, Upload::new("ID", "uploads/ID/upload/file.geojson"));
        assert_eq!(upload.completed(), 0);
    }

    #[test]
    fn serializes_in_wire_order() {
        let upload = Upload { start_time: Some(-1.0), ..Upload::new("ID", "k") }.with_districts(2);
        let text = serde_json::to_string(&upload).unwrap();
        assert_eq!(text, r#"{"id":"ID","key":"k","model":null,"districts":[null,null],"summary":{},"progress":null,"start_time":-1.0,"message":null}"#);
    }

    #[test]
    fn reads_model() {
        let upload: Upload = serde_json::from_value(json!({"id": "ID", "key": "k",
            "model": {"state": "XX", "house": "ushouse", "seats": 4, "key_prefix": "data/XX/001"}})).unwrap();
        let model = upload.model.unwrap();
        assert_eq!(model.seats, 4);
        assert_eq!(model.key_prefix, "data/XX/001");
    }
}
