use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Reserved property name holding the fraction of a precinct's original area
/// that survived clipping to a tile.
pub const FRACTION_FIELD: &str = "PlanScore:Fraction";

/// Tunables for scoring and for the continuation driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Zoom level of the precinct tile partitions.
    pub tile_zoom: u8,
    /// Decimal places kept in totals after every update.
    pub round_places: u32,
    pub fraction_field: String,
    /// Attributes to score. `None` scores every numeric property.
    pub fields: Option<Vec<String>>,
    pub tile_cache_size: usize,
    /// Suspend when less than this much invocation time remains.
    pub safety_margin_ms: u64,
    /// Ceiling on wall-clock time for one district's continuation chain.
    pub overdue_after_secs: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            tile_zoom: 12,
            round_places: 2,
            fraction_field: FRACTION_FIELD.to_string(),
            fields: None,
            tile_cache_size: 16,
            safety_margin_ms: 30_000,
            overdue_after_secs: 3_600.0,
        }
    }
}

impl ScoreConfig {
    /// Parse a config from JSON; missing fields take their defaults.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("[config] Failed to parse score config")
    }

    /// Round a value to the configured precision.
    #[inline]
    pub fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.round_places as i32);
        (value * scale).round() / scale
    }
}
