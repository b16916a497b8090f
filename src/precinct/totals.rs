use std::collections::BTreeMap;

use crate::config::ScoreConfig;

/// Accumulated attribute totals, keyed by attribute name.
pub type Totals = BTreeMap<String, f64>;

/// Fold `from` into `into`, rounding each sum.
pub fn add_totals(into: &mut Totals, from: &Totals, config: &ScoreConfig) {
    for (name, value) in from {
        let total = into.entry(name.clone()).or_insert(0.0);
        *total = config.round(*total + value);
    }
}
