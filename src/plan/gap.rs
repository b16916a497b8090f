use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;

use crate::{plan::Upload, precinct::Totals};

const RED_VOTES: &str = "Red Votes";
const BLUE_VOTES: &str = "Blue Votes";

/// Wasted votes (red, blue) and two-party total of one district.
///
/// A losing side wastes everything; a winning side wastes what it got
/// beyond half the two-party total. Ties go to blue.
fn wasted_votes(red: f64, blue: f64) -> (f64, f64, f64) {
    let total = red + blue;
    let needed = total / 2.0;
    if red > blue {
        (red - needed, blue, total)
    } else {
        (red, blue - needed, total)
    }
}

/// Efficiency gap for one red/blue field pair, or `None` without votes.
///
/// Negative values mean red wasted fewer votes than blue.
fn efficiency_gap<'a>(districts: impl Iterator<Item = &'a Totals>, red_field: &str, blue_field: &str) -> Option<f64> {
    let (mut wasted_red, mut wasted_blue, mut total) = (0.0, 0.0, 0.0);
    for totals in districts {
        let red = totals.get(red_field).copied().unwrap_or(0.0);
        let blue = totals.get(blue_field).copied().unwrap_or(0.0);
        let (r, b, t) = wasted_votes(red, blue);
        wasted_red += r;
        wasted_blue += b;
        total += t;
    }
    (total > 0.0).then(|| (wasted_red - wasted_blue) / total)
}

/// Suffixes of simulated elections with both `REPnnn` and `DEMnnn` totals.
fn simulations(totals: &Totals) -> Vec<String> {
    static SIMULATED_RED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^REP(\d+)$").unwrap());
    let found: BTreeSet<String> = totals.keys()
        .filter_map(|name| SIMULATED_RED.captures(name))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|suffix| totals.contains_key(&format!("DEM{suffix}")))
        .collect();
    found.into_iter().collect()
}

fn mean(values: &[f64]) -> f64 { values.iter().sum::<f64>() / values.len() as f64 }

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / 2.0 } else { sorted[mid] }
}

/// Plan summary from finished district totals.
///
/// Districts still pending are left out. Per-district totals are not
/// touched; only `summary` changes in the returned upload.
pub fn calculate_gap(upload: &Upload) -> Upload {
    let mut output = upload.clone();
    let districts: Vec<&Totals> = upload.districts.iter().flatten().map(|d| &d.totals).collect();
    if districts.is_empty() {
        return output;
    }
    let summary = &mut output.summary;

    let sims = simulations(districts[0]);
    if sims.is_empty() {
        if let Some(gap) = efficiency_gap(districts.iter().copied(), RED_VOTES, BLUE_VOTES) {
            summary.insert("Efficiency Gap".into(), gap);
        }
    } else {
        let gaps: Vec<f64> = sims.iter()
            .filter_map(|sim| efficiency_gap(districts.iter().copied(), &format!("REP{sim}"), &format!("DEM{sim}")))
            .collect();
        if !gaps.is_empty() {
            let m = mean(&gaps);
            let sd = if gaps.len() > 1 {
                (gaps.iter().map(|g| (g - m) * (g - m)).sum::<f64>() / (gaps.len() - 1) as f64).sqrt()
            } else {
                0.0
            };
            summary.insert("Efficiency Gap".into(), m);
            summary.insert("Efficiency Gap SD".into(), sd);
        }
    }

    let votes: Vec<(f64, f64)> = districts.iter()
        .map(|t| (t.get(RED_VOTES).copied().unwrap_or(0.0), t.get(BLUE_VOTES).copied().unwrap_or(0.0)))
        .filter(|(red, blue)| red + blue > 0.0)
        .collect();
    if !votes.is_empty() {
        let shares: Vec<f64> = votes.iter().map(|(red, blue)| blue / (red + blue)).collect();
        summary.insert("Mean-Median".into(), median(&shares) - mean(&shares));
        let blue_seats = votes.iter().filter(|(red, blue)| blue >= red).count();
        summary.insert("Blue Seats".into(), blue_seats as f64);
        summary.insert("Red Seats".into(), (votes.len() - blue_seats) as f64);
    }

    output
}
