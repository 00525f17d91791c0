use serde::{Deserialize, Serialize};

use crate::data::model::{ConditionedVector, ReferenceTable, CHANNELS};

/// Distance used to compare a conditioned sample with a reference vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f64; CHANNELS], b: &[f64; CHANNELS]) -> f64 {
        let diffs = a.iter().zip(b).map(|(x, y)| x - y);
        match self {
            DistanceMetric::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            DistanceMetric::Manhattan => diffs.map(f64::abs).sum(),
        }
    }
}

/// The closest reference entry for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<'t> {
    pub label: &'t str,
    pub distance: f64,
    /// Position of the entry in the table.
    pub index: usize,
}

/// Nearest-reference classification with the Euclidean metric.
pub fn classify<'t>(vec: &ConditionedVector, table: &'t ReferenceTable) -> Option<Match<'t>> {
    classify_with(vec, table, DistanceMetric::Euclidean)
}

/// Nearest-reference classification.
///
/// Entries are scanned in table order and only a strictly smaller distance
/// replaces the current best, so the earliest of several equally close
/// entries wins. `None` only for an empty table, which
/// [`ReferenceTable::new`] never builds.
pub fn classify_with<'t>(
    vec: &ConditionedVector,
    table: &'t ReferenceTable,
    metric: DistanceMetric,
) -> Option<Match<'t>> {
    let mut best: Option<Match<'t>> = None;
    for (index, entry) in table.iter().enumerate() {
        let distance = metric.distance(vec.values(), &entry.vector);
        log::trace!("{:<34} d={distance:.4}", entry.label);
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(Match {
                label: &entry.label,
                distance,
                index,
            });
        }
    }
    best
}
