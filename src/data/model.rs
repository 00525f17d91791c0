use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::conditioning::Conditioner;
use crate::error::{PlastiscanError, Result};

/// Number of spectral channels on the sensor.
pub const CHANNELS: usize = 6;

/// Label reported when a cycle cannot be classified.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Raw reference spectra for common polymers, in table order.
pub const BUILTIN_REFERENCES: [(&str, [u16; CHANNELS]); 6] = [
    ("Polyethylene (PE)", [1200, 1500, 1100, 1300, 1400, 1250]),
    ("Polypropylene (PP)", [1000, 1400, 1150, 1250, 1350, 1200]),
    ("Polyvinyl Chloride (PVC)", [800, 1100, 900, 1000, 950, 850]),
    ("Polystyrene (PS)", [750, 950, 850, 900, 870, 800]),
    ("Polyethylene Terephthalate (PET)", [700, 920, 800, 850, 880, 760]),
    ("Acrylic (PMMA)", [680, 890, 770, 820, 800, 740]),
];

// ---------------------------------------------------------------------------
// RawSample – one cycle's counts straight off the bus
// ---------------------------------------------------------------------------

/// Per-channel counts for one acquisition cycle, in channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample([u16; CHANNELS]);

impl RawSample {
    pub fn new(channels: [u16; CHANNELS]) -> Self {
        RawSample(channels)
    }

    pub fn channels(&self) -> &[u16; CHANNELS] {
        &self.0
    }

    pub fn to_f64(&self) -> [f64; CHANNELS] {
        self.0.map(f64::from)
    }
}

impl fmt::Display for RawSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// ConditionedVector – smoothed and normalised spectrum
// ---------------------------------------------------------------------------

/// Smoothed, min-max normalised spectrum.
///
/// Every value is in `[0, 1]`. A regular vector has its maximum at exactly
/// `1.0` and its minimum at exactly `0.0`; a degenerate one (flat input) is
/// all zeros and flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConditionedVector {
    values: [f64; CHANNELS],
    degenerate: bool,
}

impl ConditionedVector {
    pub(crate) fn normalised(values: [f64; CHANNELS]) -> Self {
        Self {
            values,
            degenerate: false,
        }
    }

    pub(crate) fn degenerate() -> Self {
        Self {
            values: [0.0; CHANNELS],
            degenerate: true,
        }
    }

    pub fn values(&self) -> &[f64; CHANNELS] {
        &self.values
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }
}

// ---------------------------------------------------------------------------
// Reference table
// ---------------------------------------------------------------------------

/// A labelled reference spectrum, on the same scale as conditioned samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub label: String,
    pub vector: [f64; CHANNELS],
}

/// Validated, ordered set of reference entries. Never empty.
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceTable {
    /// Build a table from entries that are already on the conditioned scale.
    ///
    /// Fails when the table is empty, a label is blank or repeated, or a
    /// value is not finite.
    pub fn new(entries: Vec<ReferenceEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(PlastiscanError::config("reference table is empty"));
        }
        let mut seen = BTreeSet::new();
        for (i, entry) in entries.iter().enumerate() {
            if entry.label.trim().is_empty() {
                return Err(PlastiscanError::config(format!(
                    "reference entry {i} has an empty label"
                )));
            }
            if !seen.insert(entry.label.as_str()) {
                return Err(PlastiscanError::config(format!(
                    "duplicate reference label '{}'",
                    entry.label
                )));
            }
            if let Some(j) = entry.vector.iter().position(|v| !v.is_finite()) {
                return Err(PlastiscanError::config(format!(
                    "reference '{}' channel {j} is not finite",
                    entry.label
                )));
            }
        }
        Ok(ReferenceTable { entries })
    }

    /// Build a table from raw spectra, conditioning each one the way live
    /// samples are conditioned. A flat reference spectrum is rejected.
    pub fn from_spectra<I, S>(spectra: I, conditioner: &Conditioner) -> Result<Self>
    where
        I: IntoIterator<Item = (S, [f64; CHANNELS])>,
        S: Into<String>,
    {
        let mut entries = Vec::new();
        for (label, spectrum) in spectra {
            let label = label.into();
            let vector = conditioner.condition_values(&spectrum);
            if vector.is_degenerate() {
                return Err(PlastiscanError::config(format!(
                    "reference '{label}' has a flat spectrum"
                )));
            }
            entries.push(ReferenceEntry {
                label,
                vector: *vector.values(),
            });
        }
        Self::new(entries)
    }

    /// The built-in polymer table, conditioned with `conditioner`.
    pub fn builtin(conditioner: &Conditioner) -> Result<Self> {
        Self::from_spectra(
            BUILTIN_REFERENCES
                .iter()
                .map(|(label, raw)| (*label, RawSample::new(*raw).to_f64())),
            conditioner,
        )
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.entries.iter()
    }

    /// Number of entries (always at least one).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }
}

// ---------------------------------------------------------------------------
// ClassificationResult – what a cycle hands to the sinks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: String,
    /// Estimated concentration (mg/L).
    pub concentration: f64,
    /// Distance to the matched reference; `None` when unclassified.
    pub distance: Option<f64>,
}

impl ClassificationResult {
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            concentration: 0.0,
            distance: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.distance.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str, vector: [f64; CHANNELS]) -> ReferenceEntry {
        ReferenceEntry {
            label: label.to_string(),
            vector,
        }
    }

    #[test]
    fn empty_table_is_a_config_error() {
        let err = ReferenceTable::new(Vec::new()).unwrap_err();
        assert!(matches!(err, PlastiscanError::Config(_)));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let err = ReferenceTable::new(vec![entry("A", [0.0; 6]), entry("A", [1.0; 6])]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut v = [0.0; 6];
        v[3] = f64::NAN;
        let err = ReferenceTable::new(vec![entry("A", v)]).unwrap_err();
        assert!(err.to_string().contains("channel 3"));
    }

    #[test]
    fn flat_reference_spectrum_is_rejected() {
        let err = ReferenceTable::from_spectra([("flat", [5.0; 6])], &Conditioner::default())
            .unwrap_err();
        assert!(err.to_string().contains("flat"));
    }

    #[test]
    fn builtin_table_keeps_source_order() {
        let table = ReferenceTable::builtin(&Conditioner::default()).unwrap();
        let labels: Vec<&str> = table.labels().collect();
        let expected: Vec<&str> = BUILTIN_REFERENCES.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn raw_sample_display() {
        let raw = RawSample::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(raw.to_string(), "[1, 2, 3, 4, 5, 6]");
    }
}
