use crate::data::model::ConditionedVector;

/// Scale from mean normalised intensity to mg/L.
pub const CONCENTRATION_SCALE: f64 = 10.0;

/// Concentration estimate: mean of the conditioned vector times
/// [`CONCENTRATION_SCALE`], rounded to two decimals.
pub fn estimate(vec: &ConditionedVector) -> f64 {
    let values = vec.values();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    round2(mean * CONCENTRATION_SCALE)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
