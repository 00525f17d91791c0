//! Signal conditioning: Savitzky–Golay smoothing followed by min-max
//! normalisation into `[0, 1]`.

use crate::data::model::{ConditionedVector, RawSample, CHANNELS};
use crate::error::{PlastiscanError, Result};

pub const DEFAULT_WINDOW: usize = 5;
pub const DEFAULT_POLYORDER: usize = 2;

/// Relative spread below which a smoothed spectrum counts as flat.
const FLAT_TOLERANCE: f64 = 1e-9;

/// Window-5, degree-2 weights in units of 1/35, one row per evaluation
/// position from the left edge (-2) to the right edge (+2).
const CLASSIC_WEIGHTS: [[f64; DEFAULT_WINDOW]; DEFAULT_WINDOW] = [
    [31.0, 9.0, -3.0, -5.0, 3.0],
    [9.0, 13.0, 12.0, 6.0, -5.0],
    [-3.0, 12.0, 17.0, 12.0, -3.0],
    [-5.0, 6.0, 12.0, 13.0, 9.0],
    [3.0, -5.0, -3.0, 9.0, 31.0],
];

// ---------------------------------------------------------------------------
// Savitzky–Golay filter
// ---------------------------------------------------------------------------

/// Local least-squares polynomial smoother.
///
/// Interior points use the polynomial fitted to the window centred on them.
/// The first and last `window / 2` points are evaluated on the polynomial
/// fitted to the first / last full window, so the output has the same
/// length as the input and nothing is padded.
#[derive(Debug, Clone, PartialEq)]
pub struct SavitzkyGolay {
    window: usize,
    /// `weights[p]` evaluates the window fit at position `p - window / 2`.
    weights: Vec<Vec<f64>>,
}

impl SavitzkyGolay {
    pub fn new(window: usize, polyorder: usize) -> Result<Self> {
        if window % 2 == 0 {
            return Err(PlastiscanError::config(format!(
                "smoothing window must be odd, got {window}"
            )));
        }
        if polyorder >= window {
            return Err(PlastiscanError::config(format!(
                "polynomial order {polyorder} must be below the window length {window}"
            )));
        }
        let weights = (0..window)
            .map(|p| evaluation_weights(window, polyorder, p as f64 - (window / 2) as f64))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| PlastiscanError::config("singular smoothing system"))?;
        Ok(Self { window, weights })
    }

    /// The window-5, degree-2 filter from its tabulated weights.
    pub fn classic() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            weights: CLASSIC_WEIGHTS
                .iter()
                .map(|row| row.iter().map(|w| w / 35.0).collect())
                .collect(),
        }
    }

    /// Smooth `data`. Inputs shorter than the window are returned unchanged.
    pub fn smooth(&self, data: &[f64]) -> Vec<f64> {
        let n = data.len();
        if n < self.window {
            return data.to_vec();
        }
        let half = self.window / 2;
        (0..n)
            .map(|i| {
                let start = i.saturating_sub(half).min(n - self.window);
                let w = &self.weights[i - start];
                data[start..start + self.window]
                    .iter()
                    .zip(w)
                    .map(|(y, c)| y * c)
                    .sum::<f64>()
            })
            .collect()
    }
}

/// Weights `w` such that `Σ w[k]·y[k]` is the least-squares polynomial of
/// degree `polyorder` through the window, evaluated at offset `t` from the
/// window centre.
fn evaluation_weights(window: usize, polyorder: usize, t: f64) -> Option<Vec<f64>> {
    let m = polyorder + 1;
    let half = (window / 2) as f64;
    let offsets: Vec<f64> = (0..window).map(|k| k as f64 - half).collect();

    // Normal matrix VᵀV and right-hand side [1, t, t², …].
    let mut a: Vec<Vec<f64>> = (0..m)
        .map(|r| {
            (0..m)
                .map(|c| offsets.iter().map(|x| x.powi((r + c) as i32)).sum::<f64>())
                .collect()
        })
        .collect();
    let mut z: Vec<f64> = (0..m).map(|r| t.powi(r as i32)).collect();

    solve_in_place(&mut a, &mut z)?;

    Some(
        offsets
            .iter()
            .map(|x| z.iter().enumerate().map(|(j, zj)| zj * x.powi(j as i32)).sum::<f64>())
            .collect(),
    )
}

/// Gaussian elimination with partial pivoting; the solution replaces `b`.
fn solve_in_place(a: &mut [Vec<f64>], b: &mut [f64]) -> Option<()> {
    let m = b.len();
    for col in 0..m {
        let pivot = (col..m).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < f64::EPSILON {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..m {
            let f = a[row][col] / a[col][col];
            for k in col..m {
                a[row][k] -= f * a[col][k];
            }
            b[row] -= f * b[col];
        }
    }
    for row in (0..m).rev() {
        let tail: f64 = (row + 1..m).map(|k| a[row][k] * b[k]).sum();
        b[row] = (b[row] - tail) / a[row][row];
    }
    Some(())
}

// ---------------------------------------------------------------------------
// Conditioner
// ---------------------------------------------------------------------------

/// Smoothing + normalisation, shared by live samples and reference spectra.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditioner {
    filter: SavitzkyGolay,
}

impl Default for Conditioner {
    fn default() -> Self {
        Self {
            filter: SavitzkyGolay::classic(),
        }
    }
}

impl Conditioner {
    /// Conditioner with a custom filter. The window must fit in one sample.
    pub fn new(window: usize, polyorder: usize) -> Result<Self> {
        if window > CHANNELS {
            return Err(PlastiscanError::config(format!(
                "smoothing window {window} is longer than the {CHANNELS}-channel sample"
            )));
        }
        if (window, polyorder) == (DEFAULT_WINDOW, DEFAULT_POLYORDER) {
            return Ok(Self::default());
        }
        Ok(Self {
            filter: SavitzkyGolay::new(window, polyorder)?,
        })
    }

    pub fn condition(&self, raw: &RawSample) -> ConditionedVector {
        self.condition_values(&raw.to_f64())
    }

    /// Like [`condition`](Self::condition) but reports a flat spectrum as
    /// [`PlastiscanError::DegenerateSignal`] instead of an all-zero vector.
    pub fn try_condition(&self, raw: &RawSample) -> Result<ConditionedVector> {
        self.try_condition_values(&raw.to_f64())
    }

    pub fn condition_values(&self, values: &[f64; CHANNELS]) -> ConditionedVector {
        self.try_condition_values(values)
            .unwrap_or_else(|_| ConditionedVector::degenerate())
    }

    pub fn try_condition_values(&self, values: &[f64; CHANNELS]) -> Result<ConditionedVector> {
        let smoothed = self.filter.smooth(values);
        let min = smoothed.iter().copied().fold(f64::INFINITY, f64::min);
        let max = smoothed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        let scale = max.abs().max(min.abs()).max(1.0);
        if !range.is_finite() || range <= FLAT_TOLERANCE * scale {
            return Err(PlastiscanError::DegenerateSignal { level: max });
        }

        let mut out = [0.0; CHANNELS];
        for (o, v) in out.iter_mut().zip(&smoothed) {
            *o = (v - min) / range;
        }
        Ok(ConditionedVector::normalised(out))
    }
}

/// Condition `raw` with the default window-5, degree-2 filter.
pub fn condition(raw: &RawSample) -> ConditionedVector {
    Conditioner::default().condition(raw)
}
