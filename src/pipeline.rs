use crate::data::conditioning::Conditioner;
use crate::data::estimator::estimate;
use crate::data::matcher::{classify_with, DistanceMetric};
use crate::data::model::{ClassificationResult, ConditionedVector, RawSample, ReferenceTable};
use crate::error::PlastiscanError;

/// Everything one cycle produced, as handed to the sinks.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub raw: RawSample,
    pub conditioned: ConditionedVector,
    pub result: ClassificationResult,
}

/// Conditioning, matching and estimation for one raw sample.
///
/// Holds only read-only state, so one instance serves every cycle.
#[derive(Debug, Clone)]
pub struct Pipeline {
    conditioner: Conditioner,
    table: ReferenceTable,
    metric: DistanceMetric,
}

impl Pipeline {
    pub fn new(conditioner: Conditioner, table: ReferenceTable, metric: DistanceMetric) -> Self {
        Self {
            conditioner,
            table,
            metric,
        }
    }

    /// Default conditioner and metric over the built-in polymer table.
    pub fn builtin() -> Result<Self, PlastiscanError> {
        let conditioner = Conditioner::default();
        let table = ReferenceTable::builtin(&conditioner)?;
        Ok(Self::new(conditioner, table, DistanceMetric::default()))
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn conditioner(&self) -> &Conditioner {
        &self.conditioner
    }

    /// Run one sample through the pipeline.
    ///
    /// A flat spectrum is not an error here: it is reported as
    /// [`UNKNOWN_LABEL`](crate::data::model::UNKNOWN_LABEL) with zero
    /// concentration.
    pub fn process(&self, raw: &RawSample) -> (ConditionedVector, ClassificationResult) {
        match self.conditioner.try_condition(raw) {
            Ok(conditioned) => match classify_with(&conditioned, &self.table, self.metric) {
                Some(m) => {
                    let result = ClassificationResult {
                        label: m.label.to_string(),
                        concentration: estimate(&conditioned),
                        distance: Some(m.distance),
                    };
                    (conditioned, result)
                }
                None => (conditioned, ClassificationResult::unknown()),
            },
            Err(err) => {
                log::warn!("{err}; raw sample {raw} reported as unknown");
                (ConditionedVector::degenerate(), ClassificationResult::unknown())
            }
        }
    }
}
