use std::fs::OpenOptions;
use std::path::PathBuf;

use super::ResultSink;
use crate::error::Result;
use crate::operator::OperatorInput;
use crate::pipeline::CycleReport;

/// Operator-labelled training log.
///
/// Each cycle the operator is asked for the true label; a non-empty answer
/// appends one row `c0,…,c5,label` (conditioned values) to the CSV file.
/// Skipped cycles write nothing.
pub struct LabelledCsvSink<O> {
    path: PathBuf,
    operator: O,
}

impl<O: OperatorInput> LabelledCsvSink<O> {
    pub fn new(path: impl Into<PathBuf>, operator: O) -> Self {
        Self {
            path: path.into(),
            operator,
        }
    }

    fn append(&self, report: &CycleReport, label: &str) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let mut row: Vec<String> = report
            .conditioned
            .values()
            .iter()
            .map(|v| v.to_string())
            .collect();
        row.push(label.to_string());

        writer.write_record(&row)?;
        writer.flush()?;
        Ok(())
    }
}

impl<O: OperatorInput> ResultSink for LabelledCsvSink<O> {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn publish(&mut self, report: &CycleReport) -> Result<()> {
        let Some(label) = self.operator.ask_label() else {
            return Ok(());
        };
        self.append(report, &label)?;
        log::info!("Logged cycle {} as '{label}' to {}", report.cycle, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::data::conditioning::condition;
    use crate::data::model::{ClassificationResult, RawSample};
    use crate::operator::ConsoleOperator;
    use crate::timing::CancelToken;

    fn report(cycle: u64) -> CycleReport {
        let raw = RawSample::new([1, 2, 3, 4, 5, 6]);
        CycleReport {
            cycle,
            raw,
            conditioned: condition(&raw),
            result: ClassificationResult::unknown(),
        }
    }

    #[test]
    fn appends_labelled_rows_and_skips_blank_answers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let operator = ConsoleOperator::new(Cursor::new("PE\n\nPVC\n"), Vec::new(), CancelToken::new());
        let mut sink = LabelledCsvSink::new(&path, operator);

        for cycle in 1..=3 {
            sink.publish(&report(cycle)).unwrap();
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 7);
        assert_eq!(&rows[0][6], "PE");
        assert_eq!(&rows[1][6], "PVC");
        assert_eq!(rows[0][0].parse::<f64>().unwrap(), 0.0);
        assert_eq!(rows[0][5].parse::<f64>().unwrap(), 1.0);
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let operator = ConsoleOperator::new(Cursor::new("PE\n"), Vec::new(), CancelToken::new());
        // A directory cannot be opened for appending.
        let mut sink = LabelledCsvSink::new(dir.path(), operator);
        assert!(sink.publish(&report(1)).is_err());
    }
}
