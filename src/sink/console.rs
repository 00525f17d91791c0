use std::io::Write;

use super::ResultSink;
use crate::error::Result;
use crate::pipeline::CycleReport;

/// Prints the operator-facing result line.
pub struct ConsoleSink<W> {
    out: W,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for ConsoleSink<W> {
    fn name(&self) -> &'static str {
        "console"
    }

    fn publish(&mut self, report: &CycleReport) -> Result<()> {
        let r = &report.result;
        writeln!(
            self.out,
            "Detected: {}, Concentration: {:?} mg/L",
            r.label, r.concentration
        )?;
        Ok(())
    }
}
