/// Downstream collaborators that receive every cycle's result.
///
/// Sinks are push-only. A failing sink is logged by the acquisition loop
/// and never aborts the cycle or affects the other sinks.
pub mod console;
pub mod csv_log;
pub mod http;

pub use console::ConsoleSink;
pub use csv_log::LabelledCsvSink;
pub use http::HttpSink;

use crate::error::Result;
use crate::pipeline::CycleReport;

pub trait ResultSink {
    fn name(&self) -> &'static str;
    fn publish(&mut self, report: &CycleReport) -> Result<()>;
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn publish(&mut self, report: &CycleReport) -> Result<()> {
        (**self).publish(report)
    }
}
