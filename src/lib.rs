//! Microplastic identification from a 6-channel near-infrared sensor.
//!
//! ```text
//!   RegisterBus ──► sensor::read_channels ──► Pipeline ──► ResultSink(s)
//!        ▲                                      │
//!        │                        conditioning → matcher / estimator
//!   AcquisitionLoop (Idle → Running, CancelToken, fixed interval)
//! ```

pub mod acquisition;
pub mod bus;
pub mod config;
pub mod data;
pub mod error;
pub mod operator;
pub mod pipeline;
pub mod sensor;
pub mod sink;
pub mod timing;

pub use acquisition::{AcquisitionLoop, LoopState, LoopStats};
pub use error::{PlastiscanError, Result};
pub use pipeline::{CycleReport, Pipeline};
pub use timing::CancelToken;
