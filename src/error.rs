use thiserror::Error;

use crate::bus::BusFault;

/// Errors produced by the acquisition and classification pipeline.
#[derive(Debug, Error)]
pub enum PlastiscanError {
    /// A register transaction failed after all retries.
    #[error("bus error at register {register:#04x}: {source}")]
    Bus {
        register: u8,
        #[source]
        source: BusFault,
    },

    /// Smoothed spectrum is flat, so min-max normalisation is undefined.
    #[error("degenerate signal: smoothed spectrum is flat at {level:.3}")]
    DegenerateSignal { level: f64 },

    /// Empty or inconsistent configuration / reference table.
    #[error("configuration error: {0}")]
    Config(String),

    /// A downstream collaborator (console, HTTP, CSV) failed.
    #[error("sink '{sink}' failed: {message}")]
    Sink { sink: &'static str, message: String },

    #[error("acquisition cancelled")]
    Cancelled,

    #[error("sensor has not been initialised")]
    NotInitialised,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = PlastiscanError> = std::result::Result<T, E>;

impl PlastiscanError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        PlastiscanError::Config(msg.into())
    }

    /// Whether the error only affects the current cycle.
    pub fn is_cycle_local(&self) -> bool {
        matches!(
            self,
            PlastiscanError::Bus { .. }
                | PlastiscanError::DegenerateSignal { .. }
                | PlastiscanError::Sink { .. }
        )
    }
}
