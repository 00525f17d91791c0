//! Runtime configuration.
//!
//! Everything has a default, so an absent file or a partial file is fine.
//! Command-line flags are applied on top in `main.rs`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::conditioning::{Conditioner, DEFAULT_POLYORDER, DEFAULT_WINDOW};
use crate::data::matcher::DistanceMetric;
use crate::data::model::CHANNELS;
use crate::error::PlastiscanError;

/// Register addresses used by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterMap {
    pub hw_version: u8,
    /// Setup / control register (reset bit and measurement mode).
    pub control: u8,
    pub integration_time: u8,
    pub led_control: u8,
    /// First register of the channel data block.
    pub data_start: u8,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            hw_version: 0x00,
            control: 0x04,
            integration_time: 0x05,
            led_control: 0x07,
            data_start: 0x08,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// I2C character device (Linux transport only).
    pub bus_path: PathBuf,
    /// 7-bit device address.
    pub address: u8,
    /// Value written to the integration-time register.
    pub integration_time: u8,
    /// Optional value for the LED control register.
    pub led_control: Option<u8>,
    pub registers: RegisterMap,
    /// Settle time after every register write (ms).
    pub write_settle_ms: u64,
    /// Settle time after the reset pulse (ms).
    pub reset_settle_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            bus_path: PathBuf::from("/dev/i2c-1"),
            address: 0x49,
            integration_time: 0xC0,
            led_control: None,
            registers: RegisterMap::default(),
            write_settle_ms: 100,
            reset_settle_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Delay between cycles (ms).
    pub interval_ms: u64,
    /// Extra attempts per register transaction before a cycle is aborted.
    pub bus_retries: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            bus_retries: 2,
        }
    }
}

impl AcquisitionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditioningConfig {
    pub window: usize,
    pub polyorder: usize,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            polyorder: DEFAULT_POLYORDER,
        }
    }
}

impl ConditioningConfig {
    pub fn conditioner(&self) -> Result<Conditioner, PlastiscanError> {
        Conditioner::new(self.window, self.polyorder)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub metric: DistanceMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencesConfig {
    /// Reference file (`.json` / `.csv`); the built-in table when unset.
    pub path: Option<PathBuf>,
    /// File spectra are raw counts to be conditioned at load time.
    pub precondition: bool,
}

impl Default for ReferencesConfig {
    fn default() -> Self {
        Self {
            path: None,
            precondition: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Endpoint receiving `{"microplastic", "concentration"}` posts.
    pub server_url: Option<String>,
    pub http_timeout_ms: u64,
    /// Labelled training log.
    pub csv_path: PathBuf,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            http_timeout_ms: 5000,
            csv_path: PathBuf::from("microplastic_data.csv"),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub acquisition: AcquisitionConfig,
    pub conditioning: ConditioningConfig,
    pub matching: MatchingConfig,
    pub references: ReferencesConfig,
    pub sinks: SinkConfig,
}

impl AppConfig {
    /// Read `path` (JSON) or fall back to defaults, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", p.display()))?
            }
            None => AppConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PlastiscanError> {
        self.conditioning.conditioner()?;

        if self.acquisition.interval_ms == 0 {
            return Err(PlastiscanError::config("acquisition interval must be > 0 ms"));
        }
        if self.sinks.http_timeout_ms == 0 {
            return Err(PlastiscanError::config("HTTP timeout must be > 0 ms"));
        }
        let last = self.sensor.registers.data_start as usize + 2 * CHANNELS - 1;
        if last > u8::MAX as usize {
            return Err(PlastiscanError::config(format!(
                "data block starting at {:#04x} runs past register 0xff",
                self.sensor.registers.data_start
            )));
        }
        if self.sensor.address > 0x7F {
            return Err(PlastiscanError::config(format!(
                "{:#04x} is not a 7-bit bus address",
                self.sensor.address
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_the_device() {
        let c = AppConfig::default();
        assert_eq!(c.sensor.address, 0x49);
        assert_eq!(c.sensor.integration_time, 0xC0);
        assert_eq!(c.sensor.registers.data_start, 0x08);
        assert_eq!(c.acquisition.interval(), Duration::from_secs(2));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            f,
            r#"{{ "acquisition": {{ "interval_ms": 500 }}, "matching": {{ "metric": "manhattan" }} }}"#
        )
        .unwrap();

        let c = AppConfig::load(Some(f.path())).unwrap();
        assert_eq!(c.acquisition.interval_ms, 500);
        assert_eq!(c.acquisition.bus_retries, 2);
        assert_eq!(c.matching.metric, DistanceMetric::Manhattan);
        assert_eq!(c.sensor, SensorConfig::default());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/plastiscan.json"))).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut c = AppConfig::default();
        c.conditioning.window = 4;
        assert!(c.validate().is_err());

        let mut c = AppConfig::default();
        c.acquisition.interval_ms = 0;
        assert!(c.validate().is_err());

        let mut c = AppConfig::default();
        c.sensor.registers.data_start = 0xF8;
        assert!(c.validate().is_err());

        let mut c = AppConfig::default();
        c.sensor.address = 0x80;
        assert!(c.validate().is_err());
    }
}
