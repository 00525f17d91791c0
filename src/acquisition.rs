//! Acquisition loop: setup once, then sample → condition → classify →
//! publish → wait, until cancelled.

use std::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::bus::{RegisterBus, RetryingBus};
use crate::config::{AcquisitionConfig, SensorConfig};
use crate::error::{PlastiscanError, Result};
use crate::pipeline::{CycleReport, Pipeline};
use crate::sensor::{read_channels_cancellable, setup_sensor};
use crate::sink::ResultSink;
use crate::timing::{wait, CancelToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Sensor not yet initialised.
    Idle,
    /// Sampling; stays here until the loop is dropped.
    Running,
}

/// Counters over the life of a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub classified: u64,
    pub unknown: u64,
    pub bus_errors: u64,
    pub sink_errors: u64,
}

/// Owns the bus and drives cycles one at a time.
pub struct AcquisitionLoop<B, D> {
    bus: RetryingBus<B>,
    delay: D,
    sensor: SensorConfig,
    interval: Duration,
    pipeline: Pipeline,
    sinks: Vec<Box<dyn ResultSink>>,
    state: LoopState,
    stats: LoopStats,
}

impl<B: RegisterBus, D: DelayNs> AcquisitionLoop<B, D> {
    pub fn new(
        bus: B,
        delay: D,
        sensor: SensorConfig,
        acquisition: &AcquisitionConfig,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            bus: RetryingBus::new(bus, acquisition.bus_retries),
            delay,
            sensor,
            interval: acquisition.interval(),
            pipeline,
            sinks: Vec::new(),
            state: LoopState::Idle,
            stats: LoopStats::default(),
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn ResultSink>) {
        log::debug!("sink '{}' attached", sink.name());
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: Box<dyn ResultSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn bus(&self) -> &B {
        self.bus.inner()
    }

    pub fn bus_mut(&mut self) -> &mut B {
        self.bus.inner_mut()
    }

    /// Initialise the sensor and enter `Running`. A no-op when already running.
    pub fn setup(&mut self, cancel: &CancelToken) -> Result<()> {
        if self.state == LoopState::Running {
            return Ok(());
        }
        setup_sensor(&mut self.bus, &self.sensor, &mut self.delay, cancel)?;
        self.state = LoopState::Running;
        log::info!(
            "Acquisition running: {} references, {} ms interval",
            self.pipeline.table().len(),
            self.interval.as_millis()
        );
        Ok(())
    }

    /// One full cycle without the trailing wait.
    ///
    /// A bus error aborts the cycle before anything is published. Sink
    /// failures are logged and counted but do not fail the cycle.
    pub fn run_cycle(&mut self, cancel: &CancelToken) -> Result<CycleReport> {
        if self.state != LoopState::Running {
            return Err(PlastiscanError::NotInitialised);
        }
        self.stats.cycles += 1;
        let cycle = self.stats.cycles;

        let raw = match read_channels_cancellable(&mut self.bus, &self.sensor, cancel) {
            Ok(raw) => raw,
            Err(e) => {
                if matches!(e, PlastiscanError::Bus { .. }) {
                    self.stats.bus_errors += 1;
                }
                return Err(e);
            }
        };

        let (conditioned, result) = self.pipeline.process(&raw);
        if result.is_unknown() {
            self.stats.unknown += 1;
        } else {
            self.stats.classified += 1;
        }

        let report = CycleReport {
            cycle,
            raw,
            conditioned,
            result,
        };

        for sink in &mut self.sinks {
            if let Err(e) = sink.publish(&report) {
                self.stats.sink_errors += 1;
                log::error!("cycle {cycle}: {e}");
            }
        }
        Ok(report)
    }

    /// Set up if needed, then cycle until `cancel` fires or `max_cycles`
    /// cycles have run. Bus, conditioning and sink failures only cost the
    /// current cycle; the next one starts after the normal interval.
    pub fn run(&mut self, cancel: &CancelToken, max_cycles: Option<u64>) -> Result<LoopStats> {
        self.setup(cancel)?;

        let mut done = 0u64;
        while !cancel.is_cancelled() && max_cycles.map_or(true, |max| done < max) {
            if done > 0 && !wait(&mut self.delay, self.interval, cancel) {
                break;
            }
            match self.run_cycle(cancel) {
                Ok(report) => log::debug!(
                    "cycle {}: {} ({:.2} mg/L)",
                    report.cycle,
                    report.result.label,
                    report.result.concentration
                ),
                Err(PlastiscanError::Cancelled) => break,
                Err(e) if e.is_cycle_local() => {
                    log::error!("cycle {} aborted: {e}", self.stats.cycles)
                }
                Err(e) => return Err(e),
            }

            done += 1;
        }

        log::info!("Acquisition stopped after {} cycles", self.stats.cycles);
        Ok(self.stats)
    }
}
