//! Register-level access to the 6-channel NIR sensor: initialisation and
//! channel read-out.

use std::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::bus::RegisterBus;
use crate::config::SensorConfig;
use crate::data::model::{RawSample, CHANNELS};
use crate::error::{PlastiscanError, Result};
use crate::timing::{wait, CancelToken};

/// Control register value that triggers a soft reset.
pub const CONTROL_RESET: u8 = 0x80;
/// Control register value for continuous measurement.
pub const CONTROL_CONTINUOUS: u8 = 0x03;

fn write<B, D>(
    bus: &mut B,
    delay: &mut D,
    config: &SensorConfig,
    cancel: &CancelToken,
    register: u8,
    value: u8,
) -> Result<()>
where
    B: RegisterBus + ?Sized,
    D: DelayNs + ?Sized,
{
    bus.write_register(register, value)
        .map_err(|source| PlastiscanError::Bus { register, source })?;
    if !wait(delay, Duration::from_millis(config.write_settle_ms), cancel) {
        return Err(PlastiscanError::Cancelled);
    }
    Ok(())
}

/// Reset the device, program the integration time and start continuous
/// measurement. Returns the hardware version byte.
///
/// Every write is followed by the configured settle time; the reset pulse
/// gets the longer reset settle time on top.
pub fn setup_sensor<B, D>(
    bus: &mut B,
    config: &SensorConfig,
    delay: &mut D,
    cancel: &CancelToken,
) -> Result<u8>
where
    B: RegisterBus + ?Sized,
    D: DelayNs + ?Sized,
{
    let regs = &config.registers;
    channel_registers(regs.data_start)?;

    write(bus, delay, config, cancel, regs.control, CONTROL_RESET)?;
    if !wait(delay, Duration::from_millis(config.reset_settle_ms), cancel) {
        return Err(PlastiscanError::Cancelled);
    }

    write(bus, delay, config, cancel, regs.integration_time, config.integration_time)?;
    if let Some(led) = config.led_control {
        write(bus, delay, config, cancel, regs.led_control, led)?;
    }
    write(bus, delay, config, cancel, regs.control, CONTROL_CONTINUOUS)?;

    let version = bus
        .read_register(regs.hw_version)
        .map_err(|source| PlastiscanError::Bus {
            register: regs.hw_version,
            source,
        })?;
    log::info!(
        "Sensor at {:#04x} ready (hw version {version:#04x}, integration {:#04x})",
        config.address,
        config.integration_time
    );
    Ok(version)
}

/// Read all channels in channel order.
///
/// Channel `i` is assembled from the high byte at `data_start + 2i + 1`
/// followed by the low byte at `data_start + 2i`.
pub fn read_channels<B>(bus: &mut B, config: &SensorConfig) -> Result<RawSample>
where
    B: RegisterBus + ?Sized,
{
    read_channels_cancellable(bus, config, &CancelToken::new())
}

/// Low-byte register of every channel. Fails when the data block does not
/// fit in the 8-bit register space.
fn channel_registers(data_start: u8) -> Result<[u8; CHANNELS]> {
    let mut regs = [0u8; CHANNELS];
    for (i, reg) in regs.iter_mut().enumerate() {
        *reg = u8::try_from(2 * i)
            .ok()
            .and_then(|offset| data_start.checked_add(offset))
            .filter(|low| *low < u8::MAX)
            .ok_or_else(|| {
                PlastiscanError::config(format!(
                    "data block starting at {data_start:#04x} runs past register 0xff"
                ))
            })?;
    }
    Ok(regs)
}

/// [`read_channels`], checking `cancel` before every register read.
pub fn read_channels_cancellable<B>(
    bus: &mut B,
    config: &SensorConfig,
    cancel: &CancelToken,
) -> Result<RawSample>
where
    B: RegisterBus + ?Sized,
{
    let registers = channel_registers(config.registers.data_start)?;
    let mut channels = [0u16; CHANNELS];

    for (slot, low_reg) in channels.iter_mut().zip(registers) {
        let high_reg = low_reg + 1;

        let mut read = |register: u8| {
            if cancel.is_cancelled() {
                return Err(PlastiscanError::Cancelled);
            }
            bus.read_register(register)
                .map_err(|source| PlastiscanError::Bus { register, source })
        };
        let high = read(high_reg)?;
        let low = read(low_reg)?;
        *slot = u16::from_be_bytes([high, low]);
    }

    let raw = RawSample::new(channels);
    log::debug!("raw sample {raw}");
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusFault, SimulatedBus};
    use crate::timing::testing::RecordingDelay;

    /// Logs the order of register reads.
    struct TracingBus {
        inner: SimulatedBus,
        reads: Vec<u8>,
    }

    impl RegisterBus for TracingBus {
        fn write_register(&mut self, register: u8, value: u8) -> std::result::Result<(), BusFault> {
            self.inner.write_register(register, value)
        }

        fn read_register(&mut self, register: u8) -> std::result::Result<u8, BusFault> {
            self.reads.push(register);
            self.inner.read_register(register)
        }
    }

    #[test]
    fn setup_sequence_and_settle_times() {
        let config = SensorConfig::default();
        let mut bus = SimulatedBus::new();
        bus.poke(0x00, 0x3F);
        let mut delay = RecordingDelay::default();

        let version = setup_sensor(&mut bus, &config, &mut delay, &CancelToken::new()).unwrap();

        assert_eq!(version, 0x3F);
        assert_eq!(bus.writes(), &[(0x04, 0x80), (0x05, 0xC0), (0x04, 0x03)]);
        assert_eq!(delay.total_ms, 3 * 100 + 1000);
    }

    #[test]
    fn led_control_is_written_when_configured() {
        let config = SensorConfig {
            led_control: Some(0x09),
            ..SensorConfig::default()
        };
        let mut bus = SimulatedBus::new();
        setup_sensor(&mut bus, &config, &mut RecordingDelay::default(), &CancelToken::new())
            .unwrap();
        assert!(bus.writes().contains(&(0x07, 0x09)));
    }

    #[test]
    fn setup_can_be_cancelled_during_reset_settle() {
        let token = CancelToken::new();
        let mut delay = RecordingDelay {
            total_ms: 0,
            cancel_after: Some((500, token.clone())),
        };
        let mut bus = SimulatedBus::new();
        let err = setup_sensor(&mut bus, &SensorConfig::default(), &mut delay, &token).unwrap_err();
        assert!(matches!(err, PlastiscanError::Cancelled));
        assert_eq!(bus.writes(), &[(0x04, 0x80)]);
    }

    #[test]
    fn reads_high_then_low_in_channel_order() {
        let config = SensorConfig::default();
        let raw = RawSample::new([0x0102, 0x0304, 0x0506, 0x0708, 0x090A, 0x0B0C]);
        let mut bus = TracingBus {
            inner: SimulatedBus::with_spectrum(0x08, &raw),
            reads: Vec::new(),
        };

        assert_eq!(read_channels(&mut bus, &config).unwrap(), raw);
        assert_eq!(
            bus.reads,
            vec![0x09, 0x08, 0x0B, 0x0A, 0x0D, 0x0C, 0x0F, 0x0E, 0x11, 0x10, 0x13, 0x12]
        );
    }

    #[test]
    fn failed_read_reports_the_register() {
        let config = SensorConfig::default();
        let mut bus = SimulatedBus::with_spectrum(0x08, &RawSample::new([1; 6]));
        // channel 3 high byte
        bus.fail_reads(0x0F, 1);

        match read_channels(&mut bus, &config) {
            Err(PlastiscanError::Bus { register, source }) => {
                assert_eq!(register, 0x0F);
                assert_eq!(source, BusFault::Nack);
            }
            other => panic!("expected bus error, got {other:?}"),
        }
    }

    #[test]
    fn data_block_past_the_register_space_is_a_config_error() {
        let mut config = SensorConfig::default();
        config.registers.data_start = 0xF8;
        let mut bus = SimulatedBus::new();

        let err = read_channels(&mut bus, &config).unwrap_err();
        assert!(matches!(err, PlastiscanError::Config(_)));
        assert_eq!(bus.read_count(), 0);

        let err = setup_sensor(&mut bus, &config, &mut RecordingDelay::default(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, PlastiscanError::Config(_)));
        assert!(bus.writes().is_empty());

        // Last high byte lands exactly on 0xff.
        config.registers.data_start = 0xF4;
        assert!(read_channels(&mut bus, &config).is_ok());
    }

    #[test]
    fn cancelled_read_stops_before_touching_the_bus() {
        let token = CancelToken::new();
        token.cancel();
        let mut bus = SimulatedBus::new();
        let err = read_channels_cancellable(&mut bus, &SensorConfig::default(), &token).unwrap_err();
        assert!(matches!(err, PlastiscanError::Cancelled));
        assert_eq!(bus.read_count(), 0);
    }
}
