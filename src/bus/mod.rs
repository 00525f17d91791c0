/// Register bus layer: the only thing the core needs from a transport.
///
/// ```text
///  embedded-hal I2c ──► I2cRegisterBus ─┐
///                                       ├──► RegisterBus ──► RetryingBus ──► reader / setup
///  SimulatedBus ────────────────────────┘
/// ```
pub mod i2c;
pub mod sim;

use thiserror::Error;

pub use i2c::I2cRegisterBus;
pub use sim::SimulatedBus;

/// Transport-level failure of a single register transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusFault {
    #[error("device did not acknowledge")]
    Nack,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Byte-wide register access on a device at a fixed address.
pub trait RegisterBus {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusFault>;
    fn read_register(&mut self, register: u8) -> Result<u8, BusFault>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusFault> {
        (**self).write_register(register, value)
    }

    fn read_register(&mut self, register: u8) -> Result<u8, BusFault> {
        (**self).read_register(register)
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusFault> {
        (**self).write_register(register, value)
    }

    fn read_register(&mut self, register: u8) -> Result<u8, BusFault> {
        (**self).read_register(register)
    }
}

// ---------------------------------------------------------------------------
// Bounded retry on transient faults
// ---------------------------------------------------------------------------

/// Retries every transaction up to `retries` extra times before giving up.
#[derive(Debug)]
pub struct RetryingBus<B> {
    inner: B,
    retries: u32,
}

impl<B: RegisterBus> RetryingBus<B> {
    pub fn new(inner: B, retries: u32) -> Self {
        Self { inner, retries }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }

    fn attempt<T>(
        &mut self,
        register: u8,
        mut op: impl FnMut(&mut B) -> Result<T, BusFault>,
    ) -> Result<T, BusFault> {
        let mut attempt = 0;
        loop {
            match op(&mut self.inner) {
                Ok(v) => return Ok(v),
                Err(fault) if attempt < self.retries => {
                    attempt += 1;
                    log::warn!(
                        "register {register:#04x}: {fault} (retry {attempt}/{})",
                        self.retries
                    );
                }
                Err(fault) => return Err(fault),
            }
        }
    }
}

impl<B: RegisterBus> RegisterBus for RetryingBus<B> {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusFault> {
        self.attempt(register, |bus| bus.write_register(register, value))
    }

    fn read_register(&mut self, register: u8) -> Result<u8, BusFault> {
        self.attempt(register, |bus| bus.read_register(register))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_recovers_from_transient_fault() {
        let mut sim = SimulatedBus::new();
        sim.poke(0x10, 0xAB);
        sim.fail_reads(0x10, 2);

        let mut bus = RetryingBus::new(sim, 2);
        assert_eq!(bus.read_register(0x10), Ok(0xAB));
        assert_eq!(bus.inner().read_count(), 3);
    }

    #[test]
    fn retry_gives_up_after_budget() {
        let mut sim = SimulatedBus::new();
        sim.fail_reads(0x10, 5);

        let mut bus = RetryingBus::new(sim, 1);
        assert_eq!(bus.read_register(0x10), Err(BusFault::Nack));
        assert_eq!(bus.inner().read_count(), 2);
    }

    #[test]
    fn zero_retries_fails_immediately() {
        let mut sim = SimulatedBus::new();
        sim.fail_writes(0x04, 1);

        let mut bus = RetryingBus::new(sim, 0);
        assert!(bus.write_register(0x04, 0x80).is_err());
        assert!(bus.inner().writes().is_empty());
    }
}
