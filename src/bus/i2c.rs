use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use super::{BusFault, RegisterBus};

/// Adapts any `embedded-hal` I2C controller to [`RegisterBus`].
///
/// Reads are a write of the register address followed by a repeated-start
/// read of one byte; writes send `[register, value]` in one transaction.
pub struct I2cRegisterBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> I2cRegisterBus<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Give the controller back (e.g. to share it with another driver).
    pub fn release(self) -> I2C {
        self.i2c
    }
}

fn fault_from(kind: ErrorKind) -> BusFault {
    match kind {
        ErrorKind::NoAcknowledge(_) => BusFault::Nack,
        other => BusFault::Transport(format!("{other:?}")),
    }
}

impl<I2C: I2c> RegisterBus for I2cRegisterBus<I2C> {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusFault> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| fault_from(e.kind()))
    }

    fn read_register(&mut self, register: u8) -> Result<u8, BusFault> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|e| fault_from(e.kind()))?;
        Ok(buf[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorType, NoAcknowledgeSource, Operation};

    /// Register file behind a fake controller; records every address used.
    struct FakeI2c {
        regs: [u8; 256],
        pointer: u8,
        addresses: Vec<u8>,
        nack: bool,
    }

    impl FakeI2c {
        fn new() -> Self {
            Self {
                regs: [0; 256],
                pointer: 0,
                addresses: Vec::new(),
                nack: false,
            }
        }
    }

    impl ErrorType for FakeI2c {
        type Error = ErrorKind;
    }

    impl I2c for FakeI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            self.addresses.push(address);
            if self.nack {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        self.pointer = bytes[0];
                        if let Some(&value) = bytes.get(1) {
                            self.regs[self.pointer as usize] = value;
                        }
                    }
                    Operation::Read(buf) => {
                        for b in buf.iter_mut() {
                            *b = self.regs[self.pointer as usize];
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn writes_then_reads_back_through_device_address() {
        let mut bus = I2cRegisterBus::new(FakeI2c::new(), 0x49);
        bus.write_register(0x05, 0xC0).unwrap();
        assert_eq!(bus.read_register(0x05), Ok(0xC0));

        let i2c = bus.release();
        assert_eq!(i2c.addresses, vec![0x49, 0x49]);
    }

    #[test]
    fn nack_maps_to_bus_fault() {
        let mut fake = FakeI2c::new();
        fake.nack = true;
        let mut bus = I2cRegisterBus::new(fake, 0x49);
        assert_eq!(bus.read_register(0x08), Err(BusFault::Nack));
    }

    #[test]
    fn other_errors_are_transport_faults() {
        assert!(matches!(fault_from(ErrorKind::Bus), BusFault::Transport(_)));
        assert!(matches!(
            fault_from(ErrorKind::ArbitrationLoss),
            BusFault::Transport(_)
        ));
    }
}
