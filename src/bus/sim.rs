use std::collections::HashMap;

use super::{BusFault, RegisterBus};
use crate::data::model::{RawSample, CHANNELS};

/// In-memory register file standing in for the sensor.
///
/// Used by `--simulate` and by the tests. Faults can be armed per register:
/// the next `n` transactions on that register fail with [`BusFault::Nack`].
#[derive(Debug, Clone)]
pub struct SimulatedBus {
    regs: [u8; 256],
    writes: Vec<(u8, u8)>,
    read_faults: HashMap<u8, u32>,
    write_faults: HashMap<u8, u32>,
    reads: usize,
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self {
            regs: [0; 256],
            writes: Vec::new(),
            read_faults: HashMap::new(),
            write_faults: HashMap::new(),
            reads: 0,
        }
    }

    /// A bus whose data block holds `spectrum`, laid out like the device
    /// does it (low byte at `data_start + 2i`, high byte right after).
    pub fn with_spectrum(data_start: u8, spectrum: &RawSample) -> Self {
        let mut bus = Self::new();
        bus.load_spectrum(data_start, spectrum);
        bus
    }

    pub fn load_spectrum(&mut self, data_start: u8, spectrum: &RawSample) {
        for (i, &value) in spectrum.channels().iter().enumerate().take(CHANNELS) {
            let low = data_start.wrapping_add((2 * i) as u8);
            let [hi, lo] = value.to_be_bytes();
            self.regs[low as usize] = lo;
            self.regs[low.wrapping_add(1) as usize] = hi;
        }
    }

    /// Set a register without recording a write.
    pub fn poke(&mut self, register: u8, value: u8) {
        self.regs[register as usize] = value;
    }

    pub fn peek(&self, register: u8) -> u8 {
        self.regs[register as usize]
    }

    pub fn fail_reads(&mut self, register: u8, times: u32) {
        self.read_faults.insert(register, times);
    }

    pub fn fail_writes(&mut self, register: u8, times: u32) {
        self.write_faults.insert(register, times);
    }

    /// Successful writes in order.
    pub fn writes(&self) -> &[(u8, u8)] {
        &self.writes
    }

    /// Read attempts, including the failed ones.
    pub fn read_count(&self) -> usize {
        self.reads
    }
}

fn take_fault(faults: &mut HashMap<u8, u32>, register: u8) -> bool {
    match faults.get_mut(&register) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

impl RegisterBus for SimulatedBus {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusFault> {
        if take_fault(&mut self.write_faults, register) {
            return Err(BusFault::Nack);
        }
        self.regs[register as usize] = value;
        self.writes.push((register, value));
        Ok(())
    }

    fn read_register(&mut self, register: u8) -> Result<u8, BusFault> {
        self.reads += 1;
        if take_fault(&mut self.read_faults, register) {
            return Err(BusFault::Nack);
        }
        Ok(self.regs[register as usize])
    }
}
