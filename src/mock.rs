//! In-memory collaborators for running the sensor core without hardware.

use std::collections::HashMap;

use crate::regs::{CHIP_ID, CHIP_ID_VALUE};
use crate::traits::{PowerControl, Reg, RegOp, RegWidth, RegisterBus, Result, SensorError};

/// Simulated register bus with a byte-addressed register file.
///
/// Multi-byte registers are stored big endian across consecutive addresses,
/// so overlapping 8-bit and 16-bit views of the same address agree. Every
/// successful write is logged in issue order.
#[derive(Debug, Clone)]
pub struct SimulatedBus {
    memory: HashMap<u16, u8>,
    writes: Vec<RegOp>,
    failing_addr: Option<u16>,
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBus {
    /// Create a bus whose identification register reads the expected chip id.
    #[must_use]
    pub fn new() -> Self {
        let mut bus = Self {
            memory: HashMap::new(),
            writes: Vec::new(),
            failing_addr: None,
        };
        bus.store(CHIP_ID, CHIP_ID_VALUE);
        bus
    }

    /// Preload the identification register with `id`.
    #[must_use]
    pub fn with_chip_id(mut self, id: u32) -> Self {
        self.store(CHIP_ID, id);
        self
    }

    /// Make every write touching `addr` fail until cleared.
    pub fn fail_writes_to(&mut self, addr: u16) {
        self.failing_addr = Some(addr);
    }

    /// Stop injecting write failures.
    pub fn clear_failure(&mut self) {
        self.failing_addr = None;
    }

    /// Writes issued so far, oldest first.
    pub fn writes(&self) -> &[RegOp] {
        &self.writes
    }

    /// Forget the write log, keeping register contents.
    pub fn clear_log(&mut self) {
        self.writes.clear();
    }

    /// Index in the write log of the first write of `value` to `reg`.
    pub fn position(&self, reg: Reg, value: u32) -> Option<usize> {
        self.writes
            .iter()
            .position(|op| *op == RegOp::write(reg, value))
    }

    /// Index in the write log of the last write to `reg`.
    pub fn last_position(&self, reg: Reg) -> Option<usize> {
        self.writes.iter().rposition(|op| op.reg() == reg)
    }

    /// Current register contents.
    pub fn value(&self, reg: Reg) -> u32 {
        span(reg).fold(0, |acc, addr| {
            (acc << 8) | u32::from(self.memory.get(&addr).copied().unwrap_or(0))
        })
    }

    fn store(&mut self, reg: Reg, value: u32) {
        let bytes = value.to_be_bytes();
        let len = span(reg).len();
        let tail = bytes.iter().skip(bytes.len() - len);
        for (addr, byte) in span(reg).zip(tail) {
            self.memory.insert(addr, *byte);
        }
    }
}

fn span(reg: Reg) -> std::ops::Range<u16> {
    let len = match reg.width {
        RegWidth::Bits8 => 1,
        RegWidth::Bits16 => 2,
        RegWidth::Bits24 => 3,
    };
    reg.addr..reg.addr.saturating_add(len)
}

impl RegisterBus for SimulatedBus {
    fn write(&mut self, reg: Reg, value: u32) -> Result<()> {
        if self
            .failing_addr
            .is_some_and(|addr| span(reg).contains(&addr))
        {
            return Err(SensorError::Bus {
                reg,
                reason: "injected failure".to_owned(),
            });
        }

        let value = value & reg.width.mask();
        self.store(reg, value);
        self.writes.push(RegOp::write(reg, value));
        Ok(())
    }

    fn read(&mut self, reg: Reg) -> Result<u32> {
        Ok(self.value(reg))
    }
}

/// Power collaborator that counts transitions.
#[derive(Debug, Clone, Default)]
pub struct MockPower {
    on_count: u32,
    off_count: u32,
    fail_power_on: bool,
}

impl MockPower {
    /// Create a mock that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every power-on attempt fail.
    #[must_use]
    pub const fn failing_power_on(mut self) -> Self {
        self.fail_power_on = true;
        self
    }

    /// Successful power-on transitions.
    pub const fn power_on_count(&self) -> u32 {
        self.on_count
    }

    /// Power-off transitions.
    pub const fn power_off_count(&self) -> u32 {
        self.off_count
    }
}

impl PowerControl for MockPower {
    fn power_on(&mut self) -> Result<()> {
        if self.fail_power_on {
            return Err(SensorError::Power("regulator enable failed".to_owned()));
        }
        self.on_count += 1;
        Ok(())
    }

    fn power_off(&mut self) -> Result<()> {
        self.off_count += 1;
        Ok(())
    }
}
