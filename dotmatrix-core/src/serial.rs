use crate::cpu::InterruptType;
use crate::memory::ioregisters::{IoRegister, IoRegisters};
use serde::{Deserialize, Serialize};

// 8 bits at 8192 Hz with the internal clock
const TRANSFER_CYCLES: u32 = 4096;

/// Link port stub. There is never a peer on the other end of the cable, so
/// an internally-clocked transfer shifts in all 1s; externally-clocked
/// transfers never complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPort {
    transfer_cycles_remaining: Option<u32>,
}

impl SerialPort {
    pub fn new() -> Self {
        Self { transfer_cycles_remaining: None }
    }

    pub fn tick(&mut self, cycles: u32, io_registers: &mut IoRegisters) {
        let sc = io_registers.apu_read_register(IoRegister::SC);
        if sc & 0x81 != 0x81 {
            self.transfer_cycles_remaining = None;
            return;
        }

        let remaining = self.transfer_cycles_remaining.unwrap_or(TRANSFER_CYCLES);
        match remaining.checked_sub(cycles) {
            Some(remaining) if remaining > 0 => {
                self.transfer_cycles_remaining = Some(remaining);
            }
            _ => {
                self.transfer_cycles_remaining = None;
                io_registers.privileged_set_sb(0xFF);
                io_registers.privileged_set_sc(sc & 0x7F);
                io_registers.interrupt_flags().set(InterruptType::Serial);
            }
        }
    }
}

impl Default for SerialPort {
    fn default() -> Self {
        Self::new()
    }
}
