pub(crate) mod instructions;
mod registers;

#[cfg(test)]
mod tests;

use crate::memory::ioregisters::IoRegister;
use crate::memory::AddressSpace;
use crate::ppu::PpuState;
use serde::{Deserialize, Serialize};

pub use instructions::ParseError;
pub use registers::CpuRegisters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    GameBoy,
    GameBoyColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CgbSpeedMode {
    Normal,
    Double,
}

impl CgbSpeedMode {
    pub fn toggle(self) -> Self {
        match self {
            Self::Normal => Self::Double,
            Self::Double => Self::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptType {
    VBlank,
    LcdStatus,
    Timer,
    Serial,
    Joypad,
}

impl InterruptType {
    pub fn handler_address(self) -> u16 {
        match self {
            Self::VBlank => 0x0040,
            Self::LcdStatus => 0x0048,
            Self::Timer => 0x0050,
            Self::Serial => 0x0058,
            Self::Joypad => 0x0060,
        }
    }

    pub fn bit(self) -> u8 {
        match self {
            Self::VBlank => 0x01,
            Self::LcdStatus => 0x02,
            Self::Timer => 0x04,
            Self::Serial => 0x08,
            Self::Joypad => 0x10,
        }
    }
}

pub const ISR_CYCLES_REQUIRED: u32 = 20;

// Lowest-numbered interrupts are serviced first
const INTERRUPT_PRIORITY_ORDER: [InterruptType; 5] = [
    InterruptType::VBlank,
    InterruptType::LcdStatus,
    InterruptType::Timer,
    InterruptType::Serial,
    InterruptType::Joypad,
];

fn pending_interrupts(address_space: &AddressSpace) -> u8 {
    address_space.get_ie_register()
        & address_space.get_io_registers().read_register(IoRegister::IF)
        & 0x1F
}

fn highest_priority_interrupt(address_space: &AddressSpace) -> Option<InterruptType> {
    let pending = pending_interrupts(address_space);
    INTERRUPT_PRIORITY_ORDER
        .into_iter()
        .find(|&interrupt_type| pending & interrupt_type.bit() != 0)
}

/// Whether the CPU should service an interrupt before fetching the next
/// instruction. EI arms IME for the instruction *after* EI, hence the
/// interrupt_delay check.
pub fn interrupt_triggered(cpu_registers: &CpuRegisters, address_space: &AddressSpace) -> bool {
    cpu_registers.ime && !cpu_registers.interrupt_delay && pending_interrupts(address_space) != 0
}

/// Whether any enabled interrupt is pending, ignoring IME. Used to wake the
/// CPU out of HALT.
pub fn interrupt_triggered_no_ime_check(address_space: &AddressSpace) -> bool {
    pending_interrupts(address_space) != 0
}

/// Service the highest-priority pending interrupt: clear IME and the IF bit,
/// push PC, and jump to the handler address. Costs `ISR_CYCLES_REQUIRED`.
pub fn execute_interrupt_service_routine(
    cpu_registers: &mut CpuRegisters,
    address_space: &mut AddressSpace,
    ppu_state: &PpuState,
) {
    let interrupt_type = highest_priority_interrupt(address_space)
        .expect("execute_interrupt_service_routine called with no pending interrupt");

    log::trace!("Servicing {interrupt_type:?} interrupt from PC={:04X}", cpu_registers.pc);

    cpu_registers.ime = false;
    cpu_registers.halted = false;
    address_space
        .get_io_registers_mut()
        .interrupt_flags()
        .clear(interrupt_type);

    cpu_registers.sp = cpu_registers.sp.wrapping_sub(2);
    address_space.write_address_u16(cpu_registers.sp, cpu_registers.pc, ppu_state);
    cpu_registers.pc = interrupt_type.handler_address();
}

/// Execute one CPU step: service an interrupt, execute one instruction, or
/// bill idle cycles if halted/stopped. Returns the elapsed T-states.
///
/// # Errors
///
/// Returns a `ParseError` when the opcode at PC is one of the illegal
/// opcodes that lock up the hardware.
pub fn tick_cpu(
    address_space: &mut AddressSpace,
    cpu_registers: &mut CpuRegisters,
    ppu_state: &PpuState,
) -> Result<u32, ParseError> {
    if cpu_registers.stopped {
        // STOP mode ends when a joypad interrupt is requested
        let joypad_requested = address_space
            .get_io_registers()
            .read_register(IoRegister::IF)
            & InterruptType::Joypad.bit()
            != 0;
        if joypad_requested {
            cpu_registers.stopped = false;
        } else {
            return Ok(4);
        }
    }

    if interrupt_triggered(cpu_registers, address_space) {
        execute_interrupt_service_routine(cpu_registers, address_space, ppu_state);

        return Ok(ISR_CYCLES_REQUIRED);
    }

    if cpu_registers.halted && !interrupt_triggered_no_ime_check(address_space) {
        // Keep billing cycles to the other subsystems while halted
        return Ok(4);
    }
    cpu_registers.halted = false;

    let halt_bug_triggered = cpu_registers.halt_bug_triggered;
    cpu_registers.halt_bug_triggered = false;

    let (instruction, pc) = instructions::parse_next_instruction(
        address_space,
        cpu_registers.pc,
        ppu_state,
        halt_bug_triggered,
    )?;

    log::trace!("Updating PC from {:04X} to {pc:04X}", cpu_registers.pc);
    cpu_registers.pc = pc;

    let cycles_required = instruction.cycles_required(cpu_registers);

    log::trace!("Executing instruction {instruction:04X?}, will take {cycles_required} cycles");

    instruction.execute(address_space, cpu_registers, ppu_state);

    Ok(cycles_required)
}
