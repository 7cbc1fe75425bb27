use crate::cpu::InterruptType;
use crate::memory::ioregisters::{IoRegister, IoRegisters};
use serde::{Deserialize, Serialize};

// Bit assignments of the host-facing button latch (1 = pressed)
const UP: u8 = 1 << 0;
const RIGHT: u8 = 1 << 1;
const LEFT: u8 = 1 << 2;
const DOWN: u8 = 1 << 3;
const A: u8 = 1 << 4;
const B: u8 = 1 << 5;
const SELECT: u8 = 1 << 6;
const START: u8 = 1 << 7;

/// The eight-button latch written by the host. The host may overwrite it at
/// any time with a single store; the CPU re-samples it through the JOYP trap
/// every step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoypadState {
    buttons: u8,
}

impl JoypadState {
    pub fn new() -> Self {
        Self { buttons: 0 }
    }

    pub fn set_byte(&mut self, byte: u8) {
        self.buttons = byte;
    }

    fn pressed(self, button: u8) -> bool {
        self.buttons & button != 0
    }
}

/// Recompute the low nibble of JOYP from the button latch and the currently
/// selected matrix lines (0 = pressed), raising the Joypad interrupt on any
/// high -> low transition.
pub fn update_joyp_register(joypad_state: JoypadState, io_registers: &mut IoRegisters) {
    let joyp = io_registers.read_register(IoRegister::JOYP);
    let actions_select = joyp & 0x20 == 0;
    let directions_select = joyp & 0x10 == 0;

    let bit_3 = !((actions_select && joypad_state.pressed(START))
        || (directions_select && joypad_state.pressed(DOWN)));
    let bit_2 = !((actions_select && joypad_state.pressed(SELECT))
        || (directions_select && joypad_state.pressed(UP)));
    let bit_1 = !((actions_select && joypad_state.pressed(B))
        || (directions_select && joypad_state.pressed(LEFT)));
    let bit_0 = !((actions_select && joypad_state.pressed(A))
        || (directions_select && joypad_state.pressed(RIGHT)));

    let new_joyp = (joyp & 0x30)
        | (u8::from(bit_3) << 3)
        | (u8::from(bit_2) << 2)
        | (u8::from(bit_1) << 1)
        | u8::from(bit_0);
    io_registers.privileged_set_joyp(new_joyp);

    if should_flag_interrupt(joyp, new_joyp) {
        io_registers.interrupt_flags().set(InterruptType::Joypad);
    }
}

fn should_flag_interrupt(old_joyp: u8, new_joyp: u8) -> bool {
    old_joyp & !new_joyp & 0x0F != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::ExecutionMode;

    #[test]
    fn selected_lines_reach_low_nibble() {
        let mut io_registers = IoRegisters::new(ExecutionMode::GameBoy);
        let mut joypad_state = JoypadState::new();

        joypad_state.set_byte(UP | A);

        // Directions selected
        io_registers.write_register(IoRegister::JOYP, 0x20);
        update_joyp_register(joypad_state, &mut io_registers);
        assert_eq!(0x0B, io_registers.read_register(IoRegister::JOYP) & 0x0F);

        // Actions selected
        io_registers.write_register(IoRegister::JOYP, 0x10);
        update_joyp_register(joypad_state, &mut io_registers);
        assert_eq!(0x0E, io_registers.read_register(IoRegister::JOYP) & 0x0F);

        // Neither selected: all lines high
        io_registers.write_register(IoRegister::JOYP, 0x30);
        update_joyp_register(joypad_state, &mut io_registers);
        assert_eq!(0x0F, io_registers.read_register(IoRegister::JOYP) & 0x0F);
    }

    #[test]
    fn press_raises_interrupt() {
        let mut io_registers = IoRegisters::new(ExecutionMode::GameBoy);
        let mut joypad_state = JoypadState::new();

        io_registers.write_register(IoRegister::JOYP, 0x10);
        update_joyp_register(joypad_state, &mut io_registers);
        assert!(!io_registers.interrupt_flags().get(InterruptType::Joypad));

        joypad_state.set_byte(START);
        update_joyp_register(joypad_state, &mut io_registers);
        assert!(io_registers.interrupt_flags().get(InterruptType::Joypad));

        // Releasing does not raise another interrupt
        io_registers.interrupt_flags().clear(InterruptType::Joypad);
        joypad_state.set_byte(0);
        update_joyp_register(joypad_state, &mut io_registers);
        assert!(!io_registers.interrupt_flags().get(InterruptType::Joypad));
    }
}
