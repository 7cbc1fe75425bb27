use crate::cpu::registers::CpuRegisters;
use crate::cpu::{instructions, ExecutionMode};
use crate::memory::{AddressSpace, Cartridge};
use crate::ppu::PpuState;

const PROGRAM_BASE: u16 = 0xC000;

// Parse the instruction at the start of `program_bytes` and return its cycle
// count given the flags in F.
fn cycles_for(program_bytes: &[u8], flags: u8) -> u32 {
    let cartridge = Cartridge::new_test(0x00);
    let mut address_space = AddressSpace::new(cartridge, None, ExecutionMode::GameBoy);
    let ppu_state = PpuState::new(ExecutionMode::GameBoy);

    for (i, &byte) in program_bytes.iter().enumerate() {
        address_space.write_address_u8(PROGRAM_BASE + i as u16, byte, &ppu_state);
    }

    let mut cpu_registers = CpuRegisters::new(ExecutionMode::GameBoy);
    cpu_registers.flags = flags;

    let (instruction, _) =
        instructions::parse_next_instruction(&address_space, PROGRAM_BASE, &ppu_state, false)
            .expect("test program should only contain valid opcodes");

    instruction.cycles_required(&cpu_registers)
}

#[test]
fn fixed_cycle_counts() {
    for (program, expected_cycles) in [
        (&[0x00_u8][..], 4),         // NOP
        (&[0x3E, 0x12], 8),          // LD A, n
        (&[0x7E], 8),                // LD A, (HL)
        (&[0x36, 0x12], 12),         // LD (HL), n
        (&[0x86], 8),                // ADD (HL)
        (&[0x34], 12),               // INC (HL)
        (&[0x01, 0x34, 0x12], 12),   // LD BC, nn
        (&[0xC5], 16),               // PUSH BC
        (&[0xC1], 12),               // POP BC
        (&[0xE0, 0x80], 12),         // LDH (n), A
        (&[0xF0, 0x80], 12),         // LDH A, (n)
        (&[0xEA, 0x00, 0xC0], 16),   // LD (nn), A
        (&[0x08, 0x00, 0xC0], 20),   // LD (nn), SP
        (&[0xE8, 0x05], 16),         // ADD SP, e
        (&[0xF8, 0x05], 12),         // LD HL, SP+e
        (&[0xC3, 0x00, 0x01], 16),   // JP nn
        (&[0xE9], 4),                // JP HL
        (&[0x18, 0x05], 12),         // JR e
        (&[0xCD, 0x00, 0x01], 24),   // CALL nn
        (&[0xC9], 16),               // RET
        (&[0xD9], 16),               // RETI
        (&[0xC7], 16),               // RST 00
        (&[0x09], 8),                // ADD HL, BC
        (&[0x03], 8),                // INC BC
        (&[0xF3], 4),                // DI
        (&[0xFB], 4),                // EI
        (&[0x76], 4),                // HALT
    ] {
        assert_eq!(
            expected_cycles,
            cycles_for(program, 0x00),
            "cycle count mismatch for program {program:02X?}"
        );
    }
}

#[test]
fn cb_prefixed_cycle_counts() {
    for (program, expected_cycles) in [
        (&[0xCB_u8, 0x00][..], 8), // RLC B
        (&[0xCB, 0x06], 16),       // RLC (HL)
        (&[0xCB, 0x47], 8),        // BIT 0, A
        (&[0xCB, 0x46], 12),       // BIT 0, (HL)
        (&[0xCB, 0xC6], 16),       // SET 0, (HL)
        (&[0xCB, 0x86], 16),       // RES 0, (HL)
        (&[0xCB, 0x37], 8),        // SWAP A
    ] {
        assert_eq!(
            expected_cycles,
            cycles_for(program, 0x00),
            "cycle count mismatch for program {program:02X?}"
        );
    }
}

#[test]
fn conditional_branch_cycle_counts() {
    const Z: u8 = 0x80;

    // (program, flags, expected)
    for (program, flags, expected_cycles) in [
        (&[0x28_u8, 0x05][..], Z, 12),       // JR Z taken
        (&[0x28, 0x05], 0x00, 8),            // JR Z not taken
        (&[0xCA, 0x00, 0x01], Z, 16),        // JP Z taken
        (&[0xCA, 0x00, 0x01], 0x00, 12),     // JP Z not taken
        (&[0xCC, 0x00, 0x01], Z, 24),        // CALL Z taken
        (&[0xCC, 0x00, 0x01], 0x00, 12),     // CALL Z not taken
        (&[0xC8], Z, 20),                    // RET Z taken
        (&[0xC8], 0x00, 8),                  // RET Z not taken
    ] {
        assert_eq!(
            expected_cycles,
            cycles_for(program, flags),
            "cycle count mismatch for program {program:02X?} with flags {flags:02X}"
        );
    }
}
