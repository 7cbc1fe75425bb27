use dotmatrix_core::{Core, CoreConfig};

/// Build a 32KB no-mapper ROM whose entry point jumps to the given program
/// at 0x0150.
pub fn build_rom(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0x00; 0x8000];
    // NOP; JP 0x0150
    rom[0x100..0x104].copy_from_slice(&[0x00, 0xC3, 0x50, 0x01]);
    rom[0x150..0x150 + program.len()].copy_from_slice(program);
    rom
}

pub fn new_core(program: &[u8]) -> Core {
    Core::new(build_rom(program), None, CoreConfig::default())
        .expect("synthesized test ROM should be valid")
}

/// Writes an incrementing pattern over 0x8000-0x80FF (tile data), then spins.
pub const VRAM_FILL_PROGRAM: &[u8] = &[
    0x21, 0x00, 0x80, // LD HL, 0x8000
    0xAF, // XOR A
    0x22, // LD (HL+), A
    0x3C, // INC A
    0x20, 0xFC, // JR NZ, -4
    0x18, 0xFE, // JR -2
];

/// Does nothing forever.
pub const IDLE_PROGRAM: &[u8] = &[0x18, 0xFE];
