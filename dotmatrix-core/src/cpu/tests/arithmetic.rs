use super::{hash_map, run_test, set_in_state, ExpectedState, ALL_REGISTERS};
use crate::cpu::registers::CpuRegister;

#[test]
fn add_immediate() {
    run_test(
        // LD A, 0x05; ADD 0x03
        "3E05C603",
        &ExpectedState {
            a: Some(0x08),
            f: Some(0x00),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn add_half_carry() {
    run_test(
        // LD A, 0x0F; ADD 0x01
        "3E0FC601",
        &ExpectedState {
            a: Some(0x10),
            f: Some(0x20),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn add_carry_and_zero() {
    run_test(
        // LD A, 0xFF; ADD 0x01
        "3EFFC601",
        &ExpectedState {
            a: Some(0x00),
            f: Some(0xB0),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn add_registers() {
    for register in ALL_REGISTERS {
        let load_opcode = super::load_opcode(register);
        let add_opcode = 0x80
            | match register {
                CpuRegister::B => 0x00,
                CpuRegister::C => 0x01,
                CpuRegister::D => 0x02,
                CpuRegister::E => 0x03,
                CpuRegister::H => 0x04,
                CpuRegister::L => 0x05,
                CpuRegister::A => 0x07,
            };

        let (program, expected_a) = if register == CpuRegister::A {
            // LD A, 0x05; ADD A
            (format!("{load_opcode:02X}05{add_opcode:02X}"), 0x0A)
        } else {
            // LD r, 0x05; LD A, 0x03; ADD r
            (format!("{load_opcode:02X}053E03{add_opcode:02X}"), 0x08)
        };

        let mut expected_state = ExpectedState {
            a: Some(expected_a),
            f: Some(0x00),
            ..ExpectedState::empty()
        };
        if register != CpuRegister::A {
            set_in_state(&mut expected_state, register, 0x05);
        }

        run_test(&program, &expected_state);
    }
}

#[test]
fn add_hl_indirect() {
    run_test(
        // LD HL, 0xC123; LD (HL), 0x07; LD A, 0x01; ADD (HL)
        "2123C136073E0186",
        &ExpectedState {
            a: Some(0x08),
            f: Some(0x00),
            h: Some(0xC1),
            l: Some(0x23),
            memory: hash_map!(0xC123: 0x07),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn adc_uses_carry() {
    run_test(
        // LD A, 0x01; SCF; ADC 0x01
        "3E0137CE01",
        &ExpectedState {
            a: Some(0x03),
            f: Some(0x00),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn sub_with_borrow() {
    run_test(
        // LD A, 0x05; SUB 0x06
        "3E05D606",
        &ExpectedState {
            a: Some(0xFF),
            f: Some(0x70),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn sbc_uses_carry() {
    run_test(
        // LD A, 0x10; SCF; SBC 0x01
        "3E1037DE01",
        &ExpectedState {
            a: Some(0x0E),
            f: Some(0x60),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn compare_equal_sets_zero() {
    run_test(
        // LD A, 0x42; CP 0x42
        "3E42FE42",
        &ExpectedState {
            a: Some(0x42),
            f: Some(0xC0),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn increment_wraps_and_preserves_carry() {
    // The carry flag is set in the post-boot F value and INC must not
    // touch it
    run_test(
        // LD A, 0xFF; INC A
        "3EFF3C",
        &ExpectedState {
            a: Some(0x00),
            f: Some(0xB0),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn decrement_to_zero() {
    run_test(
        // LD B, 0x01; DEC B
        "060105",
        &ExpectedState {
            b: Some(0x00),
            f: Some(0xD0),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn increment_decrement_hl_indirect() {
    run_test(
        // LD HL, 0xC080; LD (HL), 0x41; INC (HL); INC (HL); DEC (HL)
        "2180C03641343435",
        &ExpectedState {
            memory: hash_map!(0xC080: 0x42),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn add_hl_sixteen_bit_half_carry() {
    run_test(
        // LD HL, 0x0FFF; LD BC, 0x0001; ADD HL, BC
        "21FF0F01010009",
        &ExpectedState {
            h: Some(0x10),
            l: Some(0x00),
            b: Some(0x00),
            c: Some(0x01),
            f: Some(0xA0),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn increment_register_pair_no_flags() {
    run_test(
        // LD DE, 0x00FF; INC DE
        "11FF0013",
        &ExpectedState {
            d: Some(0x01),
            e: Some(0x00),
            f: Some(0xB0),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn add_sp_immediate() {
    run_test(
        // LD SP, 0xFFF8; ADD SP, 0x08
        "31F8FFE808",
        &ExpectedState {
            sp: Some(0x0000),
            f: Some(0x30),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn add_sp_negative_offset() {
    // The flags come from the low-byte add with the raw offset byte (0xF0),
    // so neither carry is set here
    run_test(
        // LD SP, 0xC005; ADD SP, -0x10
        "3105C0E8F0",
        &ExpectedState {
            sp: Some(0xBFF5),
            f: Some(0x00),
            ..ExpectedState::empty()
        },
    );

    run_test(
        // LD SP, 0xD001; ADD SP, -0x01
        "3101D0E8FF",
        &ExpectedState {
            sp: Some(0xD000),
            f: Some(0x30),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn daa_after_addition() {
    run_test(
        // LD A, 0x45; ADD 0x38; DAA
        "3E45C63827",
        &ExpectedState {
            a: Some(0x83),
            f: Some(0x00),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn daa_after_subtraction() {
    run_test(
        // LD A, 0x42; SUB 0x13; DAA
        "3E42D61327",
        &ExpectedState {
            a: Some(0x29),
            f: Some(0x40),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn daa_carry_out() {
    run_test(
        // LD A, 0x99; ADD 0x99; DAA
        "3E99C69927",
        &ExpectedState {
            a: Some(0x98),
            f: Some(0x10),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn complement_accumulator() {
    run_test(
        // LD A, 0x35; CPL
        "3E352F",
        &ExpectedState {
            a: Some(0xCA),
            f: Some(0xF0),
            ..ExpectedState::empty()
        },
    );
}
