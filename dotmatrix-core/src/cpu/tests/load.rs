use super::{hash_map, run_test, set_in_state, ExpectedState, ALL_REGISTERS};

#[test]
fn load_register_immediate() {
    for register in ALL_REGISTERS {
        let load_opcode = super::load_opcode(register);
        let program = format!("{load_opcode:02X}C4");

        let mut expected_state = ExpectedState::empty();
        set_in_state(&mut expected_state, register, 0xC4);

        run_test(&program, &expected_state);
    }
}

#[test]
fn load_register_register() {
    run_test(
        // LD B, 0x42; LD C, B
        "064248",
        &ExpectedState {
            b: Some(0x42),
            c: Some(0x42),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn load_hl_indirect() {
    run_test(
        // LD HL, 0xC234; LD (HL), 0x77; LD A, (HL)
        "2134C236777E",
        &ExpectedState {
            a: Some(0x77),
            memory: hash_map!(0xC234: 0x77),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn load_hl_increment_and_decrement() {
    run_test(
        // LD HL, 0xC000; LD A, 0x11; LD (HL+), A; LD (HL-), A
        "2100C03E112232",
        &ExpectedState {
            h: Some(0xC0),
            l: Some(0x00),
            memory: hash_map!(0xC000: 0x11, 0xC001: 0x11),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn load_bc_de_indirect() {
    run_test(
        // LD BC, 0xC050; LD A, 0x3D; LD (BC), A; LD DE, 0xC050; LD A, 0x00; LD A, (DE)
        "0150C03E3D021150C03E001A",
        &ExpectedState {
            a: Some(0x3D),
            memory: hash_map!(0xC050: 0x3D),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn load_high_page_direct() {
    run_test(
        // LD A, 0x5A; LDH (0x80), A; LD A, 0x00; LDH A, (0x80)
        "3E5AE0803E00F080",
        &ExpectedState {
            a: Some(0x5A),
            memory: hash_map!(0xFF80: 0x5A),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn load_high_page_indirect_c() {
    run_test(
        // LD C, 0x81; LD A, 0x66; LD (FF00+C), A
        "0E813E66E2",
        &ExpectedState {
            memory: hash_map!(0xFF81: 0x66),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn load_direct_address() {
    run_test(
        // LD A, 0x9A; LD (0xC456), A; LD A, 0x00; LD A, (0xC456)
        "3E9AEA56C43E00FA56C4",
        &ExpectedState {
            a: Some(0x9A),
            memory: hash_map!(0xC456: 0x9A),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn load_register_pair_immediate() {
    run_test(
        // LD BC, 0x1234; LD DE, 0x5678; LD HL, 0x9ABC; LD SP, 0xDEF0
        "01341211785621BC9A31F0DE",
        &ExpectedState {
            b: Some(0x12),
            c: Some(0x34),
            d: Some(0x56),
            e: Some(0x78),
            h: Some(0x9A),
            l: Some(0xBC),
            sp: Some(0xDEF0),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn load_direct_stack_pointer() {
    run_test(
        // LD SP, 0xBEEF; LD (0xC000), SP
        "31EFBE0800C0",
        &ExpectedState {
            sp: Some(0xBEEF),
            memory: hash_map!(0xC000: 0xEF, 0xC001: 0xBE),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn push_and_pop() {
    run_test(
        // LD BC, 0x1234; PUSH BC; POP DE
        "013412C5D1",
        &ExpectedState {
            b: Some(0x12),
            c: Some(0x34),
            d: Some(0x12),
            e: Some(0x34),
            sp: Some(0xFFFE),
            memory: hash_map!(0xFFFC: 0x34, 0xFFFD: 0x12),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn pop_af_masks_low_flag_bits() {
    run_test(
        // LD BC, 0x12FF; PUSH BC; POP AF
        "01FF12C5F1",
        &ExpectedState {
            a: Some(0x12),
            f: Some(0xF0),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn load_stack_pointer_hl() {
    run_test(
        // LD HL, 0xC123; LD SP, HL
        "2123C1F9",
        &ExpectedState {
            sp: Some(0xC123),
            ..ExpectedState::empty()
        },
    );
}

#[test]
fn load_hl_stack_pointer_offset() {
    run_test(
        // LD SP, 0xC000; LD HL, SP+0x05
        "3100C0F805",
        &ExpectedState {
            h: Some(0xC0),
            l: Some(0x05),
            f: Some(0x00),
            ..ExpectedState::empty()
        },
    );
}
