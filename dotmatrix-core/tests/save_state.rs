mod common;

use common::{new_core, VRAM_FILL_PROGRAM};
use dotmatrix_core::{SaveStateError, CYCLES_PER_FRAME};

#[test]
fn restored_state_replays_identically() {
    let mut core = new_core(VRAM_FILL_PROGRAM);

    for _ in 0..5 {
        core.step(CYCLES_PER_FRAME);
    }
    let checkpoint = core.save_state();

    for _ in 0..5 {
        core.step(CYCLES_PER_FRAME);
    }
    let straight_line = core.save_state();

    core.load_state(&checkpoint).unwrap();
    for _ in 0..5 {
        core.step(CYCLES_PER_FRAME);
    }
    let replayed = core.save_state();

    assert!(straight_line == replayed);
}

#[test]
fn restored_core_continues_stepping() {
    let mut core = new_core(VRAM_FILL_PROGRAM);

    core.step(CYCLES_PER_FRAME);
    let snapshot = core.save_state();

    core.load_state(&snapshot).unwrap();
    let outcome = core.step(CYCLES_PER_FRAME);
    assert!(outcome.frame_ready);
    assert!(!outcome.crashed);
}

#[test]
fn bad_magic_is_rejected_and_state_untouched() {
    let mut core = new_core(VRAM_FILL_PROGRAM);
    core.step(CYCLES_PER_FRAME);

    let before = core.save_state();

    let mut corrupted = before.clone();
    corrupted[0] = b'X';
    assert!(matches!(core.load_state(&corrupted), Err(SaveStateError::BadMagic)));

    assert!(before == core.save_state());
}

#[test]
fn unknown_version_is_rejected() {
    let mut core = new_core(VRAM_FILL_PROGRAM);

    let mut payload = core.save_state();
    payload[4..8].copy_from_slice(&0xFFFF_u32.to_le_bytes());

    assert!(matches!(
        core.load_state(&payload),
        Err(SaveStateError::UnsupportedVersion { .. })
    ));
}

#[test]
fn truncated_payload_is_rejected_and_state_untouched() {
    let mut core = new_core(VRAM_FILL_PROGRAM);
    core.step(CYCLES_PER_FRAME);

    let before = core.save_state();

    let truncated = &before[..before.len() / 2];
    assert!(core.load_state(truncated).is_err());

    assert!(before == core.save_state());
}
