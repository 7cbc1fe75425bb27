//! Deterministic Game Boy (DMG) and Game Boy Color (CGB) emulation core.
//!
//! The crate models the console as a single [`Core`] value driven entirely by
//! cycle budgets: given a cartridge image and a stream of joypad bytes, it
//! produces 160x144 RGB frames and a queue of stereo audio samples. Hosts own
//! all I/O — windowing, audio devices, file persistence, pacing — and drive
//! the core through [`Core::step`].

pub mod apu;
mod config;
mod core;
pub mod cpu;
mod joypad;
pub mod memory;
pub mod ppu;
mod serial;
mod serialize;
mod timer;

pub use crate::core::{Core, StepOutcome, CYCLES_PER_FRAME};
pub use config::CoreConfig;
pub use cpu::ExecutionMode;
pub use memory::CartridgeLoadError;
pub use ppu::{FRAME_BUFFER_LEN, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use serialize::SaveStateError;
