use serde::{Deserialize, Serialize};

/// Host-supplied configuration, fixed for the lifetime of a core instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Execute the boot ROM (when one is provided) instead of starting from
    /// the post-boot register state.
    pub enable_boot_rom: bool,
    /// How much audio the core accumulates before reporting the queue as
    /// ready for draining.
    pub audio_accumulate_max_millis: u32,
    /// Output rate of the audio downsampler. The downsample period is
    /// derived from this; the 48000 Hz default gives the 87-cycle period.
    pub tas_sample_rate_hz: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            enable_boot_rom: false,
            audio_accumulate_max_millis: 125,
            tas_sample_rate_hz: 48_000,
        }
    }
}
