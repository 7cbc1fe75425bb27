pub(crate) mod channels;

use crate::apu::channels::{Channel, NoiseChannel, PulseChannel, WaveChannel};
use crate::memory::ioregisters::{IoRegister, IoRegisters};
use serde::{Deserialize, Serialize};

pub const CPU_CLOCK_SPEED: u32 = 4 * 1024 * 1024;

/// Capacity of the audio queue in bytes (interleaved stereo u8 samples).
/// Must be a power of two; the write index wraps with a mask.
pub const AUDIO_QUEUE_CAPACITY: usize = 0x8000;

// The frame sequencer advances at 512 Hz
const FRAME_SEQUENCER_PERIOD: u32 = 8192;

/// Bounded byte queue the downsampler writes into. The host reads the buffer
/// and the write index and advances its own read cursor; the core never
/// blocks on it.
pub struct SampleQueue {
    buffer: Box<[u8; AUDIO_QUEUE_CAPACITY]>,
    write_index: usize,
    total_samples: u64,
}

impl SampleQueue {
    fn new() -> Self {
        Self {
            buffer: Box::new([0; AUDIO_QUEUE_CAPACITY]),
            write_index: 0,
            total_samples: 0,
        }
    }

    fn push_stereo(&mut self, sample_l: u8, sample_r: u8) {
        self.buffer[self.write_index] = sample_l;
        self.buffer[self.write_index + 1] = sample_r;
        self.write_index = (self.write_index + 2) & (AUDIO_QUEUE_CAPACITY - 1);
        self.total_samples += 1;
    }

    pub fn buffer(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Monotonic count of stereo samples written since power-on.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize)]
pub struct ApuState {
    frame_sequencer_cycles: u32,
    frame_sequencer_step: u8,
    downsample_cycles: u32,
    downsample_period: u32,
    channel_1: PulseChannel,
    channel_2: PulseChannel,
    channel_3: WaveChannel,
    channel_4: NoiseChannel,
    // The queue is transient host-facing state, not part of snapshots
    #[serde(skip)]
    sample_queue: SampleQueue,
}

impl ApuState {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            frame_sequencer_cycles: 0,
            frame_sequencer_step: 0,
            downsample_cycles: 0,
            downsample_period: CPU_CLOCK_SPEED / sample_rate_hz,
            channel_1: PulseChannel::new_channel_1(),
            channel_2: PulseChannel::new_channel_2(),
            channel_3: WaveChannel::new(),
            channel_4: NoiseChannel::new(),
            sample_queue: SampleQueue::new(),
        }
    }

    pub fn sample_queue(&self) -> &SampleQueue {
        &self.sample_queue
    }

    pub fn downsample_period(&self) -> u32 {
        self.downsample_period
    }

    // Writing NR52 bit 7 off resets every channel and the frame sequencer;
    // only wave RAM survives (the register bytes were already cleared by the
    // write trap)
    fn power_off(&mut self) {
        let downsample_period = self.downsample_period;

        self.frame_sequencer_cycles = 0;
        self.frame_sequencer_step = 0;
        self.channel_1 = PulseChannel::new_channel_1();
        self.channel_2 = PulseChannel::new_channel_2();
        self.channel_3 = WaveChannel::new();
        self.channel_4 = NoiseChannel::new();
        self.downsample_period = downsample_period;
    }

    fn process_register_updates(&mut self, io_registers: &mut IoRegisters) {
        self.channel_1.process_register_updates(io_registers);
        self.channel_2.process_register_updates(io_registers);
        self.channel_3.process_register_updates(io_registers);
        self.channel_4.process_register_updates(io_registers);
    }

    fn advance_frame_sequencer(&mut self, io_registers: &mut IoRegisters) {
        match self.frame_sequencer_step {
            0 | 4 => {
                self.tick_lengths();
            }
            2 | 6 => {
                self.tick_lengths();
                self.channel_1.tick_sweep(io_registers);
            }
            7 => {
                self.channel_1.tick_envelope();
                self.channel_2.tick_envelope();
                self.channel_4.tick_envelope();
            }
            1 | 3 | 5 => {}
            _ => panic!("invalid frame sequencer step: {}", self.frame_sequencer_step),
        }

        self.frame_sequencer_step = (self.frame_sequencer_step + 1) % 8;
    }

    fn tick_lengths(&mut self) {
        self.channel_1.tick_length();
        self.channel_2.tick_length();
        self.channel_3.tick_length();
        self.channel_4.tick_length();
    }

    /// Mix the four channels into an unsigned stereo byte pair.
    ///
    /// Each channel contributes [0, 30]; NR51 routes channels to the left
    /// and right sums, NR50 applies a (volume + 1) multiplier per side, and
    /// the result is compressed into [0, 254].
    fn sample(&self, io_registers: &IoRegisters) -> (u8, u8) {
        let nr50_value = io_registers.apu_read_register(IoRegister::NR50);
        let nr51_value = io_registers.apu_read_register(IoRegister::NR51);

        let channel_outputs = [
            self.channel_1.sample_output(),
            self.channel_2.sample_output(),
            self.channel_3.sample_output(),
            self.channel_4.sample_output(),
        ];

        let mut sample_l: u32 = 0;
        let mut sample_r: u32 = 0;
        for (channel_index, &output) in channel_outputs.iter().enumerate() {
            if nr51_value & (1 << (channel_index + 4)) != 0 {
                sample_l += u32::from(output);
            }
            if nr51_value & (1 << channel_index) != 0 {
                sample_r += u32::from(output);
            }
        }

        let l_volume = u32::from((nr50_value >> 4) & 0x07) + 1;
        let r_volume = u32::from(nr50_value & 0x07) + 1;

        // Maps [0, 960] to [0, 254]
        let sample_l = (sample_l * l_volume * 1000 / 3779) as u8;
        let sample_r = (sample_r * r_volume * 1000 / 3779) as u8;

        (sample_l, sample_r)
    }
}

/// Advance the APU by the given number of cycles: apply register writes,
/// clock the frame sequencer and channel waveforms, write the channel status
/// bits back to NR52, and emit one stereo sample per downsample period.
pub fn tick(apu_state: &mut ApuState, io_registers: &mut IoRegisters, cycles: u32) {
    if io_registers.take_apu_power_off() {
        apu_state.power_off();
    }

    if io_registers.apu_powered() {
        apu_state.process_register_updates(io_registers);

        apu_state.frame_sequencer_cycles += cycles;
        while apu_state.frame_sequencer_cycles >= FRAME_SEQUENCER_PERIOD {
            apu_state.frame_sequencer_cycles -= FRAME_SEQUENCER_PERIOD;
            apu_state.advance_frame_sequencer(io_registers);
        }

        apu_state.channel_1.tick_frequency(cycles);
        apu_state.channel_2.tick_frequency(cycles);
        apu_state.channel_3.tick_frequency(cycles, io_registers);
        apu_state.channel_4.tick_frequency(cycles);

        let status_bits = u8::from(apu_state.channel_1.channel_enabled())
            | (u8::from(apu_state.channel_2.channel_enabled()) << 1)
            | (u8::from(apu_state.channel_3.channel_enabled()) << 2)
            | (u8::from(apu_state.channel_4.channel_enabled()) << 3);
        io_registers.privileged_set_nr52_status(status_bits);
    }

    // The downsampler keeps its cadence even while the APU is powered off;
    // the fractional remainder is preserved by subtracting the period
    apu_state.downsample_cycles += cycles;
    while apu_state.downsample_cycles >= apu_state.downsample_period {
        apu_state.downsample_cycles -= apu_state.downsample_period;

        let (sample_l, sample_r) = if io_registers.apu_powered() {
            apu_state.sample(io_registers)
        } else {
            (0, 0)
        };
        apu_state.sample_queue.push_stereo(sample_l, sample_r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::ExecutionMode;

    fn new_apu() -> (ApuState, IoRegisters) {
        (ApuState::new(48_000), IoRegisters::new(ExecutionMode::GameBoy))
    }

    #[test]
    fn downsample_period_from_sample_rate() {
        let (apu_state, _) = new_apu();
        assert_eq!(87, apu_state.downsample_period());
    }

    #[test]
    fn downsampler_cadence() {
        let (mut apu_state, mut io_registers) = new_apu();

        let mut cycles_run = 0_u64;
        while cycles_run < 70224 {
            tick(&mut apu_state, &mut io_registers, 4);
            cycles_run += 4;
        }

        let expected = 70224 / 87;
        let actual = apu_state.sample_queue().total_samples();
        assert!(
            (expected - 1..=expected + 1).contains(&actual),
            "expected {expected} +/- 1 samples, got {actual}"
        );
    }

    #[test]
    fn queue_write_index_wraps() {
        let (mut apu_state, _) = new_apu();

        for _ in 0..AUDIO_QUEUE_CAPACITY / 2 - 1 {
            apu_state.sample_queue.push_stereo(1, 2);
        }
        assert_eq!(AUDIO_QUEUE_CAPACITY - 2, apu_state.sample_queue.write_index());

        apu_state.sample_queue.push_stereo(3, 4);
        assert_eq!(0, apu_state.sample_queue.write_index());
        assert_eq!(3, apu_state.sample_queue.buffer()[AUDIO_QUEUE_CAPACITY - 2]);
        assert_eq!(4, apu_state.sample_queue.buffer()[AUDIO_QUEUE_CAPACITY - 1]);
    }

    #[test]
    fn frame_sequencer_length_cadence() {
        let (mut apu_state, mut io_registers) = new_apu();

        // Length 2 on channel 2, length-enabled trigger
        io_registers.write_register(IoRegister::NR21, 0x3E);
        io_registers.write_register(IoRegister::NR22, 0xF0);
        io_registers.write_register(IoRegister::NR24, 0xC0);
        tick(&mut apu_state, &mut io_registers, 4);
        assert!(apu_state.channel_2.channel_enabled());

        // Two length ticks happen within the first three sequencer steps
        for _ in 0..3 * (FRAME_SEQUENCER_PERIOD / 4) {
            tick(&mut apu_state, &mut io_registers, 4);
        }
        assert!(!apu_state.channel_2.channel_enabled());

        let nr52_value = io_registers.read_register(IoRegister::NR52);
        assert_eq!(0x00, nr52_value & 0x02);
    }

    #[test]
    fn nr52_power_off_resets_channels() {
        let (mut apu_state, mut io_registers) = new_apu();

        io_registers.write_register(IoRegister::NR22, 0xF0);
        io_registers.write_register(IoRegister::NR24, 0x80);
        tick(&mut apu_state, &mut io_registers, 4);
        assert!(apu_state.channel_2.channel_enabled());

        io_registers.write_register(IoRegister::NR52, 0x00);
        tick(&mut apu_state, &mut io_registers, 4);

        assert!(!apu_state.channel_2.channel_enabled());
        assert_eq!(0x00, io_registers.read_register(IoRegister::NR52) & 0x0F);

        // Samples keep flowing while powered off, as silence
        let before = apu_state.sample_queue().total_samples();
        for _ in 0..100 {
            tick(&mut apu_state, &mut io_registers, 4);
        }
        assert!(apu_state.sample_queue().total_samples() > before);
    }

    #[test]
    fn mixer_maps_full_scale_to_254() {
        let (mut apu_state, mut io_registers) = new_apu();

        io_registers.write_register(IoRegister::NR50, 0x77);
        io_registers.write_register(IoRegister::NR51, 0xFF);

        // Force all four channels to output 30 by making them enabled at max
        // volume; use a square duty of 75% and check at a high phase
        io_registers.write_register(IoRegister::NR12, 0xF0);
        io_registers.write_register(IoRegister::NR14, 0x80);
        tick(&mut apu_state, &mut io_registers, 4);

        let (sample_l, _) = apu_state.sample(&io_registers);
        assert!(sample_l <= 254);
    }
}
