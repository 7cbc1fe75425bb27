use crate::apu::channels::{read_frequency, Channel, Envelope, FrequencyTimer, LengthTimer};
use crate::memory::ioregisters::{IoRegister, IoRegisters};
use serde::{Deserialize, Serialize};

const DUTY_WAVEFORMS: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 1, 1, 1],
    [0, 1, 1, 1, 1, 1, 1, 0],
];

const LENGTH_MAX: u16 = 64;
const MAX_FREQUENCY: u16 = 0x07FF;

/// Channel 1's frequency sweep. Operates on a shadow copy of the frequency,
/// ticked on frame sequencer steps 2 and 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Sweep {
    period: u8,
    negate: bool,
    shift: u8,
    timer: u8,
    shadow_frequency: u16,
    enabled: bool,
}

enum SweepTickResult {
    None,
    UpdateFrequency(u16),
    DisableChannel,
}

impl Sweep {
    fn new() -> Self {
        Self {
            period: 0,
            negate: false,
            shift: 0,
            timer: 8,
            shadow_frequency: 0,
            enabled: false,
        }
    }

    fn update_from_byte(&mut self, byte: u8) {
        self.period = (byte >> 4) & 0x07;
        self.negate = byte & 0x08 != 0;
        self.shift = byte & 0x07;
    }

    fn next_frequency(&self) -> u16 {
        let delta = self.shadow_frequency >> self.shift;
        if self.negate {
            self.shadow_frequency.wrapping_sub(delta)
        } else {
            self.shadow_frequency + delta
        }
    }

    fn reload_timer(&mut self) {
        // A zero period ticks at the pace of 8
        self.timer = if self.period == 0 { 8 } else { self.period };
    }

    // Returns false when the overflow check fails and the channel must be
    // disabled
    fn trigger(&mut self, frequency: u16) -> bool {
        self.shadow_frequency = frequency;
        self.reload_timer();
        self.enabled = self.period != 0 || self.shift != 0;

        // The overflow calculation runs at trigger time even though the
        // frequency is not written back
        if self.shift != 0 && self.next_frequency() > MAX_FREQUENCY {
            return false;
        }
        true
    }

    fn tick(&mut self) -> SweepTickResult {
        self.timer -= 1;
        if self.timer > 0 {
            return SweepTickResult::None;
        }
        self.reload_timer();

        if !self.enabled || self.period == 0 {
            return SweepTickResult::None;
        }

        let new_frequency = self.next_frequency();
        if new_frequency > MAX_FREQUENCY {
            return SweepTickResult::DisableChannel;
        }

        if self.shift != 0 {
            self.shadow_frequency = new_frequency;

            // The second calculation only performs the overflow check
            if self.next_frequency() > MAX_FREQUENCY {
                return SweepTickResult::DisableChannel;
            }
            return SweepTickResult::UpdateFrequency(new_frequency);
        }

        SweepTickResult::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PulseChannel {
    channel_enabled: bool,
    dac_enabled: bool,
    duty_cycle: u8,
    duty_position: u8,
    length: LengthTimer,
    envelope: Envelope,
    frequency_timer: FrequencyTimer,
    sweep: Option<Sweep>,
    nr0: Option<IoRegister>,
    nr1: IoRegister,
    nr2: IoRegister,
    nr3: IoRegister,
    nr4: IoRegister,
}

impl PulseChannel {
    fn new(
        nr0: Option<IoRegister>,
        nr1: IoRegister,
        nr2: IoRegister,
        nr3: IoRegister,
        nr4: IoRegister,
    ) -> Self {
        Self {
            channel_enabled: false,
            dac_enabled: false,
            duty_cycle: 0,
            duty_position: 0,
            length: LengthTimer::new(LENGTH_MAX),
            envelope: Envelope::new(),
            frequency_timer: FrequencyTimer::new(4),
            sweep: nr0.map(|_| Sweep::new()),
            nr0,
            nr1,
            nr2,
            nr3,
            nr4,
        }
    }

    pub(crate) fn new_channel_1() -> Self {
        Self::new(
            Some(IoRegister::NR10),
            IoRegister::NR11,
            IoRegister::NR12,
            IoRegister::NR13,
            IoRegister::NR14,
        )
    }

    pub(crate) fn new_channel_2() -> Self {
        Self::new(
            None,
            IoRegister::NR21,
            IoRegister::NR22,
            IoRegister::NR23,
            IoRegister::NR24,
        )
    }

    pub(crate) fn process_register_updates(&mut self, io_registers: &mut IoRegisters) {
        if let (Some(nr0), Some(sweep)) = (self.nr0, self.sweep.as_mut()) {
            if io_registers.is_register_dirty(nr0) {
                io_registers.clear_dirty_bit(nr0);
                sweep.update_from_byte(io_registers.apu_read_register(nr0));
            }
        }

        if io_registers.is_register_dirty(self.nr1) {
            io_registers.clear_dirty_bit(self.nr1);
            let nr1_value = io_registers.apu_read_register(self.nr1);
            self.duty_cycle = nr1_value >> 6;
            self.length.load(u16::from(nr1_value & 0x3F));
        }

        if io_registers.is_register_dirty(self.nr2) {
            io_registers.clear_dirty_bit(self.nr2);
            let nr2_value = io_registers.apu_read_register(self.nr2);
            self.dac_enabled = nr2_value & 0xF8 != 0;
            if !self.dac_enabled {
                self.channel_enabled = false;
            }
        }

        let frequency_dirty =
            io_registers.is_register_dirty(self.nr3) || io_registers.is_register_dirty(self.nr4);
        if frequency_dirty {
            io_registers.clear_dirty_bit(self.nr3);
            self.frequency_timer.frequency = read_frequency(io_registers, self.nr3, self.nr4);
        }

        if io_registers.is_register_dirty(self.nr4) {
            io_registers.clear_dirty_bit(self.nr4);
            let nr4_value = io_registers.apu_read_register(self.nr4);

            self.length.enabled = nr4_value & 0x40 != 0;

            if nr4_value & 0x80 != 0 {
                // Clear the trigger bit; it always reads back 0
                io_registers.apu_write_register(self.nr4, nr4_value & 0x7F);
                self.trigger(io_registers);
            }
        }

        if self.length.expired() {
            self.channel_enabled = false;
        }
    }

    fn trigger(&mut self, io_registers: &IoRegisters) {
        self.channel_enabled = self.dac_enabled;
        self.length.trigger();
        self.frequency_timer.trigger();
        self.envelope = Envelope::from_byte(io_registers.apu_read_register(self.nr2));

        if let Some(sweep) = &mut self.sweep {
            if !sweep.trigger(self.frequency_timer.frequency) {
                self.channel_enabled = false;
            }
        }
    }

    pub(crate) fn tick_frequency(&mut self, cycles: u32) {
        let clocks = self.frequency_timer.tick(cycles);
        self.duty_position = ((u32::from(self.duty_position) + clocks) % 8) as u8;
    }

    pub(crate) fn tick_length(&mut self) {
        if self.length.tick() {
            self.channel_enabled = false;
        }
    }

    pub(crate) fn tick_envelope(&mut self) {
        self.envelope.tick();
    }

    pub(crate) fn tick_sweep(&mut self, io_registers: &mut IoRegisters) {
        let Some(sweep) = &mut self.sweep else {
            return;
        };

        match sweep.tick() {
            SweepTickResult::None => {}
            SweepTickResult::DisableChannel => {
                self.channel_enabled = false;
            }
            SweepTickResult::UpdateFrequency(new_frequency) => {
                self.frequency_timer.frequency = new_frequency;

                // Write the swept frequency back to NRx3/NRx4
                io_registers.apu_write_register(self.nr3, (new_frequency & 0xFF) as u8);
                let nr4_value = io_registers.apu_read_register(self.nr4);
                io_registers.apu_write_register(
                    self.nr4,
                    (nr4_value & 0xF8) | (new_frequency >> 8) as u8,
                );
            }
        }
    }
}

impl Channel for PulseChannel {
    fn channel_enabled(&self) -> bool {
        self.channel_enabled
    }

    fn dac_enabled(&self) -> bool {
        self.dac_enabled
    }

    fn sample_digital(&self) -> Option<u8> {
        if !self.dac_enabled {
            return None;
        }

        if !self.channel_enabled {
            return Some(0);
        }

        let wave_step = DUTY_WAVEFORMS[usize::from(self.duty_cycle)]
            [usize::from(self.duty_position)];
        Some(wave_step * self.envelope.volume)
    }
}
