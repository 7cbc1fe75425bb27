use crate::apu::channels::{read_frequency, Channel, FrequencyTimer, LengthTimer};
use crate::memory::address;
use crate::memory::ioregisters::{IoRegister, IoRegisters};
use serde::{Deserialize, Serialize};

const LENGTH_MAX: u16 = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WaveChannel {
    channel_enabled: bool,
    dac_enabled: bool,
    length: LengthTimer,
    volume_shift: u8,
    sample_position: u8,
    last_sample: u8,
    frequency_timer: FrequencyTimer,
}

impl WaveChannel {
    pub(crate) fn new() -> Self {
        Self {
            channel_enabled: false,
            dac_enabled: false,
            length: LengthTimer::new(LENGTH_MAX),
            volume_shift: 8,
            sample_position: 0,
            last_sample: 0,
            frequency_timer: FrequencyTimer::new(2),
        }
    }

    pub(crate) fn process_register_updates(&mut self, io_registers: &mut IoRegisters) {
        if io_registers.is_register_dirty(IoRegister::NR30) {
            io_registers.clear_dirty_bit(IoRegister::NR30);
            self.dac_enabled = io_registers.apu_read_register(IoRegister::NR30) & 0x80 != 0;
            if !self.dac_enabled {
                self.channel_enabled = false;
            }
        }

        if io_registers.is_register_dirty(IoRegister::NR31) {
            io_registers.clear_dirty_bit(IoRegister::NR31);
            let nr31_value = io_registers.apu_read_register(IoRegister::NR31);
            self.length.load(u16::from(nr31_value));
        }

        if io_registers.is_register_dirty(IoRegister::NR32) {
            io_registers.clear_dirty_bit(IoRegister::NR32);
            // 00 mutes, 01 plays as-is, 10 halves, 11 quarters
            self.volume_shift = match io_registers.apu_read_register(IoRegister::NR32) & 0x60 {
                0x00 => 8,
                0x20 => 0,
                0x40 => 1,
                0x60 => 2,
                _ => unreachable!("masked with 0x60"),
            };
        }

        let frequency_dirty = io_registers.is_register_dirty(IoRegister::NR33)
            || io_registers.is_register_dirty(IoRegister::NR34);
        if frequency_dirty {
            io_registers.clear_dirty_bit(IoRegister::NR33);
            self.frequency_timer.frequency =
                read_frequency(io_registers, IoRegister::NR33, IoRegister::NR34);
        }

        if io_registers.is_register_dirty(IoRegister::NR34) {
            io_registers.clear_dirty_bit(IoRegister::NR34);
            let nr34_value = io_registers.apu_read_register(IoRegister::NR34);

            self.length.enabled = nr34_value & 0x40 != 0;

            if nr34_value & 0x80 != 0 {
                io_registers.apu_write_register(IoRegister::NR34, nr34_value & 0x7F);

                self.channel_enabled = self.dac_enabled;
                self.length.trigger();
                self.frequency_timer.trigger();
                self.sample_position = 0;
            }
        }

        if self.length.expired() {
            self.channel_enabled = false;
        }
    }

    pub(crate) fn tick_frequency(&mut self, cycles: u32, io_registers: &IoRegisters) {
        let clocks = self.frequency_timer.tick(cycles);
        for _ in 0..clocks {
            self.sample_position = (self.sample_position + 1) % 32;

            // Two 4-bit samples per wave RAM byte, high nibble first
            let sample_byte = io_registers
                .read_address(address::WAVE_RAM_START + u16::from(self.sample_position / 2));
            self.last_sample = if self.sample_position % 2 == 0 {
                sample_byte >> 4
            } else {
                sample_byte & 0x0F
            };
        }
    }

    pub(crate) fn tick_length(&mut self) {
        if self.length.tick() {
            self.channel_enabled = false;
        }
    }
}

impl Channel for WaveChannel {
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

        if !self.channel_enabled || self.volume_shift == 8 {
            return Some(0);
        }

        Some(self.last_sample >> self.volume_shift)
    }
}
