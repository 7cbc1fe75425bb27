mod mbc3;

use crate::memory::address;
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;
use std::time::SystemTime;

pub(crate) use mbc3::RealTimeClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MapperType {
    None,
    MBC1,
    MBC2,
    MBC3,
    MBC5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamMapResult {
    // Relative address into the full RAM array
    RamAddress(u32),
    // Relative address into MBC2's internal 512x4-bit RAM; only the low
    // nibble of the byte is backed by storage
    NibbleRamAddress(u32),
    // The RAM address is currently mapped to a cartridge-internal register
    MapperRegister,
    // The RAM address is invalid or RAM access is disabled
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Mapper {
    None,
    MBC1 {
        rom_bank_bit_mask: u8,
        ram_bank_bit_mask: u8,
        ram_enable: u8,
        rom_bank_number: u8,
        ram_bank_number: u8,
        banking_mode_select: u8,
    },
    MBC2 {
        rom_bank_bit_mask: u8,
        ram_enable: u8,
        rom_bank_number: u8,
    },
    MBC3 {
        rom_bank_bit_mask: u8,
        ram_enable: u8,
        rom_bank_number: u8,
        ram_bank_number: u8,
        real_time_clock: Option<RealTimeClock>,
    },
    MBC5 {
        rom_bank_bit_mask: u16,
        ram_bank_bit_mask: u8,
        ram_enable: u8,
        rom_bank_number: u16,
        ram_bank_number: u8,
    },
}

fn ram_enabled(ram_enable: u8) -> bool {
    ram_enable & 0x0F == 0x0A
}

impl Mapper {
    pub(crate) fn new(
        mapper_type: MapperType,
        mapper_features: MapperFeatures,
        rtc: Option<RealTimeClock>,
        rom_size: u32,
        ram_size: u32,
    ) -> Self {
        let rom_bank_bit_mask = if rom_size >= 1 << 14 {
            ((rom_size >> 14) - 1) as u16
        } else {
            0
        };
        let ram_bank_bit_mask = if ram_size >= 1 << 13 {
            ((ram_size >> 13) - 1) as u8
        } else {
            0
        };

        log::debug!("setting ROM bank bit mask to {rom_bank_bit_mask:02X} for size {rom_size}");
        log::debug!("setting RAM bank bit mask to {ram_bank_bit_mask:02X} for size {ram_size}");

        match mapper_type {
            MapperType::None => Self::None,
            MapperType::MBC1 => Self::MBC1 {
                rom_bank_bit_mask: rom_bank_bit_mask as u8,
                ram_bank_bit_mask,
                ram_enable: 0x00,
                rom_bank_number: 0x00,
                ram_bank_number: 0x00,
                banking_mode_select: 0x00,
            },
            MapperType::MBC2 => Self::MBC2 {
                rom_bank_bit_mask: rom_bank_bit_mask as u8,
                ram_enable: 0x00,
                rom_bank_number: 0x00,
            },
            MapperType::MBC3 => {
                let real_time_clock = mapper_features.has_rtc.then(|| match rtc {
                    Some(mut rtc) => {
                        rtc.update(SystemTime::now());
                        rtc
                    }
                    None => RealTimeClock::new(SystemTime::now()),
                });
                Self::MBC3 {
                    rom_bank_bit_mask: rom_bank_bit_mask as u8,
                    ram_enable: 0x00,
                    rom_bank_number: 0x00,
                    ram_bank_number: 0x00,
                    real_time_clock,
                }
            }
            MapperType::MBC5 => Self::MBC5 {
                rom_bank_bit_mask,
                ram_bank_bit_mask,
                ram_enable: 0x00,
                rom_bank_number: 0x01,
                ram_bank_number: 0x00,
            },
        }
    }

    pub(crate) fn map_rom_address(&self, address: u16) -> u32 {
        match self {
            Self::None => u32::from(address),
            &Self::MBC1 {
                rom_bank_bit_mask,
                rom_bank_number,
                ram_bank_number,
                banking_mode_select,
                ..
            } => {
                let rom_bank_number = if rom_bank_number == 0x00 {
                    0x01
                } else {
                    rom_bank_number
                };

                match address {
                    address @ 0x0000..=0x3FFF => {
                        if banking_mode_select == 0x00 {
                            u32::from(address)
                        } else {
                            let bank_number = (ram_bank_number << 5) & rom_bank_bit_mask;
                            u32::from(address) + (u32::from(bank_number) << 14)
                        }
                    }
                    address @ 0x4000..=0x7FFF => {
                        if banking_mode_select == 0x00 {
                            let bank_number = rom_bank_number & rom_bank_bit_mask;
                            u32::from(address - 0x4000) + (u32::from(bank_number) << 14)
                        } else {
                            let bank_number =
                                (rom_bank_number | (ram_bank_number << 5)) & rom_bank_bit_mask;
                            u32::from(address - 0x4000) + (u32::from(bank_number) << 14)
                        }
                    }
                    _ => panic!("mapper called for address outside of cartridge address range: {address:04X}")
                }
            }
            &Self::MBC2 {
                rom_bank_bit_mask,
                rom_bank_number,
                ..
            }
            | &Self::MBC3 {
                rom_bank_bit_mask,
                rom_bank_number,
                ..
            } => {
                let rom_bank_number = if rom_bank_number == 0x00 {
                    0x01
                } else {
                    rom_bank_number
                };

                match address {
                    address @ 0x0000..=0x3FFF => u32::from(address),
                    address @ 0x4000..=0x7FFF => {
                        let bank_number = rom_bank_number & rom_bank_bit_mask;
                        u32::from(address - 0x4000) + (u32::from(bank_number) << 14)
                    }
                    _ => panic!("mapper called for address outside of cartridge address range: {address:04X}")
                }
            }
            &Self::MBC5 {
                rom_bank_bit_mask,
                rom_bank_number,
                ..
            } => {
                // ROM bank 0 really is bank 0 in MBC5

                match address {
                    address @ 0x0000..=0x3FFF => u32::from(address),
                    address @ 0x4000..=0x7FFF => {
                        let bank_number = rom_bank_number & rom_bank_bit_mask;
                        u32::from(address - 0x4000) + (u32::from(bank_number) << 14)
                    }
                    _ => panic!("mapper called for address outside of cartridge address range: {address:04X}")
                }
            }
        }
    }

    // ROM writes don't modify the ROM itself, they set cartridge registers
    pub(crate) fn write_rom_address(&mut self, address: u16, value: u8) {
        match self {
            Self::None => {}
            Self::MBC1 {
                ram_enable,
                rom_bank_number,
                ram_bank_number,
                banking_mode_select,
                ..
            } => match address {
                _address @ 0x0000..=0x1FFF => {
                    log::trace!("MBC1 ram_enable changed to {value:02X}");
                    *ram_enable = value;
                }
                _address @ 0x2000..=0x3FFF => {
                    log::trace!("MBC1 rom_bank_number changed to {value:02X}");
                    *rom_bank_number = value & 0x1F;
                }
                _address @ 0x4000..=0x5FFF => {
                    log::trace!("MBC1 ram_bank_number changed to {value:02X}");
                    *ram_bank_number = value & 0x03;
                }
                _address @ 0x6000..=0x7FFF => {
                    log::trace!("MBC1 banking_mode_select changed to {value:02X}");
                    *banking_mode_select = value & 0x01;
                }
                _ => panic!("invalid ROM write address in MBC1 mapper: {address:04X}"),
            },
            Self::MBC2 {
                ram_enable,
                rom_bank_number,
                ..
            } => match address {
                // Address bit 8 selects between the two MBC2 registers
                address @ 0x0000..=0x3FFF => {
                    if address & 0x0100 != 0 {
                        *rom_bank_number = value & 0x0F;
                    } else {
                        *ram_enable = value;
                    }
                }
                _address @ 0x4000..=0x7FFF => {}
                _ => panic!("invalid ROM write address in MBC2 mapper: {address:04X}"),
            },
            Self::MBC3 {
                ram_enable,
                rom_bank_number,
                ram_bank_number,
                real_time_clock,
                ..
            } => match address {
                _address @ 0x0000..=0x1FFF => {
                    *ram_enable = value;
                }
                _address @ 0x2000..=0x3FFF => {
                    *rom_bank_number = value & 0x7F;
                }
                _address @ 0x4000..=0x5FFF => {
                    *ram_bank_number = value;
                }
                _address @ 0x6000..=0x7FFF => {
                    if let Some(real_time_clock) = real_time_clock {
                        real_time_clock.write_latch_register(value);
                    }
                }
                _ => panic!("invalid ROM write address in MBC3 mapper: {address:04X}"),
            },
            Self::MBC5 {
                ram_enable,
                rom_bank_number,
                ram_bank_number,
                ..
            } => match address {
                _address @ 0x0000..=0x1FFF => {
                    *ram_enable = value;
                }
                _address @ 0x2000..=0x2FFF => {
                    *rom_bank_number = (*rom_bank_number & 0xFF00) | u16::from(value);
                }
                _address @ 0x3000..=0x3FFF => {
                    *rom_bank_number = (u16::from(value & 0x01) << 8) | (*rom_bank_number & 0x00FF);
                }
                _address @ 0x4000..=0x5FFF => {
                    *ram_bank_number = value & 0x0F;
                }
                _address @ 0x6000..=0x7FFF => {}
                _ => panic!("invalid ROM write address in MBC5 mapper: {address:04X}"),
            },
        }
    }

    pub(crate) fn map_ram_address(&self, address: u16) -> RamMapResult {
        let relative_address = address - address::EXTERNAL_RAM_START;

        match self {
            Self::None => RamMapResult::RamAddress(u32::from(relative_address)),
            &Self::MBC1 {
                ram_bank_bit_mask,
                ram_enable,
                ram_bank_number,
                banking_mode_select,
                ..
            } => {
                if ram_enabled(ram_enable) {
                    if banking_mode_select == 0x00 {
                        RamMapResult::RamAddress(u32::from(relative_address))
                    } else {
                        let bank_number = ram_bank_number & ram_bank_bit_mask;
                        RamMapResult::RamAddress(
                            u32::from(relative_address) + (u32::from(bank_number) << 13),
                        )
                    }
                } else {
                    RamMapResult::None
                }
            }
            &Self::MBC2 { ram_enable, .. } => {
                if ram_enabled(ram_enable) {
                    // 512 half-bytes, echoed through the whole region
                    RamMapResult::NibbleRamAddress(u32::from(relative_address & 0x01FF))
                } else {
                    RamMapResult::None
                }
            }
            &Self::MBC3 {
                ram_enable,
                ram_bank_number,
                ..
            } => {
                if ram_enabled(ram_enable) {
                    match ram_bank_number {
                        ram_bank_number @ 0x00..=0x03 => RamMapResult::RamAddress(
                            u32::from(relative_address) + (u32::from(ram_bank_number) << 13),
                        ),
                        // 0x08-0x0C map the RTC registers
                        _ram_bank_number @ 0x08..=0x0C => RamMapResult::MapperRegister,
                        _ => RamMapResult::None,
                    }
                } else {
                    RamMapResult::None
                }
            }
            &Self::MBC5 {
                ram_bank_bit_mask,
                ram_enable,
                ram_bank_number,
                ..
            } => {
                if ram_enabled(ram_enable) {
                    let bank_number = ram_bank_number & ram_bank_bit_mask;
                    RamMapResult::RamAddress(
                        u32::from(relative_address) + (u32::from(bank_number) << 13),
                    )
                } else {
                    RamMapResult::None
                }
            }
        }
    }

    pub(crate) fn read_ram_addressed_register(&self) -> Option<u8> {
        match self {
            Self::MBC3 {
                ram_bank_number,
                real_time_clock: Some(real_time_clock),
                ..
            } => real_time_clock.read_register(*ram_bank_number),
            _ => None,
        }
    }

    pub(crate) fn write_ram_addressed_register(&mut self, value: u8) {
        if let Self::MBC3 {
            ram_bank_number,
            real_time_clock: Some(real_time_clock),
            ..
        } = self
        {
            real_time_clock.write_register(*ram_bank_number, value);
        }
    }

    /// Whether the cartridge RAM gate is currently open. The host watches
    /// this transition to decide when to persist battery-backed RAM.
    pub(crate) fn is_ram_enabled(&self) -> bool {
        match *self {
            Self::None => true,
            Self::MBC1 { ram_enable, .. }
            | Self::MBC2 { ram_enable, .. }
            | Self::MBC3 { ram_enable, .. }
            | Self::MBC5 { ram_enable, .. } => ram_enabled(ram_enable),
        }
    }

    pub(crate) fn update_rtc(&mut self) {
        let Self::MBC3 { real_time_clock: Some(real_time_clock), .. } = self else { return };
        real_time_clock.update(SystemTime::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MapperFeatures {
    pub(crate) has_ram: bool,
    pub(crate) has_battery: bool,
    pub(crate) has_rtc: bool,
}

impl std::fmt::Display for MapperFeatures {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "has_ram={}, has_battery={}, has_rtc={}",
            self.has_ram, self.has_battery, self.has_rtc
        )
    }
}

pub(crate) fn parse_byte(mapper_byte: u8) -> Option<(MapperType, MapperFeatures)> {
    let (mapper_type, has_ram, has_battery) = match mapper_byte {
        0x00 => (MapperType::None, false, false),
        0x01 => (MapperType::MBC1, false, false),
        0x02 => (MapperType::MBC1, true, false),
        0x03 => (MapperType::MBC1, true, true),
        0x05 => (MapperType::MBC2, true, false),
        0x06 => (MapperType::MBC2, true, true),
        0x0F => (MapperType::MBC3, false, true),
        // 0x10 is w/ RTC, 0x13 is w/o RTC
        0x10 | 0x13 => (MapperType::MBC3, true, true),
        0x11 => (MapperType::MBC3, false, false),
        0x12 => (MapperType::MBC3, true, false),
        // 0x19 is w/o rumble, 0x1C is w/ rumble
        0x19 | 0x1C => (MapperType::MBC5, false, false),
        // 0x1A is w/o rumble, 0x1D is w/ rumble
        0x1A | 0x1D => (MapperType::MBC5, true, false),
        // 0x1B is w/o rumble, 0x1E is w/ rumble
        0x1B | 0x1E => (MapperType::MBC5, true, true),
        _ => return None,
    };

    let has_rtc = mapper_byte == 0x0F || mapper_byte == 0x10;

    let features = MapperFeatures {
        has_ram,
        has_battery,
        has_rtc,
    };
    Some((mapper_type, features))
}
