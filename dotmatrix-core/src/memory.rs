pub mod address;
pub mod ioregisters;
mod mapper;

use crate::cpu::ExecutionMode;
use crate::memory::ioregisters::IoRegisters;
use crate::memory::mapper::{Mapper, MapperFeatures, RamMapResult};
use crate::ppu::{PpuMode, PpuState};
use crate::serialize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CartridgeLoadError {
    #[error("header should be at least 336 bytes, was {header_len} bytes")]
    HeaderTooShort { header_len: usize },
    #[error("invalid or unsupported mapper byte in cartridge header: {mapper_byte:02X}")]
    InvalidMapper { mapper_byte: u8 },
    #[error("invalid RAM size code, expected 0 or 2-5: {ram_size_code}")]
    InvalidRamSize { ram_size_code: u8 },
}

// MBC2 has no RAM size header entry; its 512 half-bytes live on the chip
const MBC2_INTERNAL_RAM_LEN: usize = 512;

#[derive(Serialize, Deserialize)]
pub struct Cartridge {
    #[serde(skip)]
    rom: Vec<u8>,
    mapper: Mapper,
    features: MapperFeatures,
    ram: Vec<u8>,
}

impl Cartridge {
    /// Create a new Cartridge value from the given ROM image.
    ///
    /// # Errors
    ///
    /// Returns a `CartridgeLoadError` when:
    /// * The ROM is too short to hold a header (must be at least 0x150 bytes)
    /// * The mapper byte in the cartridge header is invalid or unsupported
    /// * The RAM size byte in the cartridge header is invalid
    pub fn new(rom: Vec<u8>) -> Result<Self, CartridgeLoadError> {
        log::info!("Initializing cartridge using {} bytes of data", rom.len());

        if rom.len() < 0x0150 {
            return Err(CartridgeLoadError::HeaderTooShort { header_len: rom.len() });
        }

        let mapper_byte = rom[address::MAPPER as usize];
        let Some((mapper_type, mapper_features)) = mapper::parse_byte(mapper_byte) else {
            return Err(CartridgeLoadError::InvalidMapper { mapper_byte });
        };

        log::info!("Detected mapper type {mapper_type:?} (byte: {mapper_byte:02X})");
        log::info!("Mapper features: {mapper_features}");

        let ram_len = if mapper_type == mapper::MapperType::MBC2 {
            MBC2_INTERNAL_RAM_LEN
        } else if mapper_features.has_ram {
            let ram_size_code = rom[address::RAM_SIZE as usize];
            match ram_size_code {
                0x00 => 0,
                0x02 => 8192,   // 8 KB
                0x03 => 32768,  // 32 KB
                0x04 => 131072, // 128 KB
                0x05 => 65536,  // 64 KB
                _ => return Err(CartridgeLoadError::InvalidRamSize { ram_size_code }),
            }
        } else {
            0
        };

        let mapper = Mapper::new(
            mapper_type,
            mapper_features,
            None,
            rom.len() as u32,
            ram_len as u32,
        );

        log::info!("Cartridge has {ram_len} bytes of external RAM");
        log::info!("Cartridge has battery: {}", mapper_features.has_battery);

        Ok(Self {
            rom,
            mapper,
            features: mapper_features,
            ram: vec![0; ram_len],
        })
    }

    #[cfg(test)]
    pub(crate) fn new_test(mapper_byte: u8) -> Self {
        let mut rom = vec![0; 0x8000];
        rom[address::MAPPER as usize] = mapper_byte;
        rom[address::RAM_SIZE as usize] = 0x03;
        Self::new(rom).unwrap()
    }

    /// Read a value from the given ROM address.
    ///
    /// # Panics
    ///
    /// This method will panic if the ROM address is invalid. ROM addresses
    /// must be in the range \[0x0000, 0x7FFF\].
    pub fn read_rom_address(&self, address: u16) -> u8 {
        let mapped_address = self.mapper.map_rom_address(address);
        self.rom.get(mapped_address as usize).copied().unwrap_or(0xFF)
    }

    /// Write a value to the given ROM address (in reality, set a cartridge
    /// register).
    pub fn write_rom_address(&mut self, address: u16, value: u8) {
        self.mapper.write_rom_address(address, value);
    }

    /// Read a value from the given cartridge RAM address. Returns 0xFF if the
    /// address is not valid or RAM is disabled.
    pub fn read_ram_address(&self, address: u16) -> u8 {
        match self.mapper.map_ram_address(address) {
            RamMapResult::RamAddress(mapped_address) => {
                self.ram.get(mapped_address as usize).copied().unwrap_or(0xFF)
            }
            RamMapResult::NibbleRamAddress(mapped_address) => self
                .ram
                .get(mapped_address as usize)
                .map(|&half_byte| 0xF0 | half_byte)
                .unwrap_or(0xFF),
            RamMapResult::MapperRegister => {
                self.mapper.read_ram_addressed_register().unwrap_or(0xFF)
            }
            RamMapResult::None => 0xFF,
        }
    }

    /// Write a value to the given cartridge RAM address. Does nothing if the
    /// address is not valid or RAM is disabled.
    pub fn write_ram_address(&mut self, address: u16, value: u8) {
        match self.mapper.map_ram_address(address) {
            RamMapResult::RamAddress(mapped_address) => {
                if let Some(ram_value) = self.ram.get_mut(mapped_address as usize) {
                    *ram_value = value;
                }
            }
            RamMapResult::NibbleRamAddress(mapped_address) => {
                if let Some(ram_value) = self.ram.get_mut(mapped_address as usize) {
                    *ram_value = value & 0x0F;
                }
            }
            RamMapResult::MapperRegister => {
                self.mapper.write_ram_addressed_register(value);
            }
            RamMapResult::None => {}
        }
    }

    /// The cartridge's external RAM as a contiguous byte range, for the host
    /// to persist.
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Overwrite external RAM contents, e.g. from a previously persisted
    /// image. Extra bytes are ignored; a short image leaves the tail as-is.
    pub fn load_ram(&mut self, data: &[u8]) {
        let len = data.len().min(self.ram.len());
        self.ram[..len].copy_from_slice(&data[..len]);
    }

    pub fn has_battery(&self) -> bool {
        self.features.has_battery
    }

    /// Whether the mapper's RAM gate is currently open. The host watches for
    /// the enabled -> disabled transition to decide when to persist RAM.
    pub fn is_ram_enabled(&self) -> bool {
        self.mapper.is_ram_enabled()
    }

    /// Advance the real-time clock from the host wall clock, if this
    /// cartridge has one.
    pub fn update_rtc(&mut self) {
        self.mapper.update_rtc();
    }

    /// Whether this cartridge supports CGB enhancements (or requires CGB)
    pub fn supports_cgb_mode(&self) -> bool {
        self.rom[address::CGB_SUPPORT as usize] & 0x80 != 0
    }

    pub(crate) fn rom_bytes(&self) -> &[u8] {
        &self.rom
    }

    pub(crate) fn move_unserializable_fields_from(&mut self, other: Self) {
        self.rom = other.rom;
    }
}

#[derive(Serialize, Deserialize)]
pub struct AddressSpace {
    execution_mode: ExecutionMode,
    cartridge: Cartridge,
    #[serde(skip)]
    boot_rom: Option<Vec<u8>>,
    #[serde(
        serialize_with = "serialize::serialize_array",
        deserialize_with = "serialize::deserialize_array"
    )]
    vram: [u8; 16384],
    #[serde(
        serialize_with = "serialize::serialize_array",
        deserialize_with = "serialize::deserialize_array"
    )]
    working_ram: [u8; 32768],
    #[serde(
        serialize_with = "serialize::serialize_array",
        deserialize_with = "serialize::deserialize_array"
    )]
    oam: [u8; 160],
    io_registers: IoRegisters,
    #[serde(
        serialize_with = "serialize::serialize_array",
        deserialize_with = "serialize::deserialize_array"
    )]
    hram: [u8; 127],
    ie_register: u8,
}

impl AddressSpace {
    pub fn new(
        cartridge: Cartridge,
        boot_rom: Option<Vec<u8>>,
        execution_mode: ExecutionMode,
    ) -> Self {
        Self {
            execution_mode,
            cartridge,
            boot_rom,
            vram: [0; 16384],
            working_ram: [0; 32768],
            oam: [0; 160],
            io_registers: IoRegisters::new(execution_mode),
            hram: [0; 127],
            ie_register: 0,
        }
    }

    fn is_cpu_access_allowed(address: u16, ppu_state: &PpuState) -> bool {
        // Non-HRAM access is blocked while an OAM DMA transfer is active,
        // even if the PPU is disabled
        if ppu_state.oam_dma_status().is_some()
            && !(address::HRAM_START..=address::HRAM_END).contains(&address)
        {
            return false;
        }

        // OAM access is blocked while the PPU is scanning OAM or rendering
        if ppu_state.enabled()
            && matches!(
                ppu_state.mode(),
                PpuMode::ScanningOam | PpuMode::RenderingScanline
            )
            && (address::OAM_START..=address::OAM_END).contains(&address)
        {
            return false;
        }

        // VRAM access is blocked while the PPU is rendering a scanline
        !(ppu_state.enabled()
            && ppu_state.mode() == PpuMode::RenderingScanline
            && (address::VRAM_START..=address::VRAM_END).contains(&address))
    }

    fn boot_rom_read(&self, address: u16) -> Option<u8> {
        if self.io_registers.boot_rom_unmapped() {
            return None;
        }
        let boot_rom = self.boot_rom.as_ref()?;

        let mapped = match address {
            address @ 0x0000..=address::BOOT_ROM_END => Some(usize::from(address)),
            address @ address::CGB_BOOT_ROM_SECOND_START..=address::CGB_BOOT_ROM_SECOND_END
                if self.execution_mode == ExecutionMode::GameBoyColor =>
            {
                Some(usize::from(address))
            }
            _ => None,
        }?;

        boot_rom.get(mapped).copied()
    }

    /// Read the value at the given address from the perspective of the CPU.
    /// Returns 0xFF if the CPU is not able to access the given address
    /// because of PPU state.
    pub fn read_address_u8(&self, address: u16, ppu_state: &PpuState) -> u8 {
        if !Self::is_cpu_access_allowed(address, ppu_state) {
            return 0xFF;
        }

        self.read_address_u8_no_access_check(address)
    }

    fn map_vram_address(&self, address: u16) -> usize {
        match self.execution_mode {
            ExecutionMode::GameBoy => (address - address::VRAM_START) as usize,
            ExecutionMode::GameBoyColor => {
                (self.io_registers.get_cgb_vram_bank() << 13)
                    + (address - address::VRAM_START) as usize
            }
        }
    }

    fn map_working_ram_address(&self, address: u16) -> usize {
        match self.execution_mode {
            ExecutionMode::GameBoy => (address - address::WORKING_RAM_START) as usize,
            ExecutionMode::GameBoyColor => match address {
                address @ address::WORKING_RAM_START..=address::CGB_BANK_0_WORKING_RAM_END => {
                    (address - address::WORKING_RAM_START) as usize
                }
                _ => {
                    let ram_bank_number = self.io_registers.get_cgb_working_ram_bank();
                    (ram_bank_number << 12)
                        + (address - address::CGB_BANKED_WORKING_RAM_START) as usize
                }
            },
        }
    }

    pub(crate) fn read_address_u8_no_access_check(&self, address: u16) -> u8 {
        match address {
            address @ address::ROM_START..=address::ROM_END => self
                .boot_rom_read(address)
                .unwrap_or_else(|| self.cartridge.read_rom_address(address)),
            address @ address::VRAM_START..=address::VRAM_END => {
                self.vram[self.map_vram_address(address)]
            }
            address @ address::EXTERNAL_RAM_START..=address::EXTERNAL_RAM_END => {
                self.cartridge.read_ram_address(address)
            }
            address @ address::WORKING_RAM_START..=address::WORKING_RAM_END => {
                self.working_ram[self.map_working_ram_address(address)]
            }
            address @ address::ECHO_RAM_START..=address::ECHO_RAM_END => {
                self.working_ram[self.map_working_ram_address(
                    address - address::ECHO_RAM_START + address::WORKING_RAM_START,
                )]
            }
            address @ address::OAM_START..=address::OAM_END => {
                self.oam[(address - address::OAM_START) as usize]
            }
            _address @ address::UNUSABLE_START..=address::UNUSABLE_END => 0xFF,
            address @ address::IO_REGISTERS_START..=address::IO_REGISTERS_END => {
                self.io_registers.read_address(address)
            }
            address @ address::HRAM_START..=address::HRAM_END => {
                self.hram[(address - address::HRAM_START) as usize]
            }
            address::IE_REGISTER => self.ie_register,
        }
    }

    /// Read the OAM/VRAM value at the given address from the perspective of
    /// the PPU, bypassing the CPU access check.
    ///
    /// # Panics
    ///
    /// This method will panic if the address is not an OAM or VRAM address.
    pub fn ppu_read_address_u8(&self, address: u16) -> u8 {
        match address {
            address @ address::OAM_START..=address::OAM_END => {
                self.oam[(address - address::OAM_START) as usize]
            }
            address @ address::VRAM_START..=address::VRAM_END => {
                self.vram[self.map_vram_address(address)]
            }
            _ => panic!("PPU read method is only allowed to read OAM and VRAM"),
        }
    }

    /// Read a byte directly from VRAM using the given address+bank. This
    /// should only be called by the PPU.
    pub fn read_vram_direct(&self, address: u16, vram_bank: usize) -> u8 {
        debug_assert!((address::VRAM_START..=address::VRAM_END).contains(&address));

        self.vram[(vram_bank << 13) + (address - address::VRAM_START) as usize]
    }

    /// Read the value at the given address and the following address as a
    /// little-endian 16-bit value.
    pub fn read_address_u16(&self, address: u16, ppu_state: &PpuState) -> u16 {
        let lsb = self.read_address_u8(address, ppu_state);
        let msb = self.read_address_u8(address.wrapping_add(1), ppu_state);
        u16::from_le_bytes([lsb, msb])
    }

    /// Assign a value to the given address from the perspective of the CPU.
    /// The write is ignored if the CPU is not allowed to access the given
    /// address due to PPU state.
    pub fn write_address_u8(&mut self, address: u16, value: u8, ppu_state: &PpuState) {
        if !Self::is_cpu_access_allowed(address, ppu_state) {
            return;
        }

        self.write_address_u8_no_access_check(address, value);
    }

    pub(crate) fn write_address_u8_no_access_check(&mut self, address: u16, value: u8) {
        match address {
            address @ address::ROM_START..=address::ROM_END => {
                self.cartridge.write_rom_address(address, value);
            }
            address @ address::VRAM_START..=address::VRAM_END => {
                self.vram[self.map_vram_address(address)] = value;
            }
            address @ address::EXTERNAL_RAM_START..=address::EXTERNAL_RAM_END => {
                self.cartridge.write_ram_address(address, value);
            }
            address @ address::WORKING_RAM_START..=address::WORKING_RAM_END => {
                self.working_ram[self.map_working_ram_address(address)] = value;
            }
            address @ address::ECHO_RAM_START..=address::ECHO_RAM_END => {
                self.working_ram[self.map_working_ram_address(
                    address - address::ECHO_RAM_START + address::WORKING_RAM_START,
                )] = value;
            }
            address @ address::OAM_START..=address::OAM_END => {
                self.oam[(address - address::OAM_START) as usize] = value;
            }
            _address @ address::UNUSABLE_START..=address::UNUSABLE_END => {}
            address @ address::IO_REGISTERS_START..=address::IO_REGISTERS_END => {
                self.io_registers.write_address(address, value);
            }
            address @ address::HRAM_START..=address::HRAM_END => {
                self.hram[(address - address::HRAM_START) as usize] = value;
            }
            address::IE_REGISTER => {
                self.ie_register = value;
            }
        }
    }

    /// Assign a 16-bit value to the given address and the following address,
    /// using little-endian.
    pub fn write_address_u16(&mut self, address: u16, value: u16, ppu_state: &PpuState) {
        let [lsb, msb] = value.to_le_bytes();
        self.write_address_u8(address, lsb, ppu_state);
        self.write_address_u8(address.wrapping_add(1), msb, ppu_state);
    }

    pub fn get_io_registers(&self) -> &IoRegisters {
        &self.io_registers
    }

    pub fn get_io_registers_mut(&mut self) -> &mut IoRegisters {
        &mut self.io_registers
    }

    /// Retrieve the current value of the IE register (interrupts enabled).
    pub fn get_ie_register(&self) -> u8 {
        self.ie_register
    }

    /// Copy a byte from the given source address to the given destination
    /// address, bypassing access checks related to PPU state. Intended for
    /// use in OAM and VRAM DMA transfers.
    pub fn copy_byte(&mut self, src_address: u16, dst_address: u16) {
        let byte = self.read_address_u8_no_access_check(src_address);
        self.write_address_u8_no_access_check(dst_address, byte);
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cartridge
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub(crate) fn move_unserializable_fields_from(&mut self, other: Self) {
        self.cartridge.move_unserializable_fields_from(other.cartridge);
        self.boot_rom = other.boot_rom;
    }

    pub(crate) fn take_boot_rom(&mut self) -> Option<Vec<u8>> {
        self.boot_rom.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ioregisters::IoRegister;

    fn new_cgb_address_space() -> AddressSpace {
        let mut rom = vec![0; 0x8000];
        rom[address::CGB_SUPPORT as usize] = 0x80;
        let cartridge = Cartridge::new(rom).unwrap();
        AddressSpace::new(cartridge, None, ExecutionMode::GameBoyColor)
    }

    #[test]
    fn ram_read_after_write() {
        let cartridge = Cartridge::new_test(0x03);
        let mut address_space = AddressSpace::new(cartridge, None, ExecutionMode::GameBoy);
        let ppu_state = PpuState::new(ExecutionMode::GameBoy);

        for address in [0xC000, 0xD123, 0xFF80, 0xFFFE] {
            address_space.write_address_u8(address, 0x5A, &ppu_state);
            assert_eq!(0x5A, address_space.read_address_u8(address, &ppu_state));
        }
    }

    #[test]
    fn echo_ram_aliases_working_ram() {
        let cartridge = Cartridge::new_test(0x00);
        let mut address_space = AddressSpace::new(cartridge, None, ExecutionMode::GameBoy);
        let ppu_state = PpuState::new(ExecutionMode::GameBoy);

        address_space.write_address_u8(0xC123, 0x99, &ppu_state);
        assert_eq!(0x99, address_space.read_address_u8(0xE123, &ppu_state));

        address_space.write_address_u8(0xFD00, 0x34, &ppu_state);
        assert_eq!(0x34, address_space.read_address_u8(0xDD00, &ppu_state));
    }

    #[test]
    fn unusable_region_reads_ff() {
        let cartridge = Cartridge::new_test(0x00);
        let mut address_space = AddressSpace::new(cartridge, None, ExecutionMode::GameBoy);
        let ppu_state = PpuState::new(ExecutionMode::GameBoy);

        address_space.write_address_u8(0xFEA0, 0x11, &ppu_state);
        assert_eq!(0xFF, address_space.read_address_u8(0xFEA0, &ppu_state));
        assert_eq!(0xFF, address_space.read_address_u8(0xFEFF, &ppu_state));
    }

    #[test]
    fn disabled_cartridge_ram_reads_ff() {
        let cartridge = Cartridge::new_test(0x03);
        let mut address_space = AddressSpace::new(cartridge, None, ExecutionMode::GameBoy);
        let ppu_state = PpuState::new(ExecutionMode::GameBoy);

        address_space.write_address_u8(0xA000, 0x77, &ppu_state);
        assert_eq!(0xFF, address_space.read_address_u8(0xA000, &ppu_state));

        // 0x0A in the low nibble of a 0x0000-0x1FFF write opens the gate
        address_space.write_address_u8(0x0000, 0x0A, &ppu_state);
        address_space.write_address_u8(0xA000, 0x77, &ppu_state);
        assert_eq!(0x77, address_space.read_address_u8(0xA000, &ppu_state));
    }

    #[test]
    fn boot_rom_overlay() {
        let mut rom = vec![0; 0x8000];
        rom[0x0000] = 0xAA;
        rom[address::MAPPER as usize] = 0x00;
        let cartridge = Cartridge::new(rom).unwrap();
        let boot_rom = vec![0x55; 256];
        let mut address_space =
            AddressSpace::new(cartridge, Some(boot_rom), ExecutionMode::GameBoy);
        let ppu_state = PpuState::new(ExecutionMode::GameBoy);

        assert_eq!(0x55, address_space.read_address_u8(0x0000, &ppu_state));

        // Writing a nonzero value to the BANK register unmaps the boot ROM
        address_space.write_address_u8(0xFF50, 0x01, &ppu_state);
        assert_eq!(0xAA, address_space.read_address_u8(0x0000, &ppu_state));
    }

    #[test]
    fn cgb_vram_banks() {
        let mut address_space = new_cgb_address_space();
        let ppu_state = PpuState::new(ExecutionMode::GameBoyColor);

        address_space
            .get_io_registers_mut()
            .write_register(IoRegister::VBK, 0x00);

        address_space.write_address_u8(0x8500, 0xCD, &ppu_state);
        assert_eq!(0xCD, address_space.read_address_u8(0x8500, &ppu_state));

        address_space
            .get_io_registers_mut()
            .write_register(IoRegister::VBK, 0x01);

        assert_eq!(0x00, address_space.read_address_u8(0x8500, &ppu_state));
        address_space.write_address_u8(0x8500, 0xEF, &ppu_state);
        assert_eq!(0xEF, address_space.read_address_u8(0x8500, &ppu_state));

        // Bits other than 0 are ignored
        address_space
            .get_io_registers_mut()
            .write_register(IoRegister::VBK, 0xFE);
        assert_eq!(0xCD, address_space.read_address_u8(0x8500, &ppu_state));
    }

    #[test]
    fn cgb_working_ram_banks() {
        let mut address_space = new_cgb_address_space();
        let ppu_state = PpuState::new(ExecutionMode::GameBoyColor);

        address_space
            .get_io_registers_mut()
            .write_register(IoRegister::SVBK, 0x00);

        address_space.write_address_u8(0xC500, 0xDE, &ppu_state);
        address_space.write_address_u8(0xD500, 0xCF, &ppu_state);
        assert_eq!(0xCF, address_space.read_address_u8(0xD500, &ppu_state));

        // Bank 1 behaves the same as bank 0
        address_space
            .get_io_registers_mut()
            .write_register(IoRegister::SVBK, 0x01);
        assert_eq!(0xCF, address_space.read_address_u8(0xD500, &ppu_state));
        assert_eq!(0xDE, address_space.read_address_u8(0xC500, &ppu_state));

        address_space
            .get_io_registers_mut()
            .write_register(IoRegister::SVBK, 0x04);
        assert_eq!(0x00, address_space.read_address_u8(0xD500, &ppu_state));
        address_space.write_address_u8(0xD500, 0x57, &ppu_state);
        assert_eq!(0x57, address_space.read_address_u8(0xD500, &ppu_state));
        assert_eq!(0x57, address_space.working_ram[0x4500]);

        // Only the low 3 bits of SVBK are used
        address_space
            .get_io_registers_mut()
            .write_register(IoRegister::SVBK, 0xF9);
        assert_eq!(0xCF, address_space.read_address_u8(0xD500, &ppu_state));
        assert_eq!(0xDE, address_space.read_address_u8(0xC500, &ppu_state));
    }

    #[test]
    fn mbc2_nibble_ram_reads() {
        let mut rom = vec![0; 0x40000];
        rom[address::MAPPER as usize] = 0x05;
        let cartridge = Cartridge::new(rom).unwrap();
        let mut address_space = AddressSpace::new(cartridge, None, ExecutionMode::GameBoy);
        let ppu_state = PpuState::new(ExecutionMode::GameBoy);

        address_space.write_address_u8(0x0000, 0x0A, &ppu_state);
        address_space.write_address_u8(0xA005, 0xFC, &ppu_state);

        // Only the low nibble is stored; the high nibble reads back as 1s
        assert_eq!(0xFC, address_space.read_address_u8(0xA005, &ppu_state));
        assert_eq!(0xFC, address_space.read_address_u8(0xA205, &ppu_state));
    }
}
