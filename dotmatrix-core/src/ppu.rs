use crate::cpu::{ExecutionMode, InterruptType};
use crate::memory::ioregisters::{IoRegister, IoRegisters};
use crate::memory::{address, AddressSpace};
use crate::serialize;
use serde::{Deserialize, Serialize};

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

/// 160x144 pixels, 3 bytes (RGB8) each.
pub const FRAME_BUFFER_LEN: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 3;

pub type FrameBuffer = [u8; FRAME_BUFFER_LEN];

const OAM_SCAN_CYCLES: u32 = 80;
// Mode 3 varies per-line on hardware; the fixed minimum is used here
const RENDERING_CYCLES: u32 = 172;
const SCANLINE_CYCLES: u32 = 456;

const TOTAL_LINES: u8 = 154;

const MAX_SPRITES_PER_LINE: usize = 10;
const OAM_SPRITE_COUNT: u16 = 40;

const DMG_SHADES: [[u8; 3]; 4] = [[255, 255, 255], [170, 170, 170], [85, 85, 85], [0, 0, 0]];

// bg_priority bits, consulted during sprite composition
const BG_COLOR_0: u8 = 0x01;
const BG_FORCE_PRIORITY: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PpuMode {
    HBlank,
    VBlank,
    ScanningOam,
    RenderingScanline,
}

impl PpuMode {
    fn stat_bits(self) -> u8 {
        match self {
            Self::HBlank => 0x00,
            Self::VBlank => 0x01,
            Self::ScanningOam => 0x02,
            Self::RenderingScanline => 0x03,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OamDmaStatus {
    source_address: u16,
    current_byte: u16,
}

impl OamDmaStatus {
    fn new(source_high_byte: u8) -> Self {
        Self {
            source_address: u16::from(source_high_byte) << 8,
            current_byte: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct VramDmaStatus {
    source_address: u16,
    dest_address: u16,
    blocks_remaining: u8,
}

#[derive(Serialize, Deserialize)]
pub struct PpuState {
    execution_mode: ExecutionMode,
    mode: PpuMode,
    enabled: bool,
    scanline: u8,
    scanline_cycles: u32,
    window_line_counter: u8,
    frame_ready: bool,
    stat_interrupt_line: bool,
    oam_dma_status: Option<OamDmaStatus>,
    vram_dma_status: Option<VramDmaStatus>,
    #[serde(
        serialize_with = "serialize::serialize_boxed_array",
        deserialize_with = "serialize::deserialize_boxed_array"
    )]
    frame_buffer: Box<FrameBuffer>,
    // Per-pixel flags for the scanline under composition, written during
    // BG/window rendering and read during sprite composition
    #[serde(
        serialize_with = "serialize::serialize_array",
        deserialize_with = "serialize::deserialize_array"
    )]
    bg_priority: [u8; SCREEN_WIDTH],
}

impl PpuState {
    pub fn new(execution_mode: ExecutionMode) -> Self {
        Self {
            execution_mode,
            mode: PpuMode::ScanningOam,
            enabled: true,
            scanline: 0,
            scanline_cycles: 0,
            window_line_counter: 0,
            frame_ready: false,
            stat_interrupt_line: false,
            oam_dma_status: None,
            vram_dma_status: None,
            frame_buffer: Box::new([0; FRAME_BUFFER_LEN]),
            bg_priority: [0; SCREEN_WIDTH],
        }
    }

    pub fn mode(&self) -> PpuMode {
        self.mode
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn ly(&self) -> u8 {
        self.scanline
    }

    pub fn oam_dma_status(&self) -> Option<OamDmaStatus> {
        self.oam_dma_status
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.frame_buffer
    }

    /// Returns whether a completed frame has been latched since the last
    /// call, clearing the latch.
    pub fn take_frame_ready(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    fn set_pixel(&mut self, x: usize, rgb: [u8; 3]) {
        let offset = (usize::from(self.scanline) * SCREEN_WIDTH + x) * 3;
        self.frame_buffer[offset..offset + 3].copy_from_slice(&rgb);
    }
}

/// Advance the PPU by the given number of cycles: progress OAM/VRAM DMA
/// transfers, walk the mode state machine, render scanlines as mode 3
/// completes, and raise V-Blank / STAT interrupts.
pub fn tick(ppu_state: &mut PpuState, address_space: &mut AddressSpace, cycles: u32) {
    if let Some(source) = address_space.get_io_registers_mut().take_oam_dma_request() {
        ppu_state.oam_dma_status = Some(OamDmaStatus::new(source));
    }
    if ppu_state.execution_mode == ExecutionMode::GameBoyColor {
        if let Some(value) = address_space.get_io_registers_mut().take_vram_dma_request() {
            start_vram_dma(ppu_state, address_space, value);
        }
    }

    progress_oam_dma_transfer(ppu_state, address_space, cycles);

    let lcdc = address_space.get_io_registers().read_register(IoRegister::LCDC);
    if lcdc & 0x80 == 0 {
        if ppu_state.enabled {
            // The screen keeps displaying the last frame; LY holds at 0
            ppu_state.enabled = false;
            ppu_state.mode = PpuMode::HBlank;
            ppu_state.scanline = 0;
            ppu_state.scanline_cycles = 0;
            ppu_state.window_line_counter = 0;
            ppu_state.stat_interrupt_line = false;
            address_space.get_io_registers_mut().privileged_set_ly(0);
            write_back_stat(ppu_state, address_space.get_io_registers_mut());
        }
        return;
    }
    if !ppu_state.enabled {
        ppu_state.enabled = true;
        ppu_state.mode = PpuMode::ScanningOam;
        ppu_state.scanline_cycles = 0;
    }

    ppu_state.scanline_cycles += cycles;

    loop {
        let transitioned = match ppu_state.mode {
            PpuMode::ScanningOam => {
                if ppu_state.scanline_cycles >= OAM_SCAN_CYCLES {
                    ppu_state.mode = PpuMode::RenderingScanline;
                    true
                } else {
                    false
                }
            }
            PpuMode::RenderingScanline => {
                if ppu_state.scanline_cycles >= OAM_SCAN_CYCLES + RENDERING_CYCLES {
                    render_scanline(ppu_state, address_space);
                    ppu_state.mode = PpuMode::HBlank;
                    progress_vram_dma_transfer(ppu_state, address_space);
                    true
                } else {
                    false
                }
            }
            PpuMode::HBlank => {
                if ppu_state.scanline_cycles >= SCANLINE_CYCLES {
                    ppu_state.scanline_cycles -= SCANLINE_CYCLES;
                    ppu_state.scanline += 1;

                    if ppu_state.scanline == SCREEN_HEIGHT as u8 {
                        ppu_state.mode = PpuMode::VBlank;
                        ppu_state.frame_ready = true;
                        address_space
                            .get_io_registers_mut()
                            .interrupt_flags()
                            .set(InterruptType::VBlank);
                    } else {
                        ppu_state.mode = PpuMode::ScanningOam;
                    }

                    let scanline = ppu_state.scanline;
                    address_space.get_io_registers_mut().privileged_set_ly(scanline);
                    true
                } else {
                    false
                }
            }
            PpuMode::VBlank => {
                if ppu_state.scanline_cycles >= SCANLINE_CYCLES {
                    ppu_state.scanline_cycles -= SCANLINE_CYCLES;
                    ppu_state.scanline += 1;

                    if ppu_state.scanline == TOTAL_LINES {
                        ppu_state.scanline = 0;
                        ppu_state.window_line_counter = 0;
                        ppu_state.mode = PpuMode::ScanningOam;
                    }

                    let scanline = ppu_state.scanline;
                    address_space.get_io_registers_mut().privileged_set_ly(scanline);
                    true
                } else {
                    false
                }
            }
        };

        update_stat_interrupt(ppu_state, address_space);

        if !transitioned {
            break;
        }
    }
}

fn write_back_stat(ppu_state: &PpuState, io_registers: &mut IoRegisters) {
    let lyc = io_registers.read_register(IoRegister::LYC);
    let coincidence = ppu_state.scanline == lyc;

    let stat = io_registers.read_register(IoRegister::STAT);
    let new_stat = (stat & 0x78) | (u8::from(coincidence) << 2) | ppu_state.mode.stat_bits();
    io_registers.privileged_set_stat(new_stat);
}

// The STAT interrupt fires on the rising edge of the OR of all enabled
// sources, so back-to-back conditions only produce one request.
fn update_stat_interrupt(ppu_state: &mut PpuState, address_space: &mut AddressSpace) {
    let io_registers = address_space.get_io_registers_mut();
    write_back_stat(ppu_state, io_registers);

    let stat = io_registers.read_register(IoRegister::STAT);
    let interrupt_line = (stat & 0x08 != 0 && ppu_state.mode == PpuMode::HBlank)
        || (stat & 0x10 != 0 && ppu_state.mode == PpuMode::VBlank)
        || (stat & 0x20 != 0 && ppu_state.mode == PpuMode::ScanningOam)
        || (stat & 0x40 != 0 && stat & 0x04 != 0);

    if interrupt_line && !ppu_state.stat_interrupt_line {
        io_registers.interrupt_flags().set(InterruptType::LcdStatus);
    }
    ppu_state.stat_interrupt_line = interrupt_line;
}

/// Progress an in-flight OAM DMA transfer: one byte is copied per machine
/// cycle, 160 bytes total. CPU reads outside HRAM return 0xFF while the
/// transfer is active (enforced by the address space).
pub fn progress_oam_dma_transfer(
    ppu_state: &mut PpuState,
    address_space: &mut AddressSpace,
    cycles: u32,
) {
    let Some(mut status) = ppu_state.oam_dma_status else {
        return;
    };

    for _ in 0..cycles / 4 {
        address_space.copy_byte(
            status.source_address + status.current_byte,
            address::OAM_START + status.current_byte,
        );
        status.current_byte += 1;

        if status.current_byte == 160 {
            ppu_state.oam_dma_status = None;
            return;
        }
    }

    ppu_state.oam_dma_status = Some(status);
}

fn start_vram_dma(ppu_state: &mut PpuState, address_space: &mut AddressSpace, hdma5_value: u8) {
    let io_registers = address_space.get_io_registers();
    let source_address = io_registers.vram_dma_source();
    let dest_address = io_registers.vram_dma_destination();
    let blocks = (hdma5_value & 0x7F) + 1;

    if hdma5_value & 0x80 == 0 {
        if let Some(status) = ppu_state.vram_dma_status.take() {
            // A bit-7-clear write while an HBlank transfer is active cancels
            // it rather than starting a general-purpose transfer
            address_space
                .get_io_registers_mut()
                .privileged_set_hdma5(0x80 | (status.blocks_remaining - 1));
            return;
        }

        // General-purpose DMA copies everything immediately
        for offset in 0..u16::from(blocks) * 16 {
            address_space.copy_byte(source_address + offset, dest_address + offset);
        }
        address_space.get_io_registers_mut().privileged_set_hdma5(0xFF);
    } else {
        ppu_state.vram_dma_status = Some(VramDmaStatus {
            source_address,
            dest_address,
            blocks_remaining: blocks,
        });
        address_space.get_io_registers_mut().privileged_set_hdma5(blocks - 1);
    }
}

// Copies one 16-byte block per H-Blank while an HBlank-mode VRAM DMA is
// active.
fn progress_vram_dma_transfer(ppu_state: &mut PpuState, address_space: &mut AddressSpace) {
    let Some(mut status) = ppu_state.vram_dma_status else {
        return;
    };

    for offset in 0..16 {
        address_space.copy_byte(status.source_address + offset, status.dest_address + offset);
    }
    status.source_address += 16;
    status.dest_address += 16;
    status.blocks_remaining -= 1;

    let io_registers = address_space.get_io_registers_mut();
    if status.blocks_remaining == 0 {
        ppu_state.vram_dma_status = None;
        io_registers.privileged_set_hdma5(0xFF);
    } else {
        io_registers.privileged_set_hdma5(status.blocks_remaining - 1);
        ppu_state.vram_dma_status = Some(status);
    }
}

fn render_scanline(ppu_state: &mut PpuState, address_space: &AddressSpace) {
    if usize::from(ppu_state.scanline) >= SCREEN_HEIGHT {
        return;
    }

    let lcdc = address_space.get_io_registers().read_register(IoRegister::LCDC);

    // Until BG/window rendering says otherwise, every pixel composites like
    // BG color 0 (transparent to sprites)
    ppu_state.bg_priority.fill(BG_COLOR_0);

    // On DMG, LCDC bit 0 blanks the background and window entirely; on CGB
    // it only demotes BG priority during sprite composition
    let bg_enabled =
        ppu_state.execution_mode == ExecutionMode::GameBoyColor || lcdc & 0x01 != 0;

    if bg_enabled {
        render_background(ppu_state, address_space, lcdc);

        if lcdc & 0x20 != 0 {
            render_window(ppu_state, address_space, lcdc);
        }
    } else {
        for x in 0..SCREEN_WIDTH {
            ppu_state.set_pixel(x, DMG_SHADES[0]);
        }
    }

    if lcdc & 0x02 != 0 {
        render_sprites(ppu_state, address_space, lcdc);
    }
}

// Resolve the address of a tile row's first byte given the LCDC tile data
// select bit (unsigned indexing at 0x8000, signed at 0x8800).
fn tile_row_address(lcdc: u8, tile_index: u8, tile_row: u16) -> u16 {
    if lcdc & 0x10 != 0 {
        0x8000 + u16::from(tile_index) * 16 + tile_row * 2
    } else {
        let signed_index = i32::from(tile_index as i8);
        (0x9000 + signed_index * 16 + i32::from(tile_row) * 2) as u16
    }
}

fn resolve_dmg_color(palette: u8, color_id: u8) -> [u8; 3] {
    DMG_SHADES[usize::from((palette >> (color_id * 2)) & 0x03)]
}

/// Expand a 15-bit BGR555 palette entry to 24-bit RGB.
fn resolve_cgb_color(low_byte: u8, high_byte: u8) -> [u8; 3] {
    let raw = u16::from_le_bytes([low_byte, high_byte]);
    let r = (raw & 0x001F) as u8;
    let g = ((raw >> 5) & 0x001F) as u8;
    let b = ((raw >> 10) & 0x001F) as u8;

    [(r << 3) | (r >> 2), (g << 3) | (g >> 2), (b << 3) | (b >> 2)]
}

fn render_background(ppu_state: &mut PpuState, address_space: &AddressSpace, lcdc: u8) {
    let io_registers = address_space.get_io_registers();
    let scy = io_registers.read_register(IoRegister::SCY);
    let scx = io_registers.read_register(IoRegister::SCX);
    let bgp = io_registers.read_register(IoRegister::BGP);

    let tile_map_base: u16 = if lcdc & 0x08 != 0 { 0x9C00 } else { 0x9800 };

    let y = ppu_state.scanline.wrapping_add(scy);
    let tile_row = u16::from(y / 8);
    let pixel_row = u16::from(y % 8);

    for screen_x in 0..SCREEN_WIDTH {
        let x = (screen_x as u8).wrapping_add(scx);
        let tile_map_addr = tile_map_base + tile_row * 32 + u16::from(x / 8);
        let tile_index = address_space.read_vram_direct(tile_map_addr, 0);

        match ppu_state.execution_mode {
            ExecutionMode::GameBoy => {
                let tile_addr = tile_row_address(lcdc, tile_index, pixel_row);
                let low = address_space.read_vram_direct(tile_addr, 0);
                let high = address_space.read_vram_direct(tile_addr + 1, 0);

                let bit = 7 - (x % 8);
                let color_id = (((high >> bit) & 1) << 1) | ((low >> bit) & 1);

                ppu_state.set_pixel(screen_x, resolve_dmg_color(bgp, color_id));
                ppu_state.bg_priority[screen_x] = u8::from(color_id == 0);
            }
            ExecutionMode::GameBoyColor => {
                let attributes = address_space.read_vram_direct(tile_map_addr, 1);
                let palette = usize::from(attributes & 0x07);
                let tile_bank = usize::from((attributes >> 3) & 1);
                let x_flip = attributes & 0x20 != 0;
                let y_flip = attributes & 0x40 != 0;
                let force_priority = attributes & 0x80 != 0;

                let row = if y_flip { 7 - pixel_row } else { pixel_row };
                let tile_addr = tile_row_address(lcdc, tile_index, row);
                let low = address_space.read_vram_direct(tile_addr, tile_bank);
                let high = address_space.read_vram_direct(tile_addr + 1, tile_bank);

                let bit = if x_flip { x % 8 } else { 7 - (x % 8) };
                let color_id = (((high >> bit) & 1) << 1) | ((low >> bit) & 1);

                let (low_byte, high_byte) =
                    io_registers.read_bg_palette(palette, usize::from(color_id));
                ppu_state.set_pixel(screen_x, resolve_cgb_color(low_byte, high_byte));
                ppu_state.bg_priority[screen_x] =
                    u8::from(color_id == 0) | (u8::from(force_priority) << 1);
            }
        }
    }
}

fn render_window(ppu_state: &mut PpuState, address_space: &AddressSpace, lcdc: u8) {
    let io_registers = address_space.get_io_registers();
    let wy = io_registers.read_register(IoRegister::WY);
    let wx = i16::from(io_registers.read_register(IoRegister::WX)) - 7;
    let bgp = io_registers.read_register(IoRegister::BGP);

    if ppu_state.scanline < wy || wx >= SCREEN_WIDTH as i16 {
        return;
    }

    let tile_map_base: u16 = if lcdc & 0x40 != 0 { 0x9C00 } else { 0x9800 };

    let window_y = ppu_state.window_line_counter;
    let tile_row = u16::from(window_y / 8);
    let pixel_row = u16::from(window_y % 8);
    let start_x = wx.max(0) as usize;

    for screen_x in start_x..SCREEN_WIDTH {
        let window_x = (screen_x as i16 - wx) as u16;
        let tile_map_addr = tile_map_base + tile_row * 32 + window_x / 8;
        let tile_index = address_space.read_vram_direct(tile_map_addr, 0);

        match ppu_state.execution_mode {
            ExecutionMode::GameBoy => {
                let tile_addr = tile_row_address(lcdc, tile_index, pixel_row);
                let low = address_space.read_vram_direct(tile_addr, 0);
                let high = address_space.read_vram_direct(tile_addr + 1, 0);

                let bit = 7 - (window_x % 8) as u8;
                let color_id = (((high >> bit) & 1) << 1) | ((low >> bit) & 1);

                ppu_state.set_pixel(screen_x, resolve_dmg_color(bgp, color_id));
                ppu_state.bg_priority[screen_x] = u8::from(color_id == 0);
            }
            ExecutionMode::GameBoyColor => {
                let attributes = address_space.read_vram_direct(tile_map_addr, 1);
                let palette = usize::from(attributes & 0x07);
                let tile_bank = usize::from((attributes >> 3) & 1);
                let x_flip = attributes & 0x20 != 0;
                let y_flip = attributes & 0x40 != 0;
                let force_priority = attributes & 0x80 != 0;

                let row = if y_flip { 7 - pixel_row } else { pixel_row };
                let tile_addr = tile_row_address(lcdc, tile_index, row);
                let low = address_space.read_vram_direct(tile_addr, tile_bank);
                let high = address_space.read_vram_direct(tile_addr + 1, tile_bank);

                let bit = if x_flip {
                    (window_x % 8) as u8
                } else {
                    7 - (window_x % 8) as u8
                };
                let color_id = (((high >> bit) & 1) << 1) | ((low >> bit) & 1);

                let (low_byte, high_byte) =
                    io_registers.read_bg_palette(palette, usize::from(color_id));
                ppu_state.set_pixel(screen_x, resolve_cgb_color(low_byte, high_byte));
                ppu_state.bg_priority[screen_x] =
                    u8::from(color_id == 0) | (u8::from(force_priority) << 1);
            }
        }
    }

    // The window line counter only advances on scanlines where the window
    // actually drew
    ppu_state.window_line_counter += 1;
}

#[derive(Debug, Clone, Copy, Default)]
struct SpriteAttributes {
    x: u8,
    screen_y: i16,
    tile_index: u8,
    flags: u8,
}

fn render_sprites(ppu_state: &mut PpuState, address_space: &AddressSpace, lcdc: u8) {
    let io_registers = address_space.get_io_registers();
    let obp0 = io_registers.read_register(IoRegister::OBP0);
    let obp1 = io_registers.read_register(IoRegister::OBP1);

    let sprite_height: i16 = if lcdc & 0x04 != 0 { 16 } else { 8 };
    let line = i16::from(ppu_state.scanline);

    // Scan OAM in index order for the first 10 sprites intersecting this line
    let mut sprites = [SpriteAttributes::default(); MAX_SPRITES_PER_LINE];
    let mut sprite_count = 0;
    for oam_index in 0..OAM_SPRITE_COUNT {
        let oam_addr = address::OAM_START + oam_index * 4;
        let screen_y = i16::from(address_space.ppu_read_address_u8(oam_addr)) - 16;
        if line >= screen_y && line < screen_y + sprite_height {
            sprites[sprite_count] = SpriteAttributes {
                x: address_space.ppu_read_address_u8(oam_addr + 1),
                screen_y,
                tile_index: address_space.ppu_read_address_u8(oam_addr + 2),
                flags: address_space.ppu_read_address_u8(oam_addr + 3),
            };
            sprite_count += 1;
            if sprite_count == MAX_SPRITES_PER_LINE {
                break;
            }
        }
    }
    let sprites = &mut sprites[..sprite_count];

    // DMG priority: lowest X first, OAM index breaking ties (the stable sort
    // preserves scan order). CGB priority: OAM index only.
    if ppu_state.execution_mode == ExecutionMode::GameBoy {
        sprites.sort_by_key(|sprite| sprite.x);
    }

    // Composite lowest priority to highest so higher-priority sprites
    // overwrite
    for sprite in sprites.iter().rev() {
        let flip_x = sprite.flags & 0x20 != 0;
        let flip_y = sprite.flags & 0x40 != 0;
        let behind_bg = sprite.flags & 0x80 != 0;

        let mut sprite_row = line - sprite.screen_y;
        if flip_y {
            sprite_row = sprite_height - 1 - sprite_row;
        }

        let mut tile_index = sprite.tile_index;
        if sprite_height == 16 {
            tile_index &= 0xFE;
            if sprite_row >= 8 {
                tile_index += 1;
                sprite_row -= 8;
            }
        }

        let tile_bank = match ppu_state.execution_mode {
            ExecutionMode::GameBoy => 0,
            ExecutionMode::GameBoyColor => usize::from((sprite.flags >> 3) & 1),
        };
        let tile_addr = 0x8000 + u16::from(tile_index) * 16 + sprite_row as u16 * 2;
        let low = address_space.read_vram_direct(tile_addr, tile_bank);
        let high = address_space.read_vram_direct(tile_addr + 1, tile_bank);

        for pixel in 0..8_i16 {
            let screen_x = i16::from(sprite.x) - 8 + pixel;
            if !(0..SCREEN_WIDTH as i16).contains(&screen_x) {
                continue;
            }
            let screen_x = screen_x as usize;

            let bit = if flip_x { pixel as u8 } else { 7 - pixel as u8 };
            let color_id = (((high >> bit) & 1) << 1) | ((low >> bit) & 1);

            // Color 0 is transparent for sprites
            if color_id == 0 {
                continue;
            }

            let bg_info = ppu_state.bg_priority[screen_x];
            let visible = match ppu_state.execution_mode {
                ExecutionMode::GameBoy => !behind_bg || bg_info & BG_COLOR_0 != 0,
                ExecutionMode::GameBoyColor => {
                    if lcdc & 0x01 == 0 {
                        // Master priority cleared: sprites always win
                        true
                    } else if bg_info & BG_FORCE_PRIORITY != 0 || behind_bg {
                        bg_info & BG_COLOR_0 != 0
                    } else {
                        true
                    }
                }
            };
            if !visible {
                continue;
            }

            let rgb = match ppu_state.execution_mode {
                ExecutionMode::GameBoy => {
                    let palette = if sprite.flags & 0x10 != 0 { obp1 } else { obp0 };
                    resolve_dmg_color(palette, color_id)
                }
                ExecutionMode::GameBoyColor => {
                    let palette = usize::from(sprite.flags & 0x07);
                    let (low_byte, high_byte) =
                        io_registers.read_obj_palette(palette, usize::from(color_id));
                    resolve_cgb_color(low_byte, high_byte)
                }
            };
            ppu_state.set_pixel(screen_x, rgb);
        }
    }
}
