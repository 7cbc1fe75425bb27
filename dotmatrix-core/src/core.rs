use crate::apu::{self, ApuState};
use crate::config::CoreConfig;
use crate::cpu::{self, CgbSpeedMode, CpuRegisters, ExecutionMode};
use crate::joypad::{self, JoypadState};
use crate::memory::{AddressSpace, Cartridge, CartridgeLoadError};
use crate::ppu::{self, FrameBuffer, PpuState};
use crate::serial::SerialPort;
use crate::serialize::{SaveStateError, SlotReader, SlotWriter};
use crate::timer::{self, TimerCounter};

/// One full frame of emulation at normal speed: 154 scanlines of 456 cycles.
pub const CYCLES_PER_FRAME: u64 = 70224;

// Save-state slot numbers, in payload order
const SLOT_CPU: u8 = 0;
const SLOT_GRAPHICS: u8 = 1;
const SLOT_MEMORY: u8 = 2;
const SLOT_TIMER: u8 = 3;
const SLOT_JOYPAD: u8 = 4;
const SLOT_SERIAL: u8 = 5;
const SLOT_SOUND: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub cycles_ran: u64,
    pub frame_ready: bool,
    pub crashed: bool,
}

/// The whole emulated machine. Every subsystem lives here; there is no
/// global state. The host advances it with `step` and reads the framebuffer
/// and audio queue between calls.
pub struct Core {
    config: CoreConfig,
    execution_mode: ExecutionMode,
    address_space: AddressSpace,
    cpu_registers: CpuRegisters,
    ppu_state: PpuState,
    apu_state: ApuState,
    timer_counter: TimerCounter,
    serial_port: SerialPort,
    joypad_state: JoypadState,
    audio_consumed_marker: u64,
    crashed: bool,
}

impl Core {
    /// Create a core from a cartridge image and an optional boot ROM.
    ///
    /// # Errors
    ///
    /// Returns a `CartridgeLoadError` if the image is too short or names an
    /// unsupported mapper or RAM size.
    pub fn new(
        rom: Vec<u8>,
        boot_rom: Option<Vec<u8>>,
        config: CoreConfig,
    ) -> Result<Self, CartridgeLoadError> {
        let cartridge = Cartridge::new(rom)?;
        let execution_mode = if cartridge.supports_cgb_mode() {
            ExecutionMode::GameBoyColor
        } else {
            ExecutionMode::GameBoy
        };

        log::info!("Running in execution mode {execution_mode:?}");

        let boot_rom = if config.enable_boot_rom { boot_rom } else { None };
        let cpu_registers = if boot_rom.is_some() {
            CpuRegisters::new_at_boot_rom(execution_mode)
        } else {
            CpuRegisters::new(execution_mode)
        };

        Ok(Self {
            execution_mode,
            address_space: AddressSpace::new(cartridge, boot_rom, execution_mode),
            cpu_registers,
            ppu_state: PpuState::new(execution_mode),
            apu_state: ApuState::new(config.tas_sample_rate_hz),
            timer_counter: TimerCounter::new(),
            serial_port: SerialPort::new(),
            joypad_state: JoypadState::new(),
            audio_consumed_marker: 0,
            crashed: false,
            config,
        })
    }

    /// Advance emulation by up to `cycle_budget` cycles.
    ///
    /// Each iteration executes one CPU instruction (or bills idle cycles)
    /// and fans the elapsed count to the timer, PPU, APU, and serial port.
    /// Returns early when the PPU finishes a frame so the host can read the
    /// framebuffer before it is overwritten.
    pub fn step(&mut self, cycle_budget: u64) -> StepOutcome {
        let mut cycles_ran = 0;

        if self.crashed {
            return StepOutcome { cycles_ran, frame_ready: false, crashed: true };
        }

        while cycles_ran < cycle_budget {
            joypad::update_joyp_register(
                self.joypad_state,
                self.address_space.get_io_registers_mut(),
            );

            // Read TMA up front so a TMA write by this instruction reloads
            // with the old value
            let timer_modulo = timer::read_timer_modulo(self.address_space.get_io_registers());

            let cpu_cycles = match cpu::tick_cpu(
                &mut self.address_space,
                &mut self.cpu_registers,
                &self.ppu_state,
            ) {
                Ok(cpu_cycles) => cpu_cycles,
                Err(err) => {
                    log::error!("halting emulation: {err}");
                    self.crashed = true;
                    return StepOutcome { cycles_ran, frame_ready: false, crashed: true };
                }
            };

            timer::update_timer_registers(
                self.address_space.get_io_registers_mut(),
                &mut self.timer_counter,
                timer_modulo,
                u64::from(cpu_cycles),
            );

            // In double speed mode the CPU runs twice as fast relative to
            // everything else; the budget is counted in the PPU's domain
            let machine_cycles = match self.cpu_registers.cgb_speed_mode {
                CgbSpeedMode::Normal => cpu_cycles,
                CgbSpeedMode::Double => cpu_cycles / 2,
            };

            ppu::tick(&mut self.ppu_state, &mut self.address_space, machine_cycles);
            apu::tick(
                &mut self.apu_state,
                self.address_space.get_io_registers_mut(),
                machine_cycles,
            );
            self.serial_port
                .tick(machine_cycles, self.address_space.get_io_registers_mut());

            cycles_ran += u64::from(machine_cycles);

            if self.ppu_state.take_frame_ready() {
                return StepOutcome { cycles_ran, frame_ready: true, crashed: false };
            }
        }

        StepOutcome { cycles_ran, frame_ready: false, crashed: false }
    }

    /// Overwrite the joypad latch. Bits 0-7: up, right, left, down, A, B,
    /// select, start; 1 = pressed.
    pub fn set_joypad(&mut self, byte: u8) {
        self.joypad_state.set_byte(byte);
    }

    /// Read a byte as the CPU would, observing trap semantics and PPU access
    /// gating.
    pub fn read_memory(&self, address: u16) -> u8 {
        self.address_space.read_address_u8(address, &self.ppu_state)
    }

    /// Write a byte as the CPU would, observing trap semantics and PPU
    /// access gating.
    pub fn write_memory(&mut self, address: u16, value: u8) {
        self.address_space.write_address_u8(address, value, &self.ppu_state);
    }

    /// Read a byte bypassing PPU/DMA access gating.
    pub fn read_memory_raw(&self, address: u16) -> u8 {
        self.address_space.read_address_u8_no_access_check(address)
    }

    /// Write a byte bypassing PPU/DMA access gating.
    pub fn write_memory_raw(&mut self, address: u16, value: u8) {
        self.address_space.write_address_u8_no_access_check(address, value);
    }

    /// The most recently completed 160x144 RGB8 frame.
    pub fn frame_buffer(&self) -> &FrameBuffer {
        self.ppu_state.frame_buffer()
    }

    /// The audio queue contents and the current write index. Samples are
    /// interleaved stereo unsigned bytes; the consumer keeps its own read
    /// cursor and wraps at `apu::AUDIO_QUEUE_CAPACITY`.
    pub fn audio_queue(&self) -> (&[u8], usize) {
        let queue = self.apu_state.sample_queue();
        (queue.buffer(), queue.write_index())
    }

    /// Total stereo samples written since power-on.
    pub fn audio_samples_written(&self) -> u64 {
        self.apu_state.sample_queue().total_samples()
    }

    /// Whether enough audio has accumulated since the last
    /// `mark_audio_consumed` to cover `audio_accumulate_max_millis`.
    pub fn audio_threshold_reached(&self) -> bool {
        let threshold_samples = u64::from(self.config.audio_accumulate_max_millis)
            * u64::from(self.config.tas_sample_rate_hz)
            / 1000;
        self.audio_samples_written() - self.audio_consumed_marker >= threshold_samples
    }

    pub fn mark_audio_consumed(&mut self) {
        self.audio_consumed_marker = self.audio_samples_written();
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn crashed(&self) -> bool {
        self.crashed
    }

    /// Cartridge RAM as a contiguous byte range, for host persistence.
    pub fn cartridge_ram(&self) -> &[u8] {
        self.address_space.cartridge().ram()
    }

    /// Import previously persisted cartridge RAM.
    pub fn load_cartridge_ram(&mut self, data: &[u8]) {
        self.address_space.cartridge_mut().load_ram(data);
    }

    /// Whether the mapper's RAM gate is open. The host watches the
    /// enabled -> disabled transition to schedule persistence.
    pub fn cartridge_ram_enabled(&self) -> bool {
        self.address_space.cartridge().is_ram_enabled()
    }

    /// Advance the MBC3 real-time clock from the host wall clock. Never
    /// called from the step loop; determinism is the host's to break.
    pub fn update_rtc(&mut self) {
        self.address_space.cartridge_mut().update_rtc();
    }

    /// Serialize the complete core state into a versioned slot payload.
    pub fn save_state(&self) -> Vec<u8> {
        let mut writer = SlotWriter::new();
        writer.write_slot(&self.cpu_registers);
        writer.write_slot(&self.ppu_state);
        writer.write_slot(&self.address_space);
        writer.write_slot(&self.timer_counter);
        writer.write_slot(&self.joypad_state);
        writer.write_slot(&self.serial_port);
        writer.write_slot(&self.apu_state);
        writer.finish()
    }

    /// Restore core state from a `save_state` payload.
    ///
    /// # Errors
    ///
    /// Returns a `SaveStateError` on bad magic, unknown version, or a
    /// malformed slot; the core is left untouched in every error case.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), SaveStateError> {
        let mut reader = SlotReader::new(bytes)?;

        let cpu_registers: CpuRegisters = reader.read_slot(SLOT_CPU)?;
        let ppu_state: PpuState = reader.read_slot(SLOT_GRAPHICS)?;
        let address_space: AddressSpace = reader.read_slot(SLOT_MEMORY)?;
        let timer_counter: TimerCounter = reader.read_slot(SLOT_TIMER)?;
        let joypad_state: JoypadState = reader.read_slot(SLOT_JOYPAD)?;
        let serial_port: SerialPort = reader.read_slot(SLOT_SERIAL)?;
        let apu_state: ApuState = reader.read_slot(SLOT_SOUND)?;

        // Everything decoded; commit. The ROM and boot ROM are not part of
        // the payload and move over from the live state.
        let old_address_space = std::mem::replace(&mut self.address_space, address_space);
        self.address_space.move_unserializable_fields_from(old_address_space);

        self.cpu_registers = cpu_registers;
        self.ppu_state = ppu_state;
        self.timer_counter = timer_counter;
        self.joypad_state = joypad_state;
        self.serial_port = serial_port;
        self.apu_state = apu_state;
        // The audio queue restarts empty alongside its consumption marker
        self.audio_consumed_marker = 0;
        self.crashed = false;

        Ok(())
    }

    /// Reinitialize from the held ROM, clearing the crashed flag. Cartridge
    /// RAM survives the reset.
    pub fn reset(&mut self) {
        let rom = self.address_space.cartridge().rom_bytes().to_vec();
        let ram = self.address_space.cartridge().ram().to_vec();
        let boot_rom = self.address_space.take_boot_rom();
        let config = self.config.clone();

        *self = Self::new(rom, boot_rom, config)
            .expect("ROM was validated when the core was created");
        self.load_cartridge_ram(&ram);
    }
}
