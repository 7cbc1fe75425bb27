use clap::Parser;
use dotmatrix_core::{Core, CoreConfig, CYCLES_PER_FRAME, SCREEN_HEIGHT, SCREEN_WIDTH};
use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Headless driver: run a ROM for a fixed number of frames and optionally
/// dump the final frame and cartridge RAM to disk.
#[derive(Parser)]
struct Cli {
    /// Path to the cartridge ROM image
    #[arg(short = 'f', long = "rom-file-path")]
    rom_file_path: PathBuf,
    /// Number of frames to emulate
    #[arg(short = 'n', long = "frames", default_value_t = 60)]
    frames: u32,
    /// Optional boot ROM image to execute before the cartridge
    #[arg(long = "boot-rom")]
    boot_rom_path: Option<PathBuf>,
    /// Write the final frame as a binary PPM image to this path
    #[arg(short = 'o', long = "frame-out")]
    frame_out: Option<PathBuf>,
    /// Load cartridge RAM from this file before starting, and write it back
    /// after the run
    #[arg(short = 's', long = "sav-file")]
    sav_file: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = Cli::parse();

    let rom = fs::read(&args.rom_file_path)?;
    let boot_rom = args.boot_rom_path.as_ref().map(fs::read).transpose()?;

    let config = CoreConfig {
        enable_boot_rom: boot_rom.is_some(),
        ..CoreConfig::default()
    };
    let mut core = Core::new(rom, boot_rom, config)?;

    if let Some(sav_file) = &args.sav_file {
        if let Ok(ram) = fs::read(sav_file) {
            log::info!("Loaded {} bytes of cartridge RAM from {}", ram.len(), sav_file.display());
            core.load_cartridge_ram(&ram);
        }
    }

    let mut frames_rendered = 0;
    while frames_rendered < args.frames {
        let outcome = core.step(CYCLES_PER_FRAME);
        if outcome.crashed {
            log::error!("core crashed after {frames_rendered} frames");
            break;
        }
        if outcome.frame_ready {
            frames_rendered += 1;
        }
    }

    log::info!(
        "Emulated {frames_rendered} frames, {} audio samples",
        core.audio_samples_written()
    );

    if let Some(frame_out) = &args.frame_out {
        write_ppm(&mut fs::File::create(frame_out)?, core.frame_buffer())?;
        log::info!("Wrote final frame to {}", frame_out.display());
    }

    if let Some(sav_file) = &args.sav_file {
        if !core.cartridge_ram().is_empty() {
            fs::write(sav_file, core.cartridge_ram())?;
            log::info!("Wrote cartridge RAM to {}", sav_file.display());
        }
    }

    Ok(())
}

fn write_ppm<W: Write>(writer: &mut W, frame_buffer: &[u8]) -> std::io::Result<()> {
    writeln!(writer, "P6")?;
    writeln!(writer, "{SCREEN_WIDTH} {SCREEN_HEIGHT}")?;
    writeln!(writer, "255")?;
    writer.write_all(frame_buffer)
}
