//! NES console: wires the CPU, PPU, and cartridge mapper into a runnable system.

use log::info;
use nescore_cpu::Cpu;
use nescore_mappers::{Mapper, Rom, RomError, create_mapper};
use thiserror::Error;

use crate::bus::NesBus;
use crate::input::Controller;
use crate::palette;

/// NES emulation timing constants (NTSC).
pub mod timing {
    /// Master clock frequency.
    pub const MASTER_CLOCK_NTSC: u32 = 21_477_272;
    /// CPU clock frequency (master / 12).
    pub const CPU_CLOCK_NTSC: u32 = MASTER_CLOCK_NTSC / 12;
    /// PPU clock frequency (master / 4).
    pub const PPU_CLOCK_NTSC: u32 = MASTER_CLOCK_NTSC / 4;
    /// Nominal CPU cycles per frame (29,780.5, rounded down); `Console::run_frame`
    /// does not rely on this beyond bounding its watchdog.
    pub const CPU_CYCLES_PER_FRAME: u32 = 29_780;
    /// PPU dots per scanline.
    pub const PPU_DOTS_PER_SCANLINE: u16 = 341;
    /// Total scanlines per frame, including VBlank.
    pub const PPU_SCANLINES: u16 = 262;
    /// Target frame rate.
    pub const FRAME_RATE_NTSC: f64 = 60.0988;

    /// Upper bound on CPU cycles a single `run_frame` call may consume before
    /// giving up. A correctly-behaving frame finishes in ~29,781 cycles; this
    /// is generous headroom against a misbehaving ROM that never lets the PPU
    /// reach the end of VBlank (e.g. an infinite loop with rendering disabled).
    pub const FRAME_WATCHDOG_CYCLES: u64 = CPU_CYCLES_PER_FRAME as u64 * 4;
}

/// Errors constructing a [`Console`].
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The ROM image failed to parse, or named an unsupported mapper.
    #[error(transparent)]
    Rom(#[from] RomError),
}

/// NES console emulator: CPU, bus (PPU + mapper + controllers), and framebuffer.
pub struct Console {
    cpu: Cpu,
    bus: NesBus,
    /// Host-facing framebuffer (256x240 RGBA), refreshed each completed frame.
    framebuffer: Vec<u8>,
    total_cycles: u64,
    frame_count: u64,
    running: bool,
}

impl Console {
    /// Parse an iNES/NES 2.0 ROM image and build a console around it.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Rom`] if the ROM is malformed or names a
    /// mapper this core does not implement.
    pub fn new(rom_data: &[u8]) -> Result<Self, ConsoleError> {
        let rom = Rom::load(rom_data)?;
        let mapper = create_mapper(&rom)?;
        Ok(Self::with_mapper(mapper))
    }

    /// Build a console around an already-constructed mapper.
    #[must_use]
    pub fn with_mapper(mapper: Box<dyn Mapper>) -> Self {
        let mut console = Self {
            cpu: Cpu::new(),
            bus: NesBus::new(mapper),
            framebuffer: vec![0; crate::screen::FRAMEBUFFER_SIZE],
            total_cycles: 0,
            frame_count: 0,
            running: true,
        };
        console.reset();
        console
    }

    /// Reset to power-up state: resets the CPU (reading the reset vector
    /// through the bus) and the bus's own components.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        self.total_cycles = 0;
        self.running = true;
        info!(
            "console reset: mapper {} ({})",
            self.bus.mapper_number(),
            self.bus.mapper_name()
        );
    }

    /// Run exactly one CPU step (one instruction, one interrupt sequence, or
    /// one OAM DMA cycle) and catch the PPU up to it.
    ///
    /// Returns the number of CPU cycles consumed.
    pub fn step(&mut self) -> u8 {
        if !self.running {
            return 0;
        }

        let cycles = self.cpu.step(&mut self.bus);
        let frame_complete = self.bus.step_ppu(cycles);
        self.total_cycles += u64::from(cycles);

        if frame_complete {
            self.update_framebuffer();
            self.frame_count += 1;
        }

        cycles
    }

    /// Run until a full frame completes, or until a watchdog cycle budget is
    /// exhausted (guards against a ROM that never reaches VBlank).
    ///
    /// Returns the number of CPU cycles the frame actually took.
    pub fn run_frame(&mut self) -> u64 {
        let start = self.total_cycles;
        let frame_at_start = self.frame_count;

        while self.running && self.frame_count == frame_at_start {
            if self.total_cycles - start > timing::FRAME_WATCHDOG_CYCLES {
                log::warn!(
                    "run_frame watchdog triggered after {} cycles without a completed frame",
                    self.total_cycles - start
                );
                break;
            }
            self.step();
        }

        self.total_cycles - start
    }

    /// Refresh the host-facing RGBA framebuffer from the PPU's palette-index buffer.
    fn update_framebuffer(&mut self) {
        for (i, &index) in self.bus.ppu().frame_buffer().iter().enumerate() {
            let (r, g, b) = palette::palette_to_rgb(index);
            let offset = i * 4;
            self.framebuffer[offset] = r;
            self.framebuffer[offset + 1] = g;
            self.framebuffer[offset + 2] = b;
            self.framebuffer[offset + 3] = 0xFF;
        }
    }

    /// The current framebuffer (256x240 RGBA, refreshed at each completed frame).
    #[must_use]
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    /// Controller port 1.
    pub fn controller1(&mut self) -> &mut Controller {
        self.bus.controller1_mut()
    }

    /// Controller port 2.
    pub fn controller2(&mut self) -> &mut Controller {
        self.bus.controller2_mut()
    }

    /// Total CPU cycles executed since the last reset.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Number of frames completed since the last reset.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Whether the console is currently running (vs. paused).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Pause emulation; `step`/`run_frame` become no-ops until [`Console::resume`].
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Resume emulation after [`Console::pause`].
    pub fn resume(&mut self) {
        self.running = true;
    }

    /// The CPU, for debugging/tracing.
    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// The bus, for debugging/tracing.
    #[must_use]
    pub fn bus(&self) -> &NesBus {
        &self.bus
    }

    /// Read memory without side effects (no PPU register reads, no mapper
    /// state changes). Useful for a debugger/disassembler.
    #[must_use]
    pub fn peek_memory(&self, addr: u16) -> u8 {
        nescore_cpu::Bus::peek(&self.bus, addr)
    }

    /// The cartridge mapper's iNES number.
    #[must_use]
    pub fn mapper_number(&self) -> u16 {
        self.bus.mapper_number()
    }

    /// The cartridge mapper's human-readable name.
    #[must_use]
    pub fn mapper_name(&self) -> &'static str {
        self.bus.mapper_name()
    }

    /// Whether the cartridge has battery-backed PRG-RAM.
    #[must_use]
    pub fn has_battery(&self) -> bool {
        self.bus.has_battery()
    }

    /// Battery-backed RAM contents, for a host to persist between sessions.
    #[must_use]
    pub fn battery_ram(&self) -> Option<Vec<u8>> {
        self.bus.battery_ram()
    }

    /// Restore battery-backed RAM contents from a host-provided save.
    pub fn load_battery_ram(&mut self, data: &[u8]) {
        self.bus.load_battery_ram(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nescore_mappers::{Mirroring, Nrom, Rom, RomHeader};

    fn create_test_rom() -> Rom {
        Rom {
            header: RomHeader {
                prg_rom_size: 32768,
                chr_rom_size: 8192,
                mapper_number: 0,
                submapper: 0,
                mirroring: Mirroring::Vertical,
                has_battery: false,
                has_trainer: false,
                nes2_format: false,
                prg_ram_size: 0,
                prg_nvram_size: 0,
                chr_ram_size: 0,
                chr_nvram_size: 0,
            },
            prg_rom: {
                let mut prg = vec![0xEA; 32768]; // NOP sled
                prg[0x7FFC] = 0x00; // reset vector -> $8000
                prg[0x7FFD] = 0x80;
                prg
            },
            chr_rom: vec![0; 8192],
            trainer: None,
        }
    }

    fn create_test_console() -> Console {
        let rom = create_test_rom();
        Console::with_mapper(Box::new(Nrom::new(&rom).unwrap()))
    }

    #[test]
    fn reports_mapper_identity() {
        let console = create_test_console();
        assert_eq!(console.mapper_number(), 0);
        assert_eq!(console.mapper_name(), "NROM");
    }

    #[test]
    fn step_consumes_cycles() {
        let mut console = create_test_console();
        let cycles = console.step();
        assert!(cycles > 0);
        assert_eq!(console.total_cycles(), u64::from(cycles));
    }

    #[test]
    fn framebuffer_is_screen_sized() {
        let console = create_test_console();
        assert_eq!(console.framebuffer().len(), crate::screen::FRAMEBUFFER_SIZE);
    }

    #[test]
    fn pause_and_resume_gate_stepping() {
        let mut console = create_test_console();
        console.pause();
        assert!(!console.is_running());
        assert_eq!(console.step(), 0);

        console.resume();
        assert!(console.step() > 0);
    }

    #[test]
    fn run_frame_completes_within_watchdog() {
        let mut console = create_test_console();
        let cycles = console.run_frame();
        assert!(cycles > 0);
        assert_eq!(console.frame_count(), 1);
    }

    #[test]
    fn reset_zeroes_cycle_counter() {
        let mut console = create_test_console();
        for _ in 0..100 {
            console.step();
        }
        assert!(console.total_cycles() > 0);

        console.reset();
        assert_eq!(console.total_cycles(), 0);
    }
}
