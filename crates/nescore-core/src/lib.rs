//! NES emulation core: wires the CPU, PPU, and cartridge mappers into a console.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Console                              │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │                      NesBus                          │   │
//! │  │  ┌─────┐  ┌─────┐  ┌────────┐  ┌──────────────────┐ │   │
//! │  │  │ RAM │  │ PPU │  │ Mapper │  │ Controller 1 & 2  │ │   │
//! │  │  │ 2KB │  │     │  │        │  │                   │ │   │
//! │  │  └─────┘  └─────┘  └────────┘  └──────────────────┘ │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                          ▲                                  │
//! │                     ┌────┴────┐                             │
//! │                     │   CPU   │                             │
//! │                     │  6502   │                             │
//! │                     └─────────┘                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use nescore_core::{Console, Button};
//!
//! let rom_data = std::fs::read("game.nes").expect("failed to read ROM");
//! let mut console = Console::new(&rom_data).expect("failed to create console");
//!
//! loop {
//!     console.controller1().set_button(Button::A, true);
//!     console.controller1().set_button(Button::Start, true);
//!
//!     console.run_frame();
//!
//!     let _framebuffer = console.framebuffer();
//! }
//! ```

mod bus;
mod console;
pub mod input;
pub mod palette;

pub use bus::NesBus;
pub use console::{Console, ConsoleError, timing};
pub use input::{Button, Controller};

// Re-export commonly used types from dependencies.
pub use nescore_cpu::Cpu;
pub use nescore_mappers::{Mapper, Mirroring, Rom, RomError, RomHeader, create_mapper};
pub use nescore_ppu::Ppu;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// NES screen dimensions.
pub mod screen {
    /// Screen width in pixels.
    pub const WIDTH: u32 = 256;
    /// Screen height in pixels.
    pub const HEIGHT: u32 = 240;
    /// Total pixels per frame.
    pub const PIXELS: u32 = WIDTH * HEIGHT;
    /// Bytes per frame (RGBA).
    pub const FRAMEBUFFER_SIZE: usize = (PIXELS * 4) as usize;
}
