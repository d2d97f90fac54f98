//! MOS 6502 CPU core for the NES.
//!
//! This crate implements a cycle-counting interpreter for the 6502 as wired
//! into the NES: full official opcode set, page-crossing penalties, and the
//! NMI/IRQ/RESET/BRK interrupt sequence. It does not know about PPU, APU, or
//! cartridge memory directly — all of that is reached through the [`Bus`]
//! trait, so this crate can be tested with a flat RAM image and reused
//! unmodified by the full console.
//!
//! ```text
//! ┌─────────────┐        ┌──────────────┐
//! │     Cpu      │◄──────►│  impl Bus    │
//! │ (this crate) │        │ (NES system) │
//! └─────────────┘        └──────────────┘
//! ```

mod bus;
mod cpu;
mod opcodes;
mod status;

pub use bus::Bus;
pub use cpu::{Cpu, Interrupt};
pub use status::Status;

/// CPU-visible error conditions.
///
/// The core never raises these during normal execution (unknown opcodes are
/// a defined no-op per design, not a fault); the type exists so a host can
/// report genuinely impossible states without inventing its own taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CpuError {
    /// An opcode byte had no defined handler (diagnostic only; the CPU
    /// treats this as a 2-cycle NOP rather than actually raising it).
    #[error("invalid opcode {0:#04x} at {1:#06x}")]
    InvalidOpcode(u8, u16),
}

/// Hardware interrupt vector addresses.
pub mod vectors {
    /// Non-maskable interrupt vector.
    pub const NMI: u16 = 0xFFFA;
    /// Reset vector.
    pub const RESET: u16 = 0xFFFC;
    /// Maskable interrupt / BRK vector.
    pub const IRQ: u16 = 0xFFFE;
}
