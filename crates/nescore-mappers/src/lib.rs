//! NES cartridge mapper implementations.
//!
//! This crate loads iNES/NES 2.0 ROM images and provides the mapper
//! implementations that back them. A mapper owns PRG-ROM, CHR-ROM/RAM,
//! and any banking/IRQ hardware on the cartridge; the console's bus
//! dispatches all `$6000..=$FFFF` CPU accesses and all `$0000..=$1FFF`
//! PPU pattern-table accesses through it.
//!
//! # Supported mappers
//!
//! | Mapper | Name | Description |
//! |--------|------|-------------|
//! | 0 | NROM | No banking, simplest mapper |
//! | 4 | MMC3 | Fine-grained PRG/CHR banking plus a scanline IRQ |
//!
//! Every other mapper number is a loader error: [`RomError::UnsupportedMapper`].
//!
//! # Example
//!
//! ```no_run
//! use nescore_mappers::{Rom, create_mapper};
//!
//! let rom_data = std::fs::read("game.nes").expect("failed to read ROM");
//! let rom = Rom::load(&rom_data).expect("failed to parse ROM");
//! let mapper = create_mapper(&rom).expect("unsupported mapper");
//! println!("mapper: {} ({})", mapper.mapper_name(), mapper.mapper_number());
//! ```

pub mod mapper;
pub mod rom;

mod mmc3;
mod nrom;

pub use mapper::{Mapper, Mirroring};
pub use mmc3::Mmc3;
pub use nrom::Nrom;
pub use rom::{Rom, RomError, RomHeader};

/// Build the mapper named by a ROM's header.
///
/// # Errors
///
/// Returns [`RomError::UnsupportedMapper`] if the header names a mapper
/// number this crate does not implement, or a mapper-specific size error
/// if the cartridge's PRG/CHR layout does not fit that mapper.
pub fn create_mapper(rom: &Rom) -> Result<Box<dyn Mapper>, RomError> {
    match rom.header.mapper_number {
        0 => Ok(Box::new(Nrom::new(rom)?)),
        4 => Ok(Box::new(Mmc3::new(rom)?)),
        n => Err(RomError::UnsupportedMapper(n)),
    }
}

/// Mapper numbers this crate can load.
#[must_use]
pub fn supported_mappers() -> &'static [u16] {
    &[0, 4]
}

/// Whether a mapper number is supported.
#[must_use]
pub fn is_mapper_supported(mapper: u16) -> bool {
    supported_mappers().contains(&mapper)
}

/// Human-readable name for a supported mapper number.
#[must_use]
pub fn mapper_name(mapper: u16) -> Option<&'static str> {
    match mapper {
        0 => Some("NROM"),
        4 => Some("MMC3"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rom(mapper: u16, prg_len: usize, chr_len: usize) -> Rom {
        let mut h = vec![0x4E, 0x45, 0x53, 0x1A];
        h.push((prg_len / 16384) as u8);
        h.push((chr_len / 8192) as u8);
        h.push(((mapper & 0x0F) as u8) << 4);
        h.push((mapper & 0xF0) as u8);
        h.extend_from_slice(&[0; 8]);
        Rom {
            header: RomHeader::parse(&h).unwrap(),
            trainer: None,
            prg_rom: vec![0; prg_len],
            chr_rom: vec![0; chr_len],
        }
    }

    #[test]
    fn creates_nrom_for_mapper_zero() {
        let rom = test_rom(0, 32768, 8192);
        let mapper = create_mapper(&rom).unwrap();
        assert_eq!(mapper.mapper_number(), 0);
        assert_eq!(mapper.mapper_name(), "NROM");
    }

    #[test]
    fn creates_mmc3_for_mapper_four() {
        let rom = test_rom(4, 32768, 8192);
        let mapper = create_mapper(&rom).unwrap();
        assert_eq!(mapper.mapper_number(), 4);
        assert_eq!(mapper.mapper_name(), "MMC3");
    }

    #[test]
    fn rejects_unsupported_mapper_numbers() {
        let rom = test_rom(1, 32768, 8192);
        assert!(matches!(create_mapper(&rom), Err(RomError::UnsupportedMapper(1))));
    }

    #[test]
    fn supported_mappers_lists_exactly_nrom_and_mmc3() {
        assert_eq!(supported_mappers(), &[0, 4]);
        assert!(is_mapper_supported(0));
        assert!(is_mapper_supported(4));
        assert!(!is_mapper_supported(1));
        assert!(!is_mapper_supported(2));
    }

    #[test]
    fn mapper_name_covers_supported_mappers_only() {
        assert_eq!(mapper_name(0), Some("NROM"));
        assert_eq!(mapper_name(4), Some("MMC3"));
        assert_eq!(mapper_name(1), None);
    }
}
