//! Mapper 0 (NROM): fixed PRG/CHR banking, no registers.

use crate::mapper::{Mapper, Mirroring};
use crate::rom::{Rom, RomError};

/// NROM cartridge: 16 KiB or 32 KiB of fixed PRG-ROM, 8 KiB of fixed CHR
/// (ROM or RAM), fixed mirroring.
#[derive(Debug, Clone)]
pub struct Nrom {
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
    chr_ram: Vec<u8>,
    has_chr_ram: bool,
    mirroring: Mirroring,
    prg_16k_mirror: bool,
}

impl Nrom {
    /// Build an NROM mapper from a parsed ROM image.
    ///
    /// # Errors
    ///
    /// Returns [`RomError::InvalidPrgSize`] or [`RomError::InvalidChrSize`]
    /// if the cartridge's PRG/CHR sizes are not one NROM actually supports
    /// (16 KiB or 32 KiB PRG, 0 or 8 KiB CHR).
    pub fn new(rom: &Rom) -> Result<Self, RomError> {
        let prg_len = rom.prg_rom.len();
        if prg_len != 16 * 1024 && prg_len != 32 * 1024 {
            return Err(RomError::InvalidPrgSize(format!(
                "NROM requires 16KiB or 32KiB PRG-ROM, got {prg_len} bytes"
            )));
        }
        let has_chr_ram = rom.chr_rom.is_empty();
        if !has_chr_ram && rom.chr_rom.len() != 8 * 1024 {
            return Err(RomError::InvalidChrSize(format!(
                "NROM requires 8KiB CHR-ROM or CHR-RAM, got {} bytes",
                rom.chr_rom.len()
            )));
        }

        Ok(Self {
            prg_rom: rom.prg_rom.clone(),
            chr_rom: rom.chr_rom.clone(),
            chr_ram: if has_chr_ram { vec![0; 8 * 1024] } else { Vec::new() },
            has_chr_ram,
            mirroring: rom.header.mirroring,
            prg_16k_mirror: prg_len == 16 * 1024,
        })
    }
}

impl Mapper for Nrom {
    fn cpu_read(&self, addr: u16) -> u8 {
        match addr {
            0x8000..=0xFFFF => {
                let mut offset = (addr - 0x8000) as usize;
                if self.prg_16k_mirror {
                    offset &= 0x3FFF;
                }
                self.prg_rom[offset]
            }
            _ => 0,
        }
    }

    fn cpu_write(&mut self, _addr: u16, _value: u8) {
        // NROM has no PRG-RAM and no registers; writes are discarded.
    }

    fn chr_read(&self, addr: u16) -> u8 {
        if self.has_chr_ram {
            self.chr_ram[addr as usize & 0x1FFF]
        } else {
            self.chr_rom[addr as usize & 0x1FFF]
        }
    }

    fn chr_write(&mut self, addr: u16, value: u8) {
        if self.has_chr_ram {
            self.chr_ram[addr as usize & 0x1FFF] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_number(&self) -> u16 {
        0
    }

    fn mapper_name(&self) -> &'static str {
        "NROM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::RomHeader;

    fn test_rom(prg_len: usize, chr_len: usize) -> Rom {
        Rom {
            header: RomHeader::parse(&{
                let mut h = vec![0x4E, 0x45, 0x53, 0x1A];
                h.push((prg_len / 16384) as u8);
                h.push((chr_len / 8192) as u8);
                h.extend_from_slice(&[0; 10]);
                h
            })
            .unwrap(),
            trainer: None,
            prg_rom: vec![0xEA; prg_len],
            chr_rom: vec![0; chr_len],
        }
    }

    #[test]
    fn sixteen_k_prg_mirrors_into_upper_half() {
        let mut rom = test_rom(16384, 8192);
        rom.prg_rom[0] = 0x42;
        let nrom = Nrom::new(&rom).unwrap();
        assert_eq!(nrom.cpu_read(0x8000), 0x42);
        assert_eq!(nrom.cpu_read(0xC000), 0x42);
    }

    #[test]
    fn rejects_unsupported_prg_size() {
        let rom = test_rom(1024, 8192);
        assert!(matches!(Nrom::new(&rom), Err(RomError::InvalidPrgSize(_))));
    }

    #[test]
    fn chr_ram_is_writable_when_cartridge_has_no_chr_rom() {
        let rom = test_rom(16384, 0);
        let mut nrom = Nrom::new(&rom).unwrap();
        nrom.chr_write(0x0010, 0x99);
        assert_eq!(nrom.chr_read(0x0010), 0x99);
    }

    #[test]
    fn chr_rom_writes_are_discarded() {
        let rom = test_rom(16384, 8192);
        let mut nrom = Nrom::new(&rom).unwrap();
        nrom.chr_write(0x0000, 0x99);
        assert_eq!(nrom.chr_read(0x0000), 0);
    }
}
