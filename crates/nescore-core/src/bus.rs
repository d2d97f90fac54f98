//! NES system bus implementation.
//!
//! The bus connects the CPU to all other components:
//! - PPU registers ($2000-$2007, mirrored every 8 bytes to $3FFF)
//! - Controller ports ($4016-$4017)
//! - APU/IO registers ($4000-$4015, $4017 write) - stubbed, audio is out of scope
//! - Cartridge space ($4020-$FFFF, PPU CHR space $0000-$1FFF)
//! - Internal RAM ($0000-$07FF, mirrored to $1FFF)

use std::cell::RefCell;

use log::trace;
use nescore_cpu::Bus;
use nescore_mappers::Mapper;
use nescore_ppu::Ppu;

use crate::input::Controller;

/// NES system bus connecting the CPU to RAM, PPU, controllers, and the cartridge mapper.
///
/// The cartridge mapper is wrapped in a [`RefCell`] so that the PPU's CHR
/// read closure - which the PPU's `step_with_chr` requires to be `Fn`, not
/// `FnMut` - can still drive the mapper's `on_ppu_addr` edge detector (MMC3's
/// scanline IRQ) through a shared reference.
pub struct NesBus {
    /// Internal RAM (2KB, mirrored 4 times up to $1FFF).
    ram: [u8; 2048],
    /// Picture Processing Unit. Owns its own nametable/palette VRAM.
    ppu: Ppu,
    /// Cartridge mapper: owns PRG/CHR memory and any onboard banking/IRQ hardware.
    mapper: RefCell<Box<dyn Mapper>>,
    /// Controller port 1 ($4016).
    controller1: Controller,
    /// Controller port 2 ($4017).
    controller2: Controller,
    /// Pending OAM DMA source page, latched by a write to $4014.
    oam_dma_page: Option<u8>,
    /// Edge-latched NMI line raised by the PPU at the start of VBlank.
    nmi_line: bool,
    /// Last byte placed on the bus, for open-bus reads of write-only/unimplemented registers.
    open_bus: u8,
}

impl NesBus {
    /// Build a bus around a cartridge mapper. The PPU starts with the
    /// mapper's nametable mirroring mode.
    #[must_use]
    pub fn new(mapper: Box<dyn Mapper>) -> Self {
        let mirroring = mapper.mirroring();
        Self {
            ram: [0; 2048],
            ppu: Ppu::new(mirroring),
            mapper: RefCell::new(mapper),
            controller1: Controller::new(),
            controller2: Controller::new(),
            oam_dma_page: None,
            nmi_line: false,
            open_bus: 0,
        }
    }

    /// Reset the bus and every component it owns.
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.ppu.reset();
        self.controller1.reset();
        self.controller2.reset();
        self.oam_dma_page = None;
        self.nmi_line = false;
        self.open_bus = 0;
    }

    /// Step the PPU 3 dots per CPU cycle for `cpu_cycles` CPU cycles.
    ///
    /// Returns `true` if a full frame completed during this span.
    pub fn step_ppu(&mut self, cpu_cycles: u8) -> bool {
        let mapper = &self.mapper;
        let mut frame_complete = false;

        for _ in 0..(u32::from(cpu_cycles) * 3) {
            let (complete, nmi) = self.ppu.step_with_chr(|addr| {
                let mut mapper = mapper.borrow_mut();
                mapper.on_ppu_addr(addr);
                mapper.chr_read(addr)
            });
            frame_complete |= complete;
            self.nmi_line |= nmi;
        }

        frame_complete
    }

    /// The PPU, for framebuffer access and debugging.
    #[must_use]
    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    /// Controller port 1, for host input plumbing.
    pub fn controller1_mut(&mut self) -> &mut Controller {
        &mut self.controller1
    }

    /// Controller port 2, for host input plumbing.
    pub fn controller2_mut(&mut self) -> &mut Controller {
        &mut self.controller2
    }

    /// The cartridge mapper's iNES number, for diagnostics.
    #[must_use]
    pub fn mapper_number(&self) -> u16 {
        self.mapper.borrow().mapper_number()
    }

    /// The cartridge mapper's human-readable name, for diagnostics.
    #[must_use]
    pub fn mapper_name(&self) -> &'static str {
        self.mapper.borrow().mapper_name()
    }

    /// Whether the cartridge carries battery-backed PRG-RAM.
    #[must_use]
    pub fn has_battery(&self) -> bool {
        self.mapper.borrow().has_battery()
    }

    /// Battery-backed RAM contents, for a host to persist between sessions.
    #[must_use]
    pub fn battery_ram(&self) -> Option<Vec<u8>> {
        self.mapper.borrow().battery_ram().map(<[u8]>::to_vec)
    }

    /// Restore battery-backed RAM contents from a host-provided save.
    pub fn load_battery_ram(&mut self, data: &[u8]) {
        self.mapper.borrow_mut().set_battery_ram(data);
    }

    /// Sync the PPU's mirroring mode with whatever the mapper currently reports.
    ///
    /// MMC3 can change nametable mirroring at runtime via a cartridge
    /// register write, so this is called after every write the mapper handles.
    fn sync_mirroring(&mut self) {
        let mirroring = self.mapper.borrow().mirroring();
        self.ppu.set_mirroring(mirroring);
    }
}

impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],

            0x2000..=0x3FFF => {
                let mapper = &self.mapper;
                self.ppu.read_register(addr, |a| {
                    let mut mapper = mapper.borrow_mut();
                    mapper.on_ppu_addr(a);
                    mapper.chr_read(a)
                })
            }

            0x4000..=0x4015 => {
                trace!("read from stubbed APU register ${addr:04X}");
                self.open_bus
            }
            0x4016 => self.controller1.read(),
            0x4017 => self.controller2.read(),
            0x4018..=0x401F => self.open_bus,

            0x4020..=0xFFFF => self.mapper.borrow().cpu_read(addr),
        };

        self.open_bus = value;
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.open_bus = value;

        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = value,

            0x2000..=0x3FFF => {
                let mapper = &self.mapper;
                self.ppu.write_register(addr, value, |a, v| {
                    let mut mapper = mapper.borrow_mut();
                    mapper.on_ppu_addr(a);
                    mapper.chr_write(a, v);
                });
            }

            0x4000..=0x4013 | 0x4015 => {
                trace!("write to stubbed APU register ${addr:04X} = ${value:02X}");
            }
            0x4014 => self.oam_dma_page = Some(value),
            0x4016 => {
                self.controller1.write_strobe(value);
                self.controller2.write_strobe(value);
            }
            0x4017 => trace!("write to stubbed APU frame counter = ${value:02X}"),
            0x4018..=0x401F => {}

            0x4020..=0xFFFF => {
                self.mapper.borrow_mut().cpu_write(addr, value);
                self.sync_mirroring();
            }
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x2000..=0x401F => self.open_bus,
            0x4020..=0xFFFF => self.mapper.borrow().cpu_read(addr),
        }
    }

    fn poll_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_line)
    }

    fn poll_irq(&self) -> bool {
        self.mapper.borrow().irq_pending()
    }

    fn take_oam_dma(&mut self) -> Option<u8> {
        self.oam_dma_page.take()
    }

    fn oam_dma_write(&mut self, _index: u8, value: u8) {
        // OAM's destination address is tracked by OAMADDR inside the PPU
        // itself (OAMDATA writes auto-increment and wrap), so every byte
        // goes through the same register write the CPU would have used.
        self.ppu.write_register(0x2004, value, |_, _| {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nescore_mappers::{Mirroring, Nrom, Rom, RomHeader};

    fn create_test_bus() -> NesBus {
        let rom = Rom {
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
            prg_rom: vec![0; 32768],
            chr_rom: vec![0; 8192],
            trainer: None,
        };
        NesBus::new(Box::new(Nrom::new(&rom).unwrap()))
    }

    #[test]
    fn ram_mirrors_every_2kb() {
        let mut bus = create_test_bus();

        Bus::write(&mut bus, 0x0000, 0x42);
        assert_eq!(Bus::read(&mut bus, 0x0800), 0x42);
        assert_eq!(Bus::read(&mut bus, 0x1000), 0x42);
        assert_eq!(Bus::read(&mut bus, 0x1800), 0x42);

        Bus::write(&mut bus, 0x1234, 0xAB);
        assert_eq!(Bus::read(&mut bus, 0x0234), 0xAB);
    }

    #[test]
    fn controller_strobe_and_serial_read() {
        let mut bus = create_test_bus();
        bus.controller1_mut().set_buttons(0b1010_0101); // A, Select, Up, Right

        Bus::write(&mut bus, 0x4016, 1);
        Bus::write(&mut bus, 0x4016, 0);

        let bits: Vec<u8> = (0..8).map(|_| Bus::read(&mut bus, 0x4016) & 1).collect();
        assert_eq!(bits, [1, 0, 1, 0, 0, 1, 0, 1]);
    }

    #[test]
    fn oam_dma_latches_page_and_cpu_consumes_it() {
        let mut bus = create_test_bus();
        Bus::write(&mut bus, 0x4014, 0x02);
        assert_eq!(bus.take_oam_dma(), Some(0x02));
        assert_eq!(bus.take_oam_dma(), None);
    }

    #[test]
    fn nmi_line_is_edge_latched_and_consumed_once() {
        let mut bus = create_test_bus();
        assert!(!bus.poll_nmi());
        bus.nmi_line = true;
        assert!(bus.poll_nmi());
        assert!(!bus.poll_nmi());
    }

    #[test]
    fn unmapped_io_reads_as_open_bus() {
        let mut bus = create_test_bus();
        Bus::write(&mut bus, 0x0000, 0xAB);
        let _ = Bus::read(&mut bus, 0x0000);
        assert_eq!(Bus::read(&mut bus, 0x4000), 0xAB);
    }

    #[test]
    fn peek_does_not_touch_ppu_state() {
        let mut bus = create_test_bus();
        Bus::write(&mut bus, 0x0100, 0x42);
        assert_eq!(bus.peek(0x0100), 0x42);
        assert_eq!(bus.peek(0x0900), 0x42);
    }

    #[test]
    fn reset_clears_ram_and_pending_dma() {
        let mut bus = create_test_bus();
        Bus::write(&mut bus, 0x0000, 0xFF);
        Bus::write(&mut bus, 0x4014, 0x03);

        bus.reset();

        assert_eq!(Bus::read(&mut bus, 0x0000), 0);
        assert_eq!(bus.take_oam_dma(), None);
    }
}
