//! 6502 CPU core: registers, the step loop, and interrupt sequencing.

use crate::bus::Bus;
use crate::opcodes;
use crate::status::Status;
use crate::vectors;

/// Which interrupt sequence the CPU is currently running, if any.
///
/// Exposed mainly for diagnostics/tracing; the step loop does not need a
/// caller to inspect this to behave correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// No interrupt in progress.
    None,
    /// Non-maskable interrupt.
    Nmi,
    /// Maskable interrupt.
    Irq,
    /// Software interrupt via the BRK opcode.
    Brk,
}

/// MOS 6502 processor state and step loop.
#[derive(Debug, Clone)]
pub struct Cpu {
    pc: u16,
    sp: u8,
    a: u8,
    x: u8,
    y: u8,
    status: Status,
    total_cycles: u64,
    last_interrupt: Interrupt,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Construct a CPU in an unpowered state. Call [`Cpu::reset`] before
    /// stepping it against a real bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pc: 0,
            sp: 0xFD,
            a: 0,
            x: 0,
            y: 0,
            status: Status::new(),
            total_cycles: 0,
            last_interrupt: Interrupt::None,
        }
    }

    /// Reset the CPU: load PC from the reset vector, set SP and P to their
    /// documented power-on values, and account for the 7 dummy cycles the
    /// real 6502 spends doing so.
    ///
    /// These are *absolute* assignments, not adjustments relative to
    /// whatever the CPU was doing before — a CPU can be reset from any
    /// prior state and always lands here.
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.sp = 0xFD;
        self.status = Status::new();
        self.pc = bus.read_u16(vectors::RESET);
        self.total_cycles = 7;
        self.last_interrupt = Interrupt::None;
    }

    /// Execute exactly one unit of work: a pending OAM DMA cycle block, an
    /// interrupt sequence, or one instruction. Returns the number of CPU
    /// cycles consumed.
    ///
    /// Priority order, checked at the top of every call: OAM DMA > NMI >
    /// IRQ > normal fetch. NMI takes priority over a simultaneously
    /// pending IRQ.
    pub fn step(&mut self, bus: &mut impl Bus) -> u8 {
        if let Some(page) = bus.take_oam_dma() {
            return self.run_oam_dma(bus, page);
        }

        if bus.poll_nmi() {
            self.service_interrupt(bus, Interrupt::Nmi, vectors::NMI, false);
            return 7;
        }

        if bus.poll_irq() && !self.status.contains(Status::I) {
            self.service_interrupt(bus, Interrupt::Irq, vectors::IRQ, false);
            return 7;
        }

        self.last_interrupt = Interrupt::None;
        let cycles = opcodes::execute(self, bus);
        self.total_cycles += cycles as u64;
        cycles
    }

    fn run_oam_dma(&mut self, bus: &mut impl Bus, page: u8) -> u8 {
        let extra = if self.total_cycles % 2 == 1 { 514 } else { 513 };
        let base = (page as u16) << 8;
        for i in 0..=255u8 {
            let byte = bus.read(base | i as u16);
            bus.oam_dma_write(i, byte);
        }
        self.total_cycles += extra as u64;
        extra
    }

    /// Push the program counter and status, set PC from `vector`, and mark
    /// the interrupt flag. Shared by NMI, IRQ, and BRK (`from_brk`
    /// controls whether the pushed status has its B bit set).
    fn service_interrupt(&mut self, bus: &mut impl Bus, kind: Interrupt, vector: u16, from_brk: bool) {
        self.push16(bus, self.pc);
        self.push(bus, self.status.to_stack_byte(from_brk));
        self.status.set_flag(Status::I, true);
        self.pc = bus.read_u16(vector);
        self.last_interrupt = kind;
    }

    /// Entry point used by the BRK opcode handler (already advanced PC
    /// past the padding byte).
    pub(crate) fn enter_brk(&mut self, bus: &mut impl Bus) {
        self.service_interrupt(bus, Interrupt::Brk, vectors::IRQ, true);
    }

    pub(crate) fn push(&mut self, bus: &mut impl Bus, value: u8) {
        bus.write(0x0100 | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    pub(crate) fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 | self.sp as u16)
    }

    fn push16(&mut self, bus: &mut impl Bus, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, value as u8);
    }

    pub(crate) fn pull16(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.pull(bus) as u16;
        let hi = self.pull(bus) as u16;
        (hi << 8) | lo
    }

    // --- accessors ---

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.pc
    }
    /// Set the program counter directly (used by reset, interrupts, and tests).
    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }
    pub(crate) fn advance_pc(&mut self, by: u16) {
        self.pc = self.pc.wrapping_add(by);
    }
    /// Stack pointer.
    #[must_use]
    pub const fn sp(&self) -> u8 {
        self.sp
    }
    pub(crate) fn set_sp(&mut self, sp: u8) {
        self.sp = sp;
    }
    /// Accumulator.
    #[must_use]
    pub const fn a(&self) -> u8 {
        self.a
    }
    pub(crate) fn set_a(&mut self, a: u8) {
        self.a = a;
    }
    /// X index register.
    #[must_use]
    pub const fn x(&self) -> u8 {
        self.x
    }
    pub(crate) fn set_x(&mut self, x: u8) {
        self.x = x;
    }
    /// Y index register.
    #[must_use]
    pub const fn y(&self) -> u8 {
        self.y
    }
    pub(crate) fn set_y(&mut self, y: u8) {
        self.y = y;
    }
    /// Processor status flags.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }
    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
    }
    /// Total CPU cycles executed since the last reset.
    #[must_use]
    pub const fn total_cycles(&self) -> u64 {
        self.total_cycles
    }
    /// The kind of interrupt the CPU most recently serviced (`None` if the
    /// previous step was a normal instruction).
    #[must_use]
    pub const fn last_interrupt(&self) -> Interrupt {
        self.last_interrupt
    }
    /// Directly set the interrupt-disable flag's complement view for tests
    /// that need to force an interrupt-enabled or -disabled state.
    pub fn set_status_flag(&mut self, flag: Status, value: bool) {
        self.status.set_flag(flag, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        mem: [u8; 0x10000],
    }

    impl TestBus {
        fn new() -> Self {
            Self { mem: [0; 0x10000] }
        }
    }

    impl Bus for TestBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.mem[addr as usize]
        }
        fn write(&mut self, addr: u16, value: u8) {
            self.mem[addr as usize] = value;
        }
        fn peek(&self, addr: u16) -> u8 {
            self.mem[addr as usize]
        }
    }

    fn reset_bus_at(entry: u16) -> TestBus {
        let mut bus = TestBus::new();
        bus.mem[0xFFFC] = entry as u8;
        bus.mem[0xFFFD] = (entry >> 8) as u8;
        bus
    }

    #[test]
    fn reset_sets_documented_power_on_state() {
        let mut bus = reset_bus_at(0x8000);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        assert_eq!(cpu.pc(), 0x8000);
        assert_eq!(cpu.sp(), 0xFD);
        assert_eq!(cpu.status().bits(), 0x24);
        assert_eq!(cpu.total_cycles(), 7);
    }

    #[test]
    fn three_nops_advance_pc_and_cycles() {
        let mut bus = reset_bus_at(0x8000);
        bus.mem[0x8000] = 0xEA;
        bus.mem[0x8001] = 0xEA;
        bus.mem[0x8002] = 0xEA;
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x8003);
        assert_eq!(cpu.total_cycles(), 13);
    }

    #[test]
    fn jmp_absolute_sets_pc_and_cycles() {
        let mut bus = reset_bus_at(0xC000);
        bus.mem[0xC000] = 0x4C; // JMP abs
        bus.mem[0xC001] = 0xF5;
        bus.mem[0xC002] = 0xC5;
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0xC5F5);
        assert_eq!(cpu.total_cycles(), 10);
    }

    #[test]
    fn unknown_opcode_is_a_two_cycle_nop() {
        let mut bus = reset_bus_at(0x8000);
        bus.mem[0x8000] = 0xFF; // no official meaning
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        let before = cpu.pc();
        let cycles = cpu.step(&mut bus);
        assert_eq!(cycles, 2);
        assert_eq!(cpu.pc(), before.wrapping_add(1));
    }

    #[test]
    fn pha_pla_round_trips_accumulator() {
        let mut bus = reset_bus_at(0x8000);
        bus.mem[0x8000] = 0x48; // PHA
        bus.mem[0x8001] = 0x68; // PLA
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.set_a(0x42);
        cpu.step(&mut bus);
        cpu.set_a(0);
        cpu.step(&mut bus);
        assert_eq!(cpu.a(), 0x42);
    }

    #[test]
    fn nmi_vectors_through_fffa_and_costs_seven_cycles() {
        let mut bus = reset_bus_at(0x8000);
        bus.mem[0x8000] = 0xEA;
        bus.mem[0xFFFA] = 0x00;
        bus.mem[0xFFFB] = 0x90;
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);

        struct NmiBus {
            inner: TestBus,
            fired: bool,
        }
        impl Bus for NmiBus {
            fn read(&mut self, addr: u16) -> u8 {
                self.inner.read(addr)
            }
            fn write(&mut self, addr: u16, value: u8) {
                self.inner.write(addr, value);
            }
            fn poll_nmi(&mut self) -> bool {
                std::mem::take(&mut self.fired)
            }
        }
        let mut nmi_bus = NmiBus { inner: bus, fired: true };
        let cycles = cpu.step(&mut nmi_bus);
        assert_eq!(cycles, 7);
        assert_eq!(cpu.pc(), 0x9000);
        assert!(cpu.status().contains(Status::I));
    }

    proptest::proptest! {
        /// PHA followed by PLA always restores the pushed byte, with Z/N set
        /// from that byte.
        #[test]
        fn pha_pla_round_trips_any_byte(value in 0u8..=255) {
            let mut bus = reset_bus_at(0x8000);
            bus.mem[0x8000] = 0x48; // PHA
            bus.mem[0x8001] = 0x68; // PLA
            let mut cpu = Cpu::new();
            cpu.reset(&mut bus);
            cpu.set_a(value);
            cpu.step(&mut bus);
            cpu.set_a(0);
            cpu.step(&mut bus);
            proptest::prop_assert_eq!(cpu.a(), value);
            proptest::prop_assert_eq!(cpu.status().contains(Status::Z), value == 0);
            proptest::prop_assert_eq!(cpu.status().contains(Status::N), value & 0x80 != 0);
        }

        /// PHP followed by an arbitrary status mutation followed by PLP
        /// restores exactly the pushed byte, with U forced set and B masked
        /// out of the restored flags (B only ever exists on the stack).
        #[test]
        fn php_plp_round_trips_status_with_b_masked_on_pull(
            pushed in 0u8..=255,
            mutated in 0u8..=255,
        ) {
            let mut bus = reset_bus_at(0x8000);
            bus.mem[0x8000] = 0x08; // PHP
            bus.mem[0x8001] = 0x28; // PLP
            let mut cpu = Cpu::new();
            cpu.reset(&mut bus);
            cpu.set_status(Status::from_bits_truncate(pushed));
            cpu.step(&mut bus);
            cpu.set_status(Status::from_bits_truncate(mutated));
            cpu.step(&mut bus);

            let expected = (pushed | Status::U.bits()) & !Status::B.bits();
            proptest::prop_assert_eq!(cpu.status().bits() & !Status::B.bits(), expected);
            proptest::prop_assert!(!cpu.status().contains(Status::B));
        }

        /// LDA ($zp,X) always wraps its pointer fetch within page zero,
        /// however far `zp + X` overflows a byte.
        #[test]
        fn indexed_indirect_pointer_wraps_within_zero_page(zp in 0u8..=255, x in 0u8..=255) {
            let mut bus = reset_bus_at(0x8000);
            bus.mem[0x8000] = 0xA1; // LDA (zp,X)
            bus.mem[0x8001] = zp;
            let ptr = zp.wrapping_add(x);
            bus.mem[ptr as usize] = 0x34;
            bus.mem[ptr.wrapping_add(1) as usize] = 0x12;
            bus.mem[0x1234] = 0x99;
            let mut cpu = Cpu::new();
            cpu.reset(&mut bus);
            cpu.set_x(x);
            cpu.step(&mut bus);
            proptest::prop_assert_eq!(cpu.a(), 0x99);
        }
    }
}
