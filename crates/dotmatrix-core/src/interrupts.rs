//! IE/IF interrupt controller.

/// Only the low five bits of IE and IF are wired to interrupt sources.
pub const INTERRUPT_MASK: u8 = 0x1F;

/// Interrupt sources in priority order (lowest bit is serviced first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    Stat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::Stat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    pub const fn bit(self) -> u8 {
        match self {
            Interrupt::VBlank => 0x01,
            Interrupt::Stat => 0x02,
            Interrupt::Timer => 0x04,
            Interrupt::Serial => 0x08,
            Interrupt::Joypad => 0x10,
        }
    }

    /// Service routine address (gbdev.io/pandocs/Interrupts.html).
    pub const fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x40,
            Interrupt::Stat => 0x48,
            Interrupt::Timer => 0x50,
            Interrupt::Serial => 0x58,
            Interrupt::Joypad => 0x60,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    /// IE (0xFFFF)
    enabled: u8,
    /// IF (0xFF0F), stored raw; the unused high bits are forced on read.
    pending: u8,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask_enabled(&self) -> u8 {
        self.enabled
    }

    pub fn mask_pending(&self) -> u8 {
        self.pending
    }

    pub fn set_enabled(&mut self, val: u8) {
        self.enabled = val;
    }

    pub fn set_pending(&mut self, val: u8) {
        self.pending = val;
    }

    pub fn request(&mut self, irq: Interrupt) {
        self.pending |= irq.bit();
    }

    pub fn acknowledge(&mut self, irq: Interrupt) {
        self.pending &= !irq.bit();
    }

    pub fn is_pending(&self, irq: Interrupt) -> bool {
        self.pending & irq.bit() != 0
    }

    pub fn pending_enabled_interrupts(&self) -> u8 {
        self.enabled & self.pending & INTERRUPT_MASK
    }

    /// The interrupt that would be serviced next, if any.
    pub fn highest_priority(&self) -> Option<Interrupt> {
        let pending = self.pending_enabled_interrupts();
        Interrupt::ALL
            .into_iter()
            .find(|irq| pending & irq.bit() != 0)
    }

    /// IF as the CPU sees it.
    pub fn read_if(&self) -> u8 {
        self.pending | !INTERRUPT_MASK
    }

    pub fn read_ie(&self) -> u8 {
        self.enabled
    }
}
