use log::debug;

use crate::{
    cartridge::Cartridge,
    interrupts::Interrupts,
    io::Io,
    ppu::{OAM_SIZE, Ppu},
    ram::{HighRam, WorkRam},
    screen::Screen,
};

const IF_REG: u16 = 0xFF0F;
const IE_REG: u16 = 0xFFFF;

/// Post-boot IF: the boot ROM leaves a VBlank request latched.
const BOOT_IF: u8 = 0x01;

/// Address-space dispatcher. Every address belongs to exactly one
/// component; the bus itself holds no memory.
pub struct Mmu {
    pub cart: Option<Cartridge>,
    pub ppu: Ppu,
    pub io: Io,
    pub irq: Interrupts,
    pub wram: WorkRam,
    pub hram: HighRam,
}

impl Mmu {
    pub fn new() -> Self {
        let mut ppu = Ppu::new();
        ppu.apply_boot_state();
        let mut irq = Interrupts::new();
        irq.set_pending(BOOT_IF);

        Self {
            cart: None,
            ppu,
            io: Io::new(),
            irq,
            wram: WorkRam::new(),
            hram: HighRam::new(),
        }
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                self.cart.as_ref().map(|c| c.read(addr)).unwrap_or(0xFF)
            }
            0x8000..=0x9FFF => self.ppu.read_vram(addr),
            0xC000..=0xFDFF => self.wram.read(addr),
            0xFE00..=0xFE9F => self.ppu.read_oam(addr),
            // Unusable region.
            0xFEA0..=0xFEFF => 0xFF,
            IF_REG => self.irq.read_if(),
            0xFF00..=0xFF3F => self.io.read(addr),
            0xFF40..=0xFF4B => self.ppu.read_reg(addr),
            0xFF4C..=0xFF7F => 0xFF,
            0xFF80..=0xFFFE => self.hram.read(addr),
            IE_REG => self.irq.read_ie(),
        }
    }

    /// Offer the write to the cartridge controller, the I/O block and the
    /// PPU in that order; the first to claim it ends the write. Anything
    /// left over is plain storage.
    pub fn write_byte(&mut self, addr: u16, val: u8) {
        if let Some(cart) = self.cart.as_mut()
            && cart.consume_write(addr, val)
        {
            return;
        }
        if self.io.consume_write(addr, val, &mut self.irq) {
            return;
        }
        if self.ppu.consume_write(addr, val) {
            if let Some(page) = self.ppu.take_dma_request() {
                self.oam_dma(page);
            }
            return;
        }

        match addr {
            0x0000..=0x7FFF => debug!("ROM write {val:02X} to {addr:04X} with no cartridge"),
            0x8000..=0x9FFF => self.ppu.write_vram(addr, val),
            0xA000..=0xBFFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write_ram(addr, val);
                }
            }
            0xC000..=0xFDFF => self.wram.write(addr, val),
            0xFE00..=0xFE9F => self.ppu.write_oam(addr, val),
            0xFEA0..=0xFEFF | 0xFF4C..=0xFF7F => {
                debug!("ignored write {val:02X} to {addr:04X}");
            }
            IF_REG => self.irq.set_pending(val),
            0xFF00..=0xFF3F => self.io.write_reg(addr, val),
            0xFF40..=0xFF4B => self.ppu.write_reg(addr, val),
            0xFF80..=0xFFFE => self.hram.write(addr, val),
            IE_REG => self.irq.set_enabled(val),
        }
    }

    pub fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read_byte(addr) as u16;
        let hi = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn write_word(&mut self, addr: u16, val: u16) {
        self.write_byte(addr, val as u8);
        self.write_byte(addr.wrapping_add(1), (val >> 8) as u8);
    }

    /// Copy 160 bytes from `page << 8` into OAM.
    pub fn oam_dma(&mut self, page: u8) {
        let src = (page as u16) << 8;
        let mut data = [0u8; OAM_SIZE];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = self.read_byte(src.wrapping_add(i as u16));
        }
        self.ppu.load_oam(&data);
    }

    /// Advance the tick-driven followers after the CPU has run.
    pub fn step(&mut self, ticks: u32, screen: &mut dyn Screen) {
        self.ppu.step(ticks, &mut self.irq, screen);
        self.io.step(ticks, &mut self.irq);
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
