use crate::{cartridge::Cartridge, cpu::Cpu, joypad::Button, mmu::Mmu, screen::Screen};

/// Ticks in one full LCD frame: 154 lines of 456 ticks.
pub const FRAME_TICKS: u32 = 70_224;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
}

impl GameBoy {
    /// Machine in the post-boot state with `cart` inserted.
    pub fn new(cart: Cartridge) -> Self {
        let mut mmu = Mmu::new();
        mmu.load_cart(cart);
        Self {
            cpu: Cpu::new(),
            mmu,
        }
    }

    /// Reset to the post-boot state while keeping the loaded cartridge.
    pub fn reset(&mut self) {
        let cart = self.mmu.cart.take();
        self.cpu = Cpu::new();
        self.mmu = Mmu::new();
        if let Some(c) = cart {
            self.mmu.load_cart(c);
        }
    }

    /// Run one instruction, advance the rest of the machine by the ticks it
    /// took, then give pending interrupts a chance to dispatch. Returns the
    /// ticks consumed in total.
    pub fn step(&mut self, screen: &mut dyn Screen) -> u32 {
        let ticks = self.cpu.step(&mut self.mmu);
        self.mmu.step(ticks, screen);

        let dispatch = self.cpu.handle_interrupts(&mut self.mmu);
        if dispatch > 0 {
            self.mmu.step(dispatch, screen);
        }
        ticks + dispatch
    }

    /// Run for at least one frame's worth of ticks. Returns the ticks run,
    /// which overshoots [`FRAME_TICKS`] by at most one instruction.
    pub fn run_frame(&mut self, screen: &mut dyn Screen) -> u32 {
        let mut elapsed = 0;
        while elapsed < FRAME_TICKS {
            elapsed += self.step(screen);
        }
        elapsed
    }

    pub fn press(&mut self, button: Button) {
        self.mmu.io.joypad.press(button, &mut self.mmu.irq);
    }

    pub fn release(&mut self, button: Button) {
        self.mmu.io.joypad.release(button);
    }

    /// Bytes written out of the serial port since the last call.
    pub fn take_serial(&mut self) -> Vec<u8> {
        self.mmu.io.serial.take_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::FrameBuffer;

    /// 32 KiB ROM with no MBC and `code` at the entry point.
    fn rom_with(code: &[u8]) -> Cartridge {
        let mut rom = vec![0u8; 0x8000];
        rom[0x100..0x100 + code.len()].copy_from_slice(code);
        Cartridge::load(rom).expect("valid header")
    }

    #[test]
    fn step_reports_instruction_ticks() {
        let mut gb = GameBoy::new(rom_with(&[0x00, 0xC3, 0x00, 0x01]));
        let mut screen = FrameBuffer::new();
        assert_eq!(gb.step(&mut screen), 4);
        assert_eq!(gb.step(&mut screen), 16);
        assert_eq!(gb.cpu.regs.pc, 0x0100);
        assert_eq!(gb.cpu.cycles, 20);
    }

    #[test]
    fn run_frame_presents_one_frame() {
        // JR -2: spin forever.
        let mut gb = GameBoy::new(rom_with(&[0x18, 0xFE]));
        let mut screen = FrameBuffer::new();
        let ran = gb.run_frame(&mut screen);
        assert!((FRAME_TICKS..FRAME_TICKS + 24).contains(&ran));
        assert_eq!(screen.frames(), 1);
        assert_eq!(screen.lines_rendered(), 144);
    }

    #[test]
    fn vblank_interrupt_is_serviced() {
        // EI ; HALT ; JR -3 with a RETI at the VBlank vector.
        let mut rom = vec![0u8; 0x8000];
        rom[0x40] = 0xD9;
        rom[0x100..0x104].copy_from_slice(&[0xFB, 0x76, 0x18, 0xFD]);
        let mut gb = GameBoy::new(Cartridge::load(rom).expect("valid header"));
        gb.mmu.write_byte(0xFFFF, 0x01);
        gb.mmu.write_byte(0xFF0F, 0x00);
        let mut screen = FrameBuffer::new();

        let mut serviced = false;
        for _ in 0..20_000 {
            gb.step(&mut screen);
            if gb.cpu.regs.pc == 0x0040 {
                serviced = true;
                break;
            }
        }
        assert!(serviced);
        assert_eq!(screen.frames(), 1);
        assert_eq!(gb.mmu.read_word(gb.cpu.regs.sp), 0x0102);
    }

    #[test]
    fn reset_keeps_cartridge() {
        let mut gb = GameBoy::new(rom_with(&[0x3C]));
        let mut screen = FrameBuffer::new();
        gb.step(&mut screen);
        gb.reset();
        assert_eq!(gb.cpu.regs.pc, 0x0100);
        assert_eq!(gb.mmu.read_byte(0x0100), 0x3C);
    }
}
