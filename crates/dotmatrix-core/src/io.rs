//! Peripheral I/O block at 0xFF00-0xFF3F (IF at 0xFF0F belongs to the
//! interrupt controller).

use crate::{
    interrupts::Interrupts,
    joypad::{Joypad, P1},
    serial::{SB, SC, Serial},
    timer::{DIV, TAC, TIMA, TMA, Timer},
};

const IO_START: u16 = 0xFF00;
const IO_SIZE: usize = 0x40;

pub struct Io {
    pub joypad: Joypad,
    pub timer: Timer,
    pub serial: Serial,
    /// Backing bytes for registers without behaviour (sound, wave RAM,
    /// unmapped slots).
    regs: [u8; IO_SIZE],
}

impl Io {
    pub fn new() -> Self {
        Self {
            joypad: Joypad::new(),
            timer: Timer::new(),
            serial: Serial::new(),
            regs: [0; IO_SIZE],
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            P1 => self.joypad.read(),
            SB | SC => self.serial.read(addr),
            DIV | TIMA | TMA | TAC => self.timer.read(addr),
            _ => self.regs[(addr - IO_START) as usize],
        }
    }

    /// Intercept writes to registers with side effects.
    pub fn consume_write(&mut self, addr: u16, val: u8, irq: &mut Interrupts) -> bool {
        match addr {
            P1 => self.joypad.write(val, irq),
            SB | SC => self.serial.write(addr, val, irq),
            DIV | TIMA | TMA | TAC => self.timer.write(addr, val),
            _ => return false,
        }
        true
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        self.regs[(addr - IO_START) as usize] = val;
    }

    pub fn step(&mut self, ticks: u32, irq: &mut Interrupts) {
        self.timer.step(ticks, irq);
    }
}

impl Default for Io {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_with_behaviour_are_consumed() {
        let mut io = Io::new();
        let mut irq = Interrupts::new();
        for addr in [P1, SB, SC, DIV, TIMA, TMA, TAC] {
            assert!(io.consume_write(addr, 0x00, &mut irq), "{addr:04X}");
        }
        assert!(!io.consume_write(0xFF10, 0x80, &mut irq));
        assert!(!io.consume_write(0xFF30, 0x12, &mut irq));
    }

    #[test]
    fn plain_registers_are_stored() {
        let mut io = Io::new();
        io.write_reg(0xFF26, 0x80);
        io.write_reg(0xFF3F, 0xAB);
        assert_eq!(io.read(0xFF26), 0x80);
        assert_eq!(io.read(0xFF3F), 0xAB);
    }

    #[test]
    fn step_drives_the_timer() {
        let mut io = Io::new();
        let mut irq = Interrupts::new();
        io.consume_write(TAC, 0x05, &mut irq);
        io.step(64, &mut irq);
        assert_eq!(io.read(TIMA), 4);
        assert_eq!(io.read(DIV), 0);
        io.step(256, &mut irq);
        assert_eq!(io.read(DIV), 1);
    }
}
