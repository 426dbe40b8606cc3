use crate::interrupts::{Interrupt, Interrupts};

pub const DIV: u16 = 0xFF04;
pub const TIMA: u16 = 0xFF05;
pub const TMA: u16 = 0xFF06;
pub const TAC: u16 = 0xFF07;

/// Ticks between a TIMA overflow and the TMA reload.
const RELOAD_DELAY: u8 = 4;

pub struct Timer {
    /// 16-bit internal divider counter. DIV register is the upper 8 bits.
    pub div: u16,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
    last_signal: bool,
    /// Ticks left until TIMA is reloaded from TMA after an overflow
    reload_in: Option<u8>,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            last_signal: false,
            reload_in: None,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            DIV => (self.div >> 8) as u8,
            TIMA => self.tima,
            TMA => self.tma,
            TAC => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            DIV => self.set_div(0),
            TIMA => {
                // Writing during the reload delay cancels the reload.
                self.tima = val;
                self.reload_in = None;
            }
            TMA => self.tma = val,
            TAC => {
                self.tac = val & 0x07;
                self.sample_edge();
            }
            _ => {}
        }
    }

    /// Advance the timer by `ticks`, requesting the Timer interrupt when a
    /// reload completes.
    pub fn step(&mut self, ticks: u32, irq: &mut Interrupts) {
        for _ in 0..ticks {
            if let Some(delay) = self.reload_in.as_mut() {
                *delay -= 1;
                if *delay == 0 {
                    self.reload_in = None;
                    self.tima = self.tma;
                    irq.request(Interrupt::Timer);
                }
            }
            self.set_div(self.div.wrapping_add(1));
        }
    }

    fn set_div(&mut self, div: u16) {
        self.div = div;
        self.sample_edge();
    }

    /// Increment TIMA on a falling edge of the selected divider bit.
    fn sample_edge(&mut self) {
        let signal = self.signal();
        if self.last_signal && !signal {
            self.increment();
        }
        self.last_signal = signal;
    }

    fn increment(&mut self) {
        if self.tima == 0xFF {
            self.tima = 0;
            self.reload_in = Some(RELOAD_DELAY);
        } else {
            self.tima += 1;
        }
    }

    fn timer_bit(&self) -> u16 {
        match self.tac & 0x03 {
            0x00 => 9,
            0x01 => 3,
            0x02 => 5,
            _ => 7,
        }
    }

    fn signal(&self) -> bool {
        self.tac & 0x04 != 0 && (self.div >> self.timer_bit()) & 1 != 0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
