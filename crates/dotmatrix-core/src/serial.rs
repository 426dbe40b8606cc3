use log::debug;

use crate::interrupts::{Interrupt, Interrupts};

pub const SB: u16 = 0xFF01;
pub const SC: u16 = 0xFF02;

/// SC value that starts a transfer on the internal clock.
const START_INTERNAL: u8 = 0x81;

/// Serial registers without a link partner.
///
/// A transfer started on the internal clock completes immediately: the
/// outgoing byte is captured, SB reads back 0xFF (line dead) and the Serial
/// interrupt is requested. Externally clocked transfers never complete.
pub struct Serial {
    sb: u8,
    sc: u8,
    out_buf: Vec<u8>,
}

impl Serial {
    pub fn new() -> Self {
        Self {
            sb: 0,
            sc: 0,
            out_buf: Vec::new(),
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            SB => self.sb,
            SC => self.sc | 0x7E,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, irq: &mut Interrupts) {
        match addr {
            SB => self.sb = val,
            SC => {
                self.sc = val;
                if val & START_INTERNAL == START_INTERNAL {
                    debug!("serial out: {:02X} {:?}", self.sb, self.sb as char);
                    self.out_buf.push(self.sb);
                    self.sb = 0xFF;
                    self.sc &= !0x80;
                    irq.request(Interrupt::Serial);
                }
            }
            _ => {}
        }
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }

    pub fn peek_output(&self) -> &[u8] {
        &self.out_buf
    }
}

impl Default for Serial {
    fn default() -> Self {
        Self::new()
    }
}
