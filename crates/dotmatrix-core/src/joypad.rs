use crate::interrupts::{Interrupt, Interrupts};

pub const P1: u16 = 0xFF00;

const SELECT_DPAD: u8 = 0x10;
const SELECT_BUTTONS: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    /// Bit in the pressed-state byte: d-pad in the low nibble, action
    /// buttons in the high nibble.
    fn mask(self) -> u8 {
        match self {
            Button::Right => 0x01,
            Button::Left => 0x02,
            Button::Up => 0x04,
            Button::Down => 0x08,
            Button::A => 0x10,
            Button::B => 0x20,
            Button::Select => 0x40,
            Button::Start => 0x80,
        }
    }
}

/// P1 joypad matrix. Reads report pressed buttons as 0 in the selected rows.
pub struct Joypad {
    /// Select bits 4-5 as last written (0 selects the row).
    select: u8,
    /// Bitmask of held buttons, 1 = pressed.
    pressed: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            select: SELECT_DPAD | SELECT_BUTTONS,
            pressed: 0,
        }
    }

    fn lines(&self) -> u8 {
        let mut low = 0x0F;
        if self.select & SELECT_DPAD == 0 {
            low &= !(self.pressed & 0x0F);
        }
        if self.select & SELECT_BUTTONS == 0 {
            low &= !(self.pressed >> 4);
        }
        low
    }

    pub fn read(&self) -> u8 {
        0xC0 | self.select | self.lines()
    }

    pub fn write(&mut self, val: u8, irq: &mut Interrupts) {
        let before = self.lines();
        self.select = val & (SELECT_DPAD | SELECT_BUTTONS);
        self.raise_on_fall(before, irq);
    }

    pub fn press(&mut self, button: Button, irq: &mut Interrupts) {
        let before = self.lines();
        self.pressed |= button.mask();
        self.raise_on_fall(before, irq);
    }

    pub fn release(&mut self, button: Button) {
        self.pressed &= !button.mask();
    }

    /// Any input line going from high to low requests the Joypad interrupt.
    fn raise_on_fall(&self, before: u8, irq: &mut Interrupts) {
        if before & !self.lines() != 0 {
            irq.request(Interrupt::Joypad);
        }
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}
