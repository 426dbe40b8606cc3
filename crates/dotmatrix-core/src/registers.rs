// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
pub const FLAG_Z: u8 = 0x80; // Zero
pub const FLAG_N: u8 = 0x40; // Subtract
pub const FLAG_H: u8 = 0x20; // Half Carry
pub const FLAG_C: u8 = 0x10; // Carry

/// The F register. Only the upper nibble is stored; the low nibble always
/// reads back as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0xF0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    fn put(&mut self, mask: u8, on: bool) {
        if on {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    pub fn z(self) -> bool {
        self.0 & FLAG_Z != 0
    }

    pub fn n(self) -> bool {
        self.0 & FLAG_N != 0
    }

    pub fn h(self) -> bool {
        self.0 & FLAG_H != 0
    }

    pub fn c(self) -> bool {
        self.0 & FLAG_C != 0
    }

    pub fn set_z(&mut self, on: bool) {
        self.put(FLAG_Z, on);
    }

    pub fn set_n(&mut self, on: bool) {
        self.put(FLAG_N, on);
    }

    pub fn set_h(&mut self, on: bool) {
        self.put(FLAG_H, on);
    }

    pub fn set_c(&mut self, on: bool) {
        self.put(FLAG_C, on);
    }

    /// Assign all four flags at once.
    pub fn assign(&mut self, z: bool, n: bool, h: bool, c: bool) {
        self.0 = if z { FLAG_Z } else { 0 }
            | if n { FLAG_N } else { 0 }
            | if h { FLAG_H } else { 0 }
            | if c { FLAG_C } else { 0 };
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: Flags,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    pub fn af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f.bits() as u16
    }

    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = Flags::from_bits(val as u8);
    }

    pub fn bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }
}
