//! Work RAM and high RAM.

const WRAM_SIZE: usize = 0x2000;
const HRAM_SIZE: usize = 0x7F;

const WRAM_START: u16 = 0xC000;
const ECHO_START: u16 = 0xE000;
const HRAM_START: u16 = 0xFF80;

/// 8 KiB at 0xC000-0xDFFF, also visible through the echo region
/// 0xE000-0xFDFF.
pub struct WorkRam {
    data: Vec<u8>,
}

impl WorkRam {
    pub fn new() -> Self {
        Self {
            data: vec![0; WRAM_SIZE],
        }
    }

    /// Echo addresses fold back onto the same storage.
    #[inline]
    fn index(addr: u16) -> usize {
        let addr = if addr >= ECHO_START {
            addr - (ECHO_START - WRAM_START)
        } else {
            addr
        };
        debug_assert!((WRAM_START..WRAM_START + WRAM_SIZE as u16).contains(&addr));
        (addr - WRAM_START) as usize
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.data[Self::index(addr)]
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        self.data[Self::index(addr)] = val;
    }
}

impl Default for WorkRam {
    fn default() -> Self {
        Self::new()
    }
}

/// 127 bytes at 0xFF80-0xFFFE.
pub struct HighRam {
    data: [u8; HRAM_SIZE],
}

impl HighRam {
    pub fn new() -> Self {
        Self {
            data: [0; HRAM_SIZE],
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.data[(addr - HRAM_START) as usize]
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        self.data[(addr - HRAM_START) as usize] = val;
    }
}

impl Default for HighRam {
    fn default() -> Self {
        Self::new()
    }
}
