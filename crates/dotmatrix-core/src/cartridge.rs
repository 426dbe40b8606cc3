use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;
use thiserror::Error;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

// Header layout (gbdev.io/pandocs/The_Cartridge_Header.html)
const HEADER_TITLE_START: usize = 0x0134;
const HEADER_TITLE_END: usize = 0x0143;
const HEADER_CART_TYPE: usize = 0x0147;

/// Number of RTC registers exposed through the RAM window (0x08-0x0C).
const RTC_REGISTER_COUNT: usize = 5;
const RTC_SELECT_BASE: u8 = 0x08;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("unsupported cartridge type {code:#04X}")]
    UnsupportedMbc { code: u8 },

    #[error("failed to read ROM {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
    Mbc3,
}

impl MbcType {
    fn from_code(code: u8) -> Result<Self, CartridgeError> {
        match code {
            0x00 => Ok(MbcType::NoMbc),
            0x01..=0x03 => Ok(MbcType::Mbc1),
            0x0F..=0x13 => Ok(MbcType::Mbc3),
            _ => Err(CartridgeError::UnsupportedMbc { code }),
        }
    }

    /// External RAM is sized by the controller, not by the header.
    fn ram_size(self) -> usize {
        match self {
            MbcType::NoMbc => RAM_BANK_SIZE,
            MbcType::Mbc1 => RAM_BANK_SIZE * 4,
            MbcType::Mbc3 => RAM_BANK_SIZE * 8,
        }
    }
}

/// MBC1 0x6000-0x7FFF selects what the secondary 2-bit register drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankingMode {
    /// Secondary register supplies ROM bank bits 5-6.
    Rom,
    /// Secondary register selects the RAM bank.
    Ram,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MbcState {
    NoMbc,
    Mbc1 {
        rom_bank: u8,
        secondary: u8,
        mode: BankingMode,
        ram_enable: bool,
    },
    Mbc3 {
        rom_bank: u8,
        select: u8,
        ram_enable: bool,
        rtc: [u8; RTC_REGISTER_COUNT],
    },
}

/// Where a 0xA000-0xBFFF access lands.
enum RamTarget {
    Disabled,
    Ram(usize),
    Rtc(usize),
    Unmapped,
}

#[derive(Debug)]
pub struct Cartridge {
    rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub mbc: MbcType,
    pub title: String,
    mbc_state: MbcState,
}

impl Cartridge {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| CartridgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load(data)
    }

    pub fn load(mut data: Vec<u8>) -> Result<Self, CartridgeError> {
        let code = data.get(HEADER_CART_TYPE).copied().unwrap_or(0);
        let mbc = MbcType::from_code(code)?;

        // Both ROM windows must always be backed.
        if data.len() < ROM_BANK_SIZE * 2 {
            data.resize(ROM_BANK_SIZE * 2, 0xFF);
        }

        let mbc_state = match mbc {
            MbcType::NoMbc => MbcState::NoMbc,
            MbcType::Mbc1 => MbcState::Mbc1 {
                rom_bank: 1,
                secondary: 0,
                mode: BankingMode::Rom,
                ram_enable: false,
            },
            MbcType::Mbc3 => MbcState::Mbc3 {
                rom_bank: 1,
                select: 0,
                ram_enable: false,
                rtc: [0; RTC_REGISTER_COUNT],
            },
        };

        let title = header_title(&data);
        info!(
            "Loaded ROM: {} (MBC: {:?}, {} banks)",
            title,
            mbc,
            data.len() / ROM_BANK_SIZE
        );

        Ok(Self {
            rom: data,
            ram: vec![0; mbc.ram_size()],
            mbc,
            title,
            mbc_state,
        })
    }

    /// The ROM image, padded to at least two banks.
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    fn rom_bank_count(&self) -> usize {
        (self.rom.len() / ROM_BANK_SIZE).max(1)
    }

    /// Bank currently mapped at 0x4000-0x7FFF.
    pub fn rom_bank(&self) -> usize {
        let bank = match &self.mbc_state {
            MbcState::NoMbc => 1,
            MbcState::Mbc1 {
                rom_bank,
                secondary,
                mode,
                ..
            } => {
                let high = match mode {
                    BankingMode::Rom => (*secondary as usize & 0x03) << 5,
                    BankingMode::Ram => 0,
                };
                high | (*rom_bank as usize & 0x1F)
            }
            MbcState::Mbc3 { rom_bank, .. } => *rom_bank as usize & 0x7F,
        };
        bank % self.rom_bank_count()
    }

    fn ram_target(&self, addr: u16) -> RamTarget {
        let offset = (addr - 0xA000) as usize;
        match &self.mbc_state {
            MbcState::NoMbc => RamTarget::Ram(offset),
            MbcState::Mbc1 { ram_enable: false, .. } | MbcState::Mbc3 { ram_enable: false, .. } => {
                RamTarget::Disabled
            }
            MbcState::Mbc1 {
                secondary, mode, ..
            } => {
                let bank = match mode {
                    BankingMode::Rom => 0,
                    BankingMode::Ram => *secondary as usize & 0x03,
                };
                RamTarget::Ram(bank * RAM_BANK_SIZE + offset)
            }
            MbcState::Mbc3 { select, .. } => {
                if *select >= RTC_SELECT_BASE {
                    let reg = (*select - RTC_SELECT_BASE) as usize;
                    if reg < RTC_REGISTER_COUNT {
                        RamTarget::Rtc(reg)
                    } else {
                        RamTarget::Unmapped
                    }
                } else {
                    RamTarget::Ram(*select as usize * RAM_BANK_SIZE + offset)
                }
            }
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.rom[addr as usize],
            0x4000..=0x7FFF => {
                let offset = self.rom_bank() * ROM_BANK_SIZE + (addr as usize - 0x4000);
                self.rom.get(offset).copied().unwrap_or(0xFF)
            }
            0xA000..=0xBFFF => match self.ram_target(addr) {
                RamTarget::Ram(idx) => self.ram.get(idx).copied().unwrap_or(0xFF),
                RamTarget::Rtc(reg) => match &self.mbc_state {
                    MbcState::Mbc3 { rtc, .. } => rtc[reg],
                    _ => 0xFF,
                },
                RamTarget::Disabled | RamTarget::Unmapped => 0xFF,
            },
            _ => 0xFF,
        }
    }

    /// Offer a write to the controller. Every write into the ROM window is a
    /// control write and is consumed here, including on cartridges without a
    /// controller where it is simply dropped.
    pub fn consume_write(&mut self, addr: u16, val: u8) -> bool {
        if addr > 0x7FFF {
            return false;
        }
        match (&mut self.mbc_state, addr) {
            (MbcState::NoMbc, _) => {}
            (MbcState::Mbc1 { ram_enable, .. }, 0x0000..=0x1FFF)
            | (MbcState::Mbc3 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x1F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x7F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc1 { secondary, .. }, 0x4000..=0x5FFF) => {
                *secondary = val & 0x03;
            }
            (MbcState::Mbc3 { select, .. }, 0x4000..=0x5FFF) => {
                *select = val;
            }
            (MbcState::Mbc1 { mode, .. }, _) => {
                *mode = if val & 0x01 != 0 {
                    BankingMode::Ram
                } else {
                    BankingMode::Rom
                };
            }
            // Clock latch; the RTC registers never advance on their own.
            (MbcState::Mbc3 { .. }, _) => {}
        }
        true
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) {
        match self.ram_target(addr) {
            RamTarget::Ram(idx) => {
                if let Some(b) = self.ram.get_mut(idx) {
                    *b = val;
                }
            }
            RamTarget::Rtc(reg) => {
                if let MbcState::Mbc3 { rtc, .. } = &mut self.mbc_state {
                    rtc[reg] = val;
                }
            }
            RamTarget::Disabled | RamTarget::Unmapped => {}
        }
    }
}

fn header_title(data: &[u8]) -> String {
    let end = HEADER_TITLE_END.min(data.len());
    let mut slice = &data[HEADER_TITLE_START.min(end)..end];
    if let Some(pos) = slice.iter().position(|&b| b == 0) {
        slice = &slice[..pos];
    }
    String::from_utf8_lossy(slice).trim().to_string()
}
