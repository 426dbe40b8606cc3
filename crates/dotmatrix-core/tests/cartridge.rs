use std::fs;
use tempfile::tempdir;
use dotmatrix_core::cartridge::{Cartridge, CartridgeError, MbcType};

/// ROM of `banks` 16 KiB banks where every byte holds its bank number.
fn banked_rom(code: u8, banks: usize) -> Vec<u8> {
    let mut rom = Vec::with_capacity(banks * 0x4000);
    for bank in 0..banks {
        rom.extend(std::iter::repeat_n(bank as u8, 0x4000));
    }
    rom[0x0147] = code;
    rom
}

#[test]
fn from_file_reads_header() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("game.gb");

    let mut rom = vec![0u8; 0x8000];
    rom[0x0134..0x0139].copy_from_slice(b"TETRA");
    rom[0x0147] = 0x01;
    fs::write(&rom_path, &rom).unwrap();

    let cart = Cartridge::from_file(&rom_path).unwrap();
    assert_eq!(cart.mbc, MbcType::Mbc1);
    assert_eq!(cart.title, "TETRA");
    assert_eq!(cart.ram.len(), 0x8000);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = Cartridge::from_file(dir.path().join("absent.gb")).unwrap_err();
    assert!(matches!(err, CartridgeError::Io { .. }));
    assert!(err.to_string().contains("absent.gb"));
}

#[test]
fn unsupported_controller_is_rejected() {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = 0x19; // MBC5
    let err = Cartridge::load(rom).unwrap_err();
    assert!(matches!(err, CartridgeError::UnsupportedMbc { code: 0x19 }));
    assert_eq!(err.to_string(), "unsupported cartridge type 0x19");
}

#[test]
fn ram_sizes_follow_controller() {
    let sizes = [
        (0x00, 0x2000),
        (0x03, 0x8000),
        (0x0F, 0x10000),
        (0x11, 0x10000),
        (0x13, 0x10000),
    ];
    for (code, size) in sizes {
        let cart = Cartridge::load(banked_rom(code, 2)).unwrap();
        assert_eq!(cart.ram.len(), size, "type {code:#04X}");
    }
}

#[test]
fn mbc3_variants_share_the_seven_bit_scheme() {
    for code in 0x0F..=0x13 {
        let mut cart = Cartridge::load(banked_rom(code, 128)).unwrap();
        assert_eq!(cart.mbc, MbcType::Mbc3, "type {code:#04X}");
        cart.consume_write(0x2000, 0x45);
        assert_eq!(cart.read(0x4000), 0x45, "type {code:#04X}");
    }
}

#[test]
fn mbc1_bank_zero_selects_bank_one() {
    let mut cart = Cartridge::load(banked_rom(0x01, 8)).unwrap();
    cart.consume_write(0x2000, 0x00);
    let zero: Vec<u8> = (0x4000..0x8000).map(|a| cart.read(a)).collect();
    cart.consume_write(0x2000, 0x01);
    let one: Vec<u8> = (0x4000..0x8000).map(|a| cart.read(a)).collect();
    assert_eq!(zero, one);
    assert_eq!(cart.read(0x4000), 1);
}

#[test]
fn mbc1_secondary_register_extends_rom_bank_in_rom_mode() {
    let mut cart = Cartridge::load(banked_rom(0x01, 128)).unwrap();
    cart.consume_write(0x2000, 0x05);
    cart.consume_write(0x4000, 0x01);
    assert_eq!(cart.rom_bank(), 0x25);
    assert_eq!(cart.read(0x4000), 0x25);
    assert_eq!(cart.read(0x0000), 0x00);

    // RAM mode gives the secondary register to RAM.
    cart.consume_write(0x6000, 0x01);
    assert_eq!(cart.rom_bank(), 0x05);
}

#[test]
fn mbc1_ram_banks_and_enable() {
    let mut cart = Cartridge::load(banked_rom(0x03, 4)).unwrap();
    cart.write_ram(0xA000, 0x11);
    assert_eq!(cart.read(0xA000), 0xFF);

    cart.consume_write(0x0000, 0x0A);
    cart.consume_write(0x6000, 0x01);
    cart.consume_write(0x4000, 0x02);
    cart.write_ram(0xA000, 0x22);
    assert_eq!(cart.ram[2 * 0x2000], 0x22);

    cart.consume_write(0x4000, 0x00);
    assert_eq!(cart.read(0xA000), 0x00);

    cart.consume_write(0x0000, 0x00);
    assert_eq!(cart.read(0xA000), 0xFF);
}

#[test]
fn mbc3_rom_ram_and_rtc_select() {
    let mut cart = Cartridge::load(banked_rom(0x13, 128)).unwrap();
    cart.consume_write(0x2000, 0x7F);
    assert_eq!(cart.read(0x4000), 0x7F);
    cart.consume_write(0x2000, 0x00);
    assert_eq!(cart.read(0x4000), 0x01);

    cart.consume_write(0x0000, 0x0A);
    cart.consume_write(0x4000, 0x03);
    cart.write_ram(0xBFFF, 0x33);
    assert_eq!(cart.ram[3 * 0x2000 + 0x1FFF], 0x33);

    // 0x08-0x0C shadow the clock registers.
    cart.consume_write(0x4000, 0x08);
    cart.write_ram(0xA000, 59);
    assert_eq!(cart.read(0xA000), 59);
    cart.consume_write(0x4000, 0x0C);
    assert_eq!(cart.read(0xA000), 0x00);

    // Past the last clock register nothing is mapped.
    cart.consume_write(0x4000, 0x0D);
    cart.write_ram(0xA000, 0x44);
    assert_eq!(cart.read(0xA000), 0xFF);
}

#[test]
fn short_rom_is_padded_and_banks_wrap() {
    let cart = Cartridge::load(vec![0x00; 0x100]).unwrap();
    assert_eq!(cart.rom().len(), 0x8000);
    assert_eq!(cart.read(0x7FFF), 0xFF);

    let mut cart = Cartridge::load(banked_rom(0x01, 4)).unwrap();
    cart.consume_write(0x2000, 0x06);
    assert_eq!(cart.rom_bank(), 2);
    assert_eq!(cart.read(0x4000), 2);
}
