//! Tick-driven DMG Game Boy emulation core.
//!
//! This crate contains the platform-agnostic emulator logic (CPU, bus, PPU,
//! cartridge controllers, timer and joypad). Frontends implement
//! [`screen::Screen`] and drive the machine through the [`gameboy`] facade.

/// Stateless arithmetic and logic operations with their flag effects.
pub mod alu;

/// Cartridge mappers (MBC) and ROM/RAM/RTC register handling.
pub mod cartridge;

/// LR35902 CPU core.
pub mod cpu;

/// Shadow stack for catching stack corruption in tests.
#[cfg(any(test, feature = "stack-check"))]
pub mod debug_stack;

/// High-level facade that wires the CPU and MMU into a single machine.
pub mod gameboy;

/// IE/IF registers and interrupt priority.
pub mod interrupts;

/// Peripheral register block at 0xFF00.
pub mod io;

/// Joypad input register and edge-triggered interrupt behavior.
pub mod joypad;

/// Memory map and hardware plumbing.
pub mod mmu;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// Work RAM and high RAM.
pub mod ram;

/// CPU register file.
pub mod registers;

/// Presentation seam for finished scanlines.
pub mod screen;

/// Serial port without a link partner.
pub mod serial;

/// Decoded tiles, sprite attributes and their lazy caches.
pub mod tile;

/// Divider/timer unit.
pub mod timer;
