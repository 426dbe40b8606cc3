#[cfg(feature = "cpu-trace")]
use log::trace;
use log::warn;

#[cfg(any(test, feature = "stack-check"))]
use crate::debug_stack::ShadowStack;
use crate::{
    alu,
    mmu::Mmu,
    registers::{Flags, Registers},
};

// Post-boot CPU state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

const DMG_BOOT_A: u8 = 0x01;
const DMG_BOOT_F: u8 = 0xB0;
const DMG_BOOT_B: u8 = 0x00;
const DMG_BOOT_C: u8 = 0x13;
const DMG_BOOT_D: u8 = 0x00;
const DMG_BOOT_E: u8 = 0xD8;
const DMG_BOOT_H: u8 = 0x01;
const DMG_BOOT_L: u8 = 0x4D;

const TICKS_PER_M_CYCLE: u32 = 4;

/// Cost of servicing an interrupt: two wait states, the SP decrement and the
/// two pushes.
const INTERRUPT_DISPATCH_M_CYCLES: u32 = 3;

pub struct Cpu {
    pub regs: Registers,
    pub ime: bool,
    pub halted: bool,
    pub stopped: bool,
    /// Total ticks executed since construction.
    pub cycles: u64,
    halt_bug: bool,
    ime_enable_delay: u8,
    /// Ticks accumulated by the step in progress.
    step_ticks: u32,
    #[cfg(any(test, feature = "stack-check"))]
    shadow: Option<ShadowStack>,
}

impl Cpu {
    /// CPU in the state the DMG boot ROM hands over to the cartridge.
    pub fn new() -> Self {
        Self::with_registers(Registers {
            a: DMG_BOOT_A,
            f: Flags::from_bits(DMG_BOOT_F),
            b: DMG_BOOT_B,
            c: DMG_BOOT_C,
            d: DMG_BOOT_D,
            e: DMG_BOOT_E,
            h: DMG_BOOT_H,
            l: DMG_BOOT_L,
            sp: BOOT_SP,
            pc: BOOT_PC,
        })
    }

    /// CPU with every register cleared, as at power on before a boot ROM
    /// runs.
    pub fn power_on() -> Self {
        Self::with_registers(Registers::default())
    }

    fn with_registers(regs: Registers) -> Self {
        Self {
            regs,
            ime: false,
            halted: false,
            stopped: false,
            cycles: 0,
            halt_bug: false,
            ime_enable_delay: 0,
            step_ticks: 0,
            #[cfg(any(test, feature = "stack-check"))]
            shadow: None,
        }
    }

    /// Mirror every push and pop into `stack` and assert they agree.
    #[cfg(any(test, feature = "stack-check"))]
    pub fn attach_shadow_stack(&mut self, stack: ShadowStack) {
        self.shadow = Some(stack);
    }

    #[cfg(any(test, feature = "stack-check"))]
    pub fn shadow_stack(&self) -> Option<&ShadowStack> {
        self.shadow.as_ref()
    }

    #[cfg(any(test, feature = "stack-check"))]
    fn shadow_push(&mut self, val: u16) {
        if let Some(stack) = self.shadow.as_mut() {
            stack.push(val);
        }
    }

    #[cfg(not(any(test, feature = "stack-check")))]
    #[inline(always)]
    fn shadow_push(&mut self, _val: u16) {}

    #[cfg(any(test, feature = "stack-check"))]
    fn shadow_pop(&mut self, val: u16) {
        if let Some(stack) = self.shadow.as_mut() {
            let ok = stack.pop(val);
            debug_assert!(ok, "stack corruption: popped {val:04X}");
        }
    }

    #[cfg(not(any(test, feature = "stack-check")))]
    #[inline(always)]
    fn shadow_pop(&mut self, _val: u16) {}

    pub fn halt_bug(&self) -> bool {
        self.halt_bug
    }

    #[inline]
    fn tick(&mut self, m_cycles: u32) {
        let ticks = TICKS_PER_M_CYCLE * m_cycles;
        self.step_ticks += ticks;
        self.cycles += ticks as u64;
    }

    #[inline(always)]
    fn fetch8(&mut self, mmu: &mut Mmu) -> u8 {
        let val = mmu.read_byte(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.tick(1);
        val
    }

    #[inline(always)]
    fn fetch16(&mut self, mmu: &mut Mmu) -> u16 {
        let lo = self.fetch8(mmu) as u16;
        let hi = self.fetch8(mmu) as u16;
        (hi << 8) | lo
    }

    #[inline(always)]
    fn read8(&mut self, mmu: &mut Mmu, addr: u16) -> u8 {
        let val = mmu.read_byte(addr);
        self.tick(1);
        val
    }

    #[inline(always)]
    fn write8(&mut self, mmu: &mut Mmu, addr: u16, val: u8) {
        mmu.write_byte(addr, val);
        self.tick(1);
    }

    /// Formatted CPU state string for debugging.
    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} CY:{}",
            self.regs.af(),
            self.regs.bc(),
            self.regs.de(),
            self.regs.hl(),
            self.regs.pc,
            self.regs.sp,
            self.cycles
        )
    }

    /// Push high byte then low byte, pre-decrementing SP for each.
    pub fn push_stack(&mut self, mmu: &mut Mmu, val: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write8(mmu, self.regs.sp, (val >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write8(mmu, self.regs.sp, val as u8);
        self.shadow_push(val);
    }

    pub fn pop_stack(&mut self, mmu: &mut Mmu) -> u16 {
        let lo = self.read8(mmu, self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.read8(mmu, self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let val = (hi << 8) | lo;
        self.shadow_pop(val);
        val
    }

    fn read_reg(&mut self, mmu: &mut Mmu, index: u8) -> u8 {
        match index {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            6 => self.read8(mmu, self.regs.hl()),
            7 => self.regs.a,
            _ => unreachable!(),
        }
    }

    fn write_reg(&mut self, mmu: &mut Mmu, index: u8, val: u8) {
        match index {
            0 => self.regs.b = val,
            1 => self.regs.c = val,
            2 => self.regs.d = val,
            3 => self.regs.e = val,
            4 => self.regs.h = val,
            5 => self.regs.l = val,
            6 => {
                let addr = self.regs.hl();
                self.write8(mmu, addr, val);
            }
            7 => self.regs.a = val,
            _ => unreachable!(),
        }
    }

    /// BC, DE, HL, SP by the two-bit pair index used in opcodes.
    fn read_pair(&self, index: u8) -> u16 {
        match index {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            3 => self.regs.sp,
            _ => unreachable!(),
        }
    }

    fn write_pair(&mut self, index: u8, val: u16) {
        match index {
            0 => self.regs.set_bc(val),
            1 => self.regs.set_de(val),
            2 => self.regs.set_hl(val),
            3 => self.regs.sp = val,
            _ => unreachable!(),
        }
    }

    /// NZ, Z, NC, C.
    fn condition(&self, index: u8) -> bool {
        let f = self.regs.f;
        match index {
            0 => !f.z(),
            1 => f.z(),
            2 => !f.c(),
            3 => f.c(),
            _ => unreachable!(),
        }
    }

    /// ADD, ADC, SUB, SBC, AND, XOR, OR, CP against A.
    fn alu_a(&mut self, op: u8, val: u8) {
        let a = self.regs.a;
        let f = &mut self.regs.f;
        self.regs.a = match op {
            0 => alu::add8(a, val, f),
            1 => alu::adc8(a, val, f),
            2 => alu::sub8(a, val, f),
            3 => alu::sbc8(a, val, f),
            4 => alu::and(a, val, f),
            5 => alu::xor(a, val, f),
            6 => alu::or(a, val, f),
            7 => {
                alu::cp(a, val, f);
                a
            }
            _ => unreachable!(),
        };
    }

    fn jump_relative(&mut self, offset: u8) {
        self.regs.pc = self.regs.pc.wrapping_add(offset as i8 as u16);
        self.tick(1);
    }

    fn call(&mut self, mmu: &mut Mmu, target: u16) {
        self.tick(1);
        let ret = self.regs.pc;
        self.push_stack(mmu, ret);
        self.regs.pc = target;
    }

    fn ret(&mut self, mmu: &mut Mmu) {
        self.regs.pc = self.pop_stack(mmu);
        self.tick(1);
    }

    fn halt(&mut self, mmu: &Mmu) {
        if !self.ime && mmu.irq.pending_enabled_interrupts() != 0 {
            self.halt_bug = true;
        } else {
            self.halted = true;
        }
    }

    fn handle_cb(&mut self, opcode: u8, mmu: &mut Mmu) {
        let r = opcode & 0x07;
        let n = (opcode >> 3) & 0x07;
        let val = self.read_reg(mmu, r);
        let f = &mut self.regs.f;
        let res = match opcode {
            0x00..=0x07 => alu::rlc(val, true, f),
            0x08..=0x0F => alu::rrc(val, true, f),
            0x10..=0x17 => alu::rl(val, true, f),
            0x18..=0x1F => alu::rr(val, true, f),
            0x20..=0x27 => alu::sla(val, f),
            0x28..=0x2F => alu::sra(val, f),
            0x30..=0x37 => alu::swap(val, f),
            0x38..=0x3F => alu::srl(val, f),
            0x40..=0x7F => {
                // BIT only reads.
                alu::bit(n, val, f);
                return;
            }
            0x80..=0xBF => alu::res(n, val),
            0xC0..=0xFF => alu::set(n, val),
        };
        self.write_reg(mmu, r, res);
    }

    /// Service at most one pending interrupt. Returns the ticks spent, which
    /// the caller must feed to the rest of the machine.
    ///
    /// Any enabled pending interrupt wakes the CPU from HALT or STOP, even
    /// with IME clear.
    pub fn handle_interrupts(&mut self, mmu: &mut Mmu) -> u32 {
        if mmu.irq.pending_enabled_interrupts() == 0 {
            return 0;
        }
        self.halted = false;
        self.stopped = false;

        if !self.ime {
            return 0;
        }
        let Some(irq) = mmu.irq.highest_priority() else {
            return 0;
        };

        self.step_ticks = 0;
        mmu.irq.acknowledge(irq);
        self.ime = false;
        self.tick(INTERRUPT_DISPATCH_M_CYCLES);
        let ret = self.regs.pc;
        self.push_stack(mmu, ret);
        self.regs.pc = irq.vector();
        self.step_ticks
    }

    /// Execute one instruction (or one idle period while halted or stopped)
    /// and return the ticks it took.
    pub fn step(&mut self, mmu: &mut Mmu) -> u32 {
        self.step_ticks = 0;
        let enable_after = self.ime_enable_delay == 1;

        if self.halted || self.stopped {
            self.tick(1);
        } else {
            self.execute(mmu);
        }

        if enable_after && self.ime_enable_delay > 0 {
            self.ime = true;
        }
        if self.ime_enable_delay > 0 {
            self.ime_enable_delay -= 1;
        }
        self.step_ticks
    }

    fn execute(&mut self, mmu: &mut Mmu) {
        #[cfg(feature = "cpu-trace")]
        let pc = self.regs.pc;

        let opcode = if self.halt_bug {
            self.halt_bug = false;
            self.read8(mmu, self.regs.pc)
        } else {
            self.fetch8(mmu)
        };

        #[cfg(feature = "cpu-trace")]
        trace!("{pc:04X}: {opcode:02X} {}", self.debug_state());

        match opcode {
            0x00 => {}
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.fetch16(mmu);
                self.write_pair(opcode >> 4, val);
            }
            0x02 => self.write8(mmu, self.regs.bc(), self.regs.a),
            0x12 => self.write8(mmu, self.regs.de(), self.regs.a),
            0x22 => {
                let addr = self.regs.hl();
                self.write8(mmu, addr, self.regs.a);
                self.regs.set_hl(addr.wrapping_add(1));
            }
            0x32 => {
                let addr = self.regs.hl();
                self.write8(mmu, addr, self.regs.a);
                self.regs.set_hl(addr.wrapping_sub(1));
            }
            0x03 | 0x13 | 0x23 | 0x33 => {
                let idx = opcode >> 4;
                let val = self.read_pair(idx).wrapping_add(1);
                self.write_pair(idx, val);
                self.tick(1);
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let idx = opcode >> 4;
                let val = self.read_pair(idx).wrapping_sub(1);
                self.write_pair(idx, val);
                self.tick(1);
            }
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = opcode >> 3;
                let val = self.read_reg(mmu, r);
                let res = alu::inc(val, &mut self.regs.f);
                self.write_reg(mmu, r, res);
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = opcode >> 3;
                let val = self.read_reg(mmu, r);
                let res = alu::dec(val, &mut self.regs.f);
                self.write_reg(mmu, r, res);
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let val = self.fetch8(mmu);
                self.write_reg(mmu, opcode >> 3, val);
            }
            0x07 => self.regs.a = alu::rlc(self.regs.a, false, &mut self.regs.f),
            0x0F => self.regs.a = alu::rrc(self.regs.a, false, &mut self.regs.f),
            0x17 => self.regs.a = alu::rl(self.regs.a, false, &mut self.regs.f),
            0x1F => self.regs.a = alu::rr(self.regs.a, false, &mut self.regs.f),
            0x08 => {
                let addr = self.fetch16(mmu);
                let sp = self.regs.sp;
                self.write8(mmu, addr, sp as u8);
                self.write8(mmu, addr.wrapping_add(1), (sp >> 8) as u8);
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                let val = self.read_pair(opcode >> 4);
                let res = alu::add16(self.regs.hl(), val, &mut self.regs.f);
                self.regs.set_hl(res);
                self.tick(1);
            }
            0x0A => self.regs.a = self.read8(mmu, self.regs.bc()),
            0x1A => self.regs.a = self.read8(mmu, self.regs.de()),
            0x2A => {
                let addr = self.regs.hl();
                self.regs.a = self.read8(mmu, addr);
                self.regs.set_hl(addr.wrapping_add(1));
            }
            0x3A => {
                let addr = self.regs.hl();
                self.regs.a = self.read8(mmu, addr);
                self.regs.set_hl(addr.wrapping_sub(1));
            }
            0x10 => {
                // STOP is followed by a padding byte that is skipped.
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.stopped = true;
            }
            0x18 => {
                let offset = self.fetch8(mmu);
                self.jump_relative(offset);
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch8(mmu);
                if self.condition((opcode >> 3) & 0x03) {
                    self.jump_relative(offset);
                }
            }
            0x27 => self.regs.a = alu::decimal_adjust(self.regs.a, &mut self.regs.f),
            0x2F => self.regs.a = alu::complement(self.regs.a, &mut self.regs.f),
            0x37 => {
                self.regs.f.set_n(false);
                self.regs.f.set_h(false);
                self.regs.f.set_c(true);
            }
            0x3F => {
                let carry = self.regs.f.c();
                self.regs.f.set_n(false);
                self.regs.f.set_h(false);
                self.regs.f.set_c(!carry);
            }
            0x76 => self.halt(mmu),
            0x40..=0x7F => {
                let val = self.read_reg(mmu, opcode & 0x07);
                self.write_reg(mmu, (opcode >> 3) & 0x07, val);
            }
            0x80..=0xBF => {
                let val = self.read_reg(mmu, opcode & 0x07);
                self.alu_a((opcode >> 3) & 0x07, val);
            }
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let val = self.fetch8(mmu);
                self.alu_a((opcode >> 3) & 0x07, val);
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                self.tick(1);
                if self.condition((opcode >> 3) & 0x03) {
                    self.ret(mmu);
                }
            }
            0xC9 => self.ret(mmu),
            0xD9 => {
                self.ret(mmu);
                self.ime = true;
            }
            0xC1 | 0xD1 | 0xE1 => {
                let val = self.pop_stack(mmu);
                self.write_pair((opcode >> 4) & 0x03, val);
            }
            0xF1 => {
                let val = self.pop_stack(mmu);
                self.regs.set_af(val);
            }
            0xC5 | 0xD5 | 0xE5 => {
                let val = self.read_pair((opcode >> 4) & 0x03);
                self.tick(1);
                self.push_stack(mmu, val);
            }
            0xF5 => {
                let val = self.regs.af();
                self.tick(1);
                self.push_stack(mmu, val);
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let target = self.fetch16(mmu);
                if self.condition((opcode >> 3) & 0x03) {
                    self.regs.pc = target;
                    self.tick(1);
                }
            }
            0xC3 => {
                self.regs.pc = self.fetch16(mmu);
                self.tick(1);
            }
            0xE9 => self.regs.pc = self.regs.hl(),
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let target = self.fetch16(mmu);
                if self.condition((opcode >> 3) & 0x03) {
                    self.call(mmu, target);
                }
            }
            0xCD => {
                let target = self.fetch16(mmu);
                self.call(mmu, target);
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.call(mmu, (opcode & 0x38) as u16);
            }
            0xCB => {
                let cb = self.fetch8(mmu);
                self.handle_cb(cb, mmu);
            }
            0xE0 => {
                let offset = self.fetch8(mmu);
                self.write8(mmu, 0xFF00 | offset as u16, self.regs.a);
            }
            0xF0 => {
                let offset = self.fetch8(mmu);
                self.regs.a = self.read8(mmu, 0xFF00 | offset as u16);
            }
            0xE2 => self.write8(mmu, 0xFF00 | self.regs.c as u16, self.regs.a),
            0xF2 => self.regs.a = self.read8(mmu, 0xFF00 | self.regs.c as u16),
            0xEA => {
                let addr = self.fetch16(mmu);
                self.write8(mmu, addr, self.regs.a);
            }
            0xFA => {
                let addr = self.fetch16(mmu);
                self.regs.a = self.read8(mmu, addr);
            }
            0xE8 => {
                let offset = self.fetch8(mmu) as i8;
                self.regs.sp = alu::add16_signed8(self.regs.sp, offset, &mut self.regs.f);
                self.tick(2);
            }
            0xF8 => {
                let offset = self.fetch8(mmu) as i8;
                let res = alu::add16_signed8(self.regs.sp, offset, &mut self.regs.f);
                self.regs.set_hl(res);
                self.tick(1);
            }
            0xF9 => {
                self.regs.sp = self.regs.hl();
                self.tick(1);
            }
            0xF3 => {
                self.ime = false;
                self.ime_enable_delay = 0;
            }
            0xFB => {
                self.ime_enable_delay = 2;
            }
            0xD3 | 0xDB | 0xDD | 0xE3 | 0xE4 | 0xEB | 0xEC | 0xED | 0xF4 | 0xFC | 0xFD => {
                warn!(
                    "illegal opcode {opcode:02X} at PC={:04X}",
                    self.regs.pc.wrapping_sub(1)
                );
            }
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
