//! Arithmetic and logic operations shared by the CPU.
//!
//! Every function takes its operands by value and writes the flag side
//! effects into the supplied [`Flags`]. Carry and half-carry for the adders
//! come from XOR-ing the operands with the result: a bit that differs from
//! the operand bits at that position can only have been produced by a carry
//! into it.

use crate::registers::Flags;

#[inline]
fn carry_bits(lhs: u16, rhs: u16, result: u16) -> u16 {
    lhs ^ rhs ^ result
}

pub fn add8(a: u8, b: u8, f: &mut Flags) -> u8 {
    adc_inner(a, b, false, f)
}

pub fn adc8(a: u8, b: u8, f: &mut Flags) -> u8 {
    let carry = f.c();
    adc_inner(a, b, carry, f)
}

fn adc_inner(a: u8, b: u8, carry: bool, f: &mut Flags) -> u8 {
    let sum = a as u16 + b as u16 + carry as u16;
    let bits = carry_bits(a as u16, b as u16, sum);
    let res = sum as u8;
    f.assign(res == 0, false, bits & 0x10 != 0, bits & 0x100 != 0);
    res
}

pub fn sub8(a: u8, b: u8, f: &mut Flags) -> u8 {
    sbc_inner(a, b, false, f)
}

pub fn sbc8(a: u8, b: u8, f: &mut Flags) -> u8 {
    let carry = f.c();
    sbc_inner(a, b, carry, f)
}

fn sbc_inner(a: u8, b: u8, carry: bool, f: &mut Flags) -> u8 {
    let diff = (a as u16).wrapping_sub(b as u16).wrapping_sub(carry as u16);
    let bits = carry_bits(a as u16, b as u16, diff);
    let res = diff as u8;
    f.assign(res == 0, true, bits & 0x10 != 0, bits & 0x100 != 0);
    res
}

/// Compare: a subtraction whose result is discarded.
pub fn cp(a: u8, b: u8, f: &mut Flags) {
    sub8(a, b, f);
}

pub fn and(a: u8, b: u8, f: &mut Flags) -> u8 {
    let res = a & b;
    f.assign(res == 0, false, true, false);
    res
}

pub fn or(a: u8, b: u8, f: &mut Flags) -> u8 {
    let res = a | b;
    f.assign(res == 0, false, false, false);
    res
}

pub fn xor(a: u8, b: u8, f: &mut Flags) -> u8 {
    let res = a ^ b;
    f.assign(res == 0, false, false, false);
    res
}

/// 8-bit increment. Carry is left untouched.
pub fn inc(v: u8, f: &mut Flags) -> u8 {
    let res = v.wrapping_add(1);
    f.set_z(res == 0);
    f.set_n(false);
    f.set_h((v ^ 1 ^ res) & 0x10 != 0);
    res
}

/// 8-bit decrement. Carry is left untouched.
pub fn dec(v: u8, f: &mut Flags) -> u8 {
    let res = v.wrapping_sub(1);
    f.set_z(res == 0);
    f.set_n(true);
    f.set_h((v ^ 1 ^ res) & 0x10 != 0);
    res
}

/// `ADD HL, rr`. Zero is left untouched.
pub fn add16(a: u16, b: u16, f: &mut Flags) -> u16 {
    let sum = a as u32 + b as u32;
    let bits = a as u32 ^ b as u32 ^ sum;
    f.set_n(false);
    f.set_h(bits & 0x1000 != 0);
    f.set_c(bits & 0x1_0000 != 0);
    sum as u16
}

/// `ADD SP, e` and `LD HL, SP+e`.
///
/// The displacement is sign-extended for the result but the flags come from
/// an unsigned add of its raw byte to the low byte of `base`.
pub fn add16_signed8(base: u16, offset: i8, f: &mut Flags) -> u16 {
    let raw = offset as u8 as u16;
    let res = base.wrapping_add(offset as i16 as u16);
    let low = base & 0x00FF;
    let bits = carry_bits(low, raw, low + raw);
    f.assign(false, false, bits & 0x10 != 0, bits & 0x100 != 0);
    res
}

/// `DAA`: fix up the accumulator after a BCD add or subtract.
pub fn decimal_adjust(a: u8, f: &mut Flags) -> u8 {
    let mut correction = 0u8;
    let mut carry = false;
    if f.h() || (!f.n() && a & 0x0F > 0x09) {
        correction |= 0x06;
    }
    if f.c() || (!f.n() && a > 0x99) {
        correction |= 0x60;
        carry = true;
    }
    let res = if f.n() {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    f.set_z(res == 0);
    f.set_h(false);
    f.set_c(carry);
    res
}

/// `CPL`.
pub fn complement(a: u8, f: &mut Flags) -> u8 {
    f.set_n(true);
    f.set_h(true);
    !a
}

// The accumulator rotates (RLCA, RLA, RRCA, RRA) always clear Z, the CB
// forms compute it. `set_zero` selects between the two.

#[inline]
fn shifted(res: u8, carry_out: bool, set_zero: bool, f: &mut Flags) -> u8 {
    f.assign(set_zero && res == 0, false, false, carry_out);
    res
}

pub fn rlc(v: u8, set_zero: bool, f: &mut Flags) -> u8 {
    shifted(v.rotate_left(1), v & 0x80 != 0, set_zero, f)
}

pub fn rl(v: u8, set_zero: bool, f: &mut Flags) -> u8 {
    let res = (v << 1) | f.c() as u8;
    shifted(res, v & 0x80 != 0, set_zero, f)
}

pub fn rrc(v: u8, set_zero: bool, f: &mut Flags) -> u8 {
    shifted(v.rotate_right(1), v & 0x01 != 0, set_zero, f)
}

pub fn rr(v: u8, set_zero: bool, f: &mut Flags) -> u8 {
    let res = (v >> 1) | ((f.c() as u8) << 7);
    shifted(res, v & 0x01 != 0, set_zero, f)
}

pub fn sla(v: u8, f: &mut Flags) -> u8 {
    shifted(v << 1, v & 0x80 != 0, true, f)
}

pub fn sra(v: u8, f: &mut Flags) -> u8 {
    shifted((v >> 1) | (v & 0x80), v & 0x01 != 0, true, f)
}

pub fn srl(v: u8, f: &mut Flags) -> u8 {
    shifted(v >> 1, v & 0x01 != 0, true, f)
}

pub fn swap(v: u8, f: &mut Flags) -> u8 {
    shifted(v.rotate_left(4), false, true, f)
}

/// `BIT n, r`: Z is the complement of the tested bit. Carry is untouched.
pub fn bit(n: u8, v: u8, f: &mut Flags) {
    f.set_z(v & (1 << n) == 0);
    f.set_n(false);
    f.set_h(true);
}

pub fn set(n: u8, v: u8) -> u8 {
    v | (1 << n)
}

pub fn res(n: u8, v: u8) -> u8 {
    v & !(1 << n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bcd(n: u8) -> u8 {
        ((n / 10) << 4) | (n % 10)
    }

    #[test]
    fn subtract_undoes_add_with_matching_carries() {
        for carry_in in [false, true] {
            for a in 0..=255u8 {
                for b in 0..=255u8 {
                    let mut f = Flags::default();
                    f.set_c(carry_in);
                    let sum = adc8(a, b, &mut f);
                    let add_flags = f;

                    let mut g = Flags::default();
                    g.set_c(carry_in);
                    let back = sbc8(sum, b, &mut g);

                    assert_eq!(back, a, "a={a:02X} b={b:02X} c={carry_in}");
                    assert_eq!(add_flags.c(), g.c(), "carry a={a:02X} b={b:02X}");
                    assert_eq!(add_flags.h(), g.h(), "half a={a:02X} b={b:02X}");
                    assert!(!add_flags.n() && g.n());
                }
            }
        }
    }

    #[test]
    fn daa_after_add_yields_bcd_sum() {
        for x in 0..100u8 {
            for y in 0..100u8 {
                let mut f = Flags::default();
                let raw = add8(to_bcd(x), to_bcd(y), &mut f);
                let adjusted = decimal_adjust(raw, &mut f);
                let expected = (x as u16 + y as u16) % 100;
                assert_eq!(adjusted, to_bcd(expected as u8), "{x} + {y}");
                assert_eq!(f.c(), x as u16 + y as u16 >= 100, "{x} + {y}");
                assert_eq!(f.z(), adjusted == 0);
                assert!(!f.h());
            }
        }
    }

    #[test]
    fn daa_after_sub_yields_bcd_difference() {
        for x in 0..100u8 {
            for y in 0..100u8 {
                let mut f = Flags::default();
                let raw = sub8(to_bcd(x), to_bcd(y), &mut f);
                let adjusted = decimal_adjust(raw, &mut f);
                let expected = (x as i16 - y as i16).rem_euclid(100) as u8;
                assert_eq!(adjusted, to_bcd(expected), "{x} - {y}");
                assert_eq!(f.c(), x < y, "{x} - {y}");
            }
        }
    }

    #[test]
    fn inc_dec_leave_carry_alone() {
        let mut f = Flags::from_bits(0x10);
        assert_eq!(inc(0x0F, &mut f), 0x10);
        assert!(f.h() && f.c() && !f.z());
        assert_eq!(inc(0xFF, &mut f), 0x00);
        assert!(f.z() && f.h() && f.c());

        let mut f = Flags::default();
        assert_eq!(dec(0x10, &mut f), 0x0F);
        assert!(f.h() && f.n() && !f.c());
        assert_eq!(dec(0x01, &mut f), 0x00);
        assert!(f.z() && !f.h());
    }

    #[test]
    fn add16_keeps_zero_and_carries_from_bits_11_and_15() {
        let mut f = Flags::from_bits(0x80);
        assert_eq!(add16(0x0FFF, 0x0001, &mut f), 0x1000);
        assert!(f.z() && f.h() && !f.c());
        assert_eq!(add16(0xFFFF, 0x0001, &mut f), 0x0000);
        assert!(f.z() && f.h() && f.c());
        assert_eq!(add16(0x1000, 0x1000, &mut f), 0x2000);
        assert!(!f.h() && !f.c());
    }

    #[test]
    fn signed_offset_flags_use_unsigned_low_byte() {
        let mut f = Flags::from_bits(0xF0);
        // -1 as a raw byte is 0xFF: both nibble and byte carries fire.
        assert_eq!(add16_signed8(0x00FF, -1, &mut f), 0x00FE);
        assert!(f.h() && f.c() && !f.z() && !f.n());

        assert_eq!(add16_signed8(0x0000, -1, &mut f), 0xFFFF);
        assert!(!f.h() && !f.c());

        assert_eq!(add16_signed8(0xFFF8, 8, &mut f), 0x0000);
        assert!(f.h() && f.c() && !f.z());
    }

    #[test]
    fn logic_flag_rules() {
        let mut f = Flags::from_bits(0xF0);
        assert_eq!(and(0xF0, 0x0F, &mut f), 0);
        assert_eq!(f.bits(), 0xA0);
        assert_eq!(or(0x00, 0x01, &mut f), 1);
        assert_eq!(f.bits(), 0x00);
        assert_eq!(xor(0x55, 0x55, &mut f), 0);
        assert_eq!(f.bits(), 0x80);
    }

    #[test]
    fn cp_matches_sub_flags() {
        for (a, b) in [(0x10, 0x01), (0x00, 0x01), (0x42, 0x42), (0x80, 0x7F)] {
            let mut f1 = Flags::default();
            let mut f2 = Flags::default();
            cp(a, b, &mut f1);
            sub8(a, b, &mut f2);
            assert_eq!(f1, f2);
        }
    }

    #[test]
    fn accumulator_rotates_never_report_zero() {
        let mut f = Flags::default();
        assert_eq!(rlc(0x00, false, &mut f), 0x00);
        assert!(!f.z());
        assert_eq!(rlc(0x00, true, &mut f), 0x00);
        assert!(f.z());

        let mut f = Flags::default();
        assert_eq!(rl(0x80, false, &mut f), 0x00);
        assert!(!f.z() && f.c());
        assert_eq!(rl(0x00, true, &mut f), 0x01);
        assert!(!f.c());

        let mut f = Flags::from_bits(0x10);
        assert_eq!(rr(0x01, true, &mut f), 0x80);
        assert!(f.c() && !f.z());
        assert_eq!(rrc(0x01, true, &mut f), 0x80);
        assert!(f.c());
    }

    #[test]
    fn shifts_and_swap() {
        let mut f = Flags::default();
        assert_eq!(sla(0x81, &mut f), 0x02);
        assert!(f.c());
        assert_eq!(sra(0x81, &mut f), 0xC0);
        assert!(f.c());
        assert_eq!(srl(0x01, &mut f), 0x00);
        assert!(f.c() && f.z());
        assert_eq!(swap(0xA5, &mut f), 0x5A);
        assert_eq!(f.bits(), 0);
    }

    #[test]
    fn bit_sets_zero_to_complement_and_keeps_carry() {
        let mut f = Flags::from_bits(0x10 | 0x40);
        bit(3, 0x08, &mut f);
        assert!(!f.z() && f.h() && !f.n() && f.c());
        bit(2, 0x08, &mut f);
        assert!(f.z() && f.c());
        assert_eq!(set(7, 0x00), 0x80);
        assert_eq!(res(0, 0xFF), 0xFE);
    }

    #[test]
    fn complement_sets_n_and_h_only() {
        let mut f = Flags::from_bits(0x90);
        assert_eq!(complement(0x3C, &mut f), 0xC3);
        assert_eq!(f.bits(), 0xF0);
    }
}
