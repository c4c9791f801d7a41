//! Operand sizes and flag-computing arithmetic helpers.
//!
//! Every helper takes operands already truncated to the operation size,
//! returns the truncated result, and computes the full CCR effect for its
//! instruction class, so `execute` only routes values.

use crate::registers::{SR_C, SR_N, SR_V, SR_X, SR_Z};

/// Operand size of a 68000 data operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Size {
    /// 8-bit operand.
    Byte,
    /// 16-bit operand.
    Word,
    /// 32-bit operand.
    Long,
}

impl Size {
    /// Decodes the common 2-bit size field (00/01/10).
    #[must_use]
    pub const fn from_bits(bits: u16) -> Option<Self> {
        match bits & 3 {
            0 => Some(Self::Byte),
            1 => Some(Self::Word),
            2 => Some(Self::Long),
            _ => None,
        }
    }

    /// Decodes the MOVE-format size field (01 = byte, 11 = word, 10 = long).
    #[must_use]
    pub const fn from_move_bits(bits: u16) -> Option<Self> {
        match bits & 3 {
            1 => Some(Self::Byte),
            3 => Some(Self::Word),
            2 => Some(Self::Long),
            _ => None,
        }
    }

    /// Operand width in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Long => 4,
        }
    }

    /// Mask selecting the operand's low bits within a `u32`.
    #[must_use]
    pub const fn mask(self) -> u32 {
        match self {
            Self::Byte => 0xFF,
            Self::Word => 0xFFFF,
            Self::Long => 0xFFFF_FFFF,
        }
    }

    /// Mask of the operand's sign bit.
    #[must_use]
    pub const fn msb(self) -> u32 {
        match self {
            Self::Byte => 0x80,
            Self::Word => 0x8000,
            Self::Long => 0x8000_0000,
        }
    }

    /// Sign-extends a truncated operand to 32 bits.
    #[must_use]
    pub const fn sign_extend(self, value: u32) -> u32 {
        match self {
            Self::Byte => value as u8 as i8 as u32,
            Self::Word => value as u16 as i16 as u32,
            Self::Long => value,
        }
    }

    /// Merges a sized result into the low bits of a full register value.
    #[must_use]
    pub const fn merge(self, register: u32, result: u32) -> u32 {
        (register & !self.mask()) | (result & self.mask())
    }
}

fn with_nz(sr: u16, value: u32, size: Size) -> u16 {
    let mut sr = sr & !(SR_N | SR_Z);
    if value & size.mask() == 0 {
        sr |= SR_Z;
    }
    if value & size.msb() != 0 {
        sr |= SR_N;
    }
    sr
}

/// N/Z from the value, V/C cleared: MOVE, logic ops, TST, EXT, SWAP.
#[must_use]
pub fn move_flags(sr: u16, value: u32, size: Size) -> u16 {
    with_nz(sr, value, size) & !(SR_V | SR_C)
}

fn set_if(sr: u16, flag: u16, cond: bool) -> u16 {
    if cond {
        sr | flag
    } else {
        sr & !flag
    }
}

/// `dst + src` with the full ADD flag set (X follows C).
#[must_use]
pub fn add(src: u32, dst: u32, size: Size, sr: u16) -> (u32, u16) {
    let (result, carry, overflow) = add_core(src, dst, 0, size);
    let mut sr = with_nz(sr, result, size);
    sr = set_if(sr, SR_C, carry);
    sr = set_if(sr, SR_X, carry);
    sr = set_if(sr, SR_V, overflow);
    (result, sr)
}

/// `dst + src + X` with sticky Z (ADDX).
#[must_use]
pub fn addx(src: u32, dst: u32, size: Size, sr: u16) -> (u32, u16) {
    let x = u32::from(sr & SR_X != 0);
    let (result, carry, overflow) = add_core(src, dst, x, size);
    let mut new = set_if(sr, SR_N, result & size.msb() != 0);
    if result & size.mask() != 0 {
        new &= !SR_Z; // Z only clears; never set by ADDX
    }
    new = set_if(new, SR_C, carry);
    new = set_if(new, SR_X, carry);
    new = set_if(new, SR_V, overflow);
    (result, new)
}

fn add_core(src: u32, dst: u32, carry_in: u32, size: Size) -> (u32, bool, bool) {
    let mask = size.mask();
    let msb = size.msb();
    let (src, dst) = (src & mask, dst & mask);
    let wide = u64::from(src) + u64::from(dst) + u64::from(carry_in);
    let result = (wide as u32) & mask;
    let carry = wide > u64::from(mask);
    let overflow = (src ^ result) & (dst ^ result) & msb != 0;
    (result, carry, overflow)
}

/// `dst - src` with the full SUB flag set (X follows C).
#[must_use]
pub fn sub(src: u32, dst: u32, size: Size, sr: u16) -> (u32, u16) {
    let (result, borrow, overflow) = sub_core(src, dst, 0, size);
    let mut sr = with_nz(sr, result, size);
    sr = set_if(sr, SR_C, borrow);
    sr = set_if(sr, SR_X, borrow);
    sr = set_if(sr, SR_V, overflow);
    (result, sr)
}

/// `dst - src - X` with sticky Z (SUBX).
#[must_use]
pub fn subx(src: u32, dst: u32, size: Size, sr: u16) -> (u32, u16) {
    let x = u32::from(sr & SR_X != 0);
    let (result, borrow, overflow) = sub_core(src, dst, x, size);
    let mut new = set_if(sr, SR_N, result & size.msb() != 0);
    if result & size.mask() != 0 {
        new &= !SR_Z;
    }
    new = set_if(new, SR_C, borrow);
    new = set_if(new, SR_X, borrow);
    new = set_if(new, SR_V, overflow);
    (result, new)
}

/// `dst - src` setting N/Z/V/C but leaving X alone (CMP family).
#[must_use]
pub fn cmp(src: u32, dst: u32, size: Size, sr: u16) -> u16 {
    let (result, borrow, overflow) = sub_core(src, dst, 0, size);
    let mut sr = with_nz(sr, result, size);
    sr = set_if(sr, SR_C, borrow);
    sr = set_if(sr, SR_V, overflow);
    sr
}

fn sub_core(src: u32, dst: u32, borrow_in: u32, size: Size) -> (u32, bool, bool) {
    let mask = size.mask();
    let msb = size.msb();
    let (src, dst) = (src & mask, dst & mask);
    let wide = u64::from(dst)
        .wrapping_sub(u64::from(src))
        .wrapping_sub(u64::from(borrow_in));
    let result = (wide as u32) & mask;
    let borrow = u64::from(src) + u64::from(borrow_in) > u64::from(dst);
    let overflow = (src ^ dst) & (result ^ dst) & msb != 0;
    (result, borrow, overflow)
}

/// `0 - dst` (NEG).
#[must_use]
pub fn neg(dst: u32, size: Size, sr: u16) -> (u32, u16) {
    sub(dst, 0, size, sr)
}

/// `0 - dst - X` with sticky Z (NEGX).
#[must_use]
pub fn negx(dst: u32, size: Size, sr: u16) -> (u32, u16) {
    subx(dst, 0, size, sr)
}

/// Shift and rotate variants sharing one evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    /// Arithmetic shift (ASL/ASR).
    Arithmetic,
    /// Logical shift (LSL/LSR).
    Logical,
    /// Rotate with extend (ROXL/ROXR).
    RotateExtend,
    /// Plain rotate (ROL/ROR).
    Rotate,
}

impl ShiftKind {
    /// Decodes the 2-bit shift-type field.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        match bits & 3 {
            0 => Self::Arithmetic,
            1 => Self::Logical,
            2 => Self::RotateExtend,
            _ => Self::Rotate,
        }
    }
}

/// Applies a shift/rotate of `count` places (already reduced mod 64).
///
/// Implements the per-variant C/X/V rules: ASL accumulates V over every
/// step, rotates leave X alone, ROXL/ROXR load C from X at count zero.
#[must_use]
pub fn shift(kind: ShiftKind, left: bool, value: u32, count: u32, size: Size, sr: u16) -> (u32, u16) {
    let mask = size.mask();
    let msb = size.msb();
    let mut value = value & mask;
    let mut x = sr & SR_X != 0;
    let mut carry = false;
    let mut overflow = false;

    if count == 0 {
        let mut new = with_nz(sr, value, size) & !SR_V;
        new = set_if(new, SR_C, matches!(kind, ShiftKind::RotateExtend) && x);
        return (value, new);
    }

    for _ in 0..count {
        if left {
            let out = value & msb != 0;
            value = (value << 1) & mask;
            match kind {
                ShiftKind::Arithmetic => {
                    if out != (value & msb != 0) {
                        overflow = true;
                    }
                    carry = out;
                    x = out;
                }
                ShiftKind::Logical => {
                    carry = out;
                    x = out;
                }
                ShiftKind::RotateExtend => {
                    value |= u32::from(x);
                    carry = out;
                    x = out;
                }
                ShiftKind::Rotate => {
                    value |= u32::from(out);
                    carry = out;
                }
            }
        } else {
            let out = value & 1 != 0;
            value >>= 1;
            match kind {
                ShiftKind::Arithmetic => {
                    // sign bit replicates on the way down
                    if value & (msb >> 1) != 0 {
                        value |= msb;
                    }
                    carry = out;
                    x = out;
                }
                ShiftKind::Logical => {
                    carry = out;
                    x = out;
                }
                ShiftKind::RotateExtend => {
                    if x {
                        value |= msb;
                    }
                    carry = out;
                    x = out;
                }
                ShiftKind::Rotate => {
                    if out {
                        value |= msb;
                    }
                    carry = out;
                }
            }
        }
    }

    let mut new = with_nz(sr, value, size);
    new = set_if(new, SR_C, carry);
    new = set_if(new, SR_V, matches!(kind, ShiftKind::Arithmetic) && left && overflow);
    if !matches!(kind, ShiftKind::Rotate) {
        new = set_if(new, SR_X, x);
    }
    (value, new)
}

/// Outcome of a DIVU/DIVS with a non-zero divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivResult {
    /// Quotient fit in 16 bits; remainder in the high word.
    Ok {
        /// 16-bit quotient.
        quotient: u16,
        /// 16-bit remainder.
        remainder: u16,
    },
    /// Quotient overflowed 16 bits; destination is left unchanged.
    Overflow,
}

/// Unsigned 32/16 division. The divisor must be non-zero.
#[must_use]
pub fn divu(dividend: u32, divisor: u16) -> DivResult {
    let divisor = u32::from(divisor);
    let quotient = dividend / divisor;
    if quotient > 0xFFFF {
        DivResult::Overflow
    } else {
        DivResult::Ok {
            quotient: quotient as u16,
            remainder: (dividend % divisor) as u16,
        }
    }
}

/// Signed 32/16 division. The divisor must be non-zero.
#[must_use]
pub fn divs(dividend: u32, divisor: u16) -> DivResult {
    let dividend = dividend as i32;
    let divisor = i32::from(divisor as i16);
    let quotient = dividend.wrapping_div(divisor);
    if quotient > i32::from(i16::MAX) || quotient < i32::from(i16::MIN) {
        DivResult::Overflow
    } else {
        DivResult::Ok {
            quotient: quotient as u16,
            remainder: dividend.wrapping_rem(divisor) as u16,
        }
    }
}

/// Packed-BCD `dst + src + X` (ABCD); returns the byte result and carry.
#[must_use]
pub fn abcd(src: u8, dst: u8, x: bool) -> (u8, bool) {
    let mut low = (src & 0x0F) + (dst & 0x0F) + u8::from(x);
    let mut high = (src >> 4) + (dst >> 4);
    if low > 9 {
        low += 6;
    }
    high += low >> 4;
    low &= 0x0F;
    let carry = high > 9;
    if carry {
        high += 6;
    }
    (((high & 0x0F) << 4) | low, carry)
}

/// Packed-BCD `dst - src - X` (SBCD/NBCD); returns the byte result and borrow.
#[must_use]
pub fn sbcd(src: u8, dst: u8, x: bool) -> (u8, bool) {
    let low = i16::from(dst & 0x0F) - i16::from(src & 0x0F) - i16::from(x);
    let mut high = i16::from(dst >> 4) - i16::from(src >> 4);
    let mut low = low;
    if low < 0 {
        low += 10;
        high -= 1;
    }
    let borrow = high < 0;
    if high < 0 {
        high += 10;
    }
    ((((high as u8) & 0x0F) << 4) | ((low as u8) & 0x0F), borrow)
}
