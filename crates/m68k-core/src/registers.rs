//! MC68000 register file and status-register model.
//!
//! - D0-D7: 32-bit data registers
//! - A0-A6: 32-bit address registers
//! - A7: the active stack pointer, backed by separate USP/SSP shadows
//! - PC: program counter
//! - SR: status register (CCR low byte, interrupt mask, S and T bits)
//!
//! Exactly one of the two stack-pointer shadows is live in A7 at a time,
//! selected by the S bit; flipping S swaps the shadow transparently.

/// Carry flag.
pub const SR_C: u16 = 0x0001;
/// Overflow flag.
pub const SR_V: u16 = 0x0002;
/// Zero flag.
pub const SR_Z: u16 = 0x0004;
/// Negative flag.
pub const SR_N: u16 = 0x0008;
/// Extend flag.
pub const SR_X: u16 = 0x0010;
/// Supervisor mode bit.
pub const SR_S: u16 = 0x2000;
/// Trace mode bit.
pub const SR_T: u16 = 0x8000;

/// Mask of condition-code bits (the CCR).
pub const CCR_MASK: u16 = 0x001F;
/// Mask of implemented SR bits; reserved bits always read as zero.
pub const SR_MASK: u16 = 0xA71F;

/// Status register value established by the reset sequence:
/// supervisor mode, interrupt mask 7, everything else clear.
pub const SR_RESET: u16 = 0x2700;

/// MC68000 register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// Data registers D0-D7.
    pub d: [u32; 8],
    /// Address registers A0-A6; A7 lives in the USP/SSP shadows.
    pub a: [u32; 7],
    /// User stack pointer (live as A7 while the S bit is clear).
    pub usp: u32,
    /// Supervisor stack pointer (live as A7 while the S bit is set).
    pub ssp: u32,
    /// Program counter.
    pub pc: u32,
    /// Status register.
    pub sr: u16,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    /// Registers in their post-reset configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            d: [0; 8],
            a: [0; 7],
            usp: 0,
            ssp: 0,
            pc: 0,
            sr: SR_RESET,
        }
    }

    /// Reads address register `n` (0-7); A7 resolves to the live shadow.
    #[must_use]
    pub fn addr(&self, n: usize) -> u32 {
        debug_assert!(n < 8);
        if n < 7 {
            self.a[n]
        } else {
            self.sp()
        }
    }

    /// Writes address register `n` (0-7); A7 resolves to the live shadow.
    pub fn set_addr(&mut self, n: usize, value: u32) {
        debug_assert!(n < 8);
        if n < 7 {
            self.a[n] = value;
        } else {
            self.set_sp(value);
        }
    }

    /// The live stack pointer: SSP in supervisor mode, USP otherwise.
    #[must_use]
    pub const fn sp(&self) -> u32 {
        if self.is_supervisor() {
            self.ssp
        } else {
            self.usp
        }
    }

    /// Writes the live stack pointer.
    pub fn set_sp(&mut self, value: u32) {
        if self.is_supervisor() {
            self.ssp = value;
        } else {
            self.usp = value;
        }
    }

    /// True while the S bit is set.
    #[must_use]
    pub const fn is_supervisor(&self) -> bool {
        self.sr & SR_S != 0
    }

    /// Writes the full status register, masking reserved bits.
    ///
    /// A change of the S bit implicitly swaps which stack-pointer shadow
    /// the next A7 access resolves to; the shadows themselves are untouched.
    pub fn set_sr(&mut self, value: u16) {
        self.sr = value & SR_MASK;
    }

    /// The condition-code register (low byte of SR).
    #[must_use]
    pub const fn ccr(&self) -> u16 {
        self.sr & CCR_MASK
    }

    /// Writes the condition-code register, leaving the system byte alone.
    pub fn set_ccr(&mut self, value: u16) {
        self.sr = (self.sr & !CCR_MASK) | (value & CCR_MASK);
    }

    /// Sets or clears one status flag.
    pub fn set_flag(&mut self, flag: u16, value: bool) {
        if value {
            self.sr |= flag;
        } else {
            self.sr &= !flag;
        }
    }

    /// True when `flag` is set.
    #[must_use]
    pub const fn flag(&self, flag: u16) -> bool {
        self.sr & flag != 0
    }

    /// Evaluates one of the 16 condition-code predicates (Bcc/DBcc/Scc).
    #[must_use]
    pub fn condition(&self, cc: u8) -> bool {
        let c = self.flag(SR_C);
        let v = self.flag(SR_V);
        let z = self.flag(SR_Z);
        let n = self.flag(SR_N);
        match cc & 0x0F {
            0x0 => true,        // T
            0x1 => false,       // F
            0x2 => !c && !z,    // HI
            0x3 => c || z,      // LS
            0x4 => !c,          // CC
            0x5 => c,           // CS
            0x6 => !z,          // NE
            0x7 => z,           // EQ
            0x8 => !v,          // VC
            0x9 => v,           // VS
            0xA => !n,          // PL
            0xB => n,           // MI
            0xC => n == v,      // GE
            0xD => n != v,      // LT
            0xE => !z && n == v, // GT
            _ => z || n != v,   // LE
        }
    }
}
