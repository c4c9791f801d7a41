//! Exception vector numbers and the supervisor trampolines installed
//! behind them.
//!
//! The monitor runs no operating system; every vector that matters points
//! at a few words of hand-assembled supervisor code that converts the
//! exception into something the host can observe. Faults funnel into
//! `BKPT #7`, the system-call gate turns `TRAP #0` into `BKPT #2` at the
//! call site, and `TRAP #15` lands on a `STOP` that finishes the run.

use crate::memory::{BusError, Memory};

/// Vector 0: initial supervisor stack pointer.
pub const VEC_RESET_SSP: u32 = 0;
/// Vector 1: initial program counter.
pub const VEC_RESET_PC: u32 = 1;
/// Vector 2: bus error (access outside the guest region).
pub const VEC_BUS_ERROR: u32 = 2;
/// Vector 3: address error (odd word or longword access).
pub const VEC_ADDRESS_ERROR: u32 = 3;
/// Vector 4: illegal instruction.
pub const VEC_ILLEGAL: u32 = 4;
/// Vector 5: integer divide by zero.
pub const VEC_ZERO_DIVIDE: u32 = 5;
/// Vector 6: CHK out of bounds.
pub const VEC_CHK: u32 = 6;
/// Vector 7: TRAPV with V set.
pub const VEC_TRAPV: u32 = 7;
/// Vector 8: privilege violation.
pub const VEC_PRIVILEGE: u32 = 8;
/// Vector 10: line 1010 emulator.
pub const VEC_LINE_A: u32 = 10;
/// Vector 11: line 1111 emulator.
pub const VEC_LINE_F: u32 = 11;
/// Vector 32 + n: `TRAP #n`.
pub const VEC_TRAP_BASE: u32 = 32;
/// Vector 47: `TRAP #15`, the clean-exit trap.
pub const VEC_TRAP_15: u32 = VEC_TRAP_BASE + 15;

/// `BKPT #2`, the word the system-call gate plants at the call site.
pub const SYSCALL_BREAKPOINT: u16 = 0x484A;

/// Fault handler shared by every hardware-fault vector.
pub const BKPT_7_CODE: [u16; 1] = [
    0x484F, // BKPT #7
];

/// Handler behind `TRAP #15`: stop with the operand that finishes the run.
pub const FINISH_CODE: [u16; 2] = [
    0x4E72, 0xFFFF, // STOP #0xFFFF
];

/// The `TRAP #0` system-call gate.
///
/// Rewinds the stacked PC onto the TRAP word, overwrites that word with
/// `BKPT #2`, and returns through RTE so the breakpoint is taken in user
/// mode at the call site. Subsequent calls through the same site hit the
/// planted breakpoint directly, skipping the gate.
pub const TRAP_0_CODE: [u16; 7] = [
    0x41EF, 0x0002, // LEA    (2,A7),A0
    0x5590,         // SUBQ.L #2,(A0)
    0x2050,         // MOVEA.L (A0),A0
    0x30BC, 0x484A, // MOVE.W #0x484A,(A0)
    0x4E73,         // RTE
];

/// Line-A handler: skip the unimplemented word and resume.
pub const LINE_A_CODE: [u16; 3] = [
    0x54AF, 0x0002, // ADDQ.L #2,(2,A7)
    0x4E73,         // RTE
];

/// Stores a handler body at `addr`, returning the address past it.
pub(crate) fn write_words(mem: &mut Memory, addr: u32, words: &[u16]) -> Result<u32, BusError> {
    let mut addr = addr;
    for &word in words {
        mem.write_u16(addr, word)?;
        addr = addr.wrapping_add(2);
    }
    Ok(addr)
}

/// Points an exception vector at a handler.
pub(crate) fn set_vector(mem: &mut Memory, vector: u32, handler: u32) -> Result<(), BusError> {
    mem.write_u32(vector * 4, handler)
}

#[cfg(test)]
mod tests {
    use super::{write_words, TRAP_0_CODE};
    use crate::memory::Memory;

    #[test]
    fn handler_bodies_store_word_for_word() {
        let mut mem = Memory::new(64);
        let end = write_words(&mut mem, 8, &TRAP_0_CODE).unwrap();
        assert_eq!(end, 8 + 2 * TRAP_0_CODE.len() as u32);
        assert_eq!(mem.read_u16(8).unwrap(), 0x41EF);
        assert_eq!(mem.read_u16(end - 2).unwrap(), 0x4E73);
    }
}
