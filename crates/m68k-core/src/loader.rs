//! Boot-image construction: memory map, vector table, trampolines,
//! parameter area, and the user program's code segment.
//!
//! The layout is explicit configuration rather than baked-in constants;
//! [`MemoryLayout::default`] reproduces the map a small user-mode program
//! expects:
//!
//! ```text
//! 0x0000  exception vectors (pattern-filled, then selectively set)
//! 0x0400  supervisor trampolines
//! 0x0800  initial SSP (supervisor stack grows down from here)
//! 0x1000  parameter area (parameter blocks, argc, argv, strings)
//! 0x3000  initial USP and the code segment
//! ```
//!
//! Every address the boot loader bakes into an absolute-short operand
//! must sign-extend cleanly, so the whole map has to sit below `0x8000`;
//! [`build_boot_image`] rejects layouts that do not.

use thiserror::Error;

use crate::memory::{BusError, Memory};
use crate::vectors;

/// Byte offsets inside the parameter area.
const USER_PB_OFFSET: u32 = 0;
const ERRNO_PTR_OFFSET: u32 = 8;
const SYSTEM_PB_OFFSET: u32 = 20;
const ARGC_OFFSET: u32 = 40;
const ARGV_OFFSET: u32 = 44;
const STRINGS_OFFSET: u32 = 48;

/// Fill byte for uninstalled vectors: reads back as an odd handler
/// address, so a stray exception halts instead of executing garbage.
const VECTOR_FILL: u8 = 0xFF;

/// Placement of the fixed regions inside the guest address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Start of the trampoline region.
    pub os_address: u32,
    /// Initial supervisor stack pointer (vector 0 seed).
    pub initial_ssp: u32,
    /// Start of the parameter area.
    pub param_address: u32,
    /// Size of the parameter area in bytes.
    pub param_size: u32,
    /// Initial user stack pointer (the user stack grows down from the
    /// code segment).
    pub initial_usp: u32,
    /// Start of the code segment.
    pub code_address: u32,
    /// Size of the code segment in bytes.
    pub code_size: u32,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            os_address: 0x0400,
            initial_ssp: 0x0800,
            param_address: 0x1000,
            param_size: 0x1000,
            initial_usp: 0x3000,
            code_address: 0x3000,
            code_size: 0x8000,
        }
    }
}

impl MemoryLayout {
    /// Total guest region size implied by the layout.
    #[must_use]
    pub const fn total_size(&self) -> u32 {
        self.code_address + self.code_size
    }

    /// Address of the user parameter block.
    #[must_use]
    pub const fn user_pb(&self) -> u32 {
        self.param_address + USER_PB_OFFSET
    }

    /// Address of the errno-variable pointer inside the user parameter
    /// block (null while the program has not registered one).
    #[must_use]
    pub const fn errno_ptr(&self) -> u32 {
        self.param_address + ERRNO_PTR_OFFSET
    }

    /// Address of the system parameter block; its first field points at
    /// the current user parameter block.
    #[must_use]
    pub const fn system_pb(&self) -> u32 {
        self.param_address + SYSTEM_PB_OFFSET
    }

    const fn argc_address(&self) -> u32 {
        self.param_address + ARGC_OFFSET
    }

    const fn argv_address(&self) -> u32 {
        self.param_address + ARGV_OFFSET
    }

    const fn strings_address(&self) -> u32 {
        self.param_address + STRINGS_OFFSET
    }
}

/// Failures while assembling a boot image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootError {
    /// The program does not fit in the code segment.
    #[error("program is {len} bytes but the code segment holds only {max}")]
    CodeTooLarge {
        /// Program size in bytes.
        len: usize,
        /// Code segment capacity in bytes.
        max: u32,
    },
    /// Argument strings overflow the parameter area.
    #[error("arguments need {needed} bytes but the parameter area holds only {max}")]
    ArgsTooLarge {
        /// Bytes the argument vector and strings require.
        needed: u64,
        /// Parameter area capacity in bytes.
        max: u32,
    },
    /// An address the loader must encode as an absolute-short operand
    /// does not sign-extend to itself.
    #[error("layout address {addr:#010x} is not absolute-short addressable")]
    NotShortAddressable {
        /// The offending address.
        addr: u32,
    },
    /// A layout region fell outside the guest memory it implies.
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// The user-mode boot loader, assembled for a concrete layout.
///
/// Drops to user mode, establishes the user stack, clears the errno
/// pointer, publishes the user parameter block, then calls the program
/// C-style with `(argc, argv, envp=NULL, &system_pb)` and finishes
/// through `TRAP #15` when it returns.
fn loader_code(layout: &MemoryLayout) -> [u16; 21] {
    let user_pb = layout.user_pb();
    [
        0x027C, 0xDFFF,                              // ANDI    #$DFFF,SR
        0x4FF8, layout.initial_usp as u16,           // LEA     (usp).W,A7
        0x42B8, layout.errno_ptr() as u16,           // CLR.L   (errno_ptr).W
        0x21FC, (user_pb >> 16) as u16,              // MOVE.L  #user_pb,
        user_pb as u16, layout.system_pb() as u16,   //         (system_pb).W
        0x4878, layout.system_pb() as u16,           // PEA     (system_pb).W
        0x4878, 0x0000,                              // PEA     (0).W
        0x2F38, layout.argv_address() as u16,        // MOVE.L  (argv).W,-(A7)
        0x2F38, layout.argc_address() as u16,        // MOVE.L  (argc).W,-(A7)
        0x4EB8, layout.code_address as u16,          // JSR     (code).W
        0x4E4F,                                      // TRAP    #15
    ]
}

fn check_short_addressable(addr: u32) -> Result<(), BootError> {
    // Sign-extended 16-bit operands cover 0..0x8000 in this map.
    if addr < 0x8000 {
        Ok(())
    } else {
        Err(BootError::NotShortAddressable { addr })
    }
}

/// Builds a complete, reset-ready guest memory image.
///
/// `code` is the raw program for the code segment (an empty slice leaves
/// the segment zeroed); `args` become the guest's argc/argv, with
/// `args[0]` conventionally the program path.
///
/// # Errors
///
/// Rejects programs longer than the code segment, argument vectors that
/// overflow the parameter area, and layouts whose baked-in addresses are
/// not absolute-short addressable.
pub fn build_boot_image(
    layout: &MemoryLayout,
    code: &[u8],
    args: &[String],
) -> Result<Memory, BootError> {
    for addr in [
        layout.initial_usp,
        layout.errno_ptr(),
        layout.user_pb(),
        layout.system_pb(),
        layout.argv_address(),
        layout.argc_address(),
        layout.code_address,
    ] {
        check_short_addressable(addr)?;
    }
    if code.len() > layout.code_size as usize {
        return Err(BootError::CodeTooLarge {
            len: code.len(),
            max: layout.code_size,
        });
    }

    let mut mem = Memory::new(layout.total_size());
    mem.fill(0, 256 * 4, VECTOR_FILL)?;

    // Trampolines, packed one after another above the vector table.
    let mut at = layout.os_address;
    let fault_handler = at;
    at = vectors::write_words(&mut mem, at, &vectors::BKPT_7_CODE)?;
    let finish_handler = at;
    at = vectors::write_words(&mut mem, at, &vectors::FINISH_CODE)?;
    let trap_0_handler = at;
    at = vectors::write_words(&mut mem, at, &vectors::TRAP_0_CODE)?;
    let line_a_handler = at;
    at = vectors::write_words(&mut mem, at, &vectors::LINE_A_CODE)?;
    let loader = at;
    vectors::write_words(&mut mem, loader, &loader_code(layout))?;

    vectors::set_vector(&mut mem, vectors::VEC_RESET_SSP, layout.initial_ssp)?;
    vectors::set_vector(&mut mem, vectors::VEC_RESET_PC, loader)?;
    for vector in [
        vectors::VEC_BUS_ERROR,
        vectors::VEC_ADDRESS_ERROR,
        vectors::VEC_ILLEGAL,
        vectors::VEC_ZERO_DIVIDE,
        vectors::VEC_CHK,
        vectors::VEC_TRAPV,
        vectors::VEC_PRIVILEGE,
        vectors::VEC_LINE_F,
    ] {
        vectors::set_vector(&mut mem, vector, fault_handler)?;
    }
    vectors::set_vector(&mut mem, vectors::VEC_LINE_A, line_a_handler)?;
    vectors::set_vector(&mut mem, vectors::VEC_TRAP_BASE, trap_0_handler)?;
    vectors::set_vector(&mut mem, vectors::VEC_TRAP_15, finish_handler)?;

    write_args(&mut mem, layout, args)?;

    if !code.is_empty() {
        mem.bytes_mut(layout.code_address, code.len() as u32)?
            .copy_from_slice(code);
    }
    Ok(mem)
}

/// Packs argc, the argv pointer array, and the string bytes into the
/// parameter area.
fn write_args(mem: &mut Memory, layout: &MemoryLayout, args: &[String]) -> Result<(), BootError> {
    let argc = args.len() as u32;
    let table = layout.strings_address();
    let strings = table + 4 * (argc + 1);
    let needed = u64::from(strings - layout.param_address)
        + args.iter().map(|a| a.len() as u64 + 1).sum::<u64>();
    if needed > u64::from(layout.param_size) {
        return Err(BootError::ArgsTooLarge {
            needed,
            max: layout.param_size,
        });
    }

    mem.write_u32(layout.argc_address(), argc)?;
    mem.write_u32(layout.argv_address(), table)?;
    let mut string_at = strings;
    for (i, arg) in args.iter().enumerate() {
        mem.write_u32(table + 4 * i as u32, string_at)?;
        let bytes = arg.as_bytes();
        mem.bytes_mut(string_at, bytes.len() as u32)?
            .copy_from_slice(bytes);
        // Memory::new zeroes everything, so the NUL is already there.
        string_at += bytes.len() as u32 + 1;
    }
    mem.write_u32(table + 4 * argc, 0)?;
    Ok(())
}
