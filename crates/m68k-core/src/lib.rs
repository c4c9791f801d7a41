//! User-mode MC68000 virtual machine monitor core.
//!
//! The crate owns everything between a raw program image and a finished
//! run: a big-endian guest memory region, a 68000 interpreter with a
//! step/condition contract, the exception-vector trampolines that turn
//! guest traps into host-visible events, a boot-image builder, and the
//! step loop that services system calls through a host-supplied
//! dispatch table.

/// Guest memory region and bus-level access errors.
pub mod memory;
pub use memory::{BusError, Memory};

/// Register file, status-register bits, and condition-code predicates.
pub mod registers;
pub use registers::{
    Registers, CCR_MASK, SR_C, SR_MASK, SR_N, SR_RESET, SR_S, SR_T, SR_V, SR_X, SR_Z,
};

/// Stopping conditions and breakpoint families.
pub mod condition;
pub use condition::{BreakpointFamily, Condition};

/// Operand sizes and flag-computing arithmetic.
pub mod alu;
pub use alu::{DivResult, ShiftKind, Size};

/// Effective-address mode decoding and classification.
pub mod ea;
pub use ea::AddrMode;

/// The CPU state machine: reset, step, exceptions, breakpoints.
pub mod cpu;
pub use cpu::Cpu;

mod execute;

/// Exception vector numbers and supervisor trampolines.
pub mod vectors;

/// Memory layout and boot-image construction.
pub mod loader;
pub use loader::{build_boot_image, BootError, MemoryLayout};

/// The system-call bridge between guest and host.
pub mod bridge;
pub use bridge::{DispatchOutcome, ServiceOutcome, SyscallDispatch, SyscallRequest};

/// The step loop and its termination policy.
pub mod run;
pub use run::{run, RunOutcome, RunPolicy};
