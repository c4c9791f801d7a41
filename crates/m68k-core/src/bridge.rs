//! The system-call bridge between suspended guest code and the host.
//!
//! A guest system call arrives as a family-2 breakpoint (planted by the
//! `TRAP #0` gate). The bridge decodes the register convention (call
//! number in D0, arguments in D1-D3, result back in D0), hands the
//! request to a host-side [`SyscallDispatch`], and writes failures back
//! the way a C runtime expects: D0 all-ones and errno stored through the
//! program's registered errno variable.

use crate::cpu::Cpu;
use crate::memory::Memory;

/// Offset of the current-user pointer inside the system parameter block.
const CURRENT_USER_OFFSET: u32 = 0;
/// Offset of the errno-variable pointer inside the user parameter block.
const ERRNO_PTR_OFFSET: u32 = 8;

/// One decoded guest system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallRequest {
    /// Call number from D0.
    pub number: u32,
    /// Arguments from D1, D2, D3.
    pub args: [u32; 3],
}

/// What the host did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The call succeeded; the value goes back in D0.
    Complete(u32),
    /// The call failed; D0 reads all-ones and `errno` reaches the guest
    /// through its registered errno variable.
    Failed {
        /// POSIX-style error number.
        errno: u32,
    },
    /// The guest asked to end the run (an exit call); the run finishes
    /// cleanly with `status` as its result.
    Terminate {
        /// Guest-supplied exit status.
        status: u32,
    },
    /// The call number is not implemented; the guest stays suspended at
    /// the breakpoint as a fault.
    Unrecognized,
}

/// How the run loop should proceed after a bridged call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// Acknowledge the breakpoint and keep stepping.
    Resume,
    /// End the run cleanly with this result.
    Terminate {
        /// Guest-supplied exit status.
        status: u32,
    },
    /// Leave the guest suspended at the breakpoint as a fault.
    Fault,
}

/// Host-side system-call table.
pub trait SyscallDispatch {
    /// Services one request, with direct access to guest memory for
    /// buffer transfers.
    fn dispatch(&mut self, request: &SyscallRequest, mem: &mut Memory) -> DispatchOutcome;
}

/// Services the system call a suspended CPU is parked on.
///
/// A request stands as a fault when its call number is unrecognized or
/// when the errno pointer chain leaves guest memory.
pub fn service_syscall(
    cpu: &mut Cpu,
    system_pb: u32,
    dispatch: &mut dyn SyscallDispatch,
) -> ServiceOutcome {
    let request = SyscallRequest {
        number: cpu.regs.d[0],
        args: [cpu.regs.d[1], cpu.regs.d[2], cpu.regs.d[3]],
    };
    match dispatch.dispatch(&request, &mut cpu.mem) {
        DispatchOutcome::Complete(value) => {
            cpu.regs.d[0] = value;
            ServiceOutcome::Resume
        }
        DispatchOutcome::Failed { errno } => {
            cpu.regs.d[0] = u32::MAX;
            if store_errno(&mut cpu.mem, system_pb, errno) {
                ServiceOutcome::Resume
            } else {
                ServiceOutcome::Fault
            }
        }
        DispatchOutcome::Terminate { status } => ServiceOutcome::Terminate { status },
        DispatchOutcome::Unrecognized => ServiceOutcome::Fault,
    }
}

/// Follows system_pb -> current user block -> errno variable. A null
/// errno pointer means the program never registered one; the store is
/// silently skipped.
fn store_errno(mem: &mut Memory, system_pb: u32, errno: u32) -> bool {
    fn chain(mem: &mut Memory, system_pb: u32, errno: u32) -> Result<(), crate::memory::BusError> {
        let user_pb = mem.read_u32(system_pb + CURRENT_USER_OFFSET)?;
        let errno_var = mem.read_u32(user_pb + ERRNO_PTR_OFFSET)?;
        if errno_var != 0 {
            mem.write_u32(errno_var, errno)?;
        }
        Ok(())
    }
    chain(mem, system_pb, errno).is_ok()
}

#[cfg(test)]
mod tests {
    use super::{
        service_syscall, DispatchOutcome, ServiceOutcome, SyscallDispatch, SyscallRequest,
    };
    use crate::cpu::Cpu;
    use crate::memory::Memory;

    const SYSTEM_PB: u32 = 0x100;
    const USER_PB: u32 = 0x80;
    const ERRNO_VAR: u32 = 0x200;

    struct Scripted(DispatchOutcome, Option<SyscallRequest>);

    impl SyscallDispatch for Scripted {
        fn dispatch(&mut self, request: &SyscallRequest, _mem: &mut Memory) -> DispatchOutcome {
            self.1 = Some(*request);
            self.0
        }
    }

    fn cpu_with_blocks(errno_var: u32) -> Cpu {
        let mut mem = Memory::new(0x400);
        mem.write_u32(SYSTEM_PB, USER_PB).unwrap();
        mem.write_u32(USER_PB + 8, errno_var).unwrap();
        Cpu::new(mem)
    }

    #[test]
    fn request_is_decoded_from_the_register_convention() {
        let mut cpu = cpu_with_blocks(ERRNO_VAR);
        cpu.regs.d[0] = 4;
        cpu.regs.d[1] = 1;
        cpu.regs.d[2] = 0x1000;
        cpu.regs.d[3] = 13;
        let mut host = Scripted(DispatchOutcome::Complete(13), None);
        assert_eq!(
            service_syscall(&mut cpu, SYSTEM_PB, &mut host),
            ServiceOutcome::Resume
        );
        assert_eq!(
            host.1,
            Some(SyscallRequest {
                number: 4,
                args: [1, 0x1000, 13],
            })
        );
        assert_eq!(cpu.regs.d[0], 13);
    }

    #[test]
    fn failure_writes_all_ones_and_errno() {
        let mut cpu = cpu_with_blocks(ERRNO_VAR);
        let mut host = Scripted(DispatchOutcome::Failed { errno: 9 }, None);
        assert_eq!(
            service_syscall(&mut cpu, SYSTEM_PB, &mut host),
            ServiceOutcome::Resume
        );
        assert_eq!(cpu.regs.d[0], u32::MAX);
        assert_eq!(cpu.mem.read_u32(ERRNO_VAR).unwrap(), 9);
    }

    #[test]
    fn null_errno_pointer_suppresses_the_store() {
        let mut cpu = cpu_with_blocks(0);
        let mut host = Scripted(DispatchOutcome::Failed { errno: 9 }, None);
        assert_eq!(
            service_syscall(&mut cpu, SYSTEM_PB, &mut host),
            ServiceOutcome::Resume
        );
        assert_eq!(cpu.regs.d[0], u32::MAX);
    }

    #[test]
    fn exit_requests_terminate_the_run() {
        let mut cpu = cpu_with_blocks(ERRNO_VAR);
        let mut host = Scripted(DispatchOutcome::Terminate { status: 3 }, None);
        assert_eq!(
            service_syscall(&mut cpu, SYSTEM_PB, &mut host),
            ServiceOutcome::Terminate { status: 3 }
        );
    }

    #[test]
    fn unrecognized_calls_stand_as_faults() {
        let mut cpu = cpu_with_blocks(ERRNO_VAR);
        let mut host = Scripted(DispatchOutcome::Unrecognized, None);
        assert_eq!(
            service_syscall(&mut cpu, SYSTEM_PB, &mut host),
            ServiceOutcome::Fault
        );
    }

    #[test]
    fn broken_errno_chain_is_a_fault() {
        let mut cpu = cpu_with_blocks(ERRNO_VAR);
        // Point the current-user field outside guest memory.
        cpu.mem.write_u32(SYSTEM_PB, 0xFFFF_0000).unwrap();
        let mut host = Scripted(DispatchOutcome::Failed { errno: 9 }, None);
        assert_eq!(
            service_syscall(&mut cpu, SYSTEM_PB, &mut host),
            ServiceOutcome::Fault
        );
    }
}
