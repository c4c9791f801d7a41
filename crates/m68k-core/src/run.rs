//! The monitor's step loop: drive the CPU until it terminates, servicing
//! system calls along the way and enforcing the instruction quota.

use crate::bridge::{self, ServiceOutcome, SyscallDispatch};
use crate::condition::{BreakpointFamily, Condition};
use crate::cpu::Cpu;

/// `RTS`: the opcode substituted for a serviced syscall breakpoint, so
/// resuming returns from the call stub.
const RESUME_OPCODE: u16 = 0x4E75;

/// Limits the run loop imposes on top of the CPU's own semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunPolicy {
    /// Abandon the run once this many instructions have retired.
    /// `None` runs without a quota.
    pub instruction_limit: Option<u64>,
}

/// Why the run loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The guest terminated cleanly; `result` is its exit value from D0.
    Finished {
        /// Guest exit value.
        result: u32,
    },
    /// The CPU halted (double fault or a dead `STOP`).
    Halted,
    /// The guest is suspended at a breakpoint the loop will not resume:
    /// a fault family, or a syscall the host would not service.
    Breakpoint(BreakpointFamily),
    /// The instruction quota ran out with the guest still running.
    QuotaExceeded,
}

/// Steps the CPU to completion.
///
/// Family-2 breakpoints are serviced through `dispatch` and resumed;
/// everything else ends the run. `system_pb` locates the parameter block
/// the errno convention hangs off.
pub fn run(
    cpu: &mut Cpu,
    system_pb: u32,
    dispatch: &mut dyn SyscallDispatch,
    policy: RunPolicy,
) -> RunOutcome {
    loop {
        cpu.step();
        match cpu.condition() {
            Condition::Running => {
                if let Some(limit) = policy.instruction_limit {
                    if cpu.instruction_count() >= limit {
                        return RunOutcome::QuotaExceeded;
                    }
                }
            }
            Condition::Finished => {
                return RunOutcome::Finished {
                    result: cpu.regs.d[0],
                };
            }
            Condition::Halted => return RunOutcome::Halted,
            Condition::Breakpoint(family) => {
                if !family.is_syscall() {
                    return RunOutcome::Breakpoint(family);
                }
                match bridge::service_syscall(cpu, system_pb, dispatch) {
                    ServiceOutcome::Resume => cpu.acknowledge_breakpoint(RESUME_OPCODE),
                    ServiceOutcome::Terminate { status } => {
                        return RunOutcome::Finished { result: status };
                    }
                    ServiceOutcome::Fault => return RunOutcome::Breakpoint(family),
                }
            }
        }
    }
}
