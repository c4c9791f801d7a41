//! Host side of the system-call bridge: the table of calls a guest
//! program may make and their mapping onto real process I/O.

use std::io::{Read, Write};

use m68k_core::{DispatchOutcome, Memory, SyscallDispatch, SyscallRequest};
use tracing::{debug, warn};

const SYS_EXIT: u32 = 1;
const SYS_READ: u32 = 3;
const SYS_WRITE: u32 = 4;

/// Guest-visible errno values (POSIX numbering).
const EIO: u32 = 5;
const EBADF: u32 = 9;
const EFAULT: u32 = 14;

/// Dispatch table wired to the host process: exit, and byte I/O on the
/// three standard descriptors.
#[derive(Debug, Default)]
pub struct HostDispatch;

impl SyscallDispatch for HostDispatch {
    fn dispatch(&mut self, request: &SyscallRequest, mem: &mut Memory) -> DispatchOutcome {
        match request.number {
            SYS_EXIT => {
                debug!(status = request.args[0], "guest exit");
                DispatchOutcome::Terminate {
                    status: request.args[0],
                }
            }
            SYS_READ => read_call(request.args[0], request.args[1], request.args[2], mem),
            SYS_WRITE => write_call(request.args[0], request.args[1], request.args[2], mem),
            number => {
                warn!(number, "unrecognized system call");
                DispatchOutcome::Unrecognized
            }
        }
    }
}

fn errno_of(error: &std::io::Error) -> u32 {
    error.raw_os_error().map_or(EIO, |code| code as u32)
}

fn read_call(fd: u32, buf: u32, len: u32, mem: &mut Memory) -> DispatchOutcome {
    if fd != 0 {
        return DispatchOutcome::Failed { errno: EBADF };
    }
    let Ok(buffer) = mem.bytes_mut(buf, len) else {
        return DispatchOutcome::Failed { errno: EFAULT };
    };
    match std::io::stdin().lock().read(buffer) {
        Ok(n) => DispatchOutcome::Complete(n as u32),
        Err(error) => DispatchOutcome::Failed {
            errno: errno_of(&error),
        },
    }
}

fn write_call(fd: u32, buf: u32, len: u32, mem: &mut Memory) -> DispatchOutcome {
    let Ok(buffer) = mem.bytes(buf, len) else {
        return DispatchOutcome::Failed { errno: EFAULT };
    };
    let written = match fd {
        1 => std::io::stdout().lock().write(buffer),
        2 => std::io::stderr().lock().write(buffer),
        _ => return DispatchOutcome::Failed { errno: EBADF },
    };
    match written {
        Ok(n) => DispatchOutcome::Complete(n as u32),
        Err(error) => DispatchOutcome::Failed {
            errno: errno_of(&error),
        },
    }
}
