//! The closed set of stopping conditions the CPU state machine reports.

/// One of the eight numbered breakpoint families a `BKPT #n` raises.
///
/// Family 2 is reserved for the syscall entry synthesized by the trap-0
/// trampoline; every other family denotes a fault the host must not
/// resume from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BreakpointFamily {
    Bkpt0,
    Bkpt1,
    Bkpt2,
    Bkpt3,
    Bkpt4,
    Bkpt5,
    Bkpt6,
    Bkpt7,
}

impl BreakpointFamily {
    /// Decodes the low three bits of a `BKPT` opcode into a family.
    #[must_use]
    pub const fn from_field(bits: u16) -> Self {
        match bits & 7 {
            0 => Self::Bkpt0,
            1 => Self::Bkpt1,
            2 => Self::Bkpt2,
            3 => Self::Bkpt3,
            4 => Self::Bkpt4,
            5 => Self::Bkpt5,
            6 => Self::Bkpt6,
            _ => Self::Bkpt7,
        }
    }

    /// The family number, 0-7.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// True for family 2, the only family a host may service and resume.
    #[must_use]
    pub const fn is_syscall(self) -> bool {
        matches!(self, Self::Bkpt2)
    }
}

/// Outcome recorded after each step of the CPU state machine.
///
/// Once `Finished` or `Halted` is reached, further stepping is a driver
/// error; [`crate::Cpu::step`] stays inert in those states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Condition {
    /// The next instruction may be executed.
    #[default]
    Running,
    /// Clean termination; the result value is in D0.
    Finished,
    /// Unrecoverable stop (double-fault-equivalent or dead `STOP`).
    Halted,
    /// Suspended at a numbered breakpoint awaiting the host.
    Breakpoint(BreakpointFamily),
}

impl Condition {
    /// True while stepping should continue.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// The breakpoint family, when suspended at one.
    #[must_use]
    pub const fn breakpoint(self) -> Option<BreakpointFamily> {
        match self {
            Self::Breakpoint(family) => Some(family),
            Self::Running | Self::Finished | Self::Halted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BreakpointFamily, Condition};

    #[test]
    fn family_field_round_trips_and_masks() {
        for bits in 0..8u16 {
            assert_eq!(BreakpointFamily::from_field(bits).index(), bits as u8);
        }
        assert_eq!(BreakpointFamily::from_field(0xFFFA).index(), 2);
    }

    #[test]
    fn only_family_two_is_a_syscall_entry() {
        for bits in 0..8u16 {
            let family = BreakpointFamily::from_field(bits);
            assert_eq!(family.is_syscall(), bits == 2);
        }
    }

    #[test]
    fn breakpoint_accessor_reports_only_suspended_states() {
        assert_eq!(Condition::Running.breakpoint(), None);
        assert_eq!(Condition::Finished.breakpoint(), None);
        assert_eq!(
            Condition::Breakpoint(BreakpointFamily::Bkpt7).breakpoint(),
            Some(BreakpointFamily::Bkpt7)
        );
    }
}
