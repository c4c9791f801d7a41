//! Effective-address mode decoding and classification.
//!
//! The 3-bit mode / 3-bit register fields of an opcode select one of the
//! twelve 68000 addressing modes. Resolution (extension-word consumption,
//! auto-increment bookkeeping) lives on the CPU; this module only names
//! the modes and answers category questions the decode paths ask.

/// One decoded 68000 addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddrMode {
    /// `Dn`: data register direct.
    DataDirect(u8),
    /// `An`: address register direct.
    AddrDirect(u8),
    /// `(An)`: address register indirect.
    AddrIndirect(u8),
    /// `(An)+`: indirect with postincrement.
    PostIncrement(u8),
    /// `-(An)`: indirect with predecrement.
    PreDecrement(u8),
    /// `(d16,An)`: indirect with 16-bit displacement.
    Displacement(u8),
    /// `(d8,An,Xn)`: indirect with index and 8-bit displacement.
    Indexed(u8),
    /// `(xxx).W`: absolute short, sign-extended.
    AbsoluteShort,
    /// `(xxx).L`: absolute long.
    AbsoluteLong,
    /// `(d16,PC)`: program-counter relative with displacement.
    PcDisplacement,
    /// `(d8,PC,Xn)`: program-counter relative with index.
    PcIndexed,
    /// `#imm`: immediate.
    Immediate,
}

impl AddrMode {
    /// Decodes the mode/register field pair; `None` for the unused
    /// mode-7 encodings.
    #[must_use]
    pub const fn decode(mode: u8, reg: u8) -> Option<Self> {
        match mode & 7 {
            0 => Some(Self::DataDirect(reg & 7)),
            1 => Some(Self::AddrDirect(reg & 7)),
            2 => Some(Self::AddrIndirect(reg & 7)),
            3 => Some(Self::PostIncrement(reg & 7)),
            4 => Some(Self::PreDecrement(reg & 7)),
            5 => Some(Self::Displacement(reg & 7)),
            6 => Some(Self::Indexed(reg & 7)),
            _ => match reg & 7 {
                0 => Some(Self::AbsoluteShort),
                1 => Some(Self::AbsoluteLong),
                2 => Some(Self::PcDisplacement),
                3 => Some(Self::PcIndexed),
                4 => Some(Self::Immediate),
                _ => None,
            },
        }
    }

    /// True when the operand can legally be written (no PC-relative or
    /// immediate destinations).
    #[must_use]
    pub const fn is_alterable(self) -> bool {
        !matches!(
            self,
            Self::PcDisplacement | Self::PcIndexed | Self::Immediate
        )
    }

    /// Alterable and in memory (shift-memory, TAS, Scc on memory, etc.
    /// exclude register direct).
    #[must_use]
    pub const fn is_memory_alterable(self) -> bool {
        self.is_alterable() && !matches!(self, Self::DataDirect(_) | Self::AddrDirect(_))
    }

    /// Data addressing (everything except address register direct).
    #[must_use]
    pub const fn is_data(self) -> bool {
        !matches!(self, Self::AddrDirect(_))
    }

    /// Control addressing: yields an address without side effects
    /// (LEA/PEA/JMP/JSR and MOVEM's non-incrementing forms).
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(
            self,
            Self::AddrIndirect(_)
                | Self::Displacement(_)
                | Self::Indexed(_)
                | Self::AbsoluteShort
                | Self::AbsoluteLong
                | Self::PcDisplacement
                | Self::PcIndexed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::AddrMode;

    #[test]
    fn mode_seven_submodes_decode_by_register_field() {
        assert_eq!(AddrMode::decode(7, 0), Some(AddrMode::AbsoluteShort));
        assert_eq!(AddrMode::decode(7, 1), Some(AddrMode::AbsoluteLong));
        assert_eq!(AddrMode::decode(7, 2), Some(AddrMode::PcDisplacement));
        assert_eq!(AddrMode::decode(7, 3), Some(AddrMode::PcIndexed));
        assert_eq!(AddrMode::decode(7, 4), Some(AddrMode::Immediate));
        assert_eq!(AddrMode::decode(7, 5), None);
        assert_eq!(AddrMode::decode(7, 7), None);
    }

    #[test]
    fn classification_rejects_unwritable_destinations() {
        assert!(AddrMode::DataDirect(0).is_alterable());
        assert!(AddrMode::PreDecrement(7).is_memory_alterable());
        assert!(!AddrMode::Immediate.is_alterable());
        assert!(!AddrMode::PcDisplacement.is_alterable());
        assert!(!AddrMode::DataDirect(3).is_memory_alterable());
    }

    #[test]
    fn control_modes_exclude_increment_forms() {
        assert!(AddrMode::Displacement(2).is_control());
        assert!(AddrMode::PcIndexed.is_control());
        assert!(!AddrMode::PostIncrement(1).is_control());
        assert!(!AddrMode::PreDecrement(1).is_control());
        assert!(!AddrMode::DataDirect(0).is_control());
    }
}
