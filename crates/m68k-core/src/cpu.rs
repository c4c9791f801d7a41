//! The CPU state machine: reset, single-step, exception entry, and the
//! operand plumbing shared by the execute paths.
//!
//! `step` runs exactly one instruction and reports whether stepping should
//! continue; the post-step [`Condition`] says why it should not. The only
//! conditions a host may resolve and resume from are the breakpoint
//! families, via [`Cpu::acknowledge_breakpoint`].

use crate::alu::Size;
use crate::condition::Condition;
use crate::ea::AddrMode;
use crate::memory::{BusError, Memory};
use crate::registers::{Registers, SR_S, SR_T};
use crate::vectors;

/// A pending exception: which vector to take and which PC to stack.
///
/// Group-2 traps (TRAP, TRAPV, CHK, zero divide) stack the address of the
/// next instruction; instruction faults (illegal, privilege violation,
/// line A/F) stack the address of the faulting instruction, which the
/// trampolines rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Exception {
    pub(crate) vector: u32,
    pub(crate) stacked_pc: u32,
}

/// A resolved operand location, after any auto-increment side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operand {
    DataReg(u8),
    AddrReg(u8),
    Mem(u32),
    Immediate(u32),
}

/// One emulated MC68000 CPU context owning its guest memory region.
#[derive(Debug, Clone)]
pub struct Cpu {
    /// Register file, directly inspectable by the host.
    pub regs: Registers,
    /// The guest address space, exclusively owned by this context.
    pub mem: Memory,
    pub(crate) condition: Condition,
    pub(crate) instruction_count: u64,
    /// Opcode armed by `acknowledge_breakpoint`, executed in place of the
    /// breakpoint word by the next step.
    pub(crate) substitute: Option<u16>,
    /// Address of the instruction currently executing.
    pub(crate) instr_pc: u32,
}

impl Cpu {
    /// Creates a CPU over a prepared guest memory image. Call
    /// [`Cpu::reset`] before stepping.
    #[must_use]
    pub fn new(mem: Memory) -> Self {
        Self {
            regs: Registers::new(),
            mem,
            condition: Condition::Running,
            instruction_count: 0,
            substitute: None,
            instr_pc: 0,
        }
    }

    /// The condition recorded by the most recent step.
    #[must_use]
    pub fn condition(&self) -> Condition {
        self.condition
    }

    /// Instructions retired since the last reset.
    #[must_use]
    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Performs the ISA reset sequence: SSP from vector 0, PC from
    /// vector 1, supervisor mode with interrupt mask 7, counter cleared.
    ///
    /// A guest region too small to hold the reset vectors halts
    /// immediately instead of executing anything.
    pub fn reset(&mut self) {
        self.regs = Registers::new();
        self.instruction_count = 0;
        self.substitute = None;
        self.instr_pc = 0;
        self.condition = Condition::Running;
        match (self.mem.read_u32(0), self.mem.read_u32(4)) {
            (Ok(ssp), Ok(pc)) => {
                self.regs.ssp = ssp;
                self.regs.pc = pc;
            }
            _ => self.condition = Condition::Halted,
        }
    }

    /// Executes one instruction. Returns `true` while the condition is
    /// still running; once a terminal or suspending condition is reached
    /// further calls are inert and keep returning `false`.
    pub fn step(&mut self) -> bool {
        if !self.condition.is_running() {
            return false;
        }

        let instr_pc = self.regs.pc;
        let opcode = if let Some(opcode) = self.substitute.take() {
            // Executes in place of the breakpoint word; memory keeps the
            // breakpoint so re-entry takes the same path.
            self.regs.pc = instr_pc.wrapping_add(2);
            opcode
        } else {
            match self.fetch_instruction_word(instr_pc) {
                Ok(word) => {
                    self.regs.pc = instr_pc.wrapping_add(2);
                    word
                }
                Err(exception) => {
                    self.instruction_count += 1;
                    self.enter_exception(exception);
                    return self.condition.is_running();
                }
            }
        };

        self.instr_pc = instr_pc;
        let outcome = self.execute(opcode);
        self.instruction_count += 1;
        if let Err(exception) = outcome {
            self.enter_exception(exception);
        }
        self.condition.is_running()
    }

    /// Resolves a breakpoint condition by substituting `opcode` for the
    /// trapping word, so the next step resumes as if that instruction had
    /// been fetched there. The driver conventionally supplies RTS.
    ///
    /// # Panics
    ///
    /// Panics when the current condition is not a breakpoint; resolving
    /// anything else is a driver contract violation.
    pub fn acknowledge_breakpoint(&mut self, opcode: u16) {
        assert!(
            self.condition.breakpoint().is_some(),
            "acknowledge_breakpoint outside a breakpoint condition"
        );
        self.substitute = Some(opcode);
        self.condition = Condition::Running;
    }

    fn fetch_instruction_word(&self, addr: u32) -> Result<u16, Exception> {
        self.mem.read_u16(addr).map_err(|e| self.bus_fault_at(e, addr))
    }

    /// Consumes one extension word at PC.
    pub(crate) fn fetch_ext_word(&mut self) -> Result<u16, Exception> {
        let addr = self.regs.pc;
        let word = self.mem.read_u16(addr).map_err(|e| self.bus_fault_at(e, addr))?;
        self.regs.pc = addr.wrapping_add(2);
        Ok(word)
    }

    fn fetch_ext_long(&mut self) -> Result<u32, Exception> {
        let high = u32::from(self.fetch_ext_word()?);
        let low = u32::from(self.fetch_ext_word()?);
        Ok((high << 16) | low)
    }

    /// Maps a data-access bus failure onto its exception vector.
    pub(crate) fn bus_fault(&self, error: BusError) -> Exception {
        self.bus_fault_at(error, self.instr_pc)
    }

    fn bus_fault_at(&self, error: BusError, stacked_pc: u32) -> Exception {
        let vector = match error {
            BusError::OutOfRange { .. } => vectors::VEC_BUS_ERROR,
            BusError::Misaligned { .. } => vectors::VEC_ADDRESS_ERROR,
        };
        Exception {
            vector,
            stacked_pc,
        }
    }

    /// The illegal-instruction exception for the current instruction.
    pub(crate) fn illegal(&self) -> Exception {
        Exception {
            vector: vectors::VEC_ILLEGAL,
            stacked_pc: self.instr_pc,
        }
    }

    /// Checks the S bit, raising a privilege violation from user mode.
    pub(crate) fn require_supervisor(&self) -> Result<(), Exception> {
        if self.regs.is_supervisor() {
            Ok(())
        } else {
            Err(Exception {
                vector: vectors::VEC_PRIVILEGE,
                stacked_pc: self.instr_pc,
            })
        }
    }

    /// A group-2 trap: stacks the address of the next instruction.
    pub(crate) fn trap(&self, vector: u32) -> Exception {
        Exception {
            vector,
            stacked_pc: self.regs.pc,
        }
    }

    /// Enters exception processing; a fault during entry (frame push or
    /// vector fetch failing, or an odd handler address) is the
    /// double-fault-equivalent and halts the CPU for good.
    pub(crate) fn enter_exception(&mut self, exception: Exception) {
        if self.try_enter(exception).is_err() {
            self.condition = Condition::Halted;
        }
    }

    fn try_enter(&mut self, exception: Exception) -> Result<(), BusError> {
        let old_sr = self.regs.sr;
        self.regs.sr = (old_sr | SR_S) & !SR_T;
        let frame = self.regs.ssp.wrapping_sub(6);
        self.mem.write_u16(frame, old_sr)?;
        self.mem.write_u32(frame.wrapping_add(2), exception.stacked_pc)?;
        self.regs.ssp = frame;
        let handler = self.mem.read_u32(exception.vector * 4)?;
        if handler & 1 != 0 {
            return Err(BusError::Misaligned { addr: handler });
        }
        self.regs.pc = handler;
        Ok(())
    }

    /// Pushes a longword onto the live stack.
    pub(crate) fn push_long(&mut self, value: u32) -> Result<(), Exception> {
        let sp = self.regs.sp().wrapping_sub(4);
        self.mem.write_u32(sp, value).map_err(|e| self.bus_fault(e))?;
        self.regs.set_sp(sp);
        Ok(())
    }

    /// Pops a longword from the live stack.
    pub(crate) fn pop_long(&mut self) -> Result<u32, Exception> {
        let sp = self.regs.sp();
        let value = self.mem.read_u32(sp).map_err(|e| self.bus_fault(e))?;
        self.regs.set_sp(sp.wrapping_add(4));
        Ok(value)
    }

    /// Pushes a word onto the live stack.
    pub(crate) fn push_word(&mut self, value: u16) -> Result<(), Exception> {
        let sp = self.regs.sp().wrapping_sub(2);
        self.mem.write_u16(sp, value).map_err(|e| self.bus_fault(e))?;
        self.regs.set_sp(sp);
        Ok(())
    }

    /// Pops a word from the live stack.
    pub(crate) fn pop_word(&mut self) -> Result<u16, Exception> {
        let sp = self.regs.sp();
        let value = self.mem.read_u16(sp).map_err(|e| self.bus_fault(e))?;
        self.regs.set_sp(sp.wrapping_add(2));
        Ok(value)
    }

    fn index_extension(&mut self) -> Result<u32, Exception> {
        let ext = self.fetch_ext_word()?;
        let reg = usize::from((ext >> 12) & 7);
        let raw = if ext & 0x8000 != 0 {
            self.regs.addr(reg)
        } else {
            self.regs.d[reg]
        };
        let index = if ext & 0x0800 != 0 {
            raw
        } else {
            Size::Word.sign_extend(raw)
        };
        let displacement = Size::Byte.sign_extend(u32::from(ext & 0xFF));
        Ok(index.wrapping_add(displacement))
    }

    /// Step size for `(An)+`/`-(An)`; byte accesses through A7 keep the
    /// stack pointer word-aligned.
    fn step_size(size: Size, reg: u8) -> u32 {
        if reg == 7 && size == Size::Byte {
            2
        } else {
            size.bytes()
        }
    }

    /// Resolves an addressing mode to an operand location, consuming
    /// extension words and applying auto-increment side effects once.
    pub(crate) fn resolve(&mut self, mode: AddrMode, size: Size) -> Result<Operand, Exception> {
        match mode {
            AddrMode::DataDirect(n) => Ok(Operand::DataReg(n)),
            AddrMode::AddrDirect(n) => Ok(Operand::AddrReg(n)),
            AddrMode::AddrIndirect(n) => Ok(Operand::Mem(self.regs.addr(usize::from(n)))),
            AddrMode::PostIncrement(n) => {
                let addr = self.regs.addr(usize::from(n));
                let next = addr.wrapping_add(Self::step_size(size, n));
                self.regs.set_addr(usize::from(n), next);
                Ok(Operand::Mem(addr))
            }
            AddrMode::PreDecrement(n) => {
                let addr = self
                    .regs
                    .addr(usize::from(n))
                    .wrapping_sub(Self::step_size(size, n));
                self.regs.set_addr(usize::from(n), addr);
                Ok(Operand::Mem(addr))
            }
            AddrMode::Displacement(n) => {
                let base = self.regs.addr(usize::from(n));
                let d16 = Size::Word.sign_extend(u32::from(self.fetch_ext_word()?));
                Ok(Operand::Mem(base.wrapping_add(d16)))
            }
            AddrMode::Indexed(n) => {
                let base = self.regs.addr(usize::from(n));
                let offset = self.index_extension()?;
                Ok(Operand::Mem(base.wrapping_add(offset)))
            }
            AddrMode::AbsoluteShort => {
                let addr = Size::Word.sign_extend(u32::from(self.fetch_ext_word()?));
                Ok(Operand::Mem(addr))
            }
            AddrMode::AbsoluteLong => Ok(Operand::Mem(self.fetch_ext_long()?)),
            AddrMode::PcDisplacement => {
                let base = self.regs.pc;
                let d16 = Size::Word.sign_extend(u32::from(self.fetch_ext_word()?));
                Ok(Operand::Mem(base.wrapping_add(d16)))
            }
            AddrMode::PcIndexed => {
                let base = self.regs.pc;
                let offset = self.index_extension()?;
                Ok(Operand::Mem(base.wrapping_add(offset)))
            }
            AddrMode::Immediate => {
                let value = match size {
                    Size::Byte => u32::from(self.fetch_ext_word()?) & 0xFF,
                    Size::Word => u32::from(self.fetch_ext_word()?),
                    Size::Long => self.fetch_ext_long()?,
                };
                Ok(Operand::Immediate(value))
            }
        }
    }

    /// Reads a sized value from a resolved operand.
    pub(crate) fn read_operand(&mut self, operand: Operand, size: Size) -> Result<u32, Exception> {
        match operand {
            Operand::DataReg(n) => Ok(self.regs.d[usize::from(n)] & size.mask()),
            Operand::AddrReg(n) => Ok(self.regs.addr(usize::from(n)) & size.mask()),
            Operand::Immediate(value) => Ok(value & size.mask()),
            Operand::Mem(addr) => {
                let read = match size {
                    Size::Byte => self.mem.read_u8(addr).map(u32::from),
                    Size::Word => self.mem.read_u16(addr).map(u32::from),
                    Size::Long => self.mem.read_u32(addr),
                };
                read.map_err(|e| self.bus_fault(e))
            }
        }
    }

    /// Writes a sized value to a resolved operand. Data registers merge
    /// into their low bits; address registers always take all 32 bits
    /// (MOVEA-style call sites sign-extend first).
    pub(crate) fn write_operand(
        &mut self,
        operand: Operand,
        size: Size,
        value: u32,
    ) -> Result<(), Exception> {
        match operand {
            Operand::DataReg(n) => {
                let reg = &mut self.regs.d[usize::from(n)];
                *reg = size.merge(*reg, value);
                Ok(())
            }
            Operand::AddrReg(n) => {
                self.regs.set_addr(usize::from(n), value);
                Ok(())
            }
            Operand::Immediate(_) => Err(self.illegal()),
            Operand::Mem(addr) => {
                let write = match size {
                    Size::Byte => self.mem.write_u8(addr, value as u8),
                    Size::Word => self.mem.write_u16(addr, value as u16),
                    Size::Long => self.mem.write_u32(addr, value),
                };
                write.map_err(|e| self.bus_fault(e))
            }
        }
    }
}
