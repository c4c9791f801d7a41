//! Instruction execution: one `match` ladder per opcode line.
//!
//! Decoding and execution are fused; each path consumes its own extension
//! words, routes operands through the CPU's effective-address plumbing,
//! and delegates flag arithmetic to [`crate::alu`]. Every path returns
//! `Ok(())` or the exception the instruction raises.

use crate::alu::{self, DivResult, ShiftKind, Size};
use crate::condition::{BreakpointFamily, Condition};
use crate::cpu::{Cpu, Exception, Operand};
use crate::ea::AddrMode;
use crate::registers::{SR_C, SR_N, SR_V, SR_X, SR_Z};
use crate::vectors;

impl Cpu {
    /// Executes one already-fetched opcode; PC sits past the opcode word.
    pub(crate) fn execute(&mut self, opcode: u16) -> Result<(), Exception> {
        match opcode >> 12 {
            0x0 => self.exec_line_0(opcode),
            0x1 | 0x2 | 0x3 => self.exec_move(opcode),
            0x4 => self.exec_line_4(opcode),
            0x5 => self.exec_line_5(opcode),
            0x6 => self.exec_branch(opcode),
            0x7 => self.exec_moveq(opcode),
            0x8 => self.exec_line_8(opcode),
            0x9 => self.exec_add_sub(opcode, false),
            0xA => Err(Exception {
                vector: vectors::VEC_LINE_A,
                stacked_pc: self.instr_pc,
            }),
            0xB => self.exec_line_b(opcode),
            0xC => self.exec_line_c(opcode),
            0xD => self.exec_add_sub(opcode, true),
            0xE => self.exec_shift(opcode),
            _ => Err(Exception {
                vector: vectors::VEC_LINE_F,
                stacked_pc: self.instr_pc,
            }),
        }
    }

    fn ea_mode(&self, opcode: u16) -> Result<AddrMode, Exception> {
        AddrMode::decode(((opcode >> 3) & 7) as u8, (opcode & 7) as u8)
            .ok_or_else(|| self.illegal())
    }

    fn control_address(&mut self, opcode: u16) -> Result<u32, Exception> {
        let mode = self.ea_mode(opcode)?;
        if !mode.is_control() {
            return Err(self.illegal());
        }
        // Control modes always resolve to a memory location.
        match self.resolve(mode, Size::Long)? {
            Operand::Mem(addr) => Ok(addr),
            _ => Err(self.illegal()),
        }
    }

    // Line 0: immediates, bit operations, MOVEP.

    fn exec_line_0(&mut self, opcode: u16) -> Result<(), Exception> {
        if opcode & 0x0100 != 0 {
            if opcode & 0x0038 == 0x0008 {
                return self.exec_movep(opcode);
            }
            let bit = self.regs.d[usize::from((opcode >> 9) & 7)];
            return self.exec_bitop(opcode, bit, true);
        }
        if opcode & 0x0F00 == 0x0800 {
            let bit = u32::from(self.fetch_ext_word()?);
            return self.exec_bitop(opcode, bit, false);
        }
        self.exec_immediate(opcode)
    }

    fn exec_bitop(&mut self, opcode: u16, bit: u32, dynamic: bool) -> Result<(), Exception> {
        let mode = self.ea_mode(opcode)?;
        let op = (opcode >> 6) & 3;
        // Only the dynamic BTST may target an immediate.
        if !mode.is_data()
            || (!dynamic && matches!(mode, AddrMode::Immediate))
            || (op != 0 && !mode.is_alterable())
        {
            return Err(self.illegal());
        }
        // Register targets are long with bit numbers mod 32; memory is
        // byte with bit numbers mod 8.
        let (size, bit) = if matches!(mode, AddrMode::DataDirect(_)) {
            (Size::Long, bit % 32)
        } else {
            (Size::Byte, bit % 8)
        };
        let operand = self.resolve(mode, size)?;
        let value = self.read_operand(operand, size)?;
        let mask = 1u32 << bit;
        self.regs.set_flag(SR_Z, value & mask == 0);
        let new = match op {
            0 => return Ok(()), // BTST
            1 => value ^ mask,  // BCHG
            2 => value & !mask, // BCLR
            _ => value | mask,  // BSET
        };
        self.write_operand(operand, size, new)
    }

    fn exec_movep(&mut self, opcode: u16) -> Result<(), Exception> {
        let dreg = usize::from((opcode >> 9) & 7);
        let areg = usize::from(opcode & 7);
        let opmode = (opcode >> 6) & 7;
        let long = opmode & 1 != 0;
        let to_mem = opmode & 2 != 0;
        let d16 = Size::Word.sign_extend(u32::from(self.fetch_ext_word()?));
        let mut addr = self.regs.addr(areg).wrapping_add(d16);
        let count = if long { 4u32 } else { 2 };
        if to_mem {
            let value = self.regs.d[dreg];
            for i in (0..count).rev() {
                let byte = (value >> (8 * i)) as u8;
                self.mem.write_u8(addr, byte).map_err(|e| self.bus_fault(e))?;
                addr = addr.wrapping_add(2);
            }
        } else {
            let mut value = 0u32;
            for _ in 0..count {
                let byte = self.mem.read_u8(addr).map_err(|e| self.bus_fault(e))?;
                value = (value << 8) | u32::from(byte);
                addr = addr.wrapping_add(2);
            }
            let size = if long { Size::Long } else { Size::Word };
            self.regs.d[dreg] = size.merge(self.regs.d[dreg], value);
        }
        Ok(())
    }

    fn exec_immediate(&mut self, opcode: u16) -> Result<(), Exception> {
        let op = (opcode >> 9) & 7;
        let size_bits = (opcode >> 6) & 3;
        if opcode & 0x003F == 0x003C && matches!(op, 0 | 1 | 5) {
            return self.exec_imm_to_status(op, size_bits);
        }
        let size = Size::from_bits(size_bits).ok_or_else(|| self.illegal())?;
        let imm = {
            let operand = self.resolve(AddrMode::Immediate, size)?;
            self.read_operand(operand, size)?
        };
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() || !mode.is_alterable() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, size)?;
        let dst = self.read_operand(operand, size)?;
        let sr = self.regs.sr;
        match op {
            0 | 1 | 5 => {
                let result = match op {
                    0 => dst | imm,
                    1 => dst & imm,
                    _ => dst ^ imm,
                } & size.mask();
                self.regs.sr = alu::move_flags(sr, result, size);
                self.write_operand(operand, size, result)
            }
            2 => {
                let (result, sr) = alu::sub(imm, dst, size, sr);
                self.regs.sr = sr;
                self.write_operand(operand, size, result)
            }
            3 => {
                let (result, sr) = alu::add(imm, dst, size, sr);
                self.regs.sr = sr;
                self.write_operand(operand, size, result)
            }
            6 => {
                self.regs.sr = alu::cmp(imm, dst, size, sr);
                Ok(())
            }
            _ => Err(self.illegal()),
        }
    }

    fn exec_imm_to_status(&mut self, op: u16, size_bits: u16) -> Result<(), Exception> {
        match size_bits {
            0 => {
                let imm = self.fetch_ext_word()? & 0x00FF;
                let ccr = self.regs.ccr();
                let new = match op {
                    0 => ccr | imm,
                    1 => ccr & imm,
                    _ => ccr ^ imm,
                };
                self.regs.set_ccr(new);
                Ok(())
            }
            1 => {
                self.require_supervisor()?;
                let imm = self.fetch_ext_word()?;
                let sr = self.regs.sr;
                let new = match op {
                    0 => sr | imm,
                    1 => sr & imm,
                    _ => sr ^ imm,
                };
                self.regs.set_sr(new);
                Ok(())
            }
            _ => Err(self.illegal()),
        }
    }

    // Lines 1-3: MOVE and MOVEA.

    fn exec_move(&mut self, opcode: u16) -> Result<(), Exception> {
        let size = Size::from_move_bits(opcode >> 12).ok_or_else(|| self.illegal())?;
        let src_mode = self.ea_mode(opcode)?;
        let dst_mode = AddrMode::decode(((opcode >> 6) & 7) as u8, ((opcode >> 9) & 7) as u8)
            .ok_or_else(|| self.illegal())?;
        if size == Size::Byte && matches!(src_mode, AddrMode::AddrDirect(_)) {
            return Err(self.illegal());
        }
        let src = self.resolve(src_mode, size)?;
        let value = self.read_operand(src, size)?;
        if let AddrMode::AddrDirect(n) = dst_mode {
            if size == Size::Byte {
                return Err(self.illegal());
            }
            // MOVEA: sign-extend, all 32 bits, no flags.
            self.regs.set_addr(usize::from(n), size.sign_extend(value));
            return Ok(());
        }
        if !dst_mode.is_alterable() {
            return Err(self.illegal());
        }
        let dst = self.resolve(dst_mode, size)?;
        self.write_operand(dst, size, value)?;
        self.regs.sr = alu::move_flags(self.regs.sr, value, size);
        Ok(())
    }

    // Line 4: the miscellaneous page.

    fn exec_line_4(&mut self, opcode: u16) -> Result<(), Exception> {
        match opcode {
            0x4AFC => return Err(self.illegal()), // ILLEGAL
            0x4E70 => {
                // RESET: no external devices to pulse.
                self.require_supervisor()?;
                return Ok(());
            }
            0x4E71 => return Ok(()), // NOP
            0x4E72 => return self.exec_stop(),
            0x4E73 => return self.exec_rte(),
            0x4E75 => return self.exec_rts(),
            0x4E76 => {
                return if self.regs.flag(SR_V) {
                    Err(self.trap(vectors::VEC_TRAPV))
                } else {
                    Ok(())
                };
            }
            0x4E77 => return self.exec_rtr(),
            _ => {}
        }
        if opcode & 0xFFF8 == 0x4848 {
            return self.exec_bkpt(opcode);
        }
        if opcode & 0xFFF0 == 0x4E40 {
            return Err(self.trap(vectors::VEC_TRAP_BASE + u32::from(opcode & 0xF)));
        }
        if opcode & 0xFFF8 == 0x4E50 {
            return self.exec_link(opcode);
        }
        if opcode & 0xFFF8 == 0x4E58 {
            return self.exec_unlk(opcode);
        }
        if opcode & 0xFFF0 == 0x4E60 {
            return self.exec_move_usp(opcode);
        }
        if opcode & 0xFFC0 == 0x4E80 {
            return self.exec_jsr(opcode);
        }
        if opcode & 0xFFC0 == 0x4EC0 {
            return self.exec_jmp(opcode);
        }
        if opcode & 0xFFC0 == 0x4840 {
            return if opcode & 0x0038 == 0 {
                self.exec_swap(opcode)
            } else {
                self.exec_pea(opcode)
            };
        }
        if opcode & 0xFFC0 == 0x4800 {
            return self.exec_nbcd(opcode);
        }
        if opcode & 0xFFB8 == 0x4880 {
            return self.exec_ext(opcode);
        }
        if opcode & 0xFB80 == 0x4880 {
            return self.exec_movem(opcode);
        }
        match opcode & 0x0FC0 {
            0x00C0 => return self.exec_move_from_sr(opcode),
            0x04C0 => return self.exec_move_to_ccr(opcode),
            0x06C0 => return self.exec_move_to_sr(opcode),
            0x0AC0 => return self.exec_tas(opcode),
            _ => {}
        }
        if opcode & 0x0100 != 0 {
            return match (opcode >> 6) & 3 {
                2 => self.exec_chk(opcode),
                3 => self.exec_lea(opcode),
                _ => Err(self.illegal()),
            };
        }
        let size = Size::from_bits((opcode >> 6) & 3).ok_or_else(|| self.illegal())?;
        match (opcode >> 9) & 7 {
            0 => self.exec_unary(opcode, size, UnaryOp::Negx),
            1 => self.exec_unary(opcode, size, UnaryOp::Clr),
            2 => self.exec_unary(opcode, size, UnaryOp::Neg),
            3 => self.exec_unary(opcode, size, UnaryOp::Not),
            5 => self.exec_tst(opcode, size),
            _ => Err(self.illegal()),
        }
    }

    fn exec_stop(&mut self) -> Result<(), Exception> {
        self.require_supervisor()?;
        let imm = self.fetch_ext_word()?;
        if imm == 0xFFFF {
            // The finish handler's operand: clean termination, result in D0.
            self.condition = Condition::Finished;
        } else {
            self.regs.set_sr(imm);
            self.condition = Condition::Halted;
        }
        Ok(())
    }

    fn exec_rte(&mut self) -> Result<(), Exception> {
        self.require_supervisor()?;
        let sp = self.regs.ssp;
        let sr = self.mem.read_u16(sp).map_err(|e| self.bus_fault(e))?;
        let pc = self
            .mem
            .read_u32(sp.wrapping_add(2))
            .map_err(|e| self.bus_fault(e))?;
        self.regs.ssp = sp.wrapping_add(6);
        self.regs.set_sr(sr);
        self.regs.pc = pc;
        Ok(())
    }

    fn exec_rts(&mut self) -> Result<(), Exception> {
        self.regs.pc = self.pop_long()?;
        Ok(())
    }

    fn exec_rtr(&mut self) -> Result<(), Exception> {
        let ccr = self.pop_word()?;
        self.regs.pc = self.pop_long()?;
        self.regs.set_ccr(ccr);
        Ok(())
    }

    fn exec_bkpt(&mut self, opcode: u16) -> Result<(), Exception> {
        // PC stays on the breakpoint word so the host can substitute an
        // opcode there and resume.
        self.regs.pc = self.instr_pc;
        self.condition = Condition::Breakpoint(BreakpointFamily::from_field(opcode));
        Ok(())
    }

    fn exec_link(&mut self, opcode: u16) -> Result<(), Exception> {
        let reg = usize::from(opcode & 7);
        let d16 = Size::Word.sign_extend(u32::from(self.fetch_ext_word()?));
        self.push_long(self.regs.addr(reg))?;
        let sp = self.regs.sp();
        self.regs.set_addr(reg, sp);
        self.regs.set_sp(sp.wrapping_add(d16));
        Ok(())
    }

    fn exec_unlk(&mut self, opcode: u16) -> Result<(), Exception> {
        let reg = usize::from(opcode & 7);
        self.regs.set_sp(self.regs.addr(reg));
        let frame = self.pop_long()?;
        self.regs.set_addr(reg, frame);
        Ok(())
    }

    fn exec_move_usp(&mut self, opcode: u16) -> Result<(), Exception> {
        self.require_supervisor()?;
        let reg = usize::from(opcode & 7);
        if opcode & 0x0008 == 0 {
            self.regs.usp = self.regs.addr(reg);
        } else {
            let usp = self.regs.usp;
            self.regs.set_addr(reg, usp);
        }
        Ok(())
    }

    fn exec_jsr(&mut self, opcode: u16) -> Result<(), Exception> {
        let target = self.control_address(opcode)?;
        self.push_long(self.regs.pc)?;
        self.regs.pc = target;
        Ok(())
    }

    fn exec_jmp(&mut self, opcode: u16) -> Result<(), Exception> {
        self.regs.pc = self.control_address(opcode)?;
        Ok(())
    }

    fn exec_swap(&mut self, opcode: u16) -> Result<(), Exception> {
        let reg = usize::from(opcode & 7);
        let value = self.regs.d[reg].rotate_right(16);
        self.regs.d[reg] = value;
        self.regs.sr = alu::move_flags(self.regs.sr, value, Size::Long);
        Ok(())
    }

    fn exec_pea(&mut self, opcode: u16) -> Result<(), Exception> {
        let addr = self.control_address(opcode)?;
        self.push_long(addr)
    }

    fn exec_nbcd(&mut self, opcode: u16) -> Result<(), Exception> {
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() || !mode.is_alterable() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, Size::Byte)?;
        let dst = self.read_operand(operand, Size::Byte)? as u8;
        let (result, borrow) = alu::sbcd(dst, 0, self.regs.flag(SR_X));
        self.set_bcd_flags(u32::from(result), borrow);
        self.write_operand(operand, Size::Byte, u32::from(result))
    }

    fn exec_ext(&mut self, opcode: u16) -> Result<(), Exception> {
        let reg = usize::from(opcode & 7);
        let value = self.regs.d[reg];
        let (result, size) = if opcode & 0x0040 == 0 {
            (Size::Byte.sign_extend(value), Size::Word)
        } else {
            (Size::Word.sign_extend(value), Size::Long)
        };
        self.regs.d[reg] = size.merge(value, result);
        self.regs.sr = alu::move_flags(self.regs.sr, result, size);
        Ok(())
    }

    fn exec_movem(&mut self, opcode: u16) -> Result<(), Exception> {
        let to_regs = opcode & 0x0400 != 0;
        let size = if opcode & 0x0040 != 0 {
            Size::Long
        } else {
            Size::Word
        };
        let mask = self.fetch_ext_word()?;
        let mode = self.ea_mode(opcode)?;
        match mode {
            AddrMode::PreDecrement(n) if !to_regs => {
                // Mask bit 0 is A7 here; registers store from A7 down.
                let reg = usize::from(n);
                let mut addr = self.regs.addr(reg);
                for i in 0..16 {
                    if mask & (1 << i) == 0 {
                        continue;
                    }
                    addr = addr.wrapping_sub(size.bytes());
                    let value = self.reg_file(15 - i);
                    self.movem_store(addr, value, size)?;
                }
                self.regs.set_addr(reg, addr);
                Ok(())
            }
            AddrMode::PostIncrement(n) if to_regs => {
                let reg = usize::from(n);
                let mut addr = self.regs.addr(reg);
                for i in 0..16 {
                    if mask & (1 << i) == 0 {
                        continue;
                    }
                    let value = self.movem_load(addr, size)?;
                    self.set_reg_file(i, value);
                    addr = addr.wrapping_add(size.bytes());
                }
                self.regs.set_addr(reg, addr);
                Ok(())
            }
            // Stores need an alterable destination; PC-relative is
            // load-only.
            m if m.is_control() && (to_regs || m.is_alterable()) => {
                let mut addr = self.control_address(opcode)?;
                for i in 0..16 {
                    if mask & (1 << i) == 0 {
                        continue;
                    }
                    if to_regs {
                        let value = self.movem_load(addr, size)?;
                        self.set_reg_file(i, value);
                    } else {
                        let value = self.reg_file(i);
                        self.movem_store(addr, value, size)?;
                    }
                    addr = addr.wrapping_add(size.bytes());
                }
                Ok(())
            }
            _ => Err(self.illegal()),
        }
    }

    fn movem_store(&mut self, addr: u32, value: u32, size: Size) -> Result<(), Exception> {
        match size {
            Size::Word => self.mem.write_u16(addr, value as u16),
            _ => self.mem.write_u32(addr, value),
        }
        .map_err(|e| self.bus_fault(e))
    }

    /// Word transfers to registers sign-extend to the full 32 bits.
    fn movem_load(&mut self, addr: u32, size: Size) -> Result<u32, Exception> {
        let value = match size {
            Size::Word => self
                .mem
                .read_u16(addr)
                .map(|w| Size::Word.sign_extend(u32::from(w))),
            _ => self.mem.read_u32(addr),
        }
        .map_err(|e| self.bus_fault(e))?;
        Ok(value)
    }

    fn reg_file(&self, index: u16) -> u32 {
        let index = usize::from(index & 15);
        if index < 8 {
            self.regs.d[index]
        } else {
            self.regs.addr(index - 8)
        }
    }

    fn set_reg_file(&mut self, index: u16, value: u32) {
        let index = usize::from(index & 15);
        if index < 8 {
            self.regs.d[index] = value;
        } else {
            self.regs.set_addr(index - 8, value);
        }
    }

    fn exec_move_from_sr(&mut self, opcode: u16) -> Result<(), Exception> {
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() || !mode.is_alterable() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, Size::Word)?;
        self.write_operand(operand, Size::Word, u32::from(self.regs.sr))
    }

    fn exec_move_to_ccr(&mut self, opcode: u16) -> Result<(), Exception> {
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, Size::Word)?;
        let value = self.read_operand(operand, Size::Word)?;
        self.regs.set_ccr(value as u16);
        Ok(())
    }

    fn exec_move_to_sr(&mut self, opcode: u16) -> Result<(), Exception> {
        self.require_supervisor()?;
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, Size::Word)?;
        let value = self.read_operand(operand, Size::Word)?;
        self.regs.set_sr(value as u16);
        Ok(())
    }

    fn exec_tas(&mut self, opcode: u16) -> Result<(), Exception> {
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() || !mode.is_alterable() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, Size::Byte)?;
        let value = self.read_operand(operand, Size::Byte)?;
        self.regs.sr = alu::move_flags(self.regs.sr, value, Size::Byte);
        self.write_operand(operand, Size::Byte, value | 0x80)
    }

    fn exec_chk(&mut self, opcode: u16) -> Result<(), Exception> {
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, Size::Word)?;
        let bound = self.read_operand(operand, Size::Word)? as u16 as i16;
        let value = self.regs.d[usize::from((opcode >> 9) & 7)] as u16 as i16;
        if value < 0 {
            self.regs.set_flag(SR_N, true);
            return Err(self.trap(vectors::VEC_CHK));
        }
        if value > bound {
            self.regs.set_flag(SR_N, false);
            return Err(self.trap(vectors::VEC_CHK));
        }
        Ok(())
    }

    fn exec_lea(&mut self, opcode: u16) -> Result<(), Exception> {
        let addr = self.control_address(opcode)?;
        self.regs.set_addr(usize::from((opcode >> 9) & 7), addr);
        Ok(())
    }

    fn exec_unary(&mut self, opcode: u16, size: Size, op: UnaryOp) -> Result<(), Exception> {
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() || !mode.is_alterable() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, size)?;
        let dst = self.read_operand(operand, size)?;
        let sr = self.regs.sr;
        let (result, sr) = match op {
            UnaryOp::Negx => alu::negx(dst, size, sr),
            UnaryOp::Clr => (0, alu::move_flags(sr, 0, size)),
            UnaryOp::Neg => alu::neg(dst, size, sr),
            UnaryOp::Not => {
                let result = !dst & size.mask();
                (result, alu::move_flags(sr, result, size))
            }
        };
        self.regs.sr = sr;
        self.write_operand(operand, size, result)
    }

    fn exec_tst(&mut self, opcode: u16, size: Size) -> Result<(), Exception> {
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() || !mode.is_alterable() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, size)?;
        let value = self.read_operand(operand, size)?;
        self.regs.sr = alu::move_flags(self.regs.sr, value, size);
        Ok(())
    }

    // Line 5: ADDQ, SUBQ, Scc, DBcc.

    fn exec_line_5(&mut self, opcode: u16) -> Result<(), Exception> {
        if opcode & 0x00C0 == 0x00C0 {
            if opcode & 0x0038 == 0x0008 {
                return self.exec_dbcc(opcode);
            }
            return self.exec_scc(opcode);
        }
        let size = Size::from_bits((opcode >> 6) & 3).ok_or_else(|| self.illegal())?;
        let quick = match (opcode >> 9) & 7 {
            0 => 8,
            n => u32::from(n),
        };
        let subtract = opcode & 0x0100 != 0;
        let mode = self.ea_mode(opcode)?;
        if !mode.is_alterable() {
            return Err(self.illegal());
        }
        if let AddrMode::AddrDirect(n) = mode {
            if size == Size::Byte {
                return Err(self.illegal());
            }
            // Address destinations: full 32 bits, flags untouched.
            let reg = usize::from(n);
            let dst = self.regs.addr(reg);
            let result = if subtract {
                dst.wrapping_sub(quick)
            } else {
                dst.wrapping_add(quick)
            };
            self.regs.set_addr(reg, result);
            return Ok(());
        }
        let operand = self.resolve(mode, size)?;
        let dst = self.read_operand(operand, size)?;
        let (result, sr) = if subtract {
            alu::sub(quick, dst, size, self.regs.sr)
        } else {
            alu::add(quick, dst, size, self.regs.sr)
        };
        self.regs.sr = sr;
        self.write_operand(operand, size, result)
    }

    fn exec_dbcc(&mut self, opcode: u16) -> Result<(), Exception> {
        let cc = ((opcode >> 8) & 0xF) as u8;
        let d16 = Size::Word.sign_extend(u32::from(self.fetch_ext_word()?));
        if self.regs.condition(cc) {
            return Ok(());
        }
        let reg = usize::from(opcode & 7);
        let counter = (self.regs.d[reg] as u16).wrapping_sub(1);
        self.regs.d[reg] = Size::Word.merge(self.regs.d[reg], u32::from(counter));
        if counter != 0xFFFF {
            self.regs.pc = self.instr_pc.wrapping_add(2).wrapping_add(d16);
        }
        Ok(())
    }

    fn exec_scc(&mut self, opcode: u16) -> Result<(), Exception> {
        let cc = ((opcode >> 8) & 0xF) as u8;
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() || !mode.is_alterable() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, Size::Byte)?;
        let value = if self.regs.condition(cc) { 0xFF } else { 0x00 };
        self.write_operand(operand, Size::Byte, value)
    }

    // Line 6: BRA, BSR, Bcc.

    fn exec_branch(&mut self, opcode: u16) -> Result<(), Exception> {
        let cc = ((opcode >> 8) & 0xF) as u8;
        let disp8 = u32::from(opcode & 0xFF);
        let base = self.regs.pc;
        let target = if disp8 == 0 {
            let d16 = Size::Word.sign_extend(u32::from(self.fetch_ext_word()?));
            base.wrapping_add(d16)
        } else {
            base.wrapping_add(Size::Byte.sign_extend(disp8))
        };
        match cc {
            0 => self.regs.pc = target,
            1 => {
                self.push_long(self.regs.pc)?;
                self.regs.pc = target;
            }
            _ => {
                if self.regs.condition(cc) {
                    self.regs.pc = target;
                }
            }
        }
        Ok(())
    }

    // Line 7: MOVEQ.

    fn exec_moveq(&mut self, opcode: u16) -> Result<(), Exception> {
        if opcode & 0x0100 != 0 {
            return Err(self.illegal());
        }
        let value = Size::Byte.sign_extend(u32::from(opcode & 0xFF));
        self.regs.d[usize::from((opcode >> 9) & 7)] = value;
        self.regs.sr = alu::move_flags(self.regs.sr, value, Size::Long);
        Ok(())
    }

    // Line 8: OR, DIVU, DIVS, SBCD.

    fn exec_line_8(&mut self, opcode: u16) -> Result<(), Exception> {
        match (opcode >> 6) & 7 {
            3 => self.exec_div(opcode, false),
            7 => self.exec_div(opcode, true),
            4 if opcode & 0x0030 == 0 => self.exec_bcd_pair(opcode, false),
            _ => self.exec_logic(opcode, |src, dst| src | dst),
        }
    }

    fn exec_div(&mut self, opcode: u16, signed: bool) -> Result<(), Exception> {
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, Size::Word)?;
        let divisor = self.read_operand(operand, Size::Word)? as u16;
        if divisor == 0 {
            return Err(self.trap(vectors::VEC_ZERO_DIVIDE));
        }
        let reg = usize::from((opcode >> 9) & 7);
        let dividend = self.regs.d[reg];
        let outcome = if signed {
            alu::divs(dividend, divisor)
        } else {
            alu::divu(dividend, divisor)
        };
        match outcome {
            DivResult::Overflow => {
                // Destination untouched.
                self.regs.set_flag(SR_V, true);
                self.regs.set_flag(SR_C, false);
            }
            DivResult::Ok {
                quotient,
                remainder,
            } => {
                self.regs.d[reg] = (u32::from(remainder) << 16) | u32::from(quotient);
                self.regs.sr =
                    alu::move_flags(self.regs.sr, u32::from(quotient), Size::Word);
            }
        }
        Ok(())
    }

    fn exec_logic(&mut self, opcode: u16, f: fn(u32, u32) -> u32) -> Result<(), Exception> {
        let size = Size::from_bits((opcode >> 6) & 3).ok_or_else(|| self.illegal())?;
        let reg = usize::from((opcode >> 9) & 7);
        let mode = self.ea_mode(opcode)?;
        if opcode & 0x0100 != 0 {
            if !mode.is_memory_alterable() {
                return Err(self.illegal());
            }
            let operand = self.resolve(mode, size)?;
            let dst = self.read_operand(operand, size)?;
            let result = f(self.regs.d[reg], dst) & size.mask();
            self.regs.sr = alu::move_flags(self.regs.sr, result, size);
            self.write_operand(operand, size, result)
        } else {
            if !mode.is_data() {
                return Err(self.illegal());
            }
            let operand = self.resolve(mode, size)?;
            let src = self.read_operand(operand, size)?;
            let result = f(src, self.regs.d[reg]) & size.mask();
            self.regs.d[reg] = size.merge(self.regs.d[reg], result);
            self.regs.sr = alu::move_flags(self.regs.sr, result, size);
            Ok(())
        }
    }

    fn exec_bcd_pair(&mut self, opcode: u16, is_add: bool) -> Result<(), Exception> {
        let rx = usize::from((opcode >> 9) & 7);
        let ry = usize::from(opcode & 7);
        let x = self.regs.flag(SR_X);
        if opcode & 0x0008 == 0 {
            let src = self.regs.d[ry] as u8;
            let dst = self.regs.d[rx] as u8;
            let (result, carry) = if is_add {
                alu::abcd(src, dst, x)
            } else {
                alu::sbcd(src, dst, x)
            };
            self.regs.d[rx] = Size::Byte.merge(self.regs.d[rx], u32::from(result));
            self.set_bcd_flags(u32::from(result), carry);
            Ok(())
        } else {
            let src_op = self.resolve(AddrMode::PreDecrement(ry as u8), Size::Byte)?;
            let src = self.read_operand(src_op, Size::Byte)? as u8;
            let dst_op = self.resolve(AddrMode::PreDecrement(rx as u8), Size::Byte)?;
            let dst = self.read_operand(dst_op, Size::Byte)? as u8;
            let (result, carry) = if is_add {
                alu::abcd(src, dst, x)
            } else {
                alu::sbcd(src, dst, x)
            };
            self.set_bcd_flags(u32::from(result), carry);
            self.write_operand(dst_op, Size::Byte, u32::from(result))
        }
    }

    /// C/X from the decimal carry; Z only ever clears (multi-byte chains).
    fn set_bcd_flags(&mut self, result: u32, carry: bool) {
        self.regs.set_flag(SR_C, carry);
        self.regs.set_flag(SR_X, carry);
        if result != 0 {
            self.regs.set_flag(SR_Z, false);
        }
    }

    // Lines 9 and D: SUB/SUBA/SUBX and ADD/ADDA/ADDX.

    fn exec_add_sub(&mut self, opcode: u16, is_add: bool) -> Result<(), Exception> {
        let opmode = (opcode >> 6) & 7;
        let reg = usize::from((opcode >> 9) & 7);
        if opmode == 3 || opmode == 7 {
            let size = if opmode == 3 { Size::Word } else { Size::Long };
            let mode = self.ea_mode(opcode)?;
            let operand = self.resolve(mode, size)?;
            let src = size.sign_extend(self.read_operand(operand, size)?);
            let dst = self.regs.addr(reg);
            let result = if is_add {
                dst.wrapping_add(src)
            } else {
                dst.wrapping_sub(src)
            };
            self.regs.set_addr(reg, result);
            return Ok(());
        }
        let size = Size::from_bits(opmode & 3).ok_or_else(|| self.illegal())?;
        if opmode & 4 != 0 {
            if opcode & 0x0030 == 0 {
                return self.exec_addx_subx(opcode, is_add, size);
            }
            let mode = self.ea_mode(opcode)?;
            if !mode.is_memory_alterable() {
                return Err(self.illegal());
            }
            let operand = self.resolve(mode, size)?;
            let dst = self.read_operand(operand, size)?;
            let src = self.regs.d[reg];
            let (result, sr) = if is_add {
                alu::add(src, dst, size, self.regs.sr)
            } else {
                alu::sub(src, dst, size, self.regs.sr)
            };
            self.regs.sr = sr;
            self.write_operand(operand, size, result)
        } else {
            let mode = self.ea_mode(opcode)?;
            if size == Size::Byte && matches!(mode, AddrMode::AddrDirect(_)) {
                return Err(self.illegal());
            }
            let operand = self.resolve(mode, size)?;
            let src = self.read_operand(operand, size)?;
            let dst = self.regs.d[reg];
            let (result, sr) = if is_add {
                alu::add(src, dst, size, self.regs.sr)
            } else {
                alu::sub(src, dst, size, self.regs.sr)
            };
            self.regs.d[reg] = size.merge(dst, result);
            self.regs.sr = sr;
            Ok(())
        }
    }

    fn exec_addx_subx(&mut self, opcode: u16, is_add: bool, size: Size) -> Result<(), Exception> {
        let rx = usize::from((opcode >> 9) & 7);
        let ry = usize::from(opcode & 7);
        if opcode & 0x0008 == 0 {
            let src = self.regs.d[ry];
            let dst = self.regs.d[rx];
            let (result, sr) = if is_add {
                alu::addx(src, dst, size, self.regs.sr)
            } else {
                alu::subx(src, dst, size, self.regs.sr)
            };
            self.regs.d[rx] = size.merge(dst, result);
            self.regs.sr = sr;
            Ok(())
        } else {
            let src_op = self.resolve(AddrMode::PreDecrement(ry as u8), size)?;
            let src = self.read_operand(src_op, size)?;
            let dst_op = self.resolve(AddrMode::PreDecrement(rx as u8), size)?;
            let dst = self.read_operand(dst_op, size)?;
            let (result, sr) = if is_add {
                alu::addx(src, dst, size, self.regs.sr)
            } else {
                alu::subx(src, dst, size, self.regs.sr)
            };
            self.regs.sr = sr;
            self.write_operand(dst_op, size, result)
        }
    }

    // Line B: CMP, CMPA, CMPM, EOR.

    fn exec_line_b(&mut self, opcode: u16) -> Result<(), Exception> {
        let opmode = (opcode >> 6) & 7;
        let reg = usize::from((opcode >> 9) & 7);
        match opmode {
            3 | 7 => {
                let size = if opmode == 3 { Size::Word } else { Size::Long };
                let mode = self.ea_mode(opcode)?;
                let operand = self.resolve(mode, size)?;
                let src = size.sign_extend(self.read_operand(operand, size)?);
                self.regs.sr = alu::cmp(src, self.regs.addr(reg), Size::Long, self.regs.sr);
                Ok(())
            }
            0 | 1 | 2 => {
                let size = Size::from_bits(opmode).ok_or_else(|| self.illegal())?;
                let mode = self.ea_mode(opcode)?;
                if size == Size::Byte && matches!(mode, AddrMode::AddrDirect(_)) {
                    return Err(self.illegal());
                }
                let operand = self.resolve(mode, size)?;
                let src = self.read_operand(operand, size)?;
                self.regs.sr = alu::cmp(src, self.regs.d[reg], size, self.regs.sr);
                Ok(())
            }
            _ => {
                let size = Size::from_bits(opmode & 3).ok_or_else(|| self.illegal())?;
                if opcode & 0x0038 == 0x0008 {
                    // CMPM (Ay)+,(Ax)+
                    let ry = (opcode & 7) as u8;
                    let src_op = self.resolve(AddrMode::PostIncrement(ry), size)?;
                    let src = self.read_operand(src_op, size)?;
                    let dst_op =
                        self.resolve(AddrMode::PostIncrement(reg as u8), size)?;
                    let dst = self.read_operand(dst_op, size)?;
                    self.regs.sr = alu::cmp(src, dst, size, self.regs.sr);
                    return Ok(());
                }
                let mode = self.ea_mode(opcode)?;
                if !mode.is_data() || !mode.is_alterable() {
                    return Err(self.illegal());
                }
                let operand = self.resolve(mode, size)?;
                let dst = self.read_operand(operand, size)?;
                let result = (self.regs.d[reg] ^ dst) & size.mask();
                self.regs.sr = alu::move_flags(self.regs.sr, result, size);
                self.write_operand(operand, size, result)
            }
        }
    }

    // Line C: AND, MULU, MULS, ABCD, EXG.

    fn exec_line_c(&mut self, opcode: u16) -> Result<(), Exception> {
        match (opcode >> 6) & 7 {
            3 => self.exec_mul(opcode, false),
            7 => self.exec_mul(opcode, true),
            4 if opcode & 0x0030 == 0 => self.exec_bcd_pair(opcode, true),
            5 | 6 if matches!(opcode & 0x01F8, 0x0140 | 0x0148 | 0x0188) => {
                self.exec_exg(opcode)
            }
            _ => self.exec_logic(opcode, |src, dst| src & dst),
        }
    }

    fn exec_mul(&mut self, opcode: u16, signed: bool) -> Result<(), Exception> {
        let mode = self.ea_mode(opcode)?;
        if !mode.is_data() {
            return Err(self.illegal());
        }
        let operand = self.resolve(mode, Size::Word)?;
        let src = self.read_operand(operand, Size::Word)? as u16;
        let reg = usize::from((opcode >> 9) & 7);
        let dst = self.regs.d[reg] as u16;
        let product = if signed {
            (i32::from(src as i16) * i32::from(dst as i16)) as u32
        } else {
            u32::from(src) * u32::from(dst)
        };
        self.regs.d[reg] = product;
        self.regs.sr = alu::move_flags(self.regs.sr, product, Size::Long);
        Ok(())
    }

    fn exec_exg(&mut self, opcode: u16) -> Result<(), Exception> {
        let rx = usize::from((opcode >> 9) & 7);
        let ry = usize::from(opcode & 7);
        match opcode & 0x01F8 {
            0x0140 => self.regs.d.swap(rx, ry),
            0x0148 => {
                let x = self.regs.addr(rx);
                let y = self.regs.addr(ry);
                self.regs.set_addr(rx, y);
                self.regs.set_addr(ry, x);
            }
            _ => {
                let d = self.regs.d[rx];
                let a = self.regs.addr(ry);
                self.regs.d[rx] = a;
                self.regs.set_addr(ry, d);
            }
        }
        Ok(())
    }

    // Line E: shifts and rotates.

    fn exec_shift(&mut self, opcode: u16) -> Result<(), Exception> {
        let left = opcode & 0x0100 != 0;
        if opcode & 0x00C0 == 0x00C0 {
            if opcode & 0x0800 != 0 {
                return Err(self.illegal());
            }
            let kind = ShiftKind::from_bits((opcode >> 9) & 3);
            let mode = self.ea_mode(opcode)?;
            if !mode.is_memory_alterable() {
                return Err(self.illegal());
            }
            let operand = self.resolve(mode, Size::Word)?;
            let value = self.read_operand(operand, Size::Word)?;
            let (result, sr) = alu::shift(kind, left, value, 1, Size::Word, self.regs.sr);
            self.regs.sr = sr;
            return self.write_operand(operand, Size::Word, result);
        }
        let size = Size::from_bits((opcode >> 6) & 3).ok_or_else(|| self.illegal())?;
        let kind = ShiftKind::from_bits((opcode >> 3) & 3);
        let reg = usize::from(opcode & 7);
        let count = if opcode & 0x0020 != 0 {
            self.regs.d[usize::from((opcode >> 9) & 7)] % 64
        } else {
            match (opcode >> 9) & 7 {
                0 => 8,
                n => u32::from(n),
            }
        };
        let value = self.regs.d[reg];
        let (result, sr) = alu::shift(kind, left, value, count, size, self.regs.sr);
        self.regs.d[reg] = size.merge(value, result);
        self.regs.sr = sr;
        Ok(())
    }
}

enum UnaryOp {
    Negx,
    Clr,
    Neg,
    Not,
}

#[cfg(test)]
mod tests {
    use crate::condition::{BreakpointFamily, Condition};
    use crate::cpu::Cpu;
    use crate::memory::Memory;
    use crate::registers::{SR_C, SR_N, SR_S, SR_V, SR_Z};
    use crate::vectors;

    const CODE: u32 = 0x0400;

    fn cpu_with_program(words: &[u16]) -> Cpu {
        let mut mem = Memory::new(0x2000);
        mem.write_u32(0, 0x1000).unwrap();
        mem.write_u32(4, CODE).unwrap();
        for (i, word) in words.iter().enumerate() {
            mem.write_u16(CODE + 2 * i as u32, *word).unwrap();
        }
        let mut cpu = Cpu::new(mem);
        cpu.reset();
        cpu
    }

    fn run(cpu: &mut Cpu, steps: usize) {
        for _ in 0..steps {
            cpu.step();
        }
    }

    #[test]
    fn moveq_sign_extends_and_sets_flags() {
        let mut cpu = cpu_with_program(&[0x70FF]); // MOVEQ #-1,D0
        cpu.step();
        assert_eq!(cpu.regs.d[0], 0xFFFF_FFFF);
        assert!(cpu.regs.flag(SR_N));
        assert!(!cpu.regs.flag(SR_Z));
    }

    #[test]
    fn move_between_memory_and_register() {
        // MOVE.W #0x1234,D1; MOVE.W D1,(0x0600).W; MOVE.W (0x0600).W,D2
        let mut cpu = cpu_with_program(&[
            0x323C, 0x1234, // MOVE.W #$1234,D1
            0x31C1, 0x0600, // MOVE.W D1,($0600).W
            0x3438, 0x0600, // MOVE.W ($0600).W,D2
        ]);
        run(&mut cpu, 3);
        assert_eq!(cpu.mem.read_u16(0x0600).unwrap(), 0x1234);
        assert_eq!(cpu.regs.d[2] & 0xFFFF, 0x1234);
    }

    #[test]
    fn movea_sign_extends_without_flags() {
        let mut cpu = cpu_with_program(&[0x3E7C, 0x8000]); // MOVEA.W #$8000,A7
        cpu.regs.set_flag(SR_Z, true);
        cpu.step();
        assert_eq!(cpu.regs.addr(7), 0xFFFF_8000);
        assert!(cpu.regs.flag(SR_Z), "MOVEA must not touch the flags");
    }

    #[test]
    fn postincrement_and_predecrement_step_their_register() {
        // MOVE.B (A0)+,D0 twice, then MOVE.B -(A0),D1
        let mut cpu = cpu_with_program(&[0x1018, 0x1018, 0x1220]);
        cpu.regs.set_addr(0, 0x0600);
        cpu.mem.write_u8(0x0600, 0xAA).unwrap();
        cpu.mem.write_u8(0x0601, 0xBB).unwrap();
        run(&mut cpu, 3);
        assert_eq!(cpu.regs.d[0] & 0xFF, 0xBB);
        assert_eq!(cpu.regs.d[1] & 0xFF, 0xBB);
        assert_eq!(cpu.regs.addr(0), 0x0601);
    }

    #[test]
    fn add_sets_carry_and_extend() {
        // MOVE.L #$FFFFFFFF,D0; ADDQ.L #1,D0
        let mut cpu = cpu_with_program(&[0x203C, 0xFFFF, 0xFFFF, 0x5280]);
        run(&mut cpu, 2);
        assert_eq!(cpu.regs.d[0], 0);
        assert!(cpu.regs.flag(SR_Z));
        assert!(cpu.regs.flag(SR_C));
    }

    #[test]
    fn subq_on_address_register_skips_flags() {
        let mut cpu = cpu_with_program(&[0x5548]); // SUBQ.W #2,A0
        cpu.regs.set_addr(0, 1);
        cpu.regs.set_flag(SR_Z, true);
        cpu.step();
        // Full 32-bit arithmetic even for the .W form.
        assert_eq!(cpu.regs.addr(0), 0xFFFF_FFFF);
        assert!(cpu.regs.flag(SR_Z));
    }

    #[test]
    fn dbf_counts_a_word_loop_down() {
        // MOVEQ #3,D1; loop: DBF D1,loop
        let mut cpu = cpu_with_program(&[0x7203, 0x51C9, 0xFFFE]);
        cpu.step();
        let mut iterations = 0;
        while cpu.regs.pc == CODE + 2 {
            cpu.step();
            iterations += 1;
            assert!(iterations < 10);
        }
        assert_eq!(iterations, 4);
        assert_eq!(cpu.regs.d[1] & 0xFFFF, 0xFFFF);
    }

    #[test]
    fn bcc_follows_the_condition_codes() {
        // CMP.W #5,D0 (equal); BEQ.S +4; MOVEQ #1,D1; MOVEQ #2,D2
        let mut cpu = cpu_with_program(&[0x0C40, 0x0005, 0x6702, 0x7201, 0x7402]);
        cpu.regs.d[0] = 5;
        run(&mut cpu, 3);
        assert_eq!(cpu.regs.d[1], 0, "BEQ must skip the first MOVEQ");
        assert_eq!(cpu.regs.d[2], 2);
    }

    #[test]
    fn jsr_rts_round_trip() {
        // JSR ($0500).W; MOVEQ #7,D3  /  at $0500: RTS
        let mut cpu = cpu_with_program(&[0x4EB8, 0x0500, 0x7607]);
        cpu.mem.write_u16(0x0500, 0x4E75).unwrap();
        cpu.step();
        assert_eq!(cpu.regs.pc, 0x0500);
        assert_eq!(cpu.mem.read_u32(cpu.regs.sp()).unwrap(), CODE + 4);
        run(&mut cpu, 2);
        assert_eq!(cpu.regs.d[3], 7);
    }

    #[test]
    fn link_and_unlk_restore_the_frame() {
        let mut cpu = cpu_with_program(&[0x4E56, 0xFFF8, 0x4E5E]); // LINK A6,#-8; UNLK A6
        cpu.regs.set_addr(6, 0xCAFE_F00D);
        let sp0 = cpu.regs.sp();
        cpu.step();
        assert_eq!(cpu.regs.addr(6), sp0 - 4);
        assert_eq!(cpu.regs.sp(), sp0 - 4 - 8);
        cpu.step();
        assert_eq!(cpu.regs.sp(), sp0);
        assert_eq!(cpu.regs.addr(6), 0xCAFE_F00D);
    }

    #[test]
    fn lea_and_pea_agree_on_the_address() {
        // LEA (6,A1),A2; PEA (6,A1)
        let mut cpu = cpu_with_program(&[0x45E9, 0x0006, 0x4869, 0x0006]);
        cpu.regs.set_addr(1, 0x0700);
        run(&mut cpu, 2);
        assert_eq!(cpu.regs.addr(2), 0x0706);
        assert_eq!(cpu.mem.read_u32(cpu.regs.sp()).unwrap(), 0x0706);
    }

    #[test]
    fn movem_predecrement_and_postincrement_round_trip() {
        // MOVEM.L D0-D1/A1,-(A7); MOVEM.L (A7)+,D2-D3/A2
        let mut cpu = cpu_with_program(&[0x48E7, 0xC040, 0x4CDF, 0x040C]);
        cpu.regs.d[0] = 0x1111_1111;
        cpu.regs.d[1] = 0x2222_2222;
        cpu.regs.set_addr(1, 0x3333_3333);
        let sp0 = cpu.regs.sp();
        cpu.step();
        assert_eq!(cpu.regs.sp(), sp0 - 12);
        cpu.step();
        assert_eq!(cpu.regs.sp(), sp0);
        assert_eq!(cpu.regs.d[2], 0x1111_1111);
        assert_eq!(cpu.regs.d[3], 0x2222_2222);
        assert_eq!(cpu.regs.addr(2), 0x3333_3333);
    }

    #[test]
    fn movem_stores_reject_pc_relative_destinations() {
        let mut cpu = cpu_with_program(&[0x48BA, 0x0001, 0x0010]); // MOVEM.W D0,(d16,PC)
        cpu.mem.write_u32(vectors::VEC_ILLEGAL * 4, 0x0500).unwrap();
        cpu.mem.write_u16(0x0500, 0x4E71).unwrap();
        cpu.step();
        assert_eq!(cpu.regs.pc, 0x0500);
    }

    #[test]
    fn movem_loads_may_use_pc_relative_sources() {
        // MOVEM.W (2,PC),D0 picks up the word just past the instruction.
        let mut cpu = cpu_with_program(&[0x4CBA, 0x0001, 0x0002, 0x1234]);
        cpu.step();
        assert_eq!(cpu.regs.d[0], 0x1234);
    }

    #[test]
    fn swap_and_ext_reshape_registers() {
        let mut cpu = cpu_with_program(&[0x4840, 0x4881, 0x48C1]); // SWAP D0; EXT.W D1; EXT.L D1
        cpu.regs.d[0] = 0x1234_5678;
        cpu.regs.d[1] = 0x0000_00F0;
        run(&mut cpu, 3);
        assert_eq!(cpu.regs.d[0], 0x5678_1234);
        assert_eq!(cpu.regs.d[1], 0xFFFF_FFF0);
    }

    #[test]
    fn exg_swaps_across_register_files() {
        let mut cpu = cpu_with_program(&[0xC188]); // EXG D0,A0
        cpu.regs.d[0] = 0xAAAA_AAAA;
        cpu.regs.set_addr(0, 0xBBBB_BBBB);
        cpu.step();
        assert_eq!(cpu.regs.d[0], 0xBBBB_BBBB);
        assert_eq!(cpu.regs.addr(0), 0xAAAA_AAAA);
    }

    #[test]
    fn mulu_and_divu_use_word_operands() {
        // MULU #300,D0 then DIVU #7,D0
        let mut cpu = cpu_with_program(&[0xC0FC, 0x012C, 0x80FC, 0x0007]);
        cpu.regs.d[0] = 200;
        cpu.step();
        assert_eq!(cpu.regs.d[0], 60_000);
        cpu.step();
        assert_eq!(cpu.regs.d[0] & 0xFFFF, 60_000 / 7);
        assert_eq!(cpu.regs.d[0] >> 16, 60_000 % 7);
    }

    #[test]
    fn divide_by_zero_traps_through_vector_five() {
        let mut cpu = cpu_with_program(&[0x80FC, 0x0000]); // DIVU #0,D0
        cpu.mem
            .write_u32(vectors::VEC_ZERO_DIVIDE * 4, 0x0500)
            .unwrap();
        cpu.mem.write_u16(0x0500, 0x4E71).unwrap();
        cpu.step();
        assert_eq!(cpu.regs.pc, 0x0500);
        // Group-2 trap frames stack the next instruction.
        assert_eq!(cpu.mem.read_u32(cpu.regs.ssp + 2).unwrap(), CODE + 4);
    }

    #[test]
    fn shifts_set_carry_from_the_last_bit_out() {
        let mut cpu = cpu_with_program(&[0xE348, 0xE259]); // LSL.W #1,D0; ROR.W #1,D1
        cpu.regs.d[0] = 0x8001;
        cpu.regs.d[1] = 0x0001;
        cpu.step();
        assert_eq!(cpu.regs.d[0] & 0xFFFF, 0x0002);
        assert!(cpu.regs.flag(SR_C));
        cpu.step();
        assert_eq!(cpu.regs.d[1] & 0xFFFF, 0x8000);
        assert!(cpu.regs.flag(SR_C));
        assert!(cpu.regs.flag(SR_N));
    }

    #[test]
    fn bit_ops_test_before_modifying() {
        let mut cpu = cpu_with_program(&[0x0840, 0x0003]); // BCHG #3,D0
        cpu.regs.d[0] = 0;
        cpu.step();
        assert!(cpu.regs.flag(SR_Z));
        assert_eq!(cpu.regs.d[0], 8);
    }

    #[test]
    fn btst_on_memory_is_byte_sized() {
        let mut cpu = cpu_with_program(&[0x0838, 0x0007, 0x0600]); // BTST #7,($0600).W
        cpu.mem.write_u8(0x0600, 0x80).unwrap();
        cpu.step();
        assert!(!cpu.regs.flag(SR_Z));
    }

    #[test]
    fn static_btst_rejects_an_immediate_destination() {
        let mut cpu = cpu_with_program(&[0x083C, 0x0001, 0x00FF]); // BTST #1,#$FF
        cpu.mem.write_u32(vectors::VEC_ILLEGAL * 4, 0x0500).unwrap();
        cpu.mem.write_u16(0x0500, 0x4E71).unwrap();
        cpu.step();
        assert_eq!(cpu.regs.pc, 0x0500);
        // Instruction faults stack the faulting word.
        assert_eq!(cpu.mem.read_u32(cpu.regs.ssp + 2).unwrap(), CODE);
    }

    #[test]
    fn dynamic_btst_may_test_an_immediate() {
        let mut cpu = cpu_with_program(&[0x033C, 0x0004]); // BTST D1,#$04
        cpu.regs.d[1] = 2;
        cpu.step();
        assert!(!cpu.regs.flag(SR_Z));
    }

    #[test]
    fn scc_writes_all_ones_or_zero() {
        let mut cpu = cpu_with_program(&[0x50C0, 0x51C1]); // ST D0; SF D1
        cpu.regs.d[0] = 0x1234_5600;
        cpu.regs.d[1] = 0x1234_56FF;
        run(&mut cpu, 2);
        assert_eq!(cpu.regs.d[0], 0x1234_56FF);
        assert_eq!(cpu.regs.d[1], 0x1234_5600);
    }

    #[test]
    fn trap_enters_supervisor_through_its_vector() {
        let mut cpu = cpu_with_program(&[0x4E41]); // TRAP #1
        cpu.mem
            .write_u32((vectors::VEC_TRAP_BASE + 1) * 4, 0x0500)
            .unwrap();
        cpu.mem.write_u16(0x0500, 0x4E73).unwrap(); // RTE
        // Drop to user mode first.
        cpu.regs.set_sr(0);
        cpu.regs.usp = 0x0800;
        cpu.step();
        assert!(cpu.regs.is_supervisor());
        assert_eq!(cpu.regs.pc, 0x0500);
        cpu.step(); // RTE
        assert!(!cpu.regs.is_supervisor());
        assert_eq!(cpu.regs.pc, CODE + 2);
    }

    #[test]
    fn move_to_sr_from_user_mode_is_a_privilege_violation() {
        let mut cpu = cpu_with_program(&[0x46FC, 0x2700]); // MOVE #$2700,SR
        cpu.mem
            .write_u32(vectors::VEC_PRIVILEGE * 4, 0x0500)
            .unwrap();
        cpu.mem.write_u16(0x0500, 0x4E71).unwrap();
        cpu.regs.set_sr(0);
        cpu.regs.usp = 0x0800;
        cpu.step();
        assert_eq!(cpu.regs.pc, 0x0500);
        // The faulting instruction's own address is stacked.
        assert_eq!(cpu.mem.read_u32(cpu.regs.ssp + 2).unwrap(), CODE);
    }

    #[test]
    fn bkpt_suspends_with_pc_on_the_breakpoint() {
        let mut cpu = cpu_with_program(&[0x484A, 0x4E71]); // BKPT #2; NOP
        assert!(!cpu.step());
        assert_eq!(
            cpu.condition(),
            Condition::Breakpoint(BreakpointFamily::Bkpt2)
        );
        assert_eq!(cpu.regs.pc, CODE);
        // Resume over it with a NOP substitute.
        cpu.acknowledge_breakpoint(0x4E71);
        assert!(cpu.step());
        assert_eq!(cpu.regs.pc, CODE + 2);
        assert_eq!(cpu.mem.read_u16(CODE).unwrap(), 0x484A, "memory keeps the breakpoint");
    }

    #[test]
    fn stop_with_the_finish_operand_terminates() {
        let mut cpu = cpu_with_program(&[0x4E72, 0xFFFF]);
        assert!(!cpu.step());
        assert_eq!(cpu.condition(), Condition::Finished);
    }

    #[test]
    fn stop_with_any_other_operand_halts() {
        let mut cpu = cpu_with_program(&[0x4E72, 0x2700]);
        assert!(!cpu.step());
        assert_eq!(cpu.condition(), Condition::Halted);
    }

    #[test]
    fn tas_sets_the_high_bit_atomically() {
        let mut cpu = cpu_with_program(&[0x4AD0]); // TAS (A0)
        cpu.regs.set_addr(0, 0x0600);
        cpu.mem.write_u8(0x0600, 0x00).unwrap();
        cpu.step();
        assert!(cpu.regs.flag(SR_Z));
        assert_eq!(cpu.mem.read_u8(0x0600).unwrap(), 0x80);
    }

    #[test]
    fn chk_traps_only_out_of_bounds() {
        let mut cpu = cpu_with_program(&[0x4181, 0x4181]); // CHK D1,D0 twice
        cpu.mem.write_u32(vectors::VEC_CHK * 4, 0x0500).unwrap();
        cpu.mem.write_u16(0x0500, 0x4E71).unwrap();
        cpu.regs.d[0] = 5;
        cpu.regs.d[1] = 10;
        cpu.step();
        assert_eq!(cpu.regs.pc, CODE + 2, "in bounds, no trap");
        cpu.regs.d[0] = 11;
        cpu.step();
        assert_eq!(cpu.regs.pc, 0x0500);
    }

    #[test]
    fn trapv_fires_on_overflow_only() {
        let mut cpu = cpu_with_program(&[0x4E76, 0x4E76]); // TRAPV; TRAPV
        cpu.mem.write_u32(vectors::VEC_TRAPV * 4, 0x0500).unwrap();
        cpu.mem.write_u16(0x0500, 0x4E71).unwrap();
        cpu.step();
        assert_eq!(cpu.regs.pc, CODE + 2);
        cpu.regs.set_flag(SR_V, true);
        cpu.step();
        assert_eq!(cpu.regs.pc, 0x0500);
    }

    #[test]
    fn line_a_vectors_through_ten() {
        let mut cpu = cpu_with_program(&[0xA123]);
        cpu.mem.write_u32(vectors::VEC_LINE_A * 4, 0x0500).unwrap();
        cpu.mem.write_u16(0x0500, 0x4E71).unwrap();
        cpu.step();
        assert_eq!(cpu.regs.pc, 0x0500);
        assert_eq!(cpu.mem.read_u32(cpu.regs.ssp + 2).unwrap(), CODE);
    }

    #[test]
    fn cmpm_advances_both_pointers() {
        let mut cpu = cpu_with_program(&[0xB308]); // CMPM.B (A0)+,(A1)+
        cpu.regs.set_addr(0, 0x0600);
        cpu.regs.set_addr(1, 0x0601);
        cpu.mem.write_u8(0x0600, 3).unwrap();
        cpu.mem.write_u8(0x0601, 3).unwrap();
        cpu.step();
        assert!(cpu.regs.flag(SR_Z));
        assert_eq!(cpu.regs.addr(0), 0x0601);
        assert_eq!(cpu.regs.addr(1), 0x0602);
    }

    #[test]
    fn supervisor_round_trip_via_andi_to_sr() {
        // ANDI #$DFFF,SR drops to user mode, like the loader does.
        let mut cpu = cpu_with_program(&[0x027C, 0xDFFF, 0x4E71]);
        assert!(cpu.regs.flag(SR_S));
        cpu.regs.usp = 0x0800;
        cpu.step();
        assert!(!cpu.regs.is_supervisor());
        assert_eq!(cpu.regs.sp(), 0x0800);
    }
}
