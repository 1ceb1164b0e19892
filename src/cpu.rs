//! Sharp LR35902 CPU core: registers, interrupt sequencing, and execution of
//! decoded [`Instruction`]s against the memory bus. Decoding itself lives in
//! [`crate::instructions`]; this module owns the state the opcodes mutate.

use std::collections::VecDeque;

use log::debug;

use crate::instructions::{
    EXTENDED_PREFIX, HALT_DELAY, INTERRUPT_SERVICE, Instruction, InstructionSet, Operation,
    STOP_PREFIX,
};
use crate::mmu::{IF_JOYPAD, IF_SERIAL, IF_STAT, IF_TIMER, IF_VBLANK, Mmu, REG_IE, REG_IF};

// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
pub const FLAG_Z: u8 = 0x80; // Zero
pub const FLAG_N: u8 = 0x40; // Subtract
pub const FLAG_H: u8 = 0x20; // Half Carry
pub const FLAG_C: u8 = 0x10; // Carry

// Interrupt vectors (gbdev.io/pandocs/Interrupts.html)
const VECTOR_VBLANK: u16 = 0x40;
const VECTOR_STAT: u16 = 0x48;
const VECTOR_TIMER: u16 = 0x50;
const VECTOR_SERIAL: u16 = 0x58;
const VECTOR_JOYPAD: u16 = 0x60;

const TRACE_DEPTH: usize = 64;

/// Master interrupt enable. `Enabling` is the one-instruction latency of EI:
/// it is promoted to `Enabled` on the following fetch.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InterruptState {
    Disabled,
    Enabling,
    Enabled,
}

/// How much of the execution trace to render.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TraceStyle {
    #[default]
    Off,
    Compact,
    Full,
}

/// Register file snapshot taken at fetch time.
#[derive(Clone, Copy)]
pub struct RegisterState {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

/// One executed instruction: the register file before it ran plus the decoded
/// name and immediate, kept in a bounded ring for post-mortem dumps.
pub struct TraceRecord {
    pub regs: RegisterState,
    pub name: &'static str,
    pub immediate: Option<u16>,
}

impl TraceRecord {
    /// Render the instruction name with the immediate substituted in.
    pub fn describe(&self) -> String {
        match self.immediate {
            Some(imm) => self.name.replacen("{}", &format!("{imm:#x}"), 1),
            None => self.name.to_string(),
        }
    }
}

pub struct Cpu {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub interrupt_state: InterruptState,
    pub halted: bool,
    /// Extra machine cycles charged by the instruction currently executing
    /// when its branch was taken.
    pub branch_penalty: u8,
    /// PC at the start of the most recent fetch, before the opcode bytes
    /// were consumed. Trace records report this address.
    fetch_pc: u16,
    trace: VecDeque<TraceRecord>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            sp: 0,
            pc: 0,
            interrupt_state: InterruptState::Disabled,
            halted: false,
            branch_penalty: 0,
            fetch_pc: 0,
            trace: VecDeque::with_capacity(TRACE_DEPTH),
        }
    }

    pub fn af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f as u16
    }

    pub fn bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    pub fn de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    pub fn hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    pub fn set_af(&mut self, value: u16) {
        self.a = (value >> 8) as u8;
        // The low nibble of F does not exist in hardware.
        self.f = value as u8 & 0xF0;
    }

    pub fn set_bc(&mut self, value: u16) {
        self.b = (value >> 8) as u8;
        self.c = value as u8;
    }

    pub fn set_de(&mut self, value: u16) {
        self.d = (value >> 8) as u8;
        self.e = value as u8;
    }

    pub fn set_hl(&mut self, value: u16) {
        self.h = (value >> 8) as u8;
        self.l = value as u8;
    }

    pub fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }

    pub fn set_flag(&mut self, mask: u8, set: bool) {
        if set {
            self.f |= mask;
        } else {
            self.f &= !mask;
        }
    }

    fn snapshot(&self) -> RegisterState {
        RegisterState {
            a: self.a,
            f: self.f,
            b: self.b,
            c: self.c,
            d: self.d,
            e: self.e,
            h: self.h,
            l: self.l,
            sp: self.sp,
            pc: self.pc,
        }
    }

    pub fn debug_state(&self) -> String {
        format!(
            "AF={:04x} BC={:04x} DE={:04x} HL={:04x} SP={:04x} PC={:04x} {}{}{}{} ime={:?}{}",
            self.af(),
            self.bc(),
            self.de(),
            self.hl(),
            self.sp,
            self.pc,
            if self.flag(FLAG_Z) { 'Z' } else { '-' },
            if self.flag(FLAG_N) { 'N' } else { '-' },
            if self.flag(FLAG_H) { 'H' } else { '-' },
            if self.flag(FLAG_C) { 'C' } else { '-' },
            self.interrupt_state,
            if self.halted { " halted" } else { "" },
        )
    }

    fn read_pc(&mut self, mmu: &mut Mmu) -> u8 {
        let byte = mmu.read_byte(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    /// Decode the instruction at PC, or a pseudo-instruction when an
    /// interrupt is pending or the CPU is halted. PC is advanced past the
    /// opcode bytes but not past any immediate.
    pub fn fetch_next(&mut self, mmu: &mut Mmu) -> &'static Instruction {
        self.fetch_pc = self.pc;
        if self.check_for_interrupt(mmu) {
            return &INTERRUPT_SERVICE;
        }
        if self.halted {
            return &HALT_DELAY;
        }
        let set = InstructionSet::get();
        let opcode = self.read_pc(mmu);
        match opcode {
            EXTENDED_PREFIX => {
                let sub = self.read_pc(mmu);
                set.extended(sub)
            }
            STOP_PREFIX => {
                let sub = self.read_pc(mmu);
                set.stop(sub)
            }
            _ => set.primary(opcode),
        }
    }

    /// Run a fetched instruction, reading its immediate operand first.
    /// Returns the total machine-cycle cost including any branch penalty.
    pub fn execute_next(&mut self, instruction: &'static Instruction, mmu: &mut Mmu) -> u8 {
        let mut regs = self.snapshot();
        regs.pc = self.fetch_pc;
        self.branch_penalty = 0;
        let immediate = match instruction.imm_size {
            0 => None,
            1 => Some(self.read_pc(mmu) as u16),
            2 => {
                let lo = self.read_pc(mmu) as u16;
                let hi = self.read_pc(mmu) as u16;
                Some((hi << 8) | lo)
            }
            width => panic!("immediate width {width} is not decodable"),
        };
        match (instruction.operation, immediate) {
            (Operation::Implied(f), None) => f(self, mmu),
            (Operation::Immediate(f), Some(imm)) => f(self, mmu, imm),
            (Operation::Unimplemented, _) => {
                panic!("undefined opcode executed at {:#06x}", regs.pc)
            }
            (Operation::Implied(_), Some(_)) | (Operation::Immediate(_), None) => {
                panic!("{}: operand shape does not match its table entry", instruction.name)
            }
        }
        if self.trace.len() == TRACE_DEPTH {
            self.trace.pop_front();
        }
        self.trace.push_back(TraceRecord {
            regs,
            name: instruction.name,
            immediate,
        });
        instruction.cycles + self.branch_penalty
    }

    /// Promote a pending EI. Called once per instruction, between the fetch
    /// and the execute, so the instruction after EI still runs with
    /// interrupts masked.
    pub fn interrupt_clock_tick(&mut self) {
        if self.interrupt_state == InterruptState::Enabling {
            self.interrupt_state = InterruptState::Enabled;
        }
    }

    /// Service the highest-priority pending interrupt, if the master enable
    /// allows it. A pending line always lifts HALT even when masked.
    fn check_for_interrupt(&mut self, mmu: &mut Mmu) -> bool {
        let enabled = mmu.map.byte(REG_IE);
        let requested = mmu.map.byte(REG_IF);
        let pending = enabled & requested & 0x1F;
        if pending == 0 {
            return false;
        }
        self.halted = false;
        if self.interrupt_state != InterruptState::Enabled {
            return false;
        }
        let (flag, vector) = if pending & IF_VBLANK != 0 {
            (IF_VBLANK, VECTOR_VBLANK)
        } else if pending & IF_STAT != 0 {
            (IF_STAT, VECTOR_STAT)
        } else if pending & IF_TIMER != 0 {
            (IF_TIMER, VECTOR_TIMER)
        } else if pending & IF_SERIAL != 0 {
            (IF_SERIAL, VECTOR_SERIAL)
        } else {
            (IF_JOYPAD, VECTOR_JOYPAD)
        };
        debug!("servicing interrupt {flag:#04x} at vector {vector:#04x}");
        mmu.map.set_byte(REG_IF, requested & !flag);
        self.interrupt_state = InterruptState::Disabled;
        self.push_word(mmu, self.pc);
        self.pc = vector;
        true
    }

    pub fn push_word(&mut self, mmu: &mut Mmu, value: u16) {
        self.sp = self.sp.wrapping_sub(2);
        mmu.write_word(self.sp, value);
    }

    pub fn pop_word(&mut self, mmu: &mut Mmu) -> u16 {
        let value = mmu.read_word(self.sp);
        self.sp = self.sp.wrapping_add(2);
        value
    }

    /// Drain the trace ring into printable lines, oldest first.
    pub fn drain_trace(&mut self, style: TraceStyle) -> Vec<String> {
        let records: Vec<TraceRecord> = self.trace.drain(..).collect();
        match style {
            TraceStyle::Off => Vec::new(),
            TraceStyle::Compact => records
                .iter()
                .map(|r| format!("{:#06x}:  {}", r.regs.pc, r.describe()))
                .collect(),
            TraceStyle::Full => records
                .iter()
                .map(|r| {
                    format!(
                        "{:#06x}:  {:<16} AF={:04x} BC={:04x} DE={:04x} HL={:04x} SP={:04x}",
                        r.regs.pc,
                        r.describe(),
                        ((r.regs.a as u16) << 8) | r.regs.f as u16,
                        ((r.regs.b as u16) << 8) | r.regs.c as u16,
                        ((r.regs.d as u16) << 8) | r.regs.e as u16,
                        ((r.regs.h as u16) << 8) | r.regs.l as u16,
                        r.regs.sp,
                    )
                })
                .collect(),
        }
    }

    // -- 8-bit arithmetic --

    pub fn add(&mut self, value: u8) {
        let (result, carry) = self.a.overflowing_add(value);
        let half = (self.a & 0x0F) + (value & 0x0F) > 0x0F;
        self.a = result;
        self.set_flag(FLAG_Z, result == 0);
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, half);
        self.set_flag(FLAG_C, carry);
    }

    pub fn adc(&mut self, value: u8) {
        let carry_in = self.flag(FLAG_C) as u8;
        let wide = self.a as u16 + value as u16 + carry_in as u16;
        let half = (self.a & 0x0F) + (value & 0x0F) + carry_in > 0x0F;
        self.a = wide as u8;
        self.set_flag(FLAG_Z, self.a == 0);
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, half);
        self.set_flag(FLAG_C, wide > 0xFF);
    }

    pub fn sub(&mut self, value: u8) {
        let (result, borrow) = self.a.overflowing_sub(value);
        let half = (self.a & 0x0F) < (value & 0x0F);
        self.a = result;
        self.set_flag(FLAG_Z, result == 0);
        self.set_flag(FLAG_N, true);
        self.set_flag(FLAG_H, half);
        self.set_flag(FLAG_C, borrow);
    }

    pub fn sbc(&mut self, value: u8) {
        let carry_in = self.flag(FLAG_C) as u8;
        let wide = (self.a as i16) - (value as i16) - (carry_in as i16);
        let half = (self.a & 0x0F) < (value & 0x0F) + carry_in;
        self.a = wide as u8;
        self.set_flag(FLAG_Z, self.a == 0);
        self.set_flag(FLAG_N, true);
        self.set_flag(FLAG_H, half);
        self.set_flag(FLAG_C, wide < 0);
    }

    pub fn cp(&mut self, value: u8) {
        let saved = self.a;
        self.sub(value);
        self.a = saved;
    }

    pub fn and_a(&mut self, value: u8) {
        self.a &= value;
        self.f = if self.a == 0 { FLAG_Z | FLAG_H } else { FLAG_H };
    }

    pub fn or_a(&mut self, value: u8) {
        self.a |= value;
        self.f = if self.a == 0 { FLAG_Z } else { 0 };
    }

    pub fn xor_a(&mut self, value: u8) {
        self.a ^= value;
        self.f = if self.a == 0 { FLAG_Z } else { 0 };
    }

    /// Increment that preserves the carry flag.
    pub fn inc8(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.set_flag(FLAG_Z, result == 0);
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, value & 0x0F == 0x0F);
        result
    }

    /// Decrement that preserves the carry flag.
    pub fn dec8(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.set_flag(FLAG_Z, result == 0);
        self.set_flag(FLAG_N, true);
        self.set_flag(FLAG_H, value & 0x0F == 0);
        result
    }

    /// 16-bit add into HL. Z is preserved, H and C come from the high byte.
    pub fn add_hl(&mut self, value: u16) {
        let hl = self.hl();
        let (result, carry) = hl.overflowing_add(value);
        let half = (hl & 0x0FFF) + (value & 0x0FFF) > 0x0FFF;
        self.set_hl(result);
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, half);
        self.set_flag(FLAG_C, carry);
    }

    /// SP plus a sign-extended byte. Flags come from the unsigned low-byte
    /// addition, with Z and N cleared.
    pub fn add_sp_signed(&mut self, offset: u8) -> u16 {
        let signed = offset as i8 as i16 as u16;
        let result = self.sp.wrapping_add(signed);
        let half = (self.sp & 0x0F) + (offset as u16 & 0x0F) > 0x0F;
        let carry = (self.sp & 0xFF) + offset as u16 > 0xFF;
        self.set_flag(FLAG_Z, false);
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, half);
        self.set_flag(FLAG_C, carry);
        result
    }

    // -- rotates and shifts --

    pub fn rlc(&mut self, value: u8) -> u8 {
        let result = value.rotate_left(1);
        self.f = 0;
        self.set_flag(FLAG_Z, result == 0);
        self.set_flag(FLAG_C, value & 0x80 != 0);
        result
    }

    pub fn rrc(&mut self, value: u8) -> u8 {
        let result = value.rotate_right(1);
        self.f = 0;
        self.set_flag(FLAG_Z, result == 0);
        self.set_flag(FLAG_C, value & 0x01 != 0);
        result
    }

    pub fn rl(&mut self, value: u8) -> u8 {
        let result = (value << 1) | self.flag(FLAG_C) as u8;
        self.f = 0;
        self.set_flag(FLAG_Z, result == 0);
        self.set_flag(FLAG_C, value & 0x80 != 0);
        result
    }

    pub fn rr(&mut self, value: u8) -> u8 {
        let result = (value >> 1) | ((self.flag(FLAG_C) as u8) << 7);
        self.f = 0;
        self.set_flag(FLAG_Z, result == 0);
        self.set_flag(FLAG_C, value & 0x01 != 0);
        result
    }

    pub fn sla(&mut self, value: u8) -> u8 {
        let result = value << 1;
        self.f = 0;
        self.set_flag(FLAG_Z, result == 0);
        self.set_flag(FLAG_C, value & 0x80 != 0);
        result
    }

    /// Arithmetic shift right: bit 7 is replicated.
    pub fn sra(&mut self, value: u8) -> u8 {
        let result = (value >> 1) | (value & 0x80);
        self.f = 0;
        self.set_flag(FLAG_Z, result == 0);
        self.set_flag(FLAG_C, value & 0x01 != 0);
        result
    }

    pub fn srl(&mut self, value: u8) -> u8 {
        let result = value >> 1;
        self.f = 0;
        self.set_flag(FLAG_Z, result == 0);
        self.set_flag(FLAG_C, value & 0x01 != 0);
        result
    }

    pub fn swap(&mut self, value: u8) -> u8 {
        let result = value.rotate_left(4);
        self.f = if result == 0 { FLAG_Z } else { 0 };
        result
    }

    // The accumulator rotates always clear Z, unlike their 0xCB twins.

    pub fn rlca(&mut self) {
        self.a = self.rlc(self.a);
        self.set_flag(FLAG_Z, false);
    }

    pub fn rrca(&mut self) {
        self.a = self.rrc(self.a);
        self.set_flag(FLAG_Z, false);
    }

    pub fn rla(&mut self) {
        self.a = self.rl(self.a);
        self.set_flag(FLAG_Z, false);
    }

    pub fn rra(&mut self) {
        self.a = self.rr(self.a);
        self.set_flag(FLAG_Z, false);
    }

    pub fn test_bit(&mut self, value: u8, bit: u8) {
        self.set_flag(FLAG_Z, value & (1 << bit) == 0);
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, true);
    }

    /// Decimal-adjust A after a BCD add or subtract.
    pub fn daa(&mut self) {
        let mut a = self.a;
        if !self.flag(FLAG_N) {
            if self.flag(FLAG_C) || a > 0x99 {
                a = a.wrapping_add(0x60);
                self.set_flag(FLAG_C, true);
            }
            if self.flag(FLAG_H) || a & 0x0F > 0x09 {
                a = a.wrapping_add(0x06);
            }
        } else {
            if self.flag(FLAG_C) {
                a = a.wrapping_sub(0x60);
            }
            if self.flag(FLAG_H) {
                a = a.wrapping_sub(0x06);
            }
        }
        self.a = a;
        self.set_flag(FLAG_Z, a == 0);
        self.set_flag(FLAG_H, false);
    }

    pub fn cpl(&mut self) {
        self.a = !self.a;
        self.set_flag(FLAG_N, true);
        self.set_flag(FLAG_H, true);
    }

    pub fn ccf(&mut self) {
        let carry = self.flag(FLAG_C);
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, false);
        self.set_flag(FLAG_C, !carry);
    }

    pub fn scf(&mut self) {
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, false);
        self.set_flag(FLAG_C, true);
    }

    // -- control flow. The taken paths record a branch penalty on top of the
    // instruction's base cycle cost. --

    pub fn jump(&mut self, target: u16, condition: bool) {
        if condition {
            self.pc = target;
            self.branch_penalty = 1;
        }
    }

    pub fn jump_rel(&mut self, offset: u8, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(offset as i8 as i16 as u16);
            self.branch_penalty = 1;
        }
    }

    pub fn call(&mut self, mmu: &mut Mmu, target: u16, condition: bool) {
        if condition {
            self.push_word(mmu, self.pc);
            self.pc = target;
            self.branch_penalty = 3;
        }
    }

    pub fn ret(&mut self, mmu: &mut Mmu, condition: bool) {
        if condition {
            self.pc = self.pop_word(mmu);
            self.branch_penalty = 3;
        }
    }

    pub fn rst(&mut self, mmu: &mut Mmu, vector: u16) {
        self.push_word(mmu, self.pc);
        self.pc = vector;
    }
}
