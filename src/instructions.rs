//! Opcode tables for the three LR35902 instruction sets: the primary
//! 256-entry table, the 0xCB-prefixed extended table, and the single-entry
//! STOP table. Each slot is a tagged descriptor holding the operation's
//! function pointer, base machine-cycle cost and immediate width; the tables
//! are built once and shared for the process lifetime.

use std::sync::OnceLock;

use log::warn;

use crate::cpu::{Cpu, InterruptState, FLAG_C, FLAG_Z};
use crate::mmu::Mmu;

/// First byte of every extended-table encoding.
pub const EXTENDED_PREFIX: u8 = 0xCB;
/// First byte of every STOP-table encoding.
pub const STOP_PREFIX: u8 = 0x10;

/// Tagged operation descriptor. Immediate operands are decoded by the CPU
/// before invocation and passed in zero-extended.
#[derive(Clone, Copy)]
pub enum Operation {
    Implied(fn(&mut Cpu, &mut Mmu)),
    Immediate(fn(&mut Cpu, &mut Mmu, u16)),
    Unimplemented,
}

#[derive(Clone, Copy)]
pub struct Instruction {
    /// Display name; `{}` marks where the immediate is rendered.
    pub name: &'static str,
    pub operation: Operation,
    /// Base cost in machine cycles, excluding any branch penalty.
    pub cycles: u8,
    /// Immediate operand width in bytes (0, 1 or 2).
    pub imm_size: u8,
}

const UNDEFINED: Instruction = Instruction {
    name: "UNDEF",
    operation: Operation::Unimplemented,
    cycles: 0,
    imm_size: 0,
};

fn idle(_: &mut Cpu, _: &mut Mmu) {}

/// Pseudo-instruction charged when an interrupt is serviced.
pub static INTERRUPT_SERVICE: Instruction = Instruction {
    name: "INT",
    operation: Operation::Implied(idle),
    cycles: 5,
    imm_size: 0,
};

/// Pseudo-instruction charged for each machine cycle spent halted.
pub static HALT_DELAY: Instruction = Instruction {
    name: "HDEL",
    operation: Operation::Implied(idle),
    cycles: 1,
    imm_size: 0,
};

fn imp(name: &'static str, cycles: u8, f: fn(&mut Cpu, &mut Mmu)) -> Instruction {
    Instruction {
        name,
        operation: Operation::Implied(f),
        cycles,
        imm_size: 0,
    }
}

fn imm8(name: &'static str, cycles: u8, f: fn(&mut Cpu, &mut Mmu, u16)) -> Instruction {
    Instruction {
        name,
        operation: Operation::Immediate(f),
        cycles,
        imm_size: 1,
    }
}

fn imm16(name: &'static str, cycles: u8, f: fn(&mut Cpu, &mut Mmu, u16)) -> Instruction {
    Instruction {
        name,
        operation: Operation::Immediate(f),
        cycles,
        imm_size: 2,
    }
}

// The 8-bit arithmetic/logic block at `base` covers operands B,C,D,E,H,L,(HL),A.
macro_rules! alu_group {
    ($t:ident, $base:expr, $mnem:literal, $op:ident) => {{
        $t[$base + 0x00] = imp(concat!($mnem, " A,B"), 1, |c, _| c.$op(c.b));
        $t[$base + 0x01] = imp(concat!($mnem, " A,C"), 1, |c, _| c.$op(c.c));
        $t[$base + 0x02] = imp(concat!($mnem, " A,D"), 1, |c, _| c.$op(c.d));
        $t[$base + 0x03] = imp(concat!($mnem, " A,E"), 1, |c, _| c.$op(c.e));
        $t[$base + 0x04] = imp(concat!($mnem, " A,H"), 1, |c, _| c.$op(c.h));
        $t[$base + 0x05] = imp(concat!($mnem, " A,L"), 1, |c, _| c.$op(c.l));
        $t[$base + 0x06] = imp(concat!($mnem, " A,(HL)"), 2, |c, m| {
            let v = m.read_byte(c.hl());
            c.$op(v);
        });
        $t[$base + 0x07] = imp(concat!($mnem, " A,A"), 1, |c, _| c.$op(c.a));
    }};
}

// Extended-table unary block at `base`: operands B,C,D,E,H,L,(HL),A, with the
// operation returning the rewritten value.
macro_rules! unary_group {
    ($t:ident, $base:expr, $mnem:literal, $op:ident, $hl_cycles:expr) => {{
        $t[$base + 0x00] = imp(concat!($mnem, " B"), 2, |c, _| c.b = c.$op(c.b));
        $t[$base + 0x01] = imp(concat!($mnem, " C"), 2, |c, _| c.c = c.$op(c.c));
        $t[$base + 0x02] = imp(concat!($mnem, " D"), 2, |c, _| c.d = c.$op(c.d));
        $t[$base + 0x03] = imp(concat!($mnem, " E"), 2, |c, _| c.e = c.$op(c.e));
        $t[$base + 0x04] = imp(concat!($mnem, " H"), 2, |c, _| c.h = c.$op(c.h));
        $t[$base + 0x05] = imp(concat!($mnem, " L"), 2, |c, _| c.l = c.$op(c.l));
        $t[$base + 0x06] = imp(concat!($mnem, " (HL)"), $hl_cycles, |c, m| {
            let v = m.read_byte(c.hl());
            let v = c.$op(v);
            m.write_byte(c.hl(), v);
        });
        $t[$base + 0x07] = imp(concat!($mnem, " A"), 2, |c, _| c.a = c.$op(c.a));
    }};
}

// BIT is a probe: flags only, no write-back, and the (HL) form costs 3.
macro_rules! bit_group {
    ($t:ident, $base:expr, $bit:tt) => {{
        $t[$base + 0x00] = imp(concat!("BIT ", $bit, ",B"), 2, |c, _| c.test_bit(c.b, $bit));
        $t[$base + 0x01] = imp(concat!("BIT ", $bit, ",C"), 2, |c, _| c.test_bit(c.c, $bit));
        $t[$base + 0x02] = imp(concat!("BIT ", $bit, ",D"), 2, |c, _| c.test_bit(c.d, $bit));
        $t[$base + 0x03] = imp(concat!("BIT ", $bit, ",E"), 2, |c, _| c.test_bit(c.e, $bit));
        $t[$base + 0x04] = imp(concat!("BIT ", $bit, ",H"), 2, |c, _| c.test_bit(c.h, $bit));
        $t[$base + 0x05] = imp(concat!("BIT ", $bit, ",L"), 2, |c, _| c.test_bit(c.l, $bit));
        $t[$base + 0x06] = imp(concat!("BIT ", $bit, ",(HL)"), 3, |c, m| {
            let v = m.read_byte(c.hl());
            c.test_bit(v, $bit);
        });
        $t[$base + 0x07] = imp(concat!("BIT ", $bit, ",A"), 2, |c, _| c.test_bit(c.a, $bit));
    }};
}

macro_rules! set_group {
    ($t:ident, $base:expr, $bit:tt) => {{
        $t[$base + 0x00] = imp(concat!("SET ", $bit, ",B"), 2, |c, _| c.b |= 1 << $bit);
        $t[$base + 0x01] = imp(concat!("SET ", $bit, ",C"), 2, |c, _| c.c |= 1 << $bit);
        $t[$base + 0x02] = imp(concat!("SET ", $bit, ",D"), 2, |c, _| c.d |= 1 << $bit);
        $t[$base + 0x03] = imp(concat!("SET ", $bit, ",E"), 2, |c, _| c.e |= 1 << $bit);
        $t[$base + 0x04] = imp(concat!("SET ", $bit, ",H"), 2, |c, _| c.h |= 1 << $bit);
        $t[$base + 0x05] = imp(concat!("SET ", $bit, ",L"), 2, |c, _| c.l |= 1 << $bit);
        $t[$base + 0x06] = imp(concat!("SET ", $bit, ",(HL)"), 4, |c, m| {
            let v = m.read_byte(c.hl()) | (1 << $bit);
            m.write_byte(c.hl(), v);
        });
        $t[$base + 0x07] = imp(concat!("SET ", $bit, ",A"), 2, |c, _| c.a |= 1 << $bit);
    }};
}

macro_rules! res_group {
    ($t:ident, $base:expr, $bit:tt) => {{
        $t[$base + 0x00] = imp(concat!("RES ", $bit, ",B"), 2, |c, _| c.b &= !(1 << $bit));
        $t[$base + 0x01] = imp(concat!("RES ", $bit, ",C"), 2, |c, _| c.c &= !(1 << $bit));
        $t[$base + 0x02] = imp(concat!("RES ", $bit, ",D"), 2, |c, _| c.d &= !(1 << $bit));
        $t[$base + 0x03] = imp(concat!("RES ", $bit, ",E"), 2, |c, _| c.e &= !(1 << $bit));
        $t[$base + 0x04] = imp(concat!("RES ", $bit, ",H"), 2, |c, _| c.h &= !(1 << $bit));
        $t[$base + 0x05] = imp(concat!("RES ", $bit, ",L"), 2, |c, _| c.l &= !(1 << $bit));
        $t[$base + 0x06] = imp(concat!("RES ", $bit, ",(HL)"), 4, |c, m| {
            let v = m.read_byte(c.hl()) & !(1 << $bit);
            m.write_byte(c.hl(), v);
        });
        $t[$base + 0x07] = imp(concat!("RES ", $bit, ",A"), 2, |c, _| c.a &= !(1 << $bit));
    }};
}

/// The three opcode tables, built once behind a [`OnceLock`].
pub struct InstructionSet {
    primary: [Instruction; 256],
    extended: [Instruction; 256],
    stop: [Instruction; 1],
}

impl InstructionSet {
    pub fn get() -> &'static InstructionSet {
        static SET: OnceLock<InstructionSet> = OnceLock::new();
        SET.get_or_init(InstructionSet::build)
    }

    pub fn primary(&self, opcode: u8) -> &Instruction {
        &self.primary[opcode as usize]
    }

    pub fn extended(&self, opcode: u8) -> &Instruction {
        &self.extended[opcode as usize]
    }

    /// Look up the STOP table. Any second byte past the table bound is a
    /// decode failure, matching the table-index contract of the other sets.
    pub fn stop(&self, code: u8) -> &Instruction {
        let index = code as usize;
        assert!(
            index < self.stop.len(),
            "STOP operand {code:#04x} is outside the table"
        );
        &self.stop[index]
    }

    /// Render every table slot: opcode, name, immediate width, cycle cost.
    pub fn render_all(&self) -> String {
        let mut out = String::new();
        for (label, table) in [("primary", &self.primary[..]), ("0xCB", &self.extended[..]), ("STOP", &self.stop[..])] {
            out.push_str(&format!("-- {label} table --\n"));
            for (opcode, instruction) in table.iter().enumerate() {
                if matches!(instruction.operation, Operation::Unimplemented) {
                    out.push_str(&format!("{opcode:#04x}\tnot implemented\n"));
                } else {
                    out.push_str(&format!(
                        "{opcode:#04x}\t{}\t{}\t{}\n",
                        instruction.name, instruction.imm_size, instruction.cycles
                    ));
                }
            }
        }
        out
    }

    fn build() -> Self {
        Self {
            primary: Self::build_primary(),
            extended: Self::build_extended(),
            stop: Self::build_stop(),
        }
    }

    fn build_primary() -> [Instruction; 256] {
        let mut t = [UNDEFINED; 256];
        move_immediate_group(&mut t);
        move_register_group(&mut t);
        load_hl_group(&mut t);
        store_hl_group(&mut t);
        load_a_group(&mut t);
        store_a_group(&mut t);
        move_immediate_16bit_group(&mut t);
        load_store_special_group(&mut t);
        push_pop_group(&mut t);
        arithmetic_group(&mut t);
        logic_group(&mut t);
        inc_dec_group(&mut t);
        arithmetic_16bit_group(&mut t);
        accumulator_misc_group(&mut t);
        control_group(&mut t);
        rotate_a_group(&mut t);
        jump_group(&mut t);
        call_return_group(&mut t);
        t
    }

    fn build_extended() -> [Instruction; 256] {
        let mut t = [UNDEFINED; 256];
        unary_group!(t, 0x00, "RLC", rlc, 4);
        unary_group!(t, 0x08, "RRC", rrc, 4);
        unary_group!(t, 0x10, "RL", rl, 4);
        unary_group!(t, 0x18, "RR", rr, 4);
        unary_group!(t, 0x20, "SLA", sla, 4);
        unary_group!(t, 0x28, "SRA", sra, 4);
        unary_group!(t, 0x30, "SWAP", swap, 4);
        unary_group!(t, 0x38, "SRL", srl, 4);
        bit_group!(t, 0x40, 0);
        bit_group!(t, 0x48, 1);
        bit_group!(t, 0x50, 2);
        bit_group!(t, 0x58, 3);
        bit_group!(t, 0x60, 4);
        bit_group!(t, 0x68, 5);
        bit_group!(t, 0x70, 6);
        bit_group!(t, 0x78, 7);
        res_group!(t, 0x80, 0);
        res_group!(t, 0x88, 1);
        res_group!(t, 0x90, 2);
        res_group!(t, 0x98, 3);
        res_group!(t, 0xA0, 4);
        res_group!(t, 0xA8, 5);
        res_group!(t, 0xB0, 6);
        res_group!(t, 0xB8, 7);
        set_group!(t, 0xC0, 0);
        set_group!(t, 0xC8, 1);
        set_group!(t, 0xD0, 2);
        set_group!(t, 0xD8, 3);
        set_group!(t, 0xE0, 4);
        set_group!(t, 0xE8, 5);
        set_group!(t, 0xF0, 6);
        set_group!(t, 0xF8, 7);
        t
    }

    fn build_stop() -> [Instruction; 1] {
        [imp("STOP", 1, |_, _| warn!("STOP requested; low-power mode is not modeled"))]
    }
}

fn move_immediate_group(t: &mut [Instruction; 256]) {
    t[0x3E] = imm8("LD A,{}", 2, |c, _, imm| c.a = imm as u8);
    t[0x06] = imm8("LD B,{}", 2, |c, _, imm| c.b = imm as u8);
    t[0x0E] = imm8("LD C,{}", 2, |c, _, imm| c.c = imm as u8);
    t[0x16] = imm8("LD D,{}", 2, |c, _, imm| c.d = imm as u8);
    t[0x1E] = imm8("LD E,{}", 2, |c, _, imm| c.e = imm as u8);
    t[0x26] = imm8("LD H,{}", 2, |c, _, imm| c.h = imm as u8);
    t[0x2E] = imm8("LD L,{}", 2, |c, _, imm| c.l = imm as u8);
}

fn move_register_group(t: &mut [Instruction; 256]) {
    t[0x7F] = imp("LD A,A", 1, |c, _| c.a = c.a);
    t[0x78] = imp("LD A,B", 1, |c, _| c.a = c.b);
    t[0x79] = imp("LD A,C", 1, |c, _| c.a = c.c);
    t[0x7A] = imp("LD A,D", 1, |c, _| c.a = c.d);
    t[0x7B] = imp("LD A,E", 1, |c, _| c.a = c.e);
    t[0x7C] = imp("LD A,H", 1, |c, _| c.a = c.h);
    t[0x7D] = imp("LD A,L", 1, |c, _| c.a = c.l);
    t[0x47] = imp("LD B,A", 1, |c, _| c.b = c.a);
    t[0x40] = imp("LD B,B", 1, |c, _| c.b = c.b);
    t[0x41] = imp("LD B,C", 1, |c, _| c.b = c.c);
    t[0x42] = imp("LD B,D", 1, |c, _| c.b = c.d);
    t[0x43] = imp("LD B,E", 1, |c, _| c.b = c.e);
    t[0x44] = imp("LD B,H", 1, |c, _| c.b = c.h);
    t[0x45] = imp("LD B,L", 1, |c, _| c.b = c.l);
    t[0x4F] = imp("LD C,A", 1, |c, _| c.c = c.a);
    t[0x48] = imp("LD C,B", 1, |c, _| c.c = c.b);
    t[0x49] = imp("LD C,C", 1, |c, _| c.c = c.c);
    t[0x4A] = imp("LD C,D", 1, |c, _| c.c = c.d);
    t[0x4B] = imp("LD C,E", 1, |c, _| c.c = c.e);
    t[0x4C] = imp("LD C,H", 1, |c, _| c.c = c.h);
    t[0x4D] = imp("LD C,L", 1, |c, _| c.c = c.l);
    t[0x57] = imp("LD D,A", 1, |c, _| c.d = c.a);
    t[0x50] = imp("LD D,B", 1, |c, _| c.d = c.b);
    t[0x51] = imp("LD D,C", 1, |c, _| c.d = c.c);
    t[0x52] = imp("LD D,D", 1, |c, _| c.d = c.d);
    t[0x53] = imp("LD D,E", 1, |c, _| c.d = c.e);
    t[0x54] = imp("LD D,H", 1, |c, _| c.d = c.h);
    t[0x55] = imp("LD D,L", 1, |c, _| c.d = c.l);
    t[0x5F] = imp("LD E,A", 1, |c, _| c.e = c.a);
    t[0x58] = imp("LD E,B", 1, |c, _| c.e = c.b);
    t[0x59] = imp("LD E,C", 1, |c, _| c.e = c.c);
    t[0x5A] = imp("LD E,D", 1, |c, _| c.e = c.d);
    t[0x5B] = imp("LD E,E", 1, |c, _| c.e = c.e);
    t[0x5C] = imp("LD E,H", 1, |c, _| c.e = c.h);
    t[0x5D] = imp("LD E,L", 1, |c, _| c.e = c.l);
    t[0x67] = imp("LD H,A", 1, |c, _| c.h = c.a);
    t[0x60] = imp("LD H,B", 1, |c, _| c.h = c.b);
    t[0x61] = imp("LD H,C", 1, |c, _| c.h = c.c);
    t[0x62] = imp("LD H,D", 1, |c, _| c.h = c.d);
    t[0x63] = imp("LD H,E", 1, |c, _| c.h = c.e);
    t[0x64] = imp("LD H,H", 1, |c, _| c.h = c.h);
    t[0x65] = imp("LD H,L", 1, |c, _| c.h = c.l);
    t[0x6F] = imp("LD L,A", 1, |c, _| c.l = c.a);
    t[0x68] = imp("LD L,B", 1, |c, _| c.l = c.b);
    t[0x69] = imp("LD L,C", 1, |c, _| c.l = c.c);
    t[0x6A] = imp("LD L,D", 1, |c, _| c.l = c.d);
    t[0x6B] = imp("LD L,E", 1, |c, _| c.l = c.e);
    t[0x6C] = imp("LD L,H", 1, |c, _| c.l = c.h);
    t[0x6D] = imp("LD L,L", 1, |c, _| c.l = c.l);
}

fn load_hl_group(t: &mut [Instruction; 256]) {
    t[0x7E] = imp("LD A,(HL)", 2, |c, m| c.a = m.read_byte(c.hl()));
    t[0x46] = imp("LD B,(HL)", 2, |c, m| c.b = m.read_byte(c.hl()));
    t[0x4E] = imp("LD C,(HL)", 2, |c, m| c.c = m.read_byte(c.hl()));
    t[0x56] = imp("LD D,(HL)", 2, |c, m| c.d = m.read_byte(c.hl()));
    t[0x5E] = imp("LD E,(HL)", 2, |c, m| c.e = m.read_byte(c.hl()));
    t[0x66] = imp("LD H,(HL)", 2, |c, m| c.h = m.read_byte(c.hl()));
    t[0x6E] = imp("LD L,(HL)", 2, |c, m| c.l = m.read_byte(c.hl()));
}

fn store_hl_group(t: &mut [Instruction; 256]) {
    t[0x77] = imp("LD (HL),A", 2, |c, m| m.write_byte(c.hl(), c.a));
    t[0x70] = imp("LD (HL),B", 2, |c, m| m.write_byte(c.hl(), c.b));
    t[0x71] = imp("LD (HL),C", 2, |c, m| m.write_byte(c.hl(), c.c));
    t[0x72] = imp("LD (HL),D", 2, |c, m| m.write_byte(c.hl(), c.d));
    t[0x73] = imp("LD (HL),E", 2, |c, m| m.write_byte(c.hl(), c.e));
    t[0x74] = imp("LD (HL),H", 2, |c, m| m.write_byte(c.hl(), c.h));
    t[0x75] = imp("LD (HL),L", 2, |c, m| m.write_byte(c.hl(), c.l));
    t[0x36] = imm8("LD (HL),{}", 3, |c, m, imm| m.write_byte(c.hl(), imm as u8));
}

fn load_a_group(t: &mut [Instruction; 256]) {
    t[0x0A] = imp("LD A,(BC)", 2, |c, m| c.a = m.read_byte(c.bc()));
    t[0x1A] = imp("LD A,(DE)", 2, |c, m| c.a = m.read_byte(c.de()));
    t[0xFA] = imm16("LD A,({})", 4, |c, m, imm| c.a = m.read_byte(imm));
}

fn store_a_group(t: &mut [Instruction; 256]) {
    t[0x02] = imp("LD (BC),A", 2, |c, m| m.write_byte(c.bc(), c.a));
    t[0x12] = imp("LD (DE),A", 2, |c, m| m.write_byte(c.de(), c.a));
    t[0xEA] = imm16("LD ({}),A", 4, |c, m, imm| m.write_byte(imm, c.a));
}

fn move_immediate_16bit_group(t: &mut [Instruction; 256]) {
    t[0x01] = imm16("LD BC,{}", 3, |c, _, imm| c.set_bc(imm));
    t[0x11] = imm16("LD DE,{}", 3, |c, _, imm| c.set_de(imm));
    t[0x21] = imm16("LD HL,{}", 3, |c, _, imm| c.set_hl(imm));
    t[0x31] = imm16("LD SP,{}", 3, |c, _, imm| c.sp = imm);
}

fn load_store_special_group(t: &mut [Instruction; 256]) {
    t[0x3A] = imp("LDD A,(HL)", 2, |c, m| {
        c.a = m.read_byte(c.hl());
        c.set_hl(c.hl().wrapping_sub(1));
    });
    t[0x2A] = imp("LDI A,(HL)", 2, |c, m| {
        c.a = m.read_byte(c.hl());
        c.set_hl(c.hl().wrapping_add(1));
    });
    t[0x32] = imp("LDD (HL),A", 2, |c, m| {
        m.write_byte(c.hl(), c.a);
        c.set_hl(c.hl().wrapping_sub(1));
    });
    t[0x22] = imp("LDI (HL),A", 2, |c, m| {
        m.write_byte(c.hl(), c.a);
        c.set_hl(c.hl().wrapping_add(1));
    });
    t[0xE2] = imp("LD (C),A", 2, |c, m| m.write_byte(0xFF00 + c.c as u16, c.a));
    t[0xF2] = imp("LD A,(C)", 2, |c, m| c.a = m.read_byte(0xFF00 + c.c as u16));
    t[0xE0] = imm8("LDH ({}),A", 3, |c, m, imm| m.write_byte(0xFF00 + imm, c.a));
    t[0xF0] = imm8("LDH A,({})", 3, |c, m, imm| c.a = m.read_byte(0xFF00 + imm));
    t[0xF9] = imp("LD SP,HL", 2, |c, _| c.sp = c.hl());
    t[0x08] = imm16("LD ({}),SP", 5, |c, m, imm| m.write_word(imm, c.sp));
    t[0xF8] = imm8("LDHL SP,{}", 3, |c, _, imm| {
        let v = c.add_sp_signed(imm as u8);
        c.set_hl(v);
    });
}

fn push_pop_group(t: &mut [Instruction; 256]) {
    t[0xF5] = imp("PUSH AF", 4, |c, m| c.push_word(m, c.af()));
    t[0xC5] = imp("PUSH BC", 4, |c, m| c.push_word(m, c.bc()));
    t[0xD5] = imp("PUSH DE", 4, |c, m| c.push_word(m, c.de()));
    t[0xE5] = imp("PUSH HL", 4, |c, m| c.push_word(m, c.hl()));
    t[0xF1] = imp("POP AF", 3, |c, m| {
        let v = c.pop_word(m);
        c.set_af(v);
    });
    t[0xC1] = imp("POP BC", 3, |c, m| {
        let v = c.pop_word(m);
        c.set_bc(v);
    });
    t[0xD1] = imp("POP DE", 3, |c, m| {
        let v = c.pop_word(m);
        c.set_de(v);
    });
    t[0xE1] = imp("POP HL", 3, |c, m| {
        let v = c.pop_word(m);
        c.set_hl(v);
    });
}

fn arithmetic_group(t: &mut [Instruction; 256]) {
    alu_group!(t, 0x80, "ADD", add);
    alu_group!(t, 0x88, "ADC", adc);
    alu_group!(t, 0x90, "SUB", sub);
    alu_group!(t, 0x98, "SBC", sbc);
    t[0xC6] = imm8("ADD A,{}", 2, |c, _, imm| c.add(imm as u8));
    t[0xCE] = imm8("ADC A,{}", 2, |c, _, imm| c.adc(imm as u8));
    t[0xD6] = imm8("SUB A,{}", 2, |c, _, imm| c.sub(imm as u8));
    t[0xDE] = imm8("SBC A,{}", 2, |c, _, imm| c.sbc(imm as u8));
}

fn logic_group(t: &mut [Instruction; 256]) {
    alu_group!(t, 0xA0, "AND", and_a);
    alu_group!(t, 0xA8, "XOR", xor_a);
    alu_group!(t, 0xB0, "OR", or_a);
    alu_group!(t, 0xB8, "CP", cp);
    t[0xE6] = imm8("AND A,{}", 2, |c, _, imm| c.and_a(imm as u8));
    t[0xEE] = imm8("XOR A,{}", 2, |c, _, imm| c.xor_a(imm as u8));
    t[0xF6] = imm8("OR A,{}", 2, |c, _, imm| c.or_a(imm as u8));
    t[0xFE] = imm8("CP A,{}", 2, |c, _, imm| c.cp(imm as u8));
}

fn inc_dec_group(t: &mut [Instruction; 256]) {
    t[0x3C] = imp("INC A", 1, |c, _| c.a = c.inc8(c.a));
    t[0x04] = imp("INC B", 1, |c, _| c.b = c.inc8(c.b));
    t[0x0C] = imp("INC C", 1, |c, _| c.c = c.inc8(c.c));
    t[0x14] = imp("INC D", 1, |c, _| c.d = c.inc8(c.d));
    t[0x1C] = imp("INC E", 1, |c, _| c.e = c.inc8(c.e));
    t[0x24] = imp("INC H", 1, |c, _| c.h = c.inc8(c.h));
    t[0x2C] = imp("INC L", 1, |c, _| c.l = c.inc8(c.l));
    t[0x34] = imp("INC (HL)", 3, |c, m| {
        let v = m.read_byte(c.hl());
        let v = c.inc8(v);
        m.write_byte(c.hl(), v);
    });
    t[0x3D] = imp("DEC A", 1, |c, _| c.a = c.dec8(c.a));
    t[0x05] = imp("DEC B", 1, |c, _| c.b = c.dec8(c.b));
    t[0x0D] = imp("DEC C", 1, |c, _| c.c = c.dec8(c.c));
    t[0x15] = imp("DEC D", 1, |c, _| c.d = c.dec8(c.d));
    t[0x1D] = imp("DEC E", 1, |c, _| c.e = c.dec8(c.e));
    t[0x25] = imp("DEC H", 1, |c, _| c.h = c.dec8(c.h));
    t[0x2D] = imp("DEC L", 1, |c, _| c.l = c.dec8(c.l));
    t[0x35] = imp("DEC (HL)", 3, |c, m| {
        let v = m.read_byte(c.hl());
        let v = c.dec8(v);
        m.write_byte(c.hl(), v);
    });
}

fn arithmetic_16bit_group(t: &mut [Instruction; 256]) {
    t[0x09] = imp("ADD HL,BC", 2, |c, _| c.add_hl(c.bc()));
    t[0x19] = imp("ADD HL,DE", 2, |c, _| c.add_hl(c.de()));
    t[0x29] = imp("ADD HL,HL", 2, |c, _| c.add_hl(c.hl()));
    t[0x39] = imp("ADD HL,SP", 2, |c, _| c.add_hl(c.sp));
    t[0xE8] = imm8("ADD SP,{}", 4, |c, _, imm| c.sp = c.add_sp_signed(imm as u8));
    t[0x03] = imp("INC BC", 2, |c, _| c.set_bc(c.bc().wrapping_add(1)));
    t[0x13] = imp("INC DE", 2, |c, _| c.set_de(c.de().wrapping_add(1)));
    t[0x23] = imp("INC HL", 2, |c, _| c.set_hl(c.hl().wrapping_add(1)));
    t[0x33] = imp("INC SP", 2, |c, _| c.sp = c.sp.wrapping_add(1));
    t[0x0B] = imp("DEC BC", 2, |c, _| c.set_bc(c.bc().wrapping_sub(1)));
    t[0x1B] = imp("DEC DE", 2, |c, _| c.set_de(c.de().wrapping_sub(1)));
    t[0x2B] = imp("DEC HL", 2, |c, _| c.set_hl(c.hl().wrapping_sub(1)));
    t[0x3B] = imp("DEC SP", 2, |c, _| c.sp = c.sp.wrapping_sub(1));
}

fn accumulator_misc_group(t: &mut [Instruction; 256]) {
    t[0x27] = imp("DAA", 1, |c, _| c.daa());
    t[0x2F] = imp("CPL", 1, |c, _| c.cpl());
    t[0x3F] = imp("CCF", 1, |c, _| c.ccf());
    t[0x37] = imp("SCF", 1, |c, _| c.scf());
}

fn control_group(t: &mut [Instruction; 256]) {
    t[0x00] = imp("NOP", 1, |_, _| {});
    t[0x76] = imp("HALT", 1, |c, _| c.halted = true);
    t[0xF3] = imp("DI", 1, |c, _| c.interrupt_state = InterruptState::Disabled);
    // EI takes effect after the following instruction completes.
    t[0xFB] = imp("EI", 1, |c, _| c.interrupt_state = InterruptState::Enabling);
}

fn rotate_a_group(t: &mut [Instruction; 256]) {
    t[0x07] = imp("RLCA", 1, |c, _| c.rlca());
    t[0x17] = imp("RLA", 1, |c, _| c.rla());
    t[0x0F] = imp("RRCA", 1, |c, _| c.rrca());
    t[0x1F] = imp("RRA", 1, |c, _| c.rra());
}

fn jump_group(t: &mut [Instruction; 256]) {
    t[0xC3] = imm16("JP {}", 3, |c, _, imm| c.jump(imm, true));
    t[0xC2] = imm16("JP NZ,{}", 3, |c, _, imm| {
        let cond = !c.flag(FLAG_Z);
        c.jump(imm, cond);
    });
    t[0xCA] = imm16("JP Z,{}", 3, |c, _, imm| {
        let cond = c.flag(FLAG_Z);
        c.jump(imm, cond);
    });
    t[0xD2] = imm16("JP NC,{}", 3, |c, _, imm| {
        let cond = !c.flag(FLAG_C);
        c.jump(imm, cond);
    });
    t[0xDA] = imm16("JP C,{}", 3, |c, _, imm| {
        let cond = c.flag(FLAG_C);
        c.jump(imm, cond);
    });
    t[0xE9] = imp("JP HL", 1, |c, _| c.pc = c.hl());
    t[0x18] = imm8("JR {}", 2, |c, _, imm| c.jump_rel(imm as u8, true));
    t[0x20] = imm8("JR NZ,{}", 2, |c, _, imm| {
        let cond = !c.flag(FLAG_Z);
        c.jump_rel(imm as u8, cond);
    });
    t[0x28] = imm8("JR Z,{}", 2, |c, _, imm| {
        let cond = c.flag(FLAG_Z);
        c.jump_rel(imm as u8, cond);
    });
    t[0x30] = imm8("JR NC,{}", 2, |c, _, imm| {
        let cond = !c.flag(FLAG_C);
        c.jump_rel(imm as u8, cond);
    });
    t[0x38] = imm8("JR C,{}", 2, |c, _, imm| {
        let cond = c.flag(FLAG_C);
        c.jump_rel(imm as u8, cond);
    });
}

fn call_return_group(t: &mut [Instruction; 256]) {
    t[0xCD] = imm16("CALL {}", 3, |c, m, imm| c.call(m, imm, true));
    t[0xC4] = imm16("CALL NZ,{}", 3, |c, m, imm| {
        let cond = !c.flag(FLAG_Z);
        c.call(m, imm, cond);
    });
    t[0xCC] = imm16("CALL Z,{}", 3, |c, m, imm| {
        let cond = c.flag(FLAG_Z);
        c.call(m, imm, cond);
    });
    t[0xD4] = imm16("CALL NC,{}", 3, |c, m, imm| {
        let cond = !c.flag(FLAG_C);
        c.call(m, imm, cond);
    });
    t[0xDC] = imm16("CALL C,{}", 3, |c, m, imm| {
        let cond = c.flag(FLAG_C);
        c.call(m, imm, cond);
    });
    t[0xC7] = imp("RST 00H", 4, |c, m| c.rst(m, 0x00));
    t[0xCF] = imp("RST 08H", 4, |c, m| c.rst(m, 0x08));
    t[0xD7] = imp("RST 10H", 4, |c, m| c.rst(m, 0x10));
    t[0xDF] = imp("RST 18H", 4, |c, m| c.rst(m, 0x18));
    t[0xE7] = imp("RST 20H", 4, |c, m| c.rst(m, 0x20));
    t[0xEF] = imp("RST 28H", 4, |c, m| c.rst(m, 0x28));
    t[0xF7] = imp("RST 30H", 4, |c, m| c.rst(m, 0x30));
    t[0xFF] = imp("RST 38H", 4, |c, m| c.rst(m, 0x38));
    t[0xC9] = imp("RET", 1, |c, m| c.ret(m, true));
    t[0xC0] = imp("RET NZ", 2, |c, m| {
        let cond = !c.flag(FLAG_Z);
        c.ret(m, cond);
    });
    t[0xC8] = imp("RET Z", 2, |c, m| {
        let cond = c.flag(FLAG_Z);
        c.ret(m, cond);
    });
    t[0xD0] = imp("RET NC", 2, |c, m| {
        let cond = !c.flag(FLAG_C);
        c.ret(m, cond);
    });
    t[0xD8] = imp("RET C", 2, |c, m| {
        let cond = c.flag(FLAG_C);
        c.ret(m, cond);
    });
    t[0xD9] = imp("RETI", 4, |c, m| {
        c.interrupt_state = InterruptState::Enabled;
        c.pc = c.pop_word(m);
    });
}
