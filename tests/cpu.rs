use dotmatrix::cpu::{Cpu, FLAG_C, FLAG_H, FLAG_N, FLAG_Z, InterruptState, TraceStyle};
use dotmatrix::mmu::{IF_TIMER, IF_VBLANK, Mmu, REG_IE, REG_IF};

fn run_one(cpu: &mut Cpu, mmu: &mut Mmu) -> u8 {
    let instruction = cpu.fetch_next(mmu);
    cpu.interrupt_clock_tick();
    cpu.execute_next(instruction, mmu)
}

#[test]
fn ld_immediate_and_register_move() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    mmu.map.write_block(0x0100, &[0x3E, 0x42, 0x47]); // LD A,0x42 ; LD B,A
    cpu.pc = 0x0100;
    assert_eq!(run_one(&mut cpu, &mut mmu), 2);
    assert_eq!(cpu.a, 0x42);
    assert_eq!(run_one(&mut cpu, &mut mmu), 1);
    assert_eq!(cpu.b, 0x42);
    assert_eq!(cpu.pc, 0x0103);
}

#[test]
fn add_sets_half_and_full_carry() {
    let mut cpu = Cpu::new();
    cpu.a = 0x0F;
    cpu.add(0x01);
    assert_eq!(cpu.a, 0x10);
    assert!(cpu.flag(FLAG_H));
    assert!(!cpu.flag(FLAG_C));
    assert!(!cpu.flag(FLAG_Z));

    cpu.a = 0xFF;
    cpu.add(0x01);
    assert_eq!(cpu.a, 0x00);
    assert!(cpu.flag(FLAG_Z));
    assert!(cpu.flag(FLAG_H));
    assert!(cpu.flag(FLAG_C));
}

#[test]
fn sub_borrow_flags() {
    let mut cpu = Cpu::new();
    cpu.a = 0x10;
    cpu.sub(0x01);
    assert_eq!(cpu.a, 0x0F);
    assert!(cpu.flag(FLAG_N));
    assert!(cpu.flag(FLAG_H));
    assert!(!cpu.flag(FLAG_C));

    cpu.a = 0x00;
    cpu.sub(0x01);
    assert_eq!(cpu.a, 0xFF);
    assert!(cpu.flag(FLAG_C));
}

#[test]
fn adc_chains_carry() {
    let mut cpu = Cpu::new();
    cpu.a = 0xFF;
    cpu.add(0x01); // sets carry
    cpu.adc(0x00);
    assert_eq!(cpu.a, 0x01);
    assert!(!cpu.flag(FLAG_C));
}

#[test]
fn inc_preserves_carry() {
    let mut cpu = Cpu::new();
    cpu.set_flag(FLAG_C, true);
    let v = cpu.inc8(0xFF);
    assert_eq!(v, 0x00);
    assert!(cpu.flag(FLAG_Z));
    assert!(cpu.flag(FLAG_H));
    assert!(cpu.flag(FLAG_C), "INC must not touch carry");
}

#[test]
fn daa_after_bcd_add() {
    let mut cpu = Cpu::new();
    // 0x45 + 0x38 = 0x7D, decimal adjusted to 0x83.
    cpu.a = 0x45;
    cpu.add(0x38);
    cpu.daa();
    assert_eq!(cpu.a, 0x83);
    assert!(!cpu.flag(FLAG_H));
    assert!(!cpu.flag(FLAG_C));
}

#[test]
fn add_hl_preserves_zero_flag() {
    let mut cpu = Cpu::new();
    cpu.set_flag(FLAG_Z, true);
    cpu.set_hl(0x0FFF);
    cpu.add_hl(0x0001);
    assert_eq!(cpu.hl(), 0x1000);
    assert!(cpu.flag(FLAG_H));
    assert!(cpu.flag(FLAG_Z), "16-bit add must not touch Z");
}

#[test]
fn add_sp_flags_come_from_low_byte() {
    let mut cpu = Cpu::new();
    cpu.sp = 0x00FF;
    let v = cpu.add_sp_signed(0x01);
    assert_eq!(v, 0x0100);
    assert!(cpu.flag(FLAG_H));
    assert!(cpu.flag(FLAG_C));
    assert!(!cpu.flag(FLAG_Z));

    // Negative offset wraps the full 16 bits.
    cpu.sp = 0x0000;
    let v = cpu.add_sp_signed(0xFF); // -1
    assert_eq!(v, 0xFFFF);
}

#[test]
fn push_pop_round_trip_masks_f() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    cpu.sp = 0xFFFE;
    cpu.set_af(0x12FF);
    assert_eq!(cpu.f, 0xF0, "low nibble of F does not exist");
    cpu.push_word(&mut mmu, cpu.af());
    cpu.set_af(0x0000);
    let v = cpu.pop_word(&mut mmu);
    cpu.set_af(v);
    assert_eq!(cpu.af(), 0x12F0);
    assert_eq!(cpu.sp, 0xFFFE);
}

#[test]
fn jr_backwards_and_branch_penalty() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    // JR -2 loops onto itself.
    mmu.map.write_block(0x0200, &[0x18, 0xFE]);
    cpu.pc = 0x0200;
    let cycles = run_one(&mut cpu, &mut mmu);
    assert_eq!(cycles, 3, "taken JR costs base 2 plus penalty 1");
    assert_eq!(cpu.pc, 0x0200);
}

#[test]
fn conditional_jump_not_taken_has_no_penalty() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    mmu.map.write_block(0x0200, &[0xC2, 0x00, 0x03]); // JP NZ,0x0300
    cpu.pc = 0x0200;
    cpu.set_flag(FLAG_Z, true);
    let cycles = run_one(&mut cpu, &mut mmu);
    assert_eq!(cycles, 3);
    assert_eq!(cpu.pc, 0x0203);
}

#[test]
fn call_and_ret_cycle_costs() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    mmu.map.write_block(0x0200, &[0xCD, 0x00, 0x03]); // CALL 0x0300
    mmu.map.set_byte(0x0300, 0xC9); // RET
    cpu.pc = 0x0200;
    cpu.sp = 0xFFFE;
    assert_eq!(run_one(&mut cpu, &mut mmu), 6);
    assert_eq!(cpu.pc, 0x0300);
    assert_eq!(cpu.sp, 0xFFFC);
    assert_eq!(run_one(&mut cpu, &mut mmu), 4);
    assert_eq!(cpu.pc, 0x0203);
    assert_eq!(cpu.sp, 0xFFFE);
}

#[test]
fn extended_bit_probe_and_set() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    // BIT 7,H ; SET 3,A
    mmu.map.write_block(0x0200, &[0xCB, 0x7C, 0xCB, 0xDF]);
    cpu.pc = 0x0200;
    cpu.h = 0x00;
    assert_eq!(run_one(&mut cpu, &mut mmu), 2);
    assert!(cpu.flag(FLAG_Z));
    assert!(cpu.flag(FLAG_H));
    assert!(!cpu.flag(FLAG_N));
    cpu.a = 0x00;
    run_one(&mut cpu, &mut mmu);
    assert_eq!(cpu.a, 0x08);
}

#[test]
fn extended_rmw_through_hl() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    mmu.map.write_block(0x0200, &[0xCB, 0x36]); // SWAP (HL)
    cpu.pc = 0x0200;
    cpu.set_hl(0xC000);
    mmu.map.set_byte(0xC000, 0xAB);
    assert_eq!(run_one(&mut cpu, &mut mmu), 4);
    assert_eq!(mmu.map.byte(0xC000), 0xBA);
}

#[test]
fn rotate_a_clears_zero_flag() {
    let mut cpu = Cpu::new();
    cpu.a = 0x80;
    cpu.rlca();
    assert_eq!(cpu.a, 0x01);
    assert!(cpu.flag(FLAG_C));
    assert!(!cpu.flag(FLAG_Z), "RLCA never sets Z");

    // The 0xCB twin does set Z.
    cpu.a = 0x00;
    cpu.set_flag(FLAG_C, false);
    cpu.a = cpu.rlc(cpu.a);
    assert!(cpu.flag(FLAG_Z));
}

#[test]
fn interrupt_service_pushes_pc_and_clears_request() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    cpu.pc = 0x0200;
    cpu.sp = 0xFFFE;
    cpu.interrupt_state = InterruptState::Enabled;
    mmu.map.set_byte(REG_IE, IF_VBLANK | IF_TIMER);
    mmu.map.set_byte(REG_IF, IF_VBLANK | IF_TIMER);

    let instruction = cpu.fetch_next(&mut mmu);
    assert_eq!(instruction.cycles, 5);
    cpu.execute_next(instruction, &mut mmu);
    // VBlank wins the priority tie.
    assert_eq!(cpu.pc, 0x0040);
    assert_eq!(mmu.map.byte(REG_IF), IF_TIMER);
    assert_eq!(cpu.interrupt_state, InterruptState::Disabled);
    assert_eq!(mmu.read_word(cpu.sp), 0x0200);
}

#[test]
fn second_interrupt_serviced_after_reti() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    cpu.pc = 0x0200;
    cpu.sp = 0xFFFE;
    cpu.interrupt_state = InterruptState::Enabled;
    mmu.map.set_byte(REG_IE, IF_VBLANK | IF_TIMER);
    mmu.map.set_byte(REG_IF, IF_VBLANK | IF_TIMER);
    mmu.map.set_byte(0x0040, 0xD9); // RETI

    run_one(&mut cpu, &mut mmu); // service vblank
    run_one(&mut cpu, &mut mmu); // RETI re-enables
    assert_eq!(cpu.interrupt_state, InterruptState::Enabled);
    run_one(&mut cpu, &mut mmu); // service timer
    assert_eq!(cpu.pc, 0x0050);
    assert_eq!(mmu.map.byte(REG_IF), 0);
}

#[test]
fn ei_takes_effect_after_next_instruction() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    mmu.map.write_block(0x0200, &[0xFB, 0x00, 0x00]); // EI ; NOP ; NOP
    cpu.pc = 0x0200;
    cpu.sp = 0xFFFE;
    mmu.map.set_byte(REG_IE, IF_VBLANK);
    mmu.map.set_byte(REG_IF, IF_VBLANK);

    run_one(&mut cpu, &mut mmu); // EI
    assert_eq!(cpu.interrupt_state, InterruptState::Enabling);
    // The instruction after EI still runs with interrupts masked.
    run_one(&mut cpu, &mut mmu); // NOP at 0x0201
    assert_eq!(cpu.pc, 0x0202);
    assert_eq!(cpu.interrupt_state, InterruptState::Enabled);
    run_one(&mut cpu, &mut mmu); // now the interrupt is taken
    assert_eq!(cpu.pc, 0x0040);
}

#[test]
fn halt_wakes_without_master_enable() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    mmu.map.write_block(0x0200, &[0x76, 0x00]); // HALT ; NOP
    cpu.pc = 0x0200;

    run_one(&mut cpu, &mut mmu); // HALT
    assert!(cpu.halted);
    let instruction = cpu.fetch_next(&mut mmu);
    assert_eq!(instruction.cycles, 1, "halted CPU burns one cycle per step");
    cpu.execute_next(instruction, &mut mmu);
    assert!(cpu.halted);
    assert_eq!(cpu.pc, 0x0201);

    // A masked but pending request lifts HALT without being serviced.
    mmu.map.set_byte(REG_IE, IF_TIMER);
    mmu.map.set_byte(REG_IF, IF_TIMER);
    run_one(&mut cpu, &mut mmu); // the NOP after HALT
    assert!(!cpu.halted);
    assert_eq!(cpu.pc, 0x0202);
    assert_eq!(mmu.map.byte(REG_IF), IF_TIMER, "request stays pending");
}

#[test]
fn trace_renders_immediates() {
    let mut cpu = Cpu::new();
    let mut mmu = Mmu::new();
    mmu.map.write_block(0x0100, &[0x3E, 0x42]); // LD A,0x42
    cpu.pc = 0x0100;
    run_one(&mut cpu, &mut mmu);
    let lines = cpu.drain_trace(TraceStyle::Compact);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0], "0x0100:  LD A,0x42");
}
