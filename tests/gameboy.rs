use std::io::Write;
use std::sync::{Arc, Mutex};

use dotmatrix::cpu::TraceStyle;
use dotmatrix::gameboy::GameBoy;
use dotmatrix::input::Key;
use dotmatrix::mmu::{REG_DIV, REG_JOYP, REG_LCDC, REG_LY};
use dotmatrix::ppu::Framebuffer;
use tempfile::NamedTempFile;

fn boxed_frame() -> Box<Framebuffer> {
    Box::new(Framebuffer::new())
}

/// A 32KB image whose entry point writes a marker byte and halts. The boot
/// overlay is all NOPs, so execution slides from 0x0000 into the image.
fn test_machine(entry_code: &[u8]) -> (GameBoy, NamedTempFile, NamedTempFile) {
    let mut image = vec![0u8; 0x8000];
    image[0x100..0x100 + entry_code.len()].copy_from_slice(entry_code);
    image[0x134..0x134 + 4].copy_from_slice(b"TEST");

    let mut game = NamedTempFile::new().unwrap();
    game.write_all(&image).unwrap();
    let mut boot = NamedTempFile::new().unwrap();
    boot.write_all(&[0x00; 0x100]).unwrap();

    let mut gb = GameBoy::new(boxed_frame());
    gb.activate(game.path(), boot.path()).unwrap();
    (gb, game, boot)
}

#[test]
fn program_runs_from_reset_through_the_boot_overlay() {
    // LD A,0x42 ; LD (0xC000),A ; HALT
    let (mut gb, _game, _boot) = test_machine(&[0x3E, 0x42, 0xEA, 0x00, 0xC0, 0x76]);
    for _ in 0..300 {
        gb.step();
    }
    assert_eq!(gb.mmu.map.byte(0xC000), 0x42);
    assert!(gb.cpu.halted);
    assert_eq!(gb.mmu.map.title(), "TEST");
}

#[test]
fn peripherals_advance_with_instruction_cycles() {
    let (mut gb, _game, _boot) = test_machine(&[0x76]); // HALT
    gb.mmu.map.set_byte(REG_LCDC, 0x80);
    // 256 NOPs into the image plus halt cycles: one m-cycle each.
    for _ in 0..1024 {
        gb.step();
    }
    assert!(gb.mmu.map.byte(REG_DIV) >= 15, "DIV ticks every 64 m-cycles");
    assert!(gb.mmu.map.byte(REG_LY) >= 8, "PPU advanced roughly 9 lines");
}

#[test]
fn frames_complete_while_halted() {
    let (mut gb, _game, _boot) = test_machine(&[0x76]);
    gb.mmu.map.set_byte(REG_LCDC, 0x80);
    // One frame is 154 * 114 m-cycles; halted steps cost one each.
    for _ in 0..154 * 114 + 300 {
        gb.step();
    }
    assert_eq!(gb.ppu.frames, 1);
}

#[test]
fn key_events_reach_the_joypad_register() {
    let (mut gb, _game, _boot) = test_machine(&[0x76]);
    gb.mmu.write_byte(REG_JOYP, 0x10); // select action keys
    gb.key_event(Key::A, true);
    assert_eq!(gb.mmu.read_byte(REG_JOYP) & 0x0F, 0x0E);
    gb.key_event(Key::A, false);
    assert_eq!(gb.mmu.read_byte(REG_JOYP) & 0x0F, 0x0F);
}

#[test]
fn dump_state_reports_registers_and_trace() {
    let (mut gb, _game, _boot) = test_machine(&[0x3E, 0x7F, 0x76]);
    // 256 boot NOPs, then the two program instructions; stop before halt
    // delays flood the 64-entry trace ring.
    for _ in 0..258 {
        gb.step();
    }
    let dump = gb.dump_state(TraceStyle::Compact);
    assert!(dump.contains("AF="));
    assert!(dump.contains("LD A,0x7f"));
    assert!(dump.contains("HALT"));
}

#[test]
fn shared_framebuffer_observes_rendered_rows() {
    let frame = Arc::new(Mutex::new(Framebuffer::new()));
    let mut gb = GameBoy::new(Box::new(Arc::clone(&frame)));
    gb.mmu.map.set_byte(REG_LCDC, 0x90);
    gb.mmu.map.set_byte(0xFF47, 0xE4); // identity background palette
    gb.mmu.map.set_byte(0x8000, 0xFF); // tile 0 row 0: encoding 1
    gb.ppu.reset(&mut gb.mmu);

    // Drive the PPU directly for one line.
    for _ in 0..114 {
        gb.ppu.m_cycle_update(1, &mut gb.mmu);
    }
    let frame = frame.lock().unwrap();
    assert_eq!(frame.pixel(0, 0), 171);
    assert_eq!(frame.rows_ready(), 1);
}
