use std::io::Write;

use dotmatrix::input::Key;
use dotmatrix::mmu::{
    IF_JOYPAD, MAP_SIZE, Mmu, OAM_BASE, REG_BOOT_OFF, REG_DIV, REG_DMA, REG_JOYP, REG_IF,
    SignalHook,
};
use tempfile::NamedTempFile;

#[test]
fn word_access_is_little_endian() {
    let mut mmu = Mmu::new();
    mmu.write_word(0xC000, 0x1234);
    assert_eq!(mmu.map.byte(0xC000), 0x34);
    assert_eq!(mmu.map.byte(0xC001), 0x12);
    assert_eq!(mmu.read_word(0xC000), 0x1234);
}

#[test]
fn oam_dma_copies_one_byte_per_cycle() {
    let mut mmu = Mmu::new();
    mmu.register_io_signaler(SignalHook::DmaStart, REG_DMA, 0xFFFF);
    for i in 0..160u16 {
        mmu.map.set_byte(0xC100 + i, i as u8);
    }

    mmu.write_byte(REG_DMA, 0xC1);
    assert!(mmu.dma.in_progress);

    mmu.m_cycle_update(40);
    assert!(mmu.dma.in_progress);
    assert_eq!(mmu.map.byte(OAM_BASE + 39), 39);
    assert_eq!(mmu.map.byte(OAM_BASE + 40), 0, "byte 40 not copied yet");

    mmu.m_cycle_update(120);
    assert!(!mmu.dma.in_progress);
    assert_eq!(mmu.map.byte(OAM_BASE + 159), 159);

    // Further cycles are inert.
    mmu.map.set_byte(0xC100, 0xEE);
    mmu.m_cycle_update(10);
    assert_eq!(mmu.map.byte(OAM_BASE), 0);
}

#[test]
fn deregistered_signaler_stops_firing() {
    let mut mmu = Mmu::new();
    let id = mmu.register_io_signaler(SignalHook::DmaStart, REG_DMA, 0xFFFF);
    mmu.deregister_io_signaler(id);
    mmu.write_byte(REG_DMA, 0xC1);
    assert!(!mmu.dma.in_progress);
    // The register byte itself still stores normally.
    assert_eq!(mmu.map.byte(REG_DMA), 0xC1);
}

#[test]
fn joypad_read_reflects_selected_group() {
    let mut mmu = Mmu::new();
    // Select the direction group (bit 4 low).
    mmu.write_byte(REG_JOYP, 0x20);
    let Mmu { map, input, .. } = &mut mmu;
    input.key_event(Key::Right, true, map);

    let joyp = mmu.read_byte(REG_JOYP);
    assert_eq!(joyp & 0x0F, 0x0E, "right is pressed, active low");
    assert_eq!(mmu.map.byte(REG_IF) & IF_JOYPAD, IF_JOYPAD);

    // Action keys are invisible while only directions are selected.
    let Mmu { map, input, .. } = &mut mmu;
    input.key_event(Key::Start, true, map);
    assert_eq!(mmu.read_byte(REG_JOYP) & 0x0F, 0x0E);
}

#[test]
fn timer_signaler_zeroes_div_on_write_only() {
    let mut mmu = Mmu::new();
    mmu.map.set_byte(REG_DIV, 0x55);
    assert_eq!(mmu.read_byte(REG_DIV), 0x55, "reads must not reset DIV");
    mmu.write_byte(REG_DIV, 0x77);
    assert_eq!(mmu.map.byte(REG_DIV), 0);
}

#[test]
fn activate_overlays_boot_rom_and_swaps_back() {
    let mut game = NamedTempFile::new().unwrap();
    let mut image = vec![0u8; 0x8000];
    image[0] = 0x55;
    image[0x134..0x134 + 4].copy_from_slice(b"PONG");
    game.write_all(&image).unwrap();

    let mut boot = NamedTempFile::new().unwrap();
    boot.write_all(&[0xAA; 0x100]).unwrap();

    let mut mmu = Mmu::new();
    mmu.activate(game.path(), boot.path()).unwrap();
    assert_eq!(mmu.map.title(), "PONG");
    assert_eq!(mmu.map.byte(0x0000), 0xAA, "boot overlay hides the header");
    assert_eq!(mmu.map.byte(0x0134), b'P', "image is intact past the overlay");

    // Writing the boot-off register reloads the full image.
    mmu.write_byte(REG_BOOT_OFF, 0x01);
    assert_eq!(mmu.map.byte(0x0000), 0x55);
}

#[test]
fn activate_rejects_missing_image() {
    let boot = NamedTempFile::new().unwrap();
    let mut mmu = Mmu::new();
    assert!(
        mmu.activate(std::path::Path::new("/no/such/image.gb"), boot.path())
            .is_err()
    );
}

#[test]
fn load_image_rejects_empty_file() {
    let empty = NamedTempFile::new().unwrap();
    let mut mmu = Mmu::new();
    assert!(mmu.map.load_image(empty.path(), MAP_SIZE).is_err());
}

#[test]
fn dump_round_trips_the_map() {
    let mut mmu = Mmu::new();
    mmu.map.set_byte(0xC123, 0xAB);
    mmu.map.set_byte(0xFFFF, 0xCD);

    let out = NamedTempFile::new().unwrap();
    mmu.dump_to_file(out.path()).unwrap();
    let data = std::fs::read(out.path()).unwrap();
    assert_eq!(data.len(), MAP_SIZE);
    assert_eq!(data[0xC123], 0xAB);
    assert_eq!(data[0xFFFF], 0xCD);
}

#[test]
fn hexdump_formats_rows_of_sixteen() {
    let mut mmu = Mmu::new();
    mmu.map.set_byte(0xC000, 0x12);
    let dump = mmu.map.hexdump(0xC000, 32);
    assert!(dump.contains("0xc000: 0x12"));
    assert_eq!(dump.lines().count(), 3, "header plus two rows");
}
