use dotmatrix::mmu::{IF_TIMER, MemoryMap, REG_DIV, REG_IF, REG_TAC, REG_TIMA, REG_TMA};
use dotmatrix::timer::Timer;

#[test]
fn div_increments_every_64_m_cycles() {
    let mut t = Timer::new(IF_TIMER);
    let mut map = MemoryMap::new();
    t.m_cycle_update(63, &mut map);
    assert_eq!(map.byte(REG_DIV), 0);
    t.m_cycle_update(1, &mut map);
    assert_eq!(map.byte(REG_DIV), 1);
    assert_eq!(map.byte(REG_IF), 0);
}

#[test]
fn tima_counts_at_selected_rate() {
    let mut t = Timer::new(IF_TIMER);
    let mut map = MemoryMap::new();
    map.set_byte(REG_TAC, 0x04); // enabled, 4096 Hz (256 m-cycles)
    for _ in 0..255 {
        t.m_cycle_update(1, &mut map);
    }
    assert_eq!(map.byte(REG_TIMA), 0);
    t.m_cycle_update(1, &mut map);
    assert_eq!(map.byte(REG_TIMA), 1);
}

#[test]
fn tima_stops_while_disabled() {
    let mut t = Timer::new(IF_TIMER);
    let mut map = MemoryMap::new();
    for _ in 0..4 {
        t.m_cycle_update(255, &mut map);
    }
    assert_eq!(map.byte(REG_TIMA), 0);
}

#[test]
fn overflow_reloads_tma_and_requests_interrupt() {
    let mut t = Timer::new(IF_TIMER);
    let mut map = MemoryMap::new();
    map.set_byte(REG_TAC, 0x04);
    map.set_byte(REG_TIMA, 0xFF);
    map.set_byte(REG_TMA, 0xAB);
    for _ in 0..2 {
        t.m_cycle_update(128, &mut map);
    }
    assert_eq!(map.byte(REG_TIMA), 0xAB);
    assert_eq!(map.byte(REG_IF) & IF_TIMER, IF_TIMER);
}

#[test]
fn large_batch_produces_multiple_increments() {
    let mut t = Timer::new(IF_TIMER);
    let mut map = MemoryMap::new();
    map.set_byte(REG_TAC, 0x05); // enabled, 4 m-cycles per tick
    t.register_touched(REG_TAC, Some(0x05), &mut map);
    t.m_cycle_update(64, &mut map);
    assert_eq!(map.byte(REG_TIMA), 16);
}

#[test]
fn full_period_overflows_exactly_once() {
    let mut t = Timer::new(IF_TIMER);
    let mut map = MemoryMap::new();
    map.set_byte(REG_TAC, 0x07); // enabled, 64 m-cycles per tick
    t.register_touched(REG_TAC, Some(0x07), &mut map);
    map.set_byte(REG_TMA, 0xF0);
    // 256 increments wrap TIMA once and land exactly on the reload value.
    for _ in 0..256 {
        t.m_cycle_update(64, &mut map);
    }
    assert_eq!(map.byte(REG_TIMA), 0xF0);
    assert_eq!(map.byte(REG_IF) & IF_TIMER, IF_TIMER);
}

#[test]
fn div_write_resets_phase() {
    let mut t = Timer::new(IF_TIMER);
    let mut map = MemoryMap::new();
    t.m_cycle_update(63, &mut map);
    map.set_byte(REG_DIV, 0x12);
    t.register_touched(REG_DIV, Some(0x12), &mut map);
    assert_eq!(map.byte(REG_DIV), 0);
    // The sub-increment phase restarted too.
    t.m_cycle_update(63, &mut map);
    assert_eq!(map.byte(REG_DIV), 0);
    t.m_cycle_update(1, &mut map);
    assert_eq!(map.byte(REG_DIV), 1);
}

#[test]
fn tac_write_rederives_countdown() {
    let mut t = Timer::new(IF_TIMER);
    let mut map = MemoryMap::new();
    map.set_byte(REG_TAC, 0x04);
    t.m_cycle_update(200, &mut map); // partway into the 256-cycle period

    // Switching to the fast clock restarts the countdown at 4 cycles.
    map.set_byte(REG_TAC, 0x05);
    t.register_touched(REG_TAC, Some(0x05), &mut map);
    t.m_cycle_update(4, &mut map);
    assert_eq!(map.byte(REG_TIMA), 1);
}
