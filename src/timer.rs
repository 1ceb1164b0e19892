use crate::mmu::{MemoryMap, REG_DIV, REG_TAC, REG_TIMA, REG_TMA};

// DIV ticks at 16384 Hz while the machine clock runs at 1 MiHz.
const DIVIDER_PERIOD_M_CYCLES: u8 = 64;

// TIMA increment period in machine cycles, indexed by TAC clock select.
const PERIOD_TABLE: [u16; 4] = [256, 4, 16, 64];

const TAC_ENABLE: u8 = 0x04;
const TAC_CLOCK_SELECT: u8 = 0x03;

/// Divider/counter unit. The DIV/TIMA/TMA/TAC registers live in the memory
/// map; the timer keeps only the sub-register phase counters.
pub struct Timer {
    /// Machine cycles accumulated toward the next DIV increment.
    divider_counter: u8,
    /// Machine cycles remaining until the next TIMA increment.
    countdown: u64,
    interrupt_flag: u8,
}

impl Timer {
    pub fn new(interrupt_flag: u8) -> Self {
        Self {
            divider_counter: 0,
            countdown: period_m_cycles(0) as u64,
            interrupt_flag,
        }
    }

    /// Advance the timer by `m_cycles` machine cycles, requesting the timer
    /// interrupt on every TIMA overflow. A batch larger than the increment
    /// period produces multiple increments.
    pub fn m_cycle_update(&mut self, m_cycles: u8, map: &mut MemoryMap) {
        self.divider_counter = self.divider_counter.wrapping_add(m_cycles);
        if self.divider_counter >= DIVIDER_PERIOD_M_CYCLES {
            self.divider_counter -= DIVIDER_PERIOD_M_CYCLES;
            map.set_byte(REG_DIV, map.byte(REG_DIV).wrapping_add(1));
        }

        let tac = map.byte(REG_TAC);
        if tac & TAC_ENABLE == 0 {
            return;
        }

        let (next, underflow) = self.countdown.overflowing_sub(m_cycles as u64);
        self.countdown = next;
        if self.countdown != 0 && !underflow {
            return;
        }

        let period = period_m_cycles(tac & TAC_CLOCK_SELECT) as u64;
        loop {
            self.countdown = self.countdown.wrapping_add(period);
            let tima = map.byte(REG_TIMA).wrapping_add(1);
            if tima == 0 {
                map.set_byte(REG_TIMA, map.byte(REG_TMA));
                map.request_interrupt(self.interrupt_flag);
            } else {
                map.set_byte(REG_TIMA, tima);
            }
            if self.countdown != 0 && self.countdown <= period {
                break;
            }
        }
    }

    /// Signaler hook for the 0xFF04-0xFF07 register window. Writing DIV
    /// zeroes it; writing TAC re-derives the countdown from the new clock
    /// select. Reads have no timer side effects.
    pub fn register_touched(&mut self, addr: u16, value: Option<u8>, map: &mut MemoryMap) {
        if value.is_none() {
            return;
        }
        match addr {
            REG_DIV => {
                map.set_byte(REG_DIV, 0);
                self.divider_counter = 0;
            }
            REG_TAC => {
                let tac = map.byte(REG_TAC);
                self.countdown = period_m_cycles(tac & TAC_CLOCK_SELECT) as u64;
            }
            REG_TIMA | REG_TMA => {}
            _ => unreachable!("timer signaler fired for {addr:#06x}"),
        }
    }
}

fn period_m_cycles(clock_select: u8) -> u16 {
    PERIOD_TABLE[(clock_select & TAC_CLOCK_SELECT) as usize]
}
