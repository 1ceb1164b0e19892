//! Machine facade: wires the CPU, bus and PPU together and owns the
//! fetch/propagate/execute cadence of one emulation step.

use std::io;
use std::path::Path;

use log::info;

use crate::cpu::{Cpu, TraceStyle};
use crate::input::Key;
use crate::mmu::Mmu;
use crate::ppu::{FrameSink, Ppu};

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    pub ppu: Ppu,
}

impl GameBoy {
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        GameBoy {
            cpu: Cpu::new(),
            mmu: Mmu::new(),
            ppu: Ppu::new(sink),
        }
    }

    /// Load the program image and boot overlay and bring the machine up.
    pub fn activate(&mut self, game: &Path, boot: &Path) -> io::Result<()> {
        self.mmu.activate(game, boot)?;
        self.ppu.reset(&mut self.mmu);
        info!("machine activated");
        Ok(())
    }

    /// Run one instruction. Peripheral time is charged in two slices: the
    /// instruction's base cost before it executes, then any branch penalty
    /// after, so peripherals never run ahead of the cycles actually spent.
    pub fn step(&mut self) {
        let instruction = self.cpu.fetch_next(&mut self.mmu);
        self.propagate(instruction.cycles);
        self.cpu.interrupt_clock_tick();
        let total = self.cpu.execute_next(instruction, &mut self.mmu);
        self.propagate(total - instruction.cycles);
    }

    pub fn key_event(&mut self, key: Key, pressed: bool) {
        let Mmu { map, input, .. } = &mut self.mmu;
        input.key_event(key, pressed, map);
    }

    fn propagate(&mut self, m_cycles: u8) {
        if m_cycles == 0 {
            return;
        }
        self.ppu.m_cycle_update(m_cycles, &mut self.mmu);
        let Mmu { map, timer, .. } = &mut self.mmu;
        timer.m_cycle_update(m_cycles, map);
        self.mmu.m_cycle_update(m_cycles);
    }

    /// Render the CPU state and recent execution history for a post-mortem.
    pub fn dump_state(&mut self, trace: TraceStyle) -> String {
        let mut out = self.cpu.debug_state();
        out.push('\n');
        for line in self.cpu.drain_trace(trace) {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}
