//! Cycle-accurate Game Boy (DMG) emulation core.
//!
//! This crate contains the platform-agnostic emulator logic (CPU/MMU/PPU/timer).
//! Frontends present frames through the [`ppu::FrameSink`] trait and drive the
//! core via the [`gameboy`] facade.

/// LR35902 CPU core: registers, interrupt state machine, execution trace.
pub mod cpu;

/// High-level facade that wires the CPU, MMU and PPU into a single machine.
pub mod gameboy;

/// Joypad input register and edge-triggered interrupt behavior.
pub mod input;

/// Opcode tables for the primary, 0xCB-prefixed and STOP instruction sets.
pub mod instructions;

/// Memory map, I/O signalers, OAM DMA and hardware plumbing.
pub mod mmu;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// Divider/timer unit.
pub mod timer;
