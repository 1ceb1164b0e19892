use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::input::Input;
use crate::timer::Timer;

pub const MAP_SIZE: usize = 0x10000;
pub const BOOT_ROM_SIZE: usize = 0x100;

// Fixed region bases (gbdev.io/pandocs/Memory_Map.html)
pub const ROM0_BASE: u16 = 0x0000;
pub const ROM1_BASE: u16 = 0x4000;
pub const VRAM_BASE: u16 = 0x8000;
pub const EXTERNAL_RAM_BASE: u16 = 0xA000;
pub const WRAM0_BASE: u16 = 0xC000;
pub const WRAM1_BASE: u16 = 0xD000;
pub const ECHO_BASE: u16 = 0xE000;
pub const OAM_BASE: u16 = 0xFE00;
pub const IO_BASE: u16 = 0xFF00;
pub const HRAM_BASE: u16 = 0xFF80;

// I/O register addresses
pub const REG_JOYP: u16 = 0xFF00;
pub const REG_DIV: u16 = 0xFF04;
pub const REG_TIMA: u16 = 0xFF05;
pub const REG_TMA: u16 = 0xFF06;
pub const REG_TAC: u16 = 0xFF07;
pub const REG_IF: u16 = 0xFF0F;
pub const REG_LCDC: u16 = 0xFF40;
pub const REG_STAT: u16 = 0xFF41;
pub const REG_SCY: u16 = 0xFF42;
pub const REG_SCX: u16 = 0xFF43;
pub const REG_LY: u16 = 0xFF44;
pub const REG_LYC: u16 = 0xFF45;
pub const REG_DMA: u16 = 0xFF46;
pub const REG_BGP: u16 = 0xFF47;
pub const REG_OBP0: u16 = 0xFF48;
pub const REG_OBP1: u16 = 0xFF49;
pub const REG_WY: u16 = 0xFF4A;
pub const REG_WX: u16 = 0xFF4B;
pub const REG_BOOT_OFF: u16 = 0xFF50;
pub const REG_IE: u16 = 0xFFFF;

// Interrupt request flags, highest priority first
pub const IF_VBLANK: u8 = 0x01;
pub const IF_STAT: u8 = 0x02;
pub const IF_TIMER: u8 = 0x04;
pub const IF_SERIAL: u8 = 0x08;
pub const IF_JOYPAD: u8 = 0x10;

// Cartridge header fields inside ROM bank 0
const HEADER_TITLE_BASE: u16 = 0x0134;
const HEADER_TITLE_LEN: usize = 15;

const OAM_ENTRY_COUNT: usize = 40;
const OAM_SIZE: usize = OAM_ENTRY_COUNT * 4;

/// One OAM entry, decoded by value. DMA and the PPU's line scan both
/// traffic in these rather than raw byte offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectAttributes {
    pub y: u8,
    pub x: u8,
    pub tile: u8,
    pub flags: u8,
}

impl ObjectAttributes {
    pub fn palette(&self) -> usize {
        ((self.flags >> 4) & 1) as usize
    }

    pub fn flip_x(&self) -> bool {
        self.flags & 0x20 != 0
    }

    pub fn flip_y(&self) -> bool {
        self.flags & 0x40 != 0
    }

    /// Set when background colors 1-3 draw over this object.
    pub fn behind_background(&self) -> bool {
        self.flags & 0x80 != 0
    }
}

/// Flat 64KB address space. All region and register state lives here;
/// components keep only the counters the map cannot express.
pub struct MemoryMap {
    bytes: Box<[u8; MAP_SIZE]>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self {
            bytes: Box::new([0; MAP_SIZE]),
        }
    }

    #[inline(always)]
    pub fn byte(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    #[inline(always)]
    pub fn set_byte(&mut self, addr: u16, val: u8) {
        self.bytes[addr as usize] = val;
    }

    /// Copy `out.len()` bytes starting at `addr`. The range must lie inside
    /// the map.
    pub fn read_block(&self, addr: u16, out: &mut [u8]) {
        let base = addr as usize;
        assert!(base + out.len() <= MAP_SIZE);
        out.copy_from_slice(&self.bytes[base..base + out.len()]);
    }

    /// Copy `data` into the map starting at `addr`. The range must lie inside
    /// the map.
    pub fn write_block(&mut self, addr: u16, data: &[u8]) {
        let base = addr as usize;
        assert!(base + data.len() <= MAP_SIZE);
        self.bytes[base..base + data.len()].copy_from_slice(data);
    }

    pub fn request_interrupt(&mut self, flag: u8) {
        self.bytes[REG_IF as usize] |= flag;
    }

    pub fn object_attributes(&self, index: usize) -> ObjectAttributes {
        assert!(index < OAM_ENTRY_COUNT);
        let base = OAM_BASE as usize + index * 4;
        ObjectAttributes {
            y: self.bytes[base],
            x: self.bytes[base + 1],
            tile: self.bytes[base + 2],
            flags: self.bytes[base + 3],
        }
    }

    pub fn clear_oam(&mut self) {
        let base = OAM_BASE as usize;
        self.bytes[base..base + OAM_SIZE].fill(0);
    }

    /// Game title from the cartridge header, trimmed of padding.
    pub fn title(&self) -> String {
        let base = HEADER_TITLE_BASE as usize;
        self.bytes[base..base + HEADER_TITLE_LEN]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| if b.is_ascii_graphic() { b as char } else { ' ' })
            .collect()
    }

    /// Load a file image into the map at offset 0, capped at `limit` bytes.
    /// Bytes past the end of a short file are zeroed. Returns the byte count
    /// actually taken from the file.
    pub fn load_image(&mut self, path: &Path, limit: usize) -> io::Result<usize> {
        debug!("loading image {:?}", path);
        let data = fs::read(path)?;
        if data.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{:?} is empty", path),
            ));
        }
        let n = data.len().min(limit);
        self.bytes[..n].copy_from_slice(&data[..n]);
        self.bytes[n..limit].fill(0);
        Ok(n)
    }

    /// Render the classic 16-column hex view of `len` bytes at `offset`.
    pub fn hexdump(&self, offset: u16, len: u16) -> String {
        let mut out = String::from(
            "\t\t  00   01   02   03   04   05   06   07   08   09   0A   0B   0C   0D   0E   0F\n",
        );
        let base = offset as usize;
        let mut row = 0usize;
        while row < len as usize {
            let width = 16.min(len as usize - row);
            out.push_str(&format!("0x{:04x}: ", base + row));
            for i in 0..width {
                out.push_str(&format!("0x{:02x} ", self.bytes[base + row + i]));
            }
            out.push('\n');
            row += width;
        }
        out
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..]
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in reactions for I/O signalers. Handlers are tagged so registration
/// stays data-driven while dispatch can borrow the owning [`Mmu`]'s
/// components field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalHook {
    /// Write to 0xFF46 starts an OAM DMA transfer.
    DmaStart,
    /// Write to 0xFF50 unmaps the boot overlay.
    BootRomSwap,
    /// Timer register window 0xFF04-0xFF07.
    TimerControl,
    /// Joypad register 0xFF00; refreshed on every access.
    Joypad,
}

#[derive(Debug, Clone, Copy)]
struct IoSignaler {
    hook: SignalHook,
    compare: u16,
    mask: u16,
    id: u8,
}

/// OAM DMA engine state. One byte is copied per machine cycle.
#[derive(Debug, Default)]
pub struct DirectMemoryAccess {
    pub in_progress: bool,
    source: u16,
    count: u8,
}

impl DirectMemoryAccess {
    pub const DURATION_M_CYCLES: u8 = 160;
    pub const DESTINATION: u16 = OAM_BASE;
}

pub struct Mmu {
    pub map: MemoryMap,
    pub dma: DirectMemoryAccess,
    pub timer: Timer,
    pub input: Input,
    signalers: Vec<IoSignaler>,
    next_signaler_id: u8,
    game_path: Option<PathBuf>,
}

impl Mmu {
    pub fn new() -> Self {
        let mut mmu = Self {
            map: MemoryMap::new(),
            dma: DirectMemoryAccess::default(),
            timer: Timer::new(IF_TIMER),
            input: Input::new(IF_JOYPAD),
            signalers: Vec::new(),
            next_signaler_id: 0,
            game_path: None,
        };
        // Component hooks exist for the machine's whole lifetime; the
        // game-image hooks are added by activate().
        mmu.register_io_signaler(SignalHook::TimerControl, REG_DIV, 0xFFFC);
        mmu.register_io_signaler(SignalHook::Joypad, REG_JOYP, 0xFFFF);
        mmu
    }

    /// Load the 64KB program image and the 256-byte boot overlay, then wire
    /// the image-dependent signalers. Failure leaves the machine inert but is
    /// reported to the caller rather than tearing it down.
    pub fn activate(&mut self, game: &Path, boot: &Path) -> io::Result<()> {
        let loaded = self.map.load_image(game, MAP_SIZE)?;
        self.map.load_image(boot, BOOT_ROM_SIZE)?;
        self.game_path = Some(game.to_path_buf());
        info!(
            "activated \"{}\" ({} bytes, boot overlay mapped)",
            self.map.title(),
            loaded
        );
        self.register_io_signaler(SignalHook::DmaStart, REG_DMA, 0xFFFF);
        self.register_io_signaler(SignalHook::BootRomSwap, REG_BOOT_OFF, 0xFFFF);
        Ok(())
    }

    #[inline]
    pub fn read_byte(&mut self, addr: u16) -> u8 {
        // Readable side effects (joypad refresh) must land before the load.
        if (IO_BASE..HRAM_BASE).contains(&addr) {
            self.signal(addr, None);
        }
        self.map.byte(addr)
    }

    #[inline]
    pub fn write_byte(&mut self, addr: u16, val: u8) {
        self.map.set_byte(addr, val);
        if (IO_BASE..HRAM_BASE).contains(&addr) {
            self.signal(addr, Some(val));
        }
    }

    pub fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read_byte(addr) as u16;
        let hi = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn write_word(&mut self, addr: u16, val: u16) {
        self.write_byte(addr, val as u8);
        self.write_byte(addr.wrapping_add(1), (val >> 8) as u8);
    }

    /// Register a signaler fired for every access whose masked address equals
    /// `compare`. Ids are allocated monotonically so a deregistration never
    /// aliases a live signaler.
    pub fn register_io_signaler(&mut self, hook: SignalHook, compare: u16, mask: u16) -> u8 {
        let id = self.next_signaler_id;
        self.next_signaler_id = self.next_signaler_id.wrapping_add(1);
        self.signalers.push(IoSignaler {
            hook,
            compare,
            mask,
            id,
        });
        id
    }

    pub fn deregister_io_signaler(&mut self, id: u8) {
        self.signalers.retain(|s| s.id != id);
    }

    pub fn request_interrupt(&mut self, flag: u8) {
        self.map.request_interrupt(flag);
    }

    /// Advance an in-progress OAM DMA by `m_cycles` bytes.
    pub fn m_cycle_update(&mut self, m_cycles: u8) {
        if !self.dma.in_progress {
            return;
        }
        let end = Ord::min(
            DirectMemoryAccess::DURATION_M_CYCLES,
            self.dma.count.saturating_add(m_cycles),
        );
        while self.dma.count < end {
            let offset = self.dma.count as u16;
            let val = self.map.byte(self.dma.source.wrapping_add(offset));
            self.map
                .set_byte(DirectMemoryAccess::DESTINATION + offset, val);
            self.dma.count += 1;
        }
        if self.dma.count == DirectMemoryAccess::DURATION_M_CYCLES {
            self.dma.in_progress = false;
            debug!("oam dma from {:#06x} complete", self.dma.source);
        }
    }

    /// Dump the raw 64KB map verbatim.
    pub fn dump_to_file(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.map.as_slice())?;
        debug!("wrote 0x{:08x} bytes to {:?}", MAP_SIZE, path);
        Ok(())
    }

    fn signal(&mut self, addr: u16, value: Option<u8>) {
        for i in 0..self.signalers.len() {
            let s = self.signalers[i];
            if s.compare != addr & s.mask {
                continue;
            }
            self.dispatch(s.hook, addr, value);
        }
    }

    fn dispatch(&mut self, hook: SignalHook, addr: u16, value: Option<u8>) {
        match hook {
            SignalHook::DmaStart => {
                if let Some(v) = value {
                    self.dma.in_progress = true;
                    self.dma.source = (v as u16) << 8;
                    self.dma.count = 0;
                }
            }
            SignalHook::BootRomSwap => {
                if value.is_none() {
                    return;
                }
                // The overlay hid the first 256 bytes of the program; reload
                // the whole image and scrub OAM like the hardware leaves it.
                match &self.game_path {
                    Some(path) => {
                        let path = path.clone();
                        if let Err(err) = self.map.load_image(&path, MAP_SIZE) {
                            warn!("boot overlay swap failed to reload {:?}: {}", path, err);
                            return;
                        }
                        self.map.clear_oam();
                        debug!("boot overlay unmapped");
                    }
                    None => warn!("boot overlay swap requested with no program image"),
                }
            }
            SignalHook::TimerControl => self.timer.register_touched(addr, value, &mut self.map),
            SignalHook::Joypad => self.input.refresh_register(&mut self.map),
        }
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
