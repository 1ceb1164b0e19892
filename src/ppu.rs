//! Dot-clocked pixel processing unit. Each scanline walks the four LCD modes
//! (OAM search, pixel transfer, hblank, vblank) one dot at a time, with the
//! nested pixel fetcher filling two bounded rings that the transfer stage
//! drains onto a [`FrameSink`].

use std::sync::{Arc, Mutex};

use crate::mmu::{
    IF_STAT, IF_VBLANK, Mmu, ObjectAttributes, REG_BGP, REG_LCDC, REG_LY, REG_LYC, REG_OBP0,
    REG_OBP1, REG_SCY, REG_STAT,
};

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// Line timing in dots (4 dots per machine cycle)
const OAM_SEARCH_DOTS: u16 = 80;
const DOTS_PER_LINE: u16 = 456;
const DOTS_PER_M_CYCLE: u16 = 4;

// Number of lines spent in VBlank
const VBLANK_LINES: u8 = 10;

const MAX_OBJECTS_PER_LINE: usize = 10;
const TOTAL_OBJECTS: usize = 40;

// LCD modes as encoded in the low bits of STAT
const MODE_HBLANK: u8 = 0;
const MODE_VBLANK: u8 = 1;
const MODE_OAM_SEARCH: u8 = 2;
const MODE_TRANSFER: u8 = 3;

// LCDC bits
const LCDC_ENABLE: u8 = 0x80;
const LCDC_TILEMAP_HIGH: u8 = 0x08;
const LCDC_TILEDATA_UNSIGNED: u8 = 0x10;
const LCDC_OBJ_TALL: u8 = 0x04;

// STAT bits
const STAT_LYC_EQUAL: u8 = 0x04;
const STAT_HBLANK_INT: u8 = 0x08;
const STAT_VBLANK_INT: u8 = 0x10;
const STAT_OAM_INT: u8 = 0x20;
const STAT_LYC_INT: u8 = 0x40;

// VRAM layout
const TILEMAP_LOW_BASE: u16 = 0x9800;
const TILEMAP_HIGH_BASE: u16 = 0x9C00;
const TILEDATA_UNSIGNED_BASE: u16 = 0x8000;
const TILEDATA_SIGNED_BASE: u16 = 0x9000;

/// Shade brightness for the four 2-bit color encodings, lightest first.
const SHADES: [u8; 4] = [255, 171, 85, 0];

/// Destination for rendered pixels. `mark_row_ready` is called once per
/// completed scanline so a presenter can refresh incrementally.
pub trait FrameSink {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn set_pixel(&mut self, x: usize, y: usize, shade: u8);
    fn mark_row_ready(&mut self, y: usize);
}

/// In-memory grayscale frame, one byte per pixel in row-major order.
pub struct Framebuffer {
    pixels: Vec<u8>,
    rows_ready: usize,
}

impl Framebuffer {
    pub fn new() -> Self {
        Framebuffer {
            pixels: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            rows_ready: 0,
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * SCREEN_WIDTH + x]
    }

    /// Number of rows completed since the frame started.
    pub fn rows_ready(&self) -> usize {
        self.rows_ready
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for Framebuffer {
    fn width(&self) -> usize {
        SCREEN_WIDTH
    }

    fn height(&self) -> usize {
        SCREEN_HEIGHT
    }

    fn set_pixel(&mut self, x: usize, y: usize, shade: u8) {
        self.pixels[y * SCREEN_WIDTH + x] = shade;
    }

    fn mark_row_ready(&mut self, y: usize) {
        self.rows_ready = y + 1;
        if y + 1 == SCREEN_HEIGHT {
            self.rows_ready = 0;
        }
    }
}

/// Shared frame for an external presentation thread. Rendering never blocks
/// on a poisoned or contended observer for longer than the lock itself.
impl FrameSink for Arc<Mutex<Framebuffer>> {
    fn width(&self) -> usize {
        SCREEN_WIDTH
    }

    fn height(&self) -> usize {
        SCREEN_HEIGHT
    }

    fn set_pixel(&mut self, x: usize, y: usize, shade: u8) {
        let Ok(mut frame) = self.lock() else { return };
        frame.set_pixel(x, y, shade);
    }

    fn mark_row_ready(&mut self, y: usize) {
        let Ok(mut frame) = self.lock() else { return };
        frame.mark_row_ready(y);
    }
}

/// One queued pixel: its 2-bit color encoding plus the palette and priority
/// needed to resolve it during mixing.
#[derive(Clone, Copy, Default)]
struct PixelInfo {
    encoding: u8,
    palette_register: u16,
    behind_background: bool,
}

/// Fixed-capacity FIFO for fetched pixels. The fetcher holds at most one
/// pushed batch plus one in flight, so 16 slots never overflow.
struct PixelRing {
    slots: [PixelInfo; 16],
    head: usize,
    len: usize,
}

impl PixelRing {
    fn new() -> Self {
        PixelRing {
            slots: [PixelInfo::default(); 16],
            head: 0,
            len: 0,
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    fn push(&mut self, pixel: PixelInfo) {
        assert!(self.len < self.slots.len(), "pixel ring overflow");
        self.slots[(self.head + self.len) % self.slots.len()] = pixel;
        self.len += 1;
    }

    fn pop(&mut self) -> Option<PixelInfo> {
        if self.len == 0 {
            return None;
        }
        let pixel = self.slots[self.head];
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        Some(pixel)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FetchState {
    GetTileId,
    GetDataLow,
    GetDataHigh,
    Push,
}

/// Tile fetch state machine. Normally streams background tiles for the
/// current line; [`PixelFetcher::enter_object_mode`] suspends that to fetch
/// one object row, which resumes the background fetch when pushed.
struct PixelFetcher {
    state: FetchState,
    tilemap_base: u16,
    unsigned_tiledata: bool,
    x: u8,
    y: u8,
    tile_id: u8,
    data_low: u8,
    data_high: u8,
    object: Option<ObjectAttributes>,
    object_row: u8,
    object_height: u8,
    background_queue: PixelRing,
    object_queue: PixelRing,
}

impl PixelFetcher {
    fn new() -> Self {
        PixelFetcher {
            state: FetchState::GetTileId,
            tilemap_base: TILEMAP_LOW_BASE,
            unsigned_tiledata: false,
            x: 0,
            y: 0,
            tile_id: 0,
            data_low: 0,
            data_high: 0,
            object: None,
            object_row: 0,
            object_height: 8,
            background_queue: PixelRing::new(),
            object_queue: PixelRing::new(),
        }
    }

    /// Restart for a new scanline with the line's tile addressing mode.
    fn reset(&mut self, tilemap_base: u16, unsigned_tiledata: bool, y: u8) {
        self.state = FetchState::GetTileId;
        self.tilemap_base = tilemap_base;
        self.unsigned_tiledata = unsigned_tiledata;
        self.x = 0;
        self.y = y;
        self.object = None;
        self.background_queue.clear();
        self.object_queue.clear();
    }

    fn enter_object_mode(&mut self, object: ObjectAttributes, row: u8, height: u8) {
        self.object = Some(object);
        self.object_row = row;
        self.object_height = height;
        self.state = FetchState::GetDataLow;
    }

    fn in_object_render(&self) -> bool {
        self.object.is_some()
    }

    fn update(&mut self, mmu: &Mmu) {
        match self.state {
            FetchState::GetTileId => {
                let offset = (self.y as u16 >> 3) * 32 + (self.x as u16 >> 3);
                self.tile_id = mmu.map.byte(self.tilemap_base + offset);
                self.state = FetchState::GetDataLow;
            }
            FetchState::GetDataLow => {
                // Both data bytes are read here; GetDataHigh only burns the
                // second fetch's two dots.
                let address = match self.object {
                    Some(object) => {
                        let row = if object.flip_y() {
                            self.object_height - 1 - self.object_row
                        } else {
                            self.object_row
                        };
                        let tile = if self.object_height == 16 {
                            object.tile & 0xFE
                        } else {
                            object.tile
                        };
                        TILEDATA_UNSIGNED_BASE + tile as u16 * 16 + row as u16 * 2
                    }
                    None => {
                        let row = (self.y & 0x07) as u16 * 2;
                        if self.unsigned_tiledata {
                            TILEDATA_UNSIGNED_BASE + self.tile_id as u16 * 16 + row
                        } else {
                            let signed = self.tile_id as i8 as i16;
                            TILEDATA_SIGNED_BASE.wrapping_add_signed(signed * 16) + row
                        }
                    }
                };
                self.data_low = mmu.map.byte(address);
                self.data_high = mmu.map.byte(address + 1);
                self.state = FetchState::GetDataHigh;
            }
            FetchState::GetDataHigh => {
                self.state = FetchState::Push;
            }
            FetchState::Push => {
                match self.object {
                    Some(object) => {
                        if self.object_queue.len() > 8 {
                            return;
                        }
                        self.insert_pixels(
                            false,
                            if object.palette() == 0 { REG_OBP0 } else { REG_OBP1 },
                            object.flip_x(),
                            object.behind_background(),
                        );
                        self.object = None;
                    }
                    None => {
                        if self.background_queue.len() > 8 {
                            return;
                        }
                        self.insert_pixels(true, REG_BGP, false, false);
                        self.x += 8;
                    }
                }
                self.state = FetchState::GetTileId;
            }
        }
    }

    fn insert_pixels(
        &mut self,
        is_background: bool,
        palette_register: u16,
        flip_x: bool,
        behind_background: bool,
    ) {
        for i in 0..8u8 {
            let bit = if flip_x { i } else { 7 - i };
            let encoding =
                ((self.data_high >> bit) & 1) << 1 | ((self.data_low >> bit) & 1);
            let pixel = PixelInfo {
                encoding,
                palette_register,
                behind_background,
            };
            if is_background {
                self.background_queue.push(pixel);
            } else {
                self.object_queue.push(pixel);
            }
        }
    }
}

pub struct Ppu {
    sink: Box<dyn FrameSink>,
    fetcher: PixelFetcher,
    mode: u8,
    cycle: u16,
    current_x: u8,
    /// OAM snapshots for the line, paired with their table index.
    objects_on_line: [(u8, ObjectAttributes); MAX_OBJECTS_PER_LINE],
    objects_on_line_count: usize,
    stat_line: bool,
    /// Completed frames since power-on.
    pub frames: u64,
}

impl Ppu {
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Ppu {
            sink,
            fetcher: PixelFetcher::new(),
            mode: MODE_OAM_SEARCH,
            cycle: 0,
            current_x: 0,
            objects_on_line: [(0, ObjectAttributes::default()); MAX_OBJECTS_PER_LINE],
            objects_on_line_count: 0,
            stat_line: false,
            frames: 0,
        }
    }

    /// Restart from the top-left of the frame.
    pub fn reset(&mut self, mmu: &mut Mmu) {
        self.mode = MODE_OAM_SEARCH;
        self.cycle = 0;
        self.current_x = 0;
        self.objects_on_line_count = 0;
        self.stat_line = false;
        mmu.map.set_byte(REG_LY, 0);
        self.reset_fetcher(mmu);
        self.sync(mmu);
    }

    /// Advance the dot clock. A cleared LCDC enable bit freezes the state
    /// machine, abandoning the rest of the batch.
    pub fn m_cycle_update(&mut self, m_cycles: u8, mmu: &mut Mmu) {
        let mut dots = DOTS_PER_M_CYCLE * m_cycles as u16;
        while dots > 0 {
            dots -= 1;
            if mmu.map.byte(REG_LCDC) & LCDC_ENABLE == 0 {
                return;
            }
            self.cycle += 1;
            match self.mode {
                MODE_OAM_SEARCH => self.oam_search_action(mmu),
                MODE_TRANSFER => self.transfer_action(mmu),
                MODE_HBLANK => self.hblank_action(mmu),
                _ => self.vblank_action(mmu),
            }
            self.sync(mmu);
        }
    }

    /// Publish LY/STAT register state and raise the STAT interrupt on the
    /// rising edge of any enabled condition.
    fn sync(&mut self, mmu: &mut Mmu) {
        let ly = mmu.map.byte(REG_LY);
        let lyc_equal = ly == mmu.map.byte(REG_LYC);
        let stat = mmu.map.byte(REG_STAT);
        let line = (stat & STAT_LYC_INT != 0 && lyc_equal)
            || (stat & STAT_OAM_INT != 0 && self.mode == MODE_OAM_SEARCH)
            || (stat & STAT_VBLANK_INT != 0 && self.mode == MODE_VBLANK)
            || (stat & STAT_HBLANK_INT != 0 && self.mode == MODE_HBLANK);
        if line && !self.stat_line {
            mmu.map.request_interrupt(IF_STAT);
        }
        self.stat_line = line;

        let mut stat = stat & !(STAT_LYC_EQUAL | 0x03);
        if lyc_equal {
            stat |= STAT_LYC_EQUAL;
        }
        stat |= self.mode;
        mmu.map.set_byte(REG_STAT, stat);
    }

    fn reset_fetcher(&mut self, mmu: &Mmu) {
        let lcdc = mmu.map.byte(REG_LCDC);
        let tilemap_base = if lcdc & LCDC_TILEMAP_HIGH != 0 {
            TILEMAP_HIGH_BASE
        } else {
            TILEMAP_LOW_BASE
        };
        let y = mmu.map.byte(REG_LY).wrapping_add(mmu.map.byte(REG_SCY));
        self.fetcher
            .reset(tilemap_base, lcdc & LCDC_TILEDATA_UNSIGNED != 0, y);
    }

    fn object_height(lcdc: u8) -> u8 {
        if lcdc & LCDC_OBJ_TALL != 0 { 16 } else { 8 }
    }

    /// Scan one OAM entry every other dot; after 80 dots, sort the matches
    /// and hand over to the transfer stage.
    fn oam_search_action(&mut self, mmu: &mut Mmu) {
        if self.cycle & 1 != 0 {
            let index = (self.cycle >> 1) as usize;
            if index < TOTAL_OBJECTS && self.objects_on_line_count < MAX_OBJECTS_PER_LINE {
                let attr = mmu.map.object_attributes(index);
                let height = Self::object_height(mmu.map.byte(REG_LCDC)) as u16;
                let line = mmu.map.byte(REG_LY) as u16 + 16;
                if attr.x != 0 && line >= attr.y as u16 && line < attr.y as u16 + height {
                    self.objects_on_line[self.objects_on_line_count] = (index as u8, attr);
                    self.objects_on_line_count += 1;
                }
            }
        }
        if self.cycle >= OAM_SEARCH_DOTS {
            self.reset_fetcher(mmu);
            self.sort_objects_on_line();
            self.mode = MODE_TRANSFER;
        }
    }

    /// Descending by X, then descending by OAM index, so the tail always
    /// holds the leftmost object and equal-X ties consume the lowest index
    /// first.
    fn sort_objects_on_line(&mut self) {
        let objects = &mut self.objects_on_line[..self.objects_on_line_count];
        objects.sort_unstable_by(|a, b| b.1.x.cmp(&a.1.x).then(b.0.cmp(&a.0)));
    }

    fn transfer_action(&mut self, mmu: &mut Mmu) {
        self.fetcher.update(mmu);
        if self.fetcher.background_queue.len() < 8 || self.fetcher.in_object_render() {
            return;
        }

        if self.objects_on_line_count > 0 {
            let (_, object) = self.objects_on_line[self.objects_on_line_count - 1];
            if self.current_x as u16 + 8 == object.x as u16 {
                let row = (mmu.map.byte(REG_LY) as u16 + 16 - object.y as u16) as u8;
                let height = Self::object_height(mmu.map.byte(REG_LCDC));
                self.fetcher.enter_object_mode(object, row, height);
                self.objects_on_line_count -= 1;
                return;
            }
        }

        let Some(mut pixel) = self.fetcher.background_queue.pop() else {
            return;
        };
        if let Some(object_pixel) = self.fetcher.object_queue.pop() {
            if object_pixel.encoding != 0 && !object_pixel.behind_background {
                pixel = object_pixel;
            }
        }

        let ly = mmu.map.byte(REG_LY);
        let palette = mmu.map.byte(pixel.palette_register);
        let shade = SHADES[((palette >> (2 * pixel.encoding)) & 0x03) as usize];
        self.sink.set_pixel(self.current_x as usize, ly as usize, shade);
        self.current_x += 1;

        if self.current_x as usize == SCREEN_WIDTH {
            self.current_x = 0;
            self.objects_on_line_count = 0;
            self.sink.mark_row_ready(ly as usize);
            self.mode = MODE_HBLANK;
        }
    }

    fn hblank_action(&mut self, mmu: &mut Mmu) {
        if self.cycle < DOTS_PER_LINE {
            return;
        }
        self.cycle = 0;
        self.current_x = 0;
        let ly = mmu.map.byte(REG_LY) + 1;
        mmu.map.set_byte(REG_LY, ly);
        if ly as usize == SCREEN_HEIGHT {
            self.mode = MODE_VBLANK;
            mmu.map.request_interrupt(IF_VBLANK);
        } else {
            self.mode = MODE_OAM_SEARCH;
            self.objects_on_line_count = 0;
        }
    }

    fn vblank_action(&mut self, mmu: &mut Mmu) {
        if self.cycle < DOTS_PER_LINE {
            return;
        }
        self.cycle = 0;
        let ly = mmu.map.byte(REG_LY) + 1;
        mmu.map.set_byte(REG_LY, ly);
        if ly as usize == SCREEN_HEIGHT + VBLANK_LINES as usize {
            mmu.map.set_byte(REG_LY, 0);
            self.mode = MODE_OAM_SEARCH;
            self.objects_on_line_count = 0;
            self.frames += 1;
        }
    }
}
