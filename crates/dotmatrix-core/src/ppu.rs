#[cfg(feature = "ppu-trace")]
use log::trace;

use crate::{
    interrupts::{Interrupt, Interrupts},
    screen::{SCREEN_HEIGHT, SCREEN_WIDTH, Screen},
    tile::{
        SPRITE_COUNT, SpriteCache, SpritePriority, TILE_BYTES, TILE_COUNT, TILE_HEIGHT, TILE_WIDTH,
        TileCache,
    },
};

// Timing constants per LCD mode in ticks
const MODE0_CYCLES: u32 = 204; // HBlank
const MODE2_CYCLES: u32 = 80; // OAM scan
const MODE3_CYCLES: u32 = 172; // Pixel transfer
const LINE_CYCLES: u32 = MODE2_CYCLES + MODE3_CYCLES + MODE0_CYCLES;

// Number of lines spent in VBlank
const VBLANK_LINES: u32 = 10;
const MODE1_CYCLES: u32 = LINE_CYCLES * VBLANK_LINES;
const TOTAL_LINES: u8 = SCREEN_HEIGHT as u8 + VBLANK_LINES as u8;

// Internal memory sizes
const VRAM_SIZE: usize = 0x2000;
pub const OAM_SIZE: usize = 0xA0;

// Window X position is clipped if greater than this value
const WINDOW_X_MAX: u8 = 166;

// VRAM layout constants
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
/// Offset of the first byte past tile data.
const TILE_DATA_END: usize = TILE_COUNT * TILE_BYTES;

/// Size of the background map in pixels along each axis.
pub const BG_MAP_SIZE: usize = 256;
/// Tiles per row in [`Ppu::tile_sheet`].
pub const TILE_SHEET_COLUMNS: usize = 16;

// LCD registers
pub const LCDC: u16 = 0xFF40;
pub const STAT: u16 = 0xFF41;
pub const SCY: u16 = 0xFF42;
pub const SCX: u16 = 0xFF43;
pub const LY: u16 = 0xFF44;
pub const LYC: u16 = 0xFF45;
pub const DMA: u16 = 0xFF46;
pub const BGP: u16 = 0xFF47;
pub const OBP0: u16 = 0xFF48;
pub const OBP1: u16 = 0xFF49;
pub const WY: u16 = 0xFF4A;
pub const WX: u16 = 0xFF4B;

// STAT interrupt select bits
const STAT_HBLANK: u8 = 0x08;
const STAT_VBLANK: u8 = 0x10;
const STAT_OAM: u8 = 0x20;
const STAT_LYC: u8 = 0x40;
const STAT_WRITABLE: u8 = 0x78;

/// Default DMG palette colors in 0x00RRGGBB order.
pub const DMG_PALETTE: [u32; 4] = [0x009BBC0F, 0x008BAC0F, 0x00306230, 0x000F380F];

/// Current LCD mode together with the ticks already spent in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    OamScan { elapsed: u32 },
    PixelTransfer { elapsed: u32 },
    HBlank { elapsed: u32 },
    /// `lines` counts the scanline periods already elapsed inside VBlank.
    VBlank { elapsed: u32, lines: u32 },
}

impl Mode {
    /// Mode number as reported in STAT bits 0-1.
    pub fn number(self) -> u8 {
        match self {
            Mode::HBlank { .. } => 0,
            Mode::VBlank { .. } => 1,
            Mode::OamScan { .. } => 2,
            Mode::PixelTransfer { .. } => 3,
        }
    }

    fn budget(self) -> u32 {
        match self {
            Mode::OamScan { .. } => MODE2_CYCLES,
            Mode::PixelTransfer { .. } => MODE3_CYCLES,
            Mode::HBlank { .. } => MODE0_CYCLES,
            Mode::VBlank { .. } => MODE1_CYCLES,
        }
    }

    pub fn elapsed(self) -> u32 {
        match self {
            Mode::OamScan { elapsed }
            | Mode::PixelTransfer { elapsed }
            | Mode::HBlank { elapsed }
            | Mode::VBlank { elapsed, .. } => elapsed,
        }
    }

    fn elapsed_mut(&mut self) -> &mut u32 {
        match self {
            Mode::OamScan { elapsed }
            | Mode::PixelTransfer { elapsed }
            | Mode::HBlank { elapsed }
            | Mode::VBlank { elapsed, .. } => elapsed,
        }
    }
}

pub struct Ppu {
    vram: Vec<u8>,
    oam: [u8; OAM_SIZE],

    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    dma: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    /// Internal window line counter
    win_line_counter: u8,

    mode: Mode,
    stat_signal: bool,
    /// Source page of a DMA write not yet serviced by the bus.
    dma_request: Option<u8>,

    tiles: TileCache,
    sprites: SpriteCache,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            vram: vec![0; VRAM_SIZE],
            oam: [0; OAM_SIZE],
            lcdc: 0,
            stat: 0x80,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            dma: 0,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            win_line_counter: 0,
            mode: Mode::OamScan { elapsed: 0 },
            stat_signal: false,
            dma_request: None,
            tiles: TileCache::new(),
            sprites: SpriteCache::new(),
        }
    }

    /// Registers as left by the DMG boot ROM. Timing restarts at line 0.
    pub fn apply_boot_state(&mut self) {
        self.lcdc = 0x91;
        self.dma = 0xFF;
        self.bgp = 0xFC;
        self.ly = 0;
        self.win_line_counter = 0;
        self.mode = Mode::OamScan { elapsed: 0 };
        self.stat_signal = false;
        self.rebuild_stat();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcdc & 0x80 != 0
    }

    fn sprites_enabled(&self) -> bool {
        self.lcdc & 0x02 != 0
    }

    pub fn tile_cache(&self) -> &TileCache {
        &self.tiles
    }

    pub fn sprite_cache(&self) -> &SpriteCache {
        &self.sprites
    }

    pub fn read_vram(&self, addr: u16) -> u8 {
        self.vram[(addr - 0x8000) as usize]
    }

    pub fn write_vram(&mut self, addr: u16, val: u8) {
        let offset = (addr - 0x8000) as usize;
        self.vram[offset] = val;
        if offset < TILE_DATA_END {
            self.tiles.invalidate(offset);
        }
    }

    pub fn read_oam(&self, addr: u16) -> u8 {
        self.oam[(addr - 0xFE00) as usize]
    }

    pub fn write_oam(&mut self, addr: u16, val: u8) {
        let offset = (addr - 0xFE00) as usize;
        self.oam[offset] = val;
        self.sprites.invalidate(offset);
    }

    /// Bulk OAM load used by DMA. Every cached sprite is dropped.
    pub fn load_oam(&mut self, data: &[u8; OAM_SIZE]) {
        self.oam.copy_from_slice(data);
        self.sprites.invalidate_all();
    }

    /// Sprite descriptor for OAM slot `slot`, decoded on a cache miss.
    pub fn sprite(&mut self, slot: usize) -> crate::tile::SpriteAttributes {
        self.sprites.get(slot, &self.oam)
    }

    pub fn take_dma_request(&mut self) -> Option<u8> {
        self.dma_request.take()
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            LCDC => self.lcdc,
            STAT => self.stat | 0x80,
            SCY => self.scy,
            SCX => self.scx,
            LY => self.ly,
            LYC => self.lyc,
            DMA => self.dma,
            BGP => self.bgp,
            OBP0 => self.obp0,
            OBP1 => self.obp1,
            WY => self.wy,
            WX => self.wx,
            _ => 0xFF,
        }
    }

    /// Intercept writes with side effects. Returns true when the write was
    /// handled here.
    pub fn consume_write(&mut self, addr: u16, val: u8) -> bool {
        match addr {
            STAT => self.stat = (self.stat & !STAT_WRITABLE) | (val & STAT_WRITABLE),
            // LY is read-only.
            LY => {}
            DMA => {
                self.dma = val;
                self.dma_request = Some(val);
            }
            _ => return false,
        }
        true
    }

    /// Plain register storage.
    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            LCDC => self.lcdc = val,
            SCY => self.scy = val,
            SCX => self.scx = val,
            LYC => self.lyc = val,
            BGP => self.bgp = val,
            OBP0 => self.obp0 = val,
            OBP1 => self.obp1 = val,
            WY => self.wy = val,
            WX => self.wx = val,
            _ => {}
        }
    }

    /// Advance by `ticks`, carrying any surplus into the following modes.
    pub fn step(&mut self, ticks: u32, irq: &mut Interrupts, screen: &mut dyn Screen) {
        let mut remaining = ticks;
        loop {
            let budget = self.mode.budget();
            let elapsed = self.mode.elapsed_mut();
            let take = remaining.min(budget - *elapsed);
            *elapsed += take;
            remaining -= take;

            if let Mode::VBlank { elapsed, lines } = &mut self.mode {
                let due = *elapsed / LINE_CYCLES;
                let mut advanced = false;
                while *lines < due {
                    *lines += 1;
                    self.ly += 1;
                    debug_assert!(self.ly <= TOTAL_LINES);
                    advanced = true;
                }
                if advanced && self.ly < TOTAL_LINES {
                    self.update_stat(irq);
                }
            }

            if self.mode.elapsed() < budget {
                break;
            }
            self.mode = self.next_mode(irq, screen);

            #[cfg(feature = "ppu-trace")]
            trace!("PPU mode {} at LY={}", self.mode.number(), self.ly);

            self.update_stat(irq);
        }
    }

    fn next_mode(&mut self, irq: &mut Interrupts, screen: &mut dyn Screen) -> Mode {
        match self.mode {
            Mode::OamScan { .. } => Mode::PixelTransfer { elapsed: 0 },
            Mode::PixelTransfer { .. } => {
                self.render_scanline(screen);
                Mode::HBlank { elapsed: 0 }
            }
            Mode::HBlank { .. } => {
                self.ly += 1;
                if self.ly as usize == SCREEN_HEIGHT {
                    if self.lcd_enabled() {
                        irq.request(Interrupt::VBlank);
                    }
                    screen.vblank();
                    Mode::VBlank {
                        elapsed: 0,
                        lines: 0,
                    }
                } else {
                    Mode::OamScan { elapsed: 0 }
                }
            }
            Mode::VBlank { .. } => {
                debug_assert_eq!(self.ly, TOTAL_LINES);
                self.ly = 0;
                self.win_line_counter = 0;
                Mode::OamScan { elapsed: 0 }
            }
        }
    }

    fn rebuild_stat(&mut self) -> bool {
        let coincidence = self.ly == self.lyc;
        let mode_bits = if self.lcd_enabled() {
            self.mode.number()
        } else {
            0
        };
        self.stat = 0x80
            | (self.stat & STAT_WRITABLE)
            | if coincidence { 0x04 } else { 0 }
            | mode_bits;
        coincidence
    }

    /// Refresh STAT and raise the STAT interrupt on a rising edge of the
    /// combined interrupt condition.
    fn update_stat(&mut self, irq: &mut Interrupts) {
        let coincidence = self.rebuild_stat();
        let signal = self.lcd_enabled()
            && ((self.stat & STAT_LYC != 0 && coincidence)
                || match self.mode {
                    Mode::HBlank { .. } => self.stat & STAT_HBLANK != 0,
                    Mode::OamScan { .. } => self.stat & STAT_OAM != 0,
                    Mode::VBlank { .. } => self.stat & (STAT_VBLANK | STAT_OAM) != 0,
                    Mode::PixelTransfer { .. } => false,
                });
        if signal && !self.stat_signal {
            irq.request(Interrupt::Stat);
        }
        self.stat_signal = signal;
    }

    #[inline(always)]
    fn dmg_shade(palette: u8, color_id: u8) -> u32 {
        DMG_PALETTE[((palette >> (color_id * 2)) & 0x03) as usize]
    }

    /// Tile number for a raw map entry under the LCDC-selected addressing.
    fn tile_index(&self, raw: u8) -> usize {
        if self.lcdc & 0x10 != 0 {
            raw as usize
        } else {
            (256 + raw as i8 as i16) as usize
        }
    }

    fn map_code(&mut self, map_base: usize, x: usize, y: usize) -> u8 {
        let raw = self.vram[map_base + (y / TILE_HEIGHT) * 32 + x / TILE_WIDTH];
        let index = self.tile_index(raw);
        self.tiles
            .get(index, &self.vram)
            .color_code(x % TILE_WIDTH, y % TILE_HEIGHT)
    }

    fn render_scanline(&mut self, screen: &mut dyn Screen) {
        if !self.lcd_enabled() || self.ly as usize >= SCREEN_HEIGHT {
            return;
        }

        // Background colour codes before palette mapping; sprites need them
        // to resolve priority.
        let mut bg_codes = [0u8; SCREEN_WIDTH];

        if self.lcdc & 0x01 != 0 {
            let map_base = if self.lcdc & 0x08 != 0 {
                BG_MAP_1_BASE
            } else {
                BG_MAP_0_BASE
            };
            let y = self.ly.wrapping_add(self.scy) as usize;
            for (x, code) in bg_codes.iter_mut().enumerate() {
                let px = (x as u8).wrapping_add(self.scx) as usize;
                *code = self.map_code(map_base, px, y);
            }

            if self.lcdc & 0x20 != 0 && self.ly >= self.wy && self.wx <= WINDOW_X_MAX {
                let map_base = if self.lcdc & 0x40 != 0 {
                    BG_MAP_1_BASE
                } else {
                    BG_MAP_0_BASE
                };
                let left = self.wx as i16 - 7;
                let window_y = self.win_line_counter as usize;
                for x in left.max(0) as usize..SCREEN_WIDTH {
                    let window_x = (x as i16 - left) as usize;
                    bg_codes[x] = self.map_code(map_base, window_x, window_y);
                }
                self.win_line_counter = self.win_line_counter.wrapping_add(1);
            }
        }

        let mut line = [0u32; SCREEN_WIDTH];
        for (pixel, &code) in line.iter_mut().zip(bg_codes.iter()) {
            *pixel = Self::dmg_shade(self.bgp, code);
        }

        if self.sprites_enabled() {
            self.render_sprites(&bg_codes, &mut line);
        }

        screen.render_line(&line, self.ly);
    }

    fn render_sprites(&mut self, bg_codes: &[u8; SCREEN_WIDTH], line: &mut [u32; SCREEN_WIDTH]) {
        let ly = self.ly;
        let mut visible = Vec::new();
        for slot in 0..SPRITE_COUNT {
            let sprite = self.sprites.get(slot, &self.oam);
            if sprite.covers_line(ly) {
                visible.push((slot, sprite));
            }
        }
        // Lower X wins, then lower OAM index.
        visible.sort_by_key(|&(slot, sprite)| (sprite.x, slot));

        let mut drawn = [false; SCREEN_WIDTH];
        for (_, sprite) in visible {
            let mut row = (ly as i16 - sprite.y) as usize;
            debug_assert!(row < TILE_HEIGHT);
            if sprite.y_flip {
                row = TILE_HEIGHT - 1 - row;
            }
            let tile = self.tiles.get(sprite.tile as usize, &self.vram);
            let palette = if sprite.palette1 { self.obp1 } else { self.obp0 };
            for px in 0..TILE_WIDTH {
                let sx = sprite.x + px as i16;
                if !(0..SCREEN_WIDTH as i16).contains(&sx) || drawn[sx as usize] {
                    continue;
                }
                let col = if sprite.x_flip { TILE_WIDTH - 1 - px } else { px };
                let code = tile.color_code(col, row);
                if code == 0 {
                    continue;
                }
                let sx = sx as usize;
                drawn[sx] = true;
                if sprite.priority == SpritePriority::Behind && bg_codes[sx] != 0 {
                    continue;
                }
                line[sx] = Self::dmg_shade(palette, code);
            }
        }
    }

    /// Every tile in VRAM laid out [`TILE_SHEET_COLUMNS`] tiles per row,
    /// shaded through BGP.
    pub fn tile_sheet(&mut self) -> Vec<u32> {
        let rows = TILE_COUNT / TILE_SHEET_COLUMNS;
        let width = TILE_SHEET_COLUMNS * TILE_WIDTH;
        let mut out = vec![0u32; width * rows * TILE_HEIGHT];
        for index in 0..TILE_COUNT {
            let tile = self.tiles.get(index, &self.vram);
            let ox = (index % TILE_SHEET_COLUMNS) * TILE_WIDTH;
            let oy = (index / TILE_SHEET_COLUMNS) * TILE_HEIGHT;
            for y in 0..TILE_HEIGHT {
                for x in 0..TILE_WIDTH {
                    out[(oy + y) * width + ox + x] =
                        Self::dmg_shade(self.bgp, tile.color_code(x, y));
                }
            }
        }
        out
    }

    /// The full 256x256 background map `map` (0 or 1) under the current tile
    /// addressing mode.
    pub fn background_map(&mut self, map: u8) -> Vec<u32> {
        let map_base = if map != 0 { BG_MAP_1_BASE } else { BG_MAP_0_BASE };
        let mut out = vec![0u32; BG_MAP_SIZE * BG_MAP_SIZE];
        for y in 0..BG_MAP_SIZE {
            for x in 0..BG_MAP_SIZE {
                let code = self.map_code(map_base, x, y);
                out[y * BG_MAP_SIZE + x] = Self::dmg_shade(self.bgp, code);
            }
        }
        out
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
