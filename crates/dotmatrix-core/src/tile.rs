//! Decoded tiles and sprite descriptors plus their lazily filled caches.
//!
//! VRAM and OAM stay the source of truth. A cache slot is `None` until a
//! reader needs it, and is reset to `None` whenever one of its backing bytes
//! is written.

pub const TILE_WIDTH: usize = 8;
pub const TILE_HEIGHT: usize = 8;
/// Bytes of VRAM per tile (two bitplanes per row).
pub const TILE_BYTES: usize = 16;
/// Tiles addressable in 0x8000-0x97FF.
pub const TILE_COUNT: usize = 384;

/// Bytes of OAM per sprite.
pub const SPRITE_BYTES: usize = 4;
pub const SPRITE_COUNT: usize = 40;

/// An 8x8 grid of 2-bit colour codes, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pixels: [u8; TILE_WIDTH * TILE_HEIGHT],
}

impl Tile {
    pub fn decode(data: &[u8]) -> Self {
        debug_assert!(data.len() >= TILE_BYTES);
        let mut pixels = [0u8; TILE_WIDTH * TILE_HEIGHT];
        for (row, plane) in data[..TILE_BYTES].chunks_exact(2).enumerate() {
            let (lo, hi) = (plane[0], plane[1]);
            for col in 0..TILE_WIDTH {
                let bit = 7 - col;
                pixels[row * TILE_WIDTH + col] = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
            }
        }
        Self { pixels }
    }

    #[inline]
    pub fn color_code(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * TILE_WIDTH + x]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpritePriority {
    /// Drawn over every background colour.
    Front,
    /// Only visible where the background uses colour code 0.
    Behind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteAttributes {
    /// Top edge in screen coordinates (OAM byte 0 minus 16).
    pub y: i16,
    /// Left edge in screen coordinates (OAM byte 1 minus 8).
    pub x: i16,
    pub tile: u8,
    pub priority: SpritePriority,
    pub y_flip: bool,
    pub x_flip: bool,
    /// false selects OBP0, true selects OBP1.
    pub palette1: bool,
}

impl SpriteAttributes {
    pub fn decode(data: &[u8]) -> Self {
        debug_assert!(data.len() >= SPRITE_BYTES);
        let flags = data[3];
        Self {
            y: data[0] as i16 - 16,
            x: data[1] as i16 - 8,
            tile: data[2],
            priority: if flags & 0x80 != 0 {
                SpritePriority::Behind
            } else {
                SpritePriority::Front
            },
            y_flip: flags & 0x40 != 0,
            x_flip: flags & 0x20 != 0,
            palette1: flags & 0x10 != 0,
        }
    }

    /// Half-open vertical test against an 8-pixel tall sprite.
    pub fn covers_line(&self, line: u8) -> bool {
        let line = line as i16;
        self.y <= line && line < self.y + TILE_HEIGHT as i16
    }
}

pub struct TileCache {
    entries: Vec<Option<Tile>>,
}

impl TileCache {
    pub fn new() -> Self {
        Self {
            entries: vec![None; TILE_COUNT],
        }
    }

    /// Fetch tile `index`, decoding it from `vram` (offset 0 = 0x8000) on a
    /// miss.
    pub fn get(&mut self, index: usize, vram: &[u8]) -> Tile {
        debug_assert!(index < TILE_COUNT);
        *self.entries[index].get_or_insert_with(|| {
            let start = index * TILE_BYTES;
            Tile::decode(&vram[start..start + TILE_BYTES])
        })
    }

    /// Drop the tile backed by VRAM offset `offset`, if any.
    pub fn invalidate(&mut self, offset: usize) {
        if let Some(slot) = self.entries.get_mut(offset / TILE_BYTES) {
            *slot = None;
        }
    }

    pub fn is_cached(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(Option::is_some)
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SpriteCache {
    entries: Vec<Option<SpriteAttributes>>,
}

impl SpriteCache {
    pub fn new() -> Self {
        Self {
            entries: vec![None; SPRITE_COUNT],
        }
    }

    pub fn get(&mut self, slot: usize, oam: &[u8]) -> SpriteAttributes {
        debug_assert!(slot < SPRITE_COUNT);
        *self.entries[slot].get_or_insert_with(|| {
            let start = slot * SPRITE_BYTES;
            SpriteAttributes::decode(&oam[start..start + SPRITE_BYTES])
        })
    }

    pub fn invalidate(&mut self, offset: usize) {
        if let Some(slot) = self.entries.get_mut(offset / SPRITE_BYTES) {
            *slot = None;
        }
    }

    pub fn invalidate_all(&mut self) {
        self.entries.fill(None);
    }

    pub fn is_cached(&self, slot: usize) -> bool {
        self.entries.get(slot).is_some_and(Option::is_some)
    }
}

impl Default for SpriteCache {
    fn default() -> Self {
        Self::new()
    }
}
