//! Presentation seam between the PPU and whatever displays its output.

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

/// Receives finished scanlines and frame boundaries from the PPU.
///
/// Pixels are packed `0x00RRGGBB`.
pub trait Screen {
    fn render_line(&mut self, pixels: &[u32; SCREEN_WIDTH], line: u8);
    fn vblank(&mut self);
}

/// In-memory screen that keeps the last complete frame.
pub struct FrameBuffer {
    pixels: Vec<u32>,
    frames: u64,
    lines_rendered: u64,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            frames: 0,
            lines_rendered: 0,
        }
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * SCREEN_WIDTH + x]
    }

    /// Number of `vblank` notifications received.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn lines_rendered(&self) -> u64 {
        self.lines_rendered
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for FrameBuffer {
    fn render_line(&mut self, pixels: &[u32; SCREEN_WIDTH], line: u8) {
        let line = line as usize;
        if line >= SCREEN_HEIGHT {
            return;
        }
        let start = line * SCREEN_WIDTH;
        self.pixels[start..start + SCREEN_WIDTH].copy_from_slice(pixels);
        self.lines_rendered += 1;
    }

    fn vblank(&mut self) {
        self.frames += 1;
    }
}
