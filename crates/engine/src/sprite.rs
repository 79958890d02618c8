use std::sync::Arc;

use image::RgbaImage;

/// Per-pixel opacity of one frame, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    opaque: Vec<bool>,
}

impl AlphaMask {
    pub fn from_fn(width: u32, height: u32, mut is_opaque: impl FnMut(u32, u32) -> bool) -> Self {
        let mut opaque = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                opaque.push(is_opaque(x, y));
            }
        }
        Self {
            width,
            height,
            opaque,
        }
    }

    pub fn solid(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| true)
    }

    /// Builds a mask from an already decoded image; any non-zero alpha counts
    /// as opaque.
    pub fn from_rgba(image: &RgbaImage) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| {
            image.get_pixel(x, y)[3] > 0
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_opaque(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return false;
        }
        self.opaque[y as usize * self.width as usize + x as usize]
    }

    /// Exact overlap test between this mask placed at `(ax, ay)` and `other`
    /// placed at `(bx, by)`. Positions are truncated to whole pixels.
    pub fn overlaps(&self, ax: f32, ay: f32, other: &AlphaMask, bx: f32, by: f32) -> bool {
        let (ax, ay, bx, by) = (ax as i32, ay as i32, bx as i32, by as i32);
        let left = ax.max(bx);
        let top = ay.max(by);
        let right = (ax + self.width as i32).min(bx + other.width as i32);
        let bottom = (ay + self.height as i32).min(by + other.height as i32);

        for y in top..bottom {
            for x in left..right {
                if self.is_opaque(x - ax, y - ay) && other.is_opaque(x - bx, y - by) {
                    return true;
                }
            }
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub mask: Option<Arc<AlphaMask>>,
    pub key: Option<String>,
}

impl Frame {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            mask: None,
            key: None,
        }
    }

    /// Frame whose size is taken from its mask.
    pub fn masked(mask: AlphaMask) -> Self {
        Self {
            width: mask.width(),
            height: mask.height(),
            mask: Some(Arc::new(mask)),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// The size-providing visual attached to every body: a looping cycle of
/// frames. Decoding and drawing happen elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    frames: Vec<Frame>,
    frame_duration_ms: u64,
    elapsed_ms: u64,
    current: usize,
}

impl Default for Sprite {
    fn default() -> Self {
        Self::empty(1, 1)
    }
}

impl Sprite {
    pub fn empty(width: u32, height: u32) -> Self {
        Self::still(Frame::sized(width, height))
    }

    pub fn still(frame: Frame) -> Self {
        Self::animated(vec![frame], 0)
    }

    pub fn animated(frames: Vec<Frame>, frame_duration_ms: u64) -> Self {
        let frames = if frames.is_empty() {
            vec![Frame::sized(1, 1)]
        } else {
            frames
        };
        Self {
            frames,
            frame_duration_ms,
            elapsed_ms: 0,
            current: 0,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frames[self.current]
    }

    pub fn frame_index(&self) -> usize {
        self.current
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn width(&self) -> u32 {
        self.frame().width
    }

    pub fn height(&self) -> u32 {
        self.frame().height
    }

    pub fn mask(&self) -> Option<&AlphaMask> {
        self.frame().mask.as_deref()
    }

    pub fn advance(&mut self, elapsed_ms: u64) {
        if self.frames.len() < 2 || self.frame_duration_ms == 0 {
            return;
        }
        self.elapsed_ms = self.elapsed_ms.saturating_add(elapsed_ms);
        let steps = self.elapsed_ms / self.frame_duration_ms;
        self.elapsed_ms %= self.frame_duration_ms;
        self.current = ((self.current as u64 + steps) % self.frames.len() as u64) as usize;
    }
}
