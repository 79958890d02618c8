use std::path::PathBuf;

use thiserror::Error;

use crate::entity::Entity;
use crate::geometry::Rect;

/// Decorative, non-simulated tile produced by a loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub key: String,
}

/// Turns map symbols into entities and decorative tiles. Called once per
/// symbol with the cell's top-left pixel position.
pub trait MapLoader {
    fn object(&mut self, symbol: char, x: i32, y: i32) -> Option<Entity>;

    fn tile(&mut self, _symbol: char, _x: i32, _y: i32) -> Option<Tile> {
        None
    }
}

impl<F> MapLoader for F
where
    F: FnMut(char, i32, i32) -> Option<Entity>,
{
    fn object(&mut self, symbol: char, x: i32, y: i32) -> Option<Entity> {
        self(symbol, x, y)
    }
}

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("failed to read map file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapSummary {
    pub width_tiles: u32,
    pub height_tiles: u32,
    pub entity_count: usize,
    pub tile_count: usize,
    pub padded_rows: usize,
}

/// The loaded symbol grid. Ragged rows are padded to the widest row with
/// empty cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    symbols: Vec<Option<char>>,
    tiles: Vec<Option<Tile>>,
}

/// Pixel offset of tile `tiles`, clamped to `i32::MAX`.
pub(crate) fn tiles_to_px(tiles: u32, tile_size: u32) -> i32 {
    i32::try_from(u64::from(tiles) * u64::from(tile_size)).unwrap_or(i32::MAX)
}

pub(crate) fn clamp_px(pixels: u32) -> i32 {
    i32::try_from(pixels).unwrap_or(i32::MAX)
}

impl MapGrid {
    pub(crate) fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let cells = width as usize * height as usize;
        Self {
            width,
            height,
            tile_size,
            symbols: vec![None; cells],
            tiles: vec![None; cells],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn width_px(&self) -> i32 {
        tiles_to_px(self.width, self.tile_size)
    }

    pub fn height_px(&self) -> i32 {
        tiles_to_px(self.height, self.tile_size)
    }

    pub fn bounds_px(&self) -> Rect {
        Rect::new(0, 0, self.width_px(), self.height_px())
    }

    fn index_of(&self, tx: u32, ty: u32) -> Option<usize> {
        if tx >= self.width || ty >= self.height {
            return None;
        }
        Some(ty as usize * self.width as usize + tx as usize)
    }

    pub(crate) fn set_symbol(&mut self, tx: u32, ty: u32, symbol: char) {
        if let Some(index) = self.index_of(tx, ty) {
            self.symbols[index] = Some(symbol);
        }
    }

    pub(crate) fn set_tile(&mut self, tx: u32, ty: u32, tile: Tile) {
        if let Some(index) = self.index_of(tx, ty) {
            self.tiles[index] = Some(tile);
        }
    }

    /// Symbol read from the map source, `None` for padded or out-of-range
    /// cells.
    pub fn symbol_at(&self, tx: u32, ty: u32) -> Option<char> {
        self.index_of(tx, ty).and_then(|index| self.symbols[index])
    }

    pub fn tile_at(&self, tx: u32, ty: u32) -> Option<&Tile> {
        self.index_of(tx, ty)
            .and_then(|index| self.tiles[index].as_ref())
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().flatten()
    }

    pub fn to_pixels(&self, tiles: f32) -> f32 {
        self.tile_size as f32 * tiles
    }

    pub fn to_tiles(&self, pixels: f32) -> f32 {
        if self.tile_size == 0 {
            return 0.0;
        }
        pixels / self.tile_size as f32
    }

    pub fn tile_bounds(&self, tx: i32, ty: i32) -> Rect {
        let size = clamp_px(self.tile_size);
        Rect::new(tx.saturating_mul(size), ty.saturating_mul(size), size, size)
    }

    pub fn is_aligned_to_grid(&self, x: f32, y: f32) -> bool {
        if self.tile_size == 0 {
            return false;
        }
        let size = self.tile_size as f32;
        x % size == 0.0 && y % size == 0.0
    }

    /// Debug dump: one row per line, each cell followed by a space.
    pub fn as_string(&self) -> String {
        let mut out = String::with_capacity((self.width as usize * 2 + 1) * self.height as usize);
        for ty in 0..self.height {
            for tx in 0..self.width {
                out.push(self.symbol_at(tx, ty).unwrap_or(' '));
                out.push(' ');
            }
            out.push('\n');
        }
        out
    }
}
