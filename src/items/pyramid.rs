//! Pyramid descriptors and resolved level geometry
//!
//! A descriptor is what callers hand to `World::add_item`: the content
//! identity, full-resolution size, tile size, and optionally an explicit
//! level list. Resolution turns it into a [`Pyramid`] with a validated,
//! coarsest-first level chain and the grid math the selection algorithm
//! needs.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::geom::{Point, Rect};
use crate::{EngineError, Result};

pub const DEFAULT_TILE_SIZE: u32 = 256;

fn default_tile_size() -> u32 {
    DEFAULT_TILE_SIZE
}

/// One explicit pyramid level in a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDescriptor {
    pub width: u32,
    pub height: u32,
}

/// Resolved source for a single tiled image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyramidDescriptor {
    /// Content identity; items sharing a key share cached tiles
    pub key: String,
    /// Full-resolution width in pixels
    pub width: u32,
    /// Full-resolution height in pixels
    pub height: u32,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// Explicit levels; a halving chain is generated when empty
    #[serde(default)]
    pub levels: Vec<LevelDescriptor>,
}

impl PyramidDescriptor {
    pub fn new(key: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            key: key.into(),
            width,
            height,
            tile_size: DEFAULT_TILE_SIZE,
            levels: Vec::new(),
        }
    }
}

/// What callers pass to `World::add_item`: either one pyramid, or a
/// sequence batch that the world refuses and reports back for the caller
/// to expand item by item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Single(PyramidDescriptor),
    Sequence(Vec<PyramidDescriptor>),
}

impl SourceSpec {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, SourceSpec::Sequence(_))
    }
}

/// One resolved resolution tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PyramidLevel {
    pub width: u32,
    pub height: u32,
    /// Level pixels per content pixel, in (0, 1]
    pub scale: f64,
}

/// Inclusive tile grid range at one level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min_col: u32,
    pub max_col: u32,
    pub min_row: u32,
    pub max_row: u32,
}

impl TileRange {
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let cols = self.min_col..=self.max_col;
        let min_row = self.min_row;
        let max_row = self.max_row;
        cols.flat_map(move |col| (min_row..=max_row).map(move |row| (col, row)))
    }

    /// Number of tiles the range spans
    pub fn count(&self) -> usize {
        ((self.max_col - self.min_col + 1) as usize) * ((self.max_row - self.min_row + 1) as usize)
    }
}

/// Validated multi-resolution geometry for one content source
#[derive(Debug, Clone)]
pub struct Pyramid {
    key: Arc<str>,
    content_size: Point,
    tile_size: u32,
    /// Coarsest first, strictly increasing in resolution
    levels: Vec<PyramidLevel>,
}

impl Pyramid {
    pub fn from_descriptor(descriptor: &PyramidDescriptor) -> Result<Self> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(EngineError::InvalidArgument(format!(
                "pyramid {} has empty content size {}x{}",
                descriptor.key, descriptor.width, descriptor.height
            )));
        }
        if descriptor.tile_size == 0 {
            return Err(EngineError::InvalidArgument(format!(
                "pyramid {} has zero tile size",
                descriptor.key
            )));
        }

        let levels = if descriptor.levels.is_empty() {
            Self::halving_chain(descriptor.width, descriptor.height, descriptor.tile_size)
        } else {
            let mut explicit = descriptor.levels.clone();
            explicit.sort_by_key(|level| level.width);
            for pair in explicit.windows(2) {
                if pair[1].width <= pair[0].width || pair[1].height <= pair[0].height {
                    return Err(EngineError::InvalidArgument(format!(
                        "pyramid {} levels are not strictly increasing in resolution",
                        descriptor.key
                    )));
                }
            }
            explicit
        };

        let content_width = descriptor.width as f64;
        let levels = levels
            .iter()
            .map(|level| PyramidLevel {
                width: level.width,
                height: level.height,
                scale: level.width as f64 / content_width,
            })
            .collect();

        Ok(Self {
            key: descriptor.key.as_str().into(),
            content_size: Point::new(descriptor.width as f64, descriptor.height as f64),
            tile_size: descriptor.tile_size,
            levels,
        })
    }

    /// Power-of-two chain from the full size down to one tile, coarsest
    /// first
    fn halving_chain(width: u32, height: u32, tile_size: u32) -> Vec<LevelDescriptor> {
        let mut levels = vec![LevelDescriptor { width, height }];
        let (mut w, mut h) = (width, height);
        while w.max(h) > tile_size {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            levels.push(LevelDescriptor {
                width: w,
                height: h,
            });
        }
        levels.reverse();
        levels
    }

    pub fn key(&self) -> &Arc<str> {
        &self.key
    }

    pub fn content_size(&self) -> Point {
        self.content_size
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Picks the level to draw from: the coarsest level whose width still
    /// covers `min_width` level pixels, avoiding upsampling blur while
    /// minimizing bytes fetched. Falls back to the finest level when even
    /// it is too coarse.
    pub fn level_for_width(&self, min_width: f64) -> usize {
        self.levels
            .iter()
            .position(|level| level.width as f64 >= min_width)
            .unwrap_or(self.levels.len() - 1)
    }

    /// Tile grid dimensions at a level
    pub fn tiles_across(&self, level: usize) -> (u32, u32) {
        let level = &self.levels[level];
        (
            level.width.div_ceil(self.tile_size),
            level.height.div_ceil(self.tile_size),
        )
    }

    /// Tile columns and rows at `level` overlapping `region` (in level
    /// pixels), clamped to the grid. Returns `None` when the region misses
    /// the level entirely.
    pub fn tile_range(&self, level: usize, region: &Rect) -> Option<TileRange> {
        let meta = &self.levels[level];
        let level_rect = Rect::new(0.0, 0.0, meta.width as f64, meta.height as f64);
        let region = region.intersection(&level_rect)?;
        if region.is_empty() {
            return None;
        }

        let tile = self.tile_size as f64;
        let (cols, rows) = self.tiles_across(level);
        let min_col = ((region.x / tile).floor() as u32).min(cols - 1);
        let max_col = (((region.right() / tile).ceil() as u32).max(1) - 1).min(cols - 1);
        let min_row = ((region.y / tile).floor() as u32).min(rows - 1);
        let max_row = (((region.bottom() / tile).ceil() as u32).max(1) - 1).min(rows - 1);

        Some(TileRange {
            min_col,
            max_col,
            min_row,
            max_row,
        })
    }

    /// Rectangle of a tile in level pixels, clamped at the right and
    /// bottom edges
    pub fn tile_rect(&self, level: usize, col: u32, row: u32) -> Rect {
        let meta = &self.levels[level];
        let tile = self.tile_size as f64;
        let x = col as f64 * tile;
        let y = row as f64 * tile;
        Rect::new(
            x,
            y,
            (meta.width as f64 - x).min(tile),
            (meta.height as f64 - y).min(tile),
        )
    }
}
