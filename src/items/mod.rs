//! Tiled image items and their pyramid geometry

pub mod pyramid;
pub mod tiled_image;

pub use pyramid::{Pyramid, PyramidDescriptor, PyramidLevel, SourceSpec};
pub use tiled_image::{TileDraw, TiledImage};

use std::fmt;
use std::sync::Arc;

use crate::core::geom::Rect;
use crate::tiles::loader::TileFetcher;

/// Opaque handle identifying a world member. Stays valid until the item is
/// removed; all cross-component references (events, lookups) use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Everything needed to add one item to a world: the source, the fetcher
/// that produces its tile bytes, and the initial placement.
#[derive(Clone)]
pub struct ItemOptions {
    pub source: SourceSpec,
    pub fetcher: Arc<dyn TileFetcher>,
    /// Initial position in logical space
    pub x: f64,
    pub y: f64,
    /// Initial logical width; height follows the content aspect ratio
    pub width: f64,
    pub opacity: f64,
    /// Optional clip rectangle in content pixels
    pub clip: Option<Rect>,
    /// Insertion index; appended when absent
    pub index: Option<usize>,
}

impl ItemOptions {
    pub fn new(source: SourceSpec, fetcher: Arc<dyn TileFetcher>) -> Self {
        Self {
            source,
            fetcher,
            x: 0.0,
            y: 0.0,
            width: 1.0,
            opacity: 1.0,
            clip: None,
            index: None,
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_clip(mut self, clip: Rect) -> Self {
        self.clip = Some(clip);
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl fmt::Debug for ItemOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemOptions")
            .field("source", &self.source)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("opacity", &self.opacity)
            .field("clip", &self.clip)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
