//! Shared tile storage and asynchronous loading

pub mod cache;
pub mod loader;

pub use cache::{Acquire, CacheStats, CompletedTile, TileCache};
pub use loader::{LoadResult, TileFetcher};

use std::fmt;
use std::sync::Arc;

/// Decoded tile payload; opaque to the engine, shared with the drawer
pub type TileData = Arc<Vec<u8>>;

/// Unique key for a cached tile: the owning pyramid's content identity plus
/// the tile's level and grid position.
///
/// The source key identifies content, not an item: two items opened from
/// the same source share the same tiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileFingerprint {
    /// Content identity of the owning pyramid
    pub source: Arc<str>,
    /// Pyramid level index (0 = coarsest)
    pub level: u32,
    /// Tile column (0-indexed from left)
    pub col: u32,
    /// Tile row (0-indexed from top)
    pub row: u32,
}

impl TileFingerprint {
    pub fn new(source: impl Into<Arc<str>>, level: u32, col: u32, row: u32) -> Self {
        Self {
            source: source.into(),
            level,
            col,
            row,
        }
    }
}

impl fmt::Display for TileFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}/{}_{}",
            self.source, self.level, self.col, self.row
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_equality() {
        let a = TileFingerprint::new("pyramid.dzi", 3, 1, 2);
        let b = TileFingerprint::new("pyramid.dzi", 3, 1, 2);
        let c = TileFingerprint::new("pyramid.dzi", 3, 2, 1);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_display() {
        let fp = TileFingerprint::new("img", 2, 4, 5);
        assert_eq!(fp.to_string(), "img#2/4_5");
    }
}
