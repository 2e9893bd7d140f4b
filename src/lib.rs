//! # Zoomlet
//!
//! A Rust-native deep-zoom image engine inspired by OpenSeadragon.
//!
//! This library provides the coordination core of a multi-resolution image
//! viewer: a [`World`] of independently positioned image pyramids, spring
//! animated item geometry, per-frame pyramid-level and tile selection, and a
//! shared reference-counted [`TileCache`]. Rendering, tile transport, and
//! input handling stay outside; the engine hands a drawer a per-frame render
//! plan and consumes tile bytes through a [`TileFetcher`] collaborator.

pub mod animation;
pub mod core;
pub mod events;
pub mod items;
pub mod pipeline;
pub mod prelude;
pub mod tiles;
pub mod world;

// Re-export public API
pub use crate::core::{
    config::{EngineOptions, EngineProfile, OverflowPolicy},
    geom::{Point, Rect},
    space::{CoordinateSpace, Viewport},
};

pub use crate::items::{
    pyramid::{Pyramid, PyramidDescriptor, SourceSpec},
    tiled_image::TiledImage,
    ItemId, ItemOptions,
};

pub use crate::events::{EngineEvent, EventBus};

pub use crate::tiles::{
    cache::{Acquire, CacheStats, TileCache},
    loader::TileFetcher,
    TileData, TileFingerprint,
};

pub use crate::pipeline::{FrameReport, ItemFrame, RenderPlan, UpdatePipeline};

pub use crate::world::World;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("item is not a member of this world")]
    NotFound,

    #[error("index {index} out of range for {count} items")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("composite tile source: {0}")]
    CompositeNotSupported(String),

    #[error("tile load failed: {0}")]
    Load(String),

    #[error("descriptor error: {0}")]
    Descriptor(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, EngineError>;
