//! Prelude module for common zoomlet types and traits
//!
//! Re-exports the most commonly used types for easy importing with
//! `use zoomlet::prelude::*;`

pub use crate::core::{
    config::{EngineOptions, EngineProfile, OverflowPolicy},
    geom::{Point, Rect},
    space::{CoordinateSpace, Viewport},
};

pub use crate::animation::spring::{Spring, SpringStep};

pub use crate::events::{EngineEvent, EventBus, EventSink};

pub use crate::items::{
    pyramid::{Pyramid, PyramidDescriptor, PyramidLevel, SourceSpec},
    tiled_image::{TileDraw, TiledImage},
    ItemId, ItemOptions,
};

pub use crate::tiles::{
    cache::{Acquire, CacheStats, TileCache},
    loader::TileFetcher,
    TileData, TileFingerprint,
};

pub use crate::world::World;

pub use crate::pipeline::{FrameReport, ItemFrame, RenderPlan, UpdatePipeline};

pub use crate::{EngineError, Result};

pub use std::sync::Arc;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
