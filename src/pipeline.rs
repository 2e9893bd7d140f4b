//! Per-frame update driver
//!
//! An external frame loop owns the timing source and calls
//! [`UpdatePipeline::tick`] once per rendering frame. Each tick advances
//! every item's springs, reruns tile selection against the current logical
//! viewport, assembles the render plan for the drawer, and then pumps the
//! cache's load completions so finished tiles show up next frame. Within a
//! frame, every `update-level` notification precedes any `update-tile`
//! from that frame's completions, and `update-tile` follows completion
//! order rather than request order.

use std::sync::Arc;

use crate::core::config::{EngineOptions, EngineProfile};
use crate::core::geom::Rect;
use crate::core::space::Viewport;
use crate::events::{EngineEvent, EventBus};
use crate::items::tiled_image::TileDraw;
use crate::items::ItemId;
use crate::tiles::TileCache;
use crate::world::World;

/// Everything the drawer needs for one item, in paint order
#[derive(Debug, Clone)]
pub struct ItemFrame {
    pub item: ItemId,
    /// Eased on-screen bounds in logical space
    pub bounds: Rect,
    pub opacity: f64,
    /// Rotation about the bounds center, degrees
    pub rotation: f64,
    /// Clip rectangle in content pixels, when set
    pub clip: Option<Rect>,
    /// Resolved tiles, coarse levels first
    pub tiles: Vec<TileDraw>,
}

/// Per-frame output consumed by the external drawer
#[derive(Debug, Clone, Default)]
pub struct RenderPlan {
    pub items: Vec<ItemFrame>,
}

/// What one tick produced
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub tick: u64,
    /// Some animated value is still easing
    pub animating: bool,
    /// The frame driver should schedule another frame soon
    pub needs_frame: bool,
    pub plan: RenderPlan,
}

pub struct UpdatePipeline {
    world: World,
    cache: Arc<TileCache>,
    events: EventBus,
    viewport: Viewport,
    tick: u64,
}

impl UpdatePipeline {
    pub fn new(profile: EngineProfile) -> Self {
        Self::with_options(profile.resolve())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let cache = Arc::new(TileCache::with_policy(
            options.tile_cache_capacity,
            options.overflow_policy,
        ));
        let events = EventBus::new();
        let world = World::new(cache.clone(), events.sink(), options);
        Self {
            world,
            cache,
            events,
            viewport: Viewport::default(),
            tick: 0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Sets the logical viewport the next tick selects tiles against
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Removes and returns all queued events, oldest first
    pub fn drain_events(&self) -> Vec<EngineEvent> {
        self.events.drain()
    }

    /// Advances the engine by one frame of `elapsed` fractional time
    pub fn tick(&mut self, elapsed: f64) -> FrameReport {
        self.tick += 1;
        let tick = self.tick;
        self.cache.begin_frame(tick);

        // 1. Animations
        let mut animating = false;
        let mut finished = Vec::new();
        for item in self.world.iter_mut() {
            let step = item.advance_animation(elapsed);
            if step.finished {
                finished.push(item.id());
            }
            animating |= !item.is_settled();
        }
        let sink = self.events.sink();
        for item in finished {
            sink.emit(EngineEvent::AnimationFinish { item });
        }

        // 2. Level and tile selection, per item in paint order
        let viewport = self.viewport;
        for item in self.world.iter_mut() {
            item.update_levels_and_tiles(&viewport, tick);
        }

        // 3. Render plan for the drawer
        let plan = RenderPlan {
            items: self
                .world
                .iter()
                .filter(|item| !item.is_destroyed())
                .map(|item| ItemFrame {
                    item: item.id(),
                    bounds: item.bounds(true),
                    opacity: item.opacity(true),
                    rotation: item.rotation(true),
                    clip: item.clip(),
                    tiles: item.draw_list().to_vec(),
                })
                .collect(),
        };
        for item in self.world.iter_mut() {
            item.mark_drawn();
        }

        // 4. Pump load completions; finished tiles land in next frame's
        // plan and keep needs_frame alive until drawn
        for done in self.cache.process_completions() {
            match done.result {
                Ok(data) => {
                    let mut owners = Vec::new();
                    for item in self.world.iter_mut() {
                        if item.note_tile_loaded(&done.tile, data.clone()) {
                            owners.push(item.id());
                        }
                    }
                    if owners.is_empty() {
                        log::debug!("tile {} completed with no owners", done.tile);
                    }
                    for item in owners {
                        sink.emit(EngineEvent::UpdateTile {
                            item,
                            tile: done.tile.clone(),
                        });
                    }
                }
                Err(error) => {
                    sink.emit(EngineEvent::TileLoadFailed {
                        tile: done.tile,
                        error,
                    });
                }
            }
        }

        // 5. Reclaim released tiles past capacity
        self.cache.evict_if_needed();

        FrameReport {
            tick,
            animating,
            needs_frame: animating || self.world.needs_draw(),
            plan,
        }
    }
}
