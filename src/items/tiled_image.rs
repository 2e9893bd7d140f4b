//! A single positioned image pyramid
//!
//! Owns the item's animated geometry, decides which pyramid level and tile
//! set the current view needs, and keeps the shared cache's refcounts in
//! step with that need. Mutators move animation targets synchronously and
//! return immediately; eased current values only advance on frame ticks.

use std::sync::Arc;

use crate::animation::spring::Spring;
use crate::core::config::EngineOptions;
use crate::core::geom::{Point, Rect};
use crate::core::space::{CoordinateSpace, Viewport};
use crate::events::{EngineEvent, EventSink};
use crate::prelude::{HashMap, HashSet};
use crate::tiles::{Acquire, TileCache, TileData, TileFetcher, TileFingerprint};
use crate::{EngineError, Result};

use super::pyramid::Pyramid;
use super::{ItemId, ItemOptions};

/// One tile ready to paint: payload plus destination in logical space
#[derive(Debug, Clone)]
pub struct TileDraw {
    pub tile: TileFingerprint,
    pub data: TileData,
    pub dest: Rect,
}

/// Result of advancing an item's springs by one tick
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimationStep {
    /// Some current value moved
    pub moved: bool,
    /// Every animated value reached its target on this tick
    pub finished: bool,
}

pub struct TiledImage {
    id: ItemId,
    pyramid: Pyramid,
    fetcher: Arc<dyn TileFetcher>,
    cache: Arc<TileCache>,
    events: EventSink,

    x: Spring,
    y: Spring,
    width: Spring,
    opacity: Spring,
    rotation: Spring,
    clip: Option<Rect>,

    /// Fingerprints we hold a cache reference for (resident or pending)
    held: HashSet<TileFingerprint>,
    /// Payloads for the held tiles that have arrived
    resident: HashMap<TileFingerprint, TileData>,
    draw_list: Vec<TileDraw>,
    last_drawn: Vec<TileFingerprint>,
    tiles_changed: bool,
    drawn_once: bool,
    destroyed: bool,
}

impl TiledImage {
    pub(crate) fn new(
        id: ItemId,
        pyramid: Pyramid,
        options: &ItemOptions,
        cache: Arc<TileCache>,
        events: EventSink,
        engine: &EngineOptions,
    ) -> Result<Self> {
        if !options.width.is_finite() || options.width <= 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "item width must be positive, got {}",
                options.width
            )));
        }
        if !options.x.is_finite() || !options.y.is_finite() {
            return Err(EngineError::InvalidArgument(
                "item position must be finite".into(),
            ));
        }
        if !(0.0..=1.0).contains(&options.opacity) {
            return Err(EngineError::InvalidArgument(format!(
                "opacity must be within [0, 1], got {}",
                options.opacity
            )));
        }
        if let Some(clip) = &options.clip {
            if !clip.is_valid() {
                return Err(EngineError::InvalidArgument(format!(
                    "clip rectangle is invalid: {clip:?}"
                )));
            }
        }

        let spring = |value: f64| {
            Spring::new(value, engine.spring_stiffness).with_epsilon(engine.settle_epsilon)
        };

        Ok(Self {
            id,
            pyramid,
            fetcher: options.fetcher.clone(),
            cache,
            events,
            x: spring(options.x),
            y: spring(options.y),
            width: spring(options.width),
            opacity: spring(options.opacity),
            rotation: spring(0.0),
            clip: options.clip,
            held: HashSet::default(),
            resident: HashMap::default(),
            draw_list: Vec::new(),
            last_drawn: Vec::new(),
            tiles_changed: false,
            drawn_once: false,
            destroyed: false,
        })
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn pyramid(&self) -> &Pyramid {
        &self.pyramid
    }

    /// Intrinsic full-resolution size in pixels
    pub fn content_size(&self) -> Point {
        self.pyramid.content_size()
    }

    /// Bounds height always follows the content aspect ratio
    fn aspect(&self) -> f64 {
        let size = self.content_size();
        size.y / size.x
    }

    /// Target bounds by default; eased current bounds when `current`
    pub fn bounds(&self, current: bool) -> Rect {
        let width = self.width.value(current);
        Rect::new(
            self.x.value(current),
            self.y.value(current),
            width,
            width * self.aspect(),
        )
    }

    pub fn opacity(&self, current: bool) -> f64 {
        self.opacity.value(current)
    }

    pub fn rotation(&self, current: bool) -> f64 {
        self.rotation.value(current)
    }

    pub fn clip(&self) -> Option<Rect> {
        self.clip
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ------------------------------------------------------------------
    // Mutators: target values move synchronously, current values do not.

    pub fn set_position(&mut self, position: Point) -> Result<()> {
        if !position.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "position must be finite, got ({}, {})",
                position.x, position.y
            )));
        }
        if position.x != self.x.target() || position.y != self.y.target() {
            self.x.set_target(position.x);
            self.y.set_target(position.y);
            self.events.emit(EngineEvent::BoundsChange { item: self.id });
        }
        Ok(())
    }

    pub fn set_width(&mut self, width: f64) -> Result<()> {
        if !width.is_finite() || width <= 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "width must be positive, got {width}"
            )));
        }
        if width != self.width.target() {
            self.width.set_target(width);
            self.events.emit(EngineEvent::BoundsChange { item: self.id });
        }
        Ok(())
    }

    pub fn set_height(&mut self, height: f64) -> Result<()> {
        if !height.is_finite() || height <= 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "height must be positive, got {height}"
            )));
        }
        self.set_width(height / self.aspect())
    }

    pub fn set_opacity(&mut self, opacity: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(EngineError::InvalidArgument(format!(
                "opacity must be within [0, 1], got {opacity}"
            )));
        }
        self.opacity.set_target(opacity);
        Ok(())
    }

    pub fn set_rotation(&mut self, degrees: f64) -> Result<()> {
        if !degrees.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "rotation must be finite, got {degrees}"
            )));
        }
        if degrees != self.rotation.target() {
            self.rotation.set_target(degrees);
            self.events.emit(EngineEvent::BoundsChange { item: self.id });
        }
        Ok(())
    }

    pub fn set_clip(&mut self, clip: Option<Rect>) -> Result<()> {
        if let Some(rect) = &clip {
            if !rect.is_valid() {
                return Err(EngineError::InvalidArgument(format!(
                    "clip rectangle is invalid: {rect:?}"
                )));
            }
        }
        if clip != self.clip {
            self.clip = clip;
            self.tiles_changed = true;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Coordinate mapping

    /// Mapping for the settled (target) or on-screen (current) geometry
    pub fn coordinate_space(&self, current: bool) -> CoordinateSpace {
        CoordinateSpace::new(self.bounds(current), self.content_size())
            .with_rotation(self.rotation.value(current))
    }

    pub fn content_to_logical_point(&self, point: &Point, current: bool) -> Point {
        self.coordinate_space(current).content_to_logical_point(point)
    }

    pub fn logical_to_content_point(&self, point: &Point, current: bool) -> Point {
        self.coordinate_space(current).logical_to_content_point(point)
    }

    pub fn content_to_logical_rect(&self, rect: &Rect, current: bool) -> Rect {
        self.coordinate_space(current).content_to_logical_rect(rect)
    }

    pub fn logical_to_content_rect(&self, rect: &Rect, current: bool) -> Rect {
        self.coordinate_space(current).logical_to_content_rect(rect)
    }

    // ------------------------------------------------------------------
    // Frame advancement

    pub fn is_settled(&self) -> bool {
        self.x.is_settled()
            && self.y.is_settled()
            && self.width.is_settled()
            && self.opacity.is_settled()
            && self.rotation.is_settled()
    }

    /// Advances all springs by one tick of `elapsed` fractional time
    pub(crate) fn advance_animation(&mut self, elapsed: f64) -> AnimationStep {
        if self.destroyed {
            return AnimationStep::default();
        }
        let steps = [
            self.x.tick(elapsed),
            self.y.tick(elapsed),
            self.width.tick(elapsed),
            self.opacity.tick(elapsed),
            self.rotation.tick(elapsed),
        ];
        let moved = steps.iter().any(|s| s.changed);
        let settled_now = steps.iter().any(|s| s.settled);
        AnimationStep {
            moved,
            finished: settled_now && self.is_settled(),
        }
    }

    /// True when the item has pending visual work: unsettled animation, a
    /// changed tile set since the last draw, or nothing painted yet
    pub fn needs_draw(&self) -> bool {
        !self.destroyed && (!self.is_settled() || self.tiles_changed || !self.drawn_once)
    }

    /// Tiles to paint for this item, coarse levels first
    pub fn draw_list(&self) -> &[TileDraw] {
        &self.draw_list
    }

    pub(crate) fn mark_drawn(&mut self) {
        if !self.draw_list.is_empty() || self.held.is_empty() {
            self.drawn_once = true;
        }
        self.tiles_changed = false;
    }

    // ------------------------------------------------------------------
    // Tile selection

    /// The core per-frame selection pass: pick the ideal pyramid level for
    /// the current bounds and viewport density, request its tiles, and keep
    /// already-resident tiles from other levels around as a best-available
    /// fallback until the ideal level has fully arrived. Never fails; an
    /// unready level only degrades the draw list.
    pub fn update_levels_and_tiles(&mut self, viewport: &Viewport, tick: u64) {
        if self.destroyed {
            return;
        }

        let bounds = self.bounds(true);
        if bounds.is_empty() {
            self.release_interest();
            return;
        }
        let rotation = self.rotation.current();
        let space = self.coordinate_space(true);

        // Visible logical region: viewport against the item footprint and
        // the clip. Under rotation the footprint is the rotated bounding
        // box and the content region is taken conservatively.
        let footprint = bounds.rotated_bounding_box(&bounds.center(), rotation);
        let Some(mut visible) = viewport.rect.intersection(&footprint) else {
            self.release_interest();
            return;
        };
        if let Some(clip) = self.clip {
            let clip_logical = space.content_to_logical_rect(&clip);
            match visible.intersection(&clip_logical) {
                Some(clipped) => visible = clipped,
                None => {
                    self.release_interest();
                    return;
                }
            }
        }
        if visible.is_empty() {
            self.release_interest();
            return;
        }

        let content_size = self.content_size();
        let content_region = if rotation == 0.0 {
            self.clamp_to_content(space.logical_to_content_rect(&visible))
        } else {
            // Conservative under rotation: the axis-aligned inverse map can
            // miss corners, so consider the full content extent.
            Rect::new(0.0, 0.0, content_size.x, content_size.y)
        };
        let visibility = (visible.area() / footprint.area()).clamp(0.0, 1.0);

        // Ideal level: the coarsest resolution that still meets on-screen
        // pixel density for the item's logical width.
        let needed_width = viewport.pixels_per_unit() * bounds.width;
        let ideal = self.pyramid.level_for_width(needed_width);

        let mut needed: HashSet<TileFingerprint> = HashSet::default();
        for level in 0..=ideal {
            let meta = self.pyramid.levels()[level];
            let level_region = content_region.scaled(meta.scale);
            self.events.emit(EngineEvent::UpdateLevel {
                item: self.id,
                level,
                opacity: self.opacity.current(),
                visibility,
                top_left: level_region.top_left(),
                bottom_right: level_region.bottom_right(),
                tick,
                best: level == ideal,
            });
            if level == ideal {
                if let Some(range) = self.pyramid.tile_range(level, &level_region) {
                    for (col, row) in range.iter() {
                        needed.insert(self.fingerprint(level, col, row));
                    }
                }
            }
        }

        // Best-available retention: while the ideal level is incomplete,
        // keep holding resident tiles from other levels so the frame never
        // goes blank.
        let ideal_complete = needed.iter().all(|fp| self.resident.contains_key(fp));
        let mut keep = needed;
        if !ideal_complete {
            for fp in &self.held {
                if fp.level as usize != ideal && self.resident.contains_key(fp) {
                    keep.insert(fp.clone());
                }
            }
        }

        let dropped: Vec<TileFingerprint> = self
            .held
            .iter()
            .filter(|fp| !keep.contains(*fp))
            .cloned()
            .collect();
        for fp in dropped {
            self.cache.release(&fp);
            self.held.remove(&fp);
            self.resident.remove(&fp);
        }

        for fp in &keep {
            if self.held.contains(fp) {
                self.cache.touch(fp);
            } else {
                if let Acquire::Resident(data) = self.cache.acquire(fp, &self.fetcher) {
                    self.resident.insert(fp.clone(), data);
                }
                self.held.insert(fp.clone());
            }
        }

        self.rebuild_draw_list(&space);
    }

    /// Called by the frame pump when a load this item holds interest in
    /// completes; returns true when the tile was ours.
    pub(crate) fn note_tile_loaded(&mut self, tile: &TileFingerprint, data: TileData) -> bool {
        if self.destroyed || !self.held.contains(tile) {
            return false;
        }
        self.resident.insert(tile.clone(), data);
        self.tiles_changed = true;
        true
    }

    /// Releases every cached tile reference owned by this item without
    /// touching geometry targets; subsequent frames reload from scratch
    pub fn reset(&mut self) {
        for fp in self.held.drain() {
            self.cache.discard(&fp);
        }
        self.resident.clear();
        self.draw_list.clear();
        self.last_drawn.clear();
        self.drawn_once = false;
        self.tiles_changed = true;
    }

    /// Releases all resources and detaches the item; idempotent
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.reset();
        self.destroyed = true;
    }

    fn fingerprint(&self, level: usize, col: u32, row: u32) -> TileFingerprint {
        TileFingerprint {
            source: self.pyramid.key().clone(),
            level: level as u32,
            col,
            row,
        }
    }

    fn clamp_to_content(&self, region: Rect) -> Rect {
        let size = self.content_size();
        region
            .intersection(&Rect::new(0.0, 0.0, size.x, size.y))
            .unwrap_or_default()
    }

    /// Nothing of this item is visible: let go of every reference but keep
    /// the tiles warm in the cache for when it scrolls back in.
    fn release_interest(&mut self) {
        for fp in self.held.drain() {
            self.cache.release(&fp);
        }
        self.resident.clear();
        if !self.draw_list.is_empty() {
            self.draw_list.clear();
            self.tiles_changed = true;
        }
        self.last_drawn.clear();
    }

    fn rebuild_draw_list(&mut self, space: &CoordinateSpace) {
        let mut order: Vec<&TileFingerprint> = self.resident.keys().collect();
        order.sort_by_key(|fp| (fp.level, fp.col, fp.row));

        self.draw_list = order
            .iter()
            .map(|fp| {
                let level = self.pyramid.levels()[fp.level as usize];
                let level_rect = self.pyramid.tile_rect(fp.level as usize, fp.col, fp.row);
                let content_rect = level_rect.scaled(1.0 / level.scale);
                TileDraw {
                    tile: (*fp).clone(),
                    data: self.resident[*fp].clone(),
                    dest: space.content_to_logical_rect(&content_rect),
                }
            })
            .collect();

        let drawn: Vec<TileFingerprint> = order.into_iter().cloned().collect();
        if drawn != self.last_drawn {
            self.tiles_changed = true;
            self.last_drawn = drawn;
        }
    }
}

impl Drop for TiledImage {
    fn drop(&mut self) {
        self.destroy();
    }
}
