//! Ordered collection of tiled image items
//!
//! The world owns every item, assigns paint order (index 0 is the bottom of
//! the stack), and keeps indices contiguous across adds, removals, and
//! moves. Every reorder is a stable move: items between the old and new
//! slot shift by one, and the relative order of everything untouched is
//! preserved.

use std::sync::Arc;

use crate::core::config::EngineOptions;
use crate::events::{EngineEvent, EventSink};
use crate::items::pyramid::{Pyramid, SourceSpec};
use crate::items::{ItemId, ItemOptions, TiledImage};
use crate::prelude::HashMap;
use crate::tiles::TileCache;
use crate::{EngineError, Result};

const SEQUENCE_MESSAGE: &str = "sequences cannot be added; add them one at a time";

pub struct World {
    items: Vec<TiledImage>,
    index_of: HashMap<ItemId, usize>,
    next_id: u64,
    cache: Arc<TileCache>,
    events: EventSink,
    options: EngineOptions,
}

impl World {
    pub(crate) fn new(cache: Arc<TileCache>, events: EventSink, options: EngineOptions) -> Self {
        Self {
            items: Vec::new(),
            index_of: HashMap::default(),
            next_id: 0,
            cache,
            events,
            options,
        }
    }

    /// Constructs an item from its options and inserts it at
    /// `options.index` (clamped; appended by default). Sequence sources are
    /// refused: the failure is reported as an `add-item-failed` event
    /// carrying the original options so the caller can expand the batch
    /// into individual adds.
    pub fn add_item(&mut self, options: ItemOptions) -> Result<ItemId> {
        let descriptor = match &options.source {
            SourceSpec::Single(descriptor) => descriptor.clone(),
            SourceSpec::Sequence(sources) => {
                let message = SEQUENCE_MESSAGE.to_string();
                log::warn!("refusing sequence source of {} entries", sources.len());
                self.events.emit(EngineEvent::AddItemFailed {
                    message: message.clone(),
                    options: Box::new(options.clone()),
                });
                return Err(EngineError::CompositeNotSupported(message));
            }
        };

        let pyramid = Pyramid::from_descriptor(&descriptor)?;
        let index = options.index.unwrap_or(self.items.len()).min(self.items.len());

        let id = ItemId(self.next_id);
        let item = TiledImage::new(
            id,
            pyramid,
            &options,
            self.cache.clone(),
            self.events.clone(),
            &self.options,
        )?;
        self.next_id += 1;

        self.items.insert(index, item);
        self.reindex_from(index);
        log::debug!("added {} at index {}", id, index);
        self.events.emit(EngineEvent::AddItem { item: id, index });
        Ok(id)
    }

    /// Detaches and destroys an item, compacting the indices above it
    pub fn remove_item(&mut self, item: ItemId) -> Result<()> {
        let Some(&index) = self.index_of.get(&item) else {
            return Err(EngineError::NotFound);
        };

        let mut removed = self.items.remove(index);
        removed.destroy();
        self.index_of.remove(&item);
        self.reindex_from(index);
        log::debug!("removed {} from index {}", item, index);
        self.events.emit(EngineEvent::RemoveItem { item });
        Ok(())
    }

    /// Moves an item to `new_index` with a stable shift of everything in
    /// between. A move to the current index is a no-op and emits nothing.
    pub fn set_item_index(&mut self, item: ItemId, new_index: usize) -> Result<()> {
        let Some(&previous_index) = self.index_of.get(&item) else {
            return Err(EngineError::NotFound);
        };
        if new_index >= self.items.len() {
            return Err(EngineError::IndexOutOfRange {
                index: new_index,
                count: self.items.len(),
            });
        }
        if new_index == previous_index {
            return Ok(());
        }

        let moved = self.items.remove(previous_index);
        self.items.insert(new_index, moved);
        self.reindex_from(previous_index.min(new_index));
        self.events.emit(EngineEvent::ItemIndexChange {
            item,
            previous_index,
            new_index,
        });
        Ok(())
    }

    pub fn item_at(&self, index: usize) -> Option<&TiledImage> {
        self.items.get(index)
    }

    pub fn item_at_mut(&mut self, index: usize) -> Option<&mut TiledImage> {
        self.items.get_mut(index)
    }

    pub fn item(&self, id: ItemId) -> Option<&TiledImage> {
        self.index_of.get(&id).map(|&index| &self.items[index])
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut TiledImage> {
        let index = *self.index_of.get(&id)?;
        Some(&mut self.items[index])
    }

    /// O(1); `None` for non-members
    pub fn index_of_item(&self, id: ItemId) -> Option<usize> {
        self.index_of.get(&id).copied()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Items in paint order, bottom first
    pub fn iter(&self) -> impl Iterator<Item = &TiledImage> {
        self.items.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut TiledImage> {
        self.items.iter_mut()
    }

    /// True when any member has pending visual work
    pub fn needs_draw(&self) -> bool {
        self.items.iter().any(|item| item.needs_draw())
    }

    fn reindex_from(&mut self, start: usize) {
        for index in start..self.items.len() {
            self.index_of.insert(self.items[index].id(), index);
        }
    }
}
