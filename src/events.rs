//! Engine event stream
//!
//! Every structural and frame notification flows through one unbounded
//! channel in emission order, so the per-frame ordering guarantees (level
//! passes coarse to fine before that pass's tile completions) hold for any
//! consumer. Components hold cloned [`EventSink`]s; the pipeline owner
//! drains the receiving side once per frame or whenever convenient.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::core::geom::Point;
use crate::items::{ItemId, ItemOptions};
use crate::tiles::TileFingerprint;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// An item joined the world at `index`
    AddItem { item: ItemId, index: usize },
    /// An add request was refused; carries the original options so the
    /// caller can recover (e.g. expand a sequence into single adds)
    AddItemFailed {
        message: String,
        options: Box<ItemOptions>,
    },
    /// An item left the world
    RemoveItem { item: ItemId },
    /// An item moved to a new index; everything between shifted one slot
    ItemIndexChange {
        item: ItemId,
        previous_index: usize,
        new_index: usize,
    },
    /// A geometry target changed (position, size, or rotation)
    BoundsChange { item: ItemId },
    /// One pyramid level was considered during a frame's selection pass
    UpdateLevel {
        item: ItemId,
        level: usize,
        opacity: f64,
        /// Fraction of the item's bounds inside the viewport, in [0, 1]
        visibility: f64,
        /// Considered region in level pixels
        top_left: Point,
        bottom_right: Point,
        /// Frame tick of the pass
        tick: u64,
        /// True for the level actually selected for drawing
        best: bool,
    },
    /// A tile this item requested became resident
    UpdateTile { item: ItemId, tile: TileFingerprint },
    /// A tile fetch failed; it will be retried on the next request
    TileLoadFailed { tile: TileFingerprint, error: String },
    /// All of an item's animated values settled this frame
    AnimationFinish { item: ItemId },
}

/// Cloneable emitting handle
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<EngineEvent>,
}

impl EventSink {
    pub fn emit(&self, event: EngineEvent) {
        // Send can only fail when the consumer side is gone, in which case
        // nobody is listening anyway.
        let _ = self.tx.send(event);
    }
}

/// Owning end of the event stream
pub struct EventBus {
    tx: Sender<EngineEvent>,
    rx: Receiver<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sink(&self) -> EventSink {
        EventSink {
            tx: self.tx.clone(),
        }
    }

    /// Removes and returns all queued events, oldest first
    pub fn drain(&self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_drain_in_emission_order() {
        let bus = EventBus::new();
        let sink = bus.sink();

        for n in 0..3 {
            sink.emit(EngineEvent::RemoveItem { item: ItemId(n) });
        }

        let events = bus.drain();
        assert_eq!(events.len(), 3);
        for (n, event) in events.iter().enumerate() {
            match event {
                EngineEvent::RemoveItem { item } => assert_eq!(item.0, n as u64),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_cloned_sinks_share_the_stream() {
        let bus = EventBus::new();
        let a = bus.sink();
        let b = a.clone();

        a.emit(EngineEvent::RemoveItem { item: ItemId(1) });
        b.emit(EngineEvent::RemoveItem { item: ItemId(2) });

        assert_eq!(bus.drain().len(), 2);
    }
}
