//! Shared tile cache with reference counting and LRU eviction
//!
//! One cache is shared by every item in a world (and may be shared wider).
//! Records are refcounted by the items depending on them; a referenced tile
//! is never evicted. Released tiles stay resident ("warm") and are reclaimed
//! in least-recently-used order once capacity is exceeded. Loads are
//! asynchronous and coalesced: at most one fetch is in flight per
//! fingerprint, and a generation counter lets `reset`/`destroy` cancel
//! interest so a late completion is dropped instead of resurrecting a dead
//! slot. All store mutation happens inside this module.

use lru::LruCache;
use std::sync::{Arc, Mutex};

use crate::core::config::OverflowPolicy;
use crate::prelude::HashMap;

use super::loader::{TileFetcher, TileLoader};
use super::{TileData, TileFingerprint};

/// Outcome of an [`TileCache::acquire`] call
#[derive(Debug, Clone)]
pub enum Acquire {
    /// Tile is resident; the payload can be drawn this frame
    Resident(TileData),
    /// A load is in flight (started now or coalesced with an earlier
    /// request); completion arrives through the frame pump
    Pending,
}

/// A load that finished during this frame's pump
#[derive(Debug)]
pub struct CompletedTile {
    pub tile: TileFingerprint,
    pub result: Result<TileData, String>,
    /// False when a strict-capacity cache handed the payload to requesters
    /// without retaining it
    pub retained: bool,
}

/// Observability counters, in tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub resident: usize,
    pub pending: usize,
    pub capacity: usize,
}

struct TileRecord {
    data: TileData,
    refcount: usize,
    last_used_tick: u64,
}

struct Pending {
    generation: u64,
    interest: usize,
}

struct CacheState {
    capacity: usize,
    overflow: OverflowPolicy,
    tick: u64,
    store: HashMap<TileFingerprint, TileRecord>,
    /// Recency order among refcount == 0 records; least recent pops first
    idle: LruCache<TileFingerprint, ()>,
    pending: HashMap<TileFingerprint, Pending>,
    /// Monotonic per-fingerprint load generation
    generations: HashMap<TileFingerprint, u64>,
    /// Last load failure per fingerprint; retried on the next acquire
    failed: HashMap<TileFingerprint, String>,
}

/// Process-shared tile store. Clone the `Arc` handle into every item.
pub struct TileCache {
    state: Mutex<CacheState>,
    loader: TileLoader,
}

impl TileCache {
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, OverflowPolicy::Elastic)
    }

    pub fn with_policy(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(CacheState {
                capacity: capacity.max(1),
                overflow,
                tick: 0,
                store: HashMap::default(),
                idle: LruCache::unbounded(),
                pending: HashMap::default(),
                generations: HashMap::default(),
                failed: HashMap::default(),
            }),
            loader: TileLoader::new(),
        }
    }

    /// Advances the frame counter used for recency stamps
    pub fn begin_frame(&self, tick: u64) {
        self.lock().tick = tick;
    }

    /// Returns the resident tile, bumping its refcount and recency, or
    /// starts an asynchronous load. Concurrent acquires for the same
    /// fingerprint coalesce into a single fetch. A previously failed
    /// fingerprint is retried, never served from a poisoned entry.
    pub fn acquire(&self, tile: &TileFingerprint, fetcher: &Arc<dyn TileFetcher>) -> Acquire {
        let mut state = self.lock();
        let tick = state.tick;

        let resident = state.store.get_mut(tile).map(|record| {
            let was_idle = record.refcount == 0;
            record.refcount += 1;
            record.last_used_tick = tick;
            (record.data.clone(), was_idle)
        });
        if let Some((data, was_idle)) = resident {
            if was_idle {
                state.idle.pop(tile);
            }
            return Acquire::Resident(data);
        }

        if let Some(pending) = state.pending.get_mut(tile) {
            pending.interest += 1;
            return Acquire::Pending;
        }

        if let Some(error) = state.failed.remove(tile) {
            log::debug!("retrying tile {} after failure: {}", tile, error);
        }

        let generation = {
            let counter = state.generations.entry(tile.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        state.pending.insert(
            tile.clone(),
            Pending {
                generation,
                interest: 1,
            },
        );
        self.loader
            .dispatch(tile.clone(), generation, fetcher.clone());
        Acquire::Pending
    }

    /// Refreshes the recency stamp of a tile that is still in use
    pub fn touch(&self, tile: &TileFingerprint) {
        let mut state = self.lock();
        let tick = state.tick;
        if let Some(record) = state.store.get_mut(tile) {
            record.last_used_tick = tick;
            if record.refcount == 0 {
                state.idle.get(tile);
            }
        }
    }

    /// Drops one reference. A record reaching refcount zero stays resident
    /// but becomes eviction-eligible; pending interest reaching zero
    /// cancels the in-flight load.
    pub fn release(&self, tile: &TileFingerprint) {
        let mut state = self.lock();
        if let Some(record) = state.store.get_mut(tile) {
            record.refcount = record.refcount.saturating_sub(1);
            if record.refcount == 0 {
                state.idle.put(tile.clone(), ());
            }
            return;
        }
        state.drop_pending_interest(tile);
    }

    /// Drops one reference and removes the record outright when it was the
    /// last one. Used by item `reset`/`destroy`, which must leave no trace
    /// of their tiles behind.
    pub fn discard(&self, tile: &TileFingerprint) {
        let mut state = self.lock();
        if let Some(record) = state.store.get_mut(tile) {
            record.refcount = record.refcount.saturating_sub(1);
            if record.refcount == 0 {
                state.store.remove(tile);
                state.idle.pop(tile);
                log::debug!("discarded tile {}", tile);
            }
            return;
        }
        state.drop_pending_interest(tile);
    }

    /// Drains finished loads. Stale completions (generation superseded by a
    /// cancel) are dropped without touching the store; failures are
    /// recorded per fingerprint for retry on the next acquire.
    pub fn process_completions(&self) -> Vec<CompletedTile> {
        let results = self.loader.try_recv_results();
        if results.is_empty() {
            return Vec::new();
        }

        let mut state = self.lock();
        let mut completed = Vec::with_capacity(results.len());

        for result in results {
            let live = state
                .pending
                .get(&result.tile)
                .is_some_and(|p| p.generation == result.generation);
            if !live {
                log::debug!("dropping stale load for tile {}", result.tile);
                continue;
            }
            let pending = state.pending.remove(&result.tile).expect("pending vanished");

            match result.data {
                Ok(bytes) => {
                    let data: TileData = Arc::new(bytes);
                    state.failed.remove(&result.tile);

                    let mut retained = true;
                    if state.store.len() >= state.capacity {
                        let excess = state.store.len() + 1 - state.capacity;
                        state.evict_excess(excess);
                        if state.store.len() >= state.capacity
                            && state.overflow == OverflowPolicy::Strict
                        {
                            retained = false;
                        }
                    }
                    if retained {
                        let tick = state.tick;
                        state.store.insert(
                            result.tile.clone(),
                            TileRecord {
                                data: data.clone(),
                                refcount: pending.interest,
                                last_used_tick: tick,
                            },
                        );
                        if pending.interest == 0 {
                            state.idle.put(result.tile.clone(), ());
                        }
                    } else {
                        log::debug!("cache full of referenced tiles; not retaining {}", result.tile);
                    }
                    completed.push(CompletedTile {
                        tile: result.tile,
                        result: Ok(data),
                        retained,
                    });
                }
                Err(error) => {
                    let message = error.to_string();
                    state.failed.insert(result.tile.clone(), message.clone());
                    completed.push(CompletedTile {
                        tile: result.tile,
                        result: Err(message),
                        retained: false,
                    });
                }
            }
        }

        completed
    }

    /// Evicts released records, least recently used first, until the store
    /// is within capacity. Referenced records are never evicted; when only
    /// referenced records remain, capacity overflows instead.
    pub fn evict_if_needed(&self) {
        let mut state = self.lock();
        if state.store.len() > state.capacity {
            let excess = state.store.len() - state.capacity;
            state.evict_excess(excess);
        }
    }

    /// Count of resident tiles
    pub fn num_tiles_loaded(&self) -> usize {
        self.lock().store.len()
    }

    /// True while a load for the fingerprint is in flight
    pub fn is_pending(&self, tile: &TileFingerprint) -> bool {
        self.lock().pending.contains_key(tile)
    }

    /// Last recorded load failure for a fingerprint, if any
    pub fn last_failure(&self, tile: &TileFingerprint) -> Option<String> {
        self.lock().failed.get(tile).cloned()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            resident: state.store.len(),
            pending: state.pending.len(),
            capacity: state.capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().expect("tile cache poisoned")
    }
}

impl CacheState {
    fn drop_pending_interest(&mut self, tile: &TileFingerprint) {
        if let Some(pending) = self.pending.get_mut(tile) {
            pending.interest = pending.interest.saturating_sub(1);
            if pending.interest == 0 {
                // Nobody wants the result anymore; supersede the generation
                // so the completion is dropped on arrival.
                self.pending.remove(tile);
                *self.generations.entry(tile.clone()).or_insert(0) += 1;
                log::debug!("cancelled in-flight load for tile {}", tile);
            }
        }
    }

    fn evict_excess(&mut self, excess: usize) {
        for _ in 0..excess {
            match self.idle.pop_lru() {
                Some((tile, ())) => {
                    self.store.remove(&tile);
                    log::debug!("evicted tile {}", tile);
                }
                None => break,
            }
        }
    }
}
