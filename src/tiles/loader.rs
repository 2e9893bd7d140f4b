//! Asynchronous tile loading plumbing
//!
//! Fetches run on a small pool of detached worker threads shared by every
//! cache in the process; completions travel back over a channel and are
//! drained once per frame. Nothing in here blocks the frame loop.

use crossbeam_channel::{unbounded, Receiver, Sender};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::thread;

use super::TileFingerprint;

/// Number of loader worker threads shared across the process
const WORKER_THREADS: usize = 4;

/// External collaborator that produces tile payloads.
///
/// `fetch` runs on a loader worker thread and may block on I/O or decoding;
/// it is never invoked on the frame loop.
pub trait TileFetcher: Send + Sync + 'static {
    fn fetch(&self, tile: &TileFingerprint) -> crate::Result<Vec<u8>>;
}

/// Completion of one fetch, tagged with the generation it was issued under
#[derive(Debug)]
pub struct LoadResult {
    pub tile: TileFingerprint,
    pub generation: u64,
    pub data: crate::Result<Vec<u8>>,
}

struct LoadJob {
    tile: TileFingerprint,
    generation: u64,
    fetcher: Arc<dyn TileFetcher>,
    reply: Sender<LoadResult>,
}

/// Shared worker pool, spun up on first use. Keeping one pool per process
/// bounds fetch concurrency no matter how many viewers are alive, the same
/// way a shared HTTP client bounds connection setup.
static WORK_QUEUE: Lazy<Sender<LoadJob>> = Lazy::new(|| {
    let (tx, rx) = unbounded::<LoadJob>();
    for n in 0..WORKER_THREADS {
        let rx = rx.clone();
        thread::Builder::new()
            .name(format!("zoomlet-loader-{n}"))
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    log::debug!("fetching tile {}", job.tile);
                    let data = job.fetcher.fetch(&job.tile);
                    if let Err(e) = &data {
                        log::warn!("tile {} fetch failed: {}", job.tile, e);
                    }
                    let _ = job.reply.send(LoadResult {
                        tile: job.tile,
                        generation: job.generation,
                        data,
                    });
                }
            })
            .expect("failed to spawn zoomlet loader worker");
    }
    tx
});

/// Per-cache handle onto the shared pool: dispatches jobs and collects the
/// completions addressed to its cache.
pub(crate) struct TileLoader {
    result_tx: Sender<LoadResult>,
    result_rx: Receiver<LoadResult>,
}

impl TileLoader {
    pub fn new() -> Self {
        let (result_tx, result_rx) = unbounded();
        Self {
            result_tx,
            result_rx,
        }
    }

    /// Queue one fetch; the completion arrives via `try_recv_results`
    pub fn dispatch(&self, tile: TileFingerprint, generation: u64, fetcher: Arc<dyn TileFetcher>) {
        let job = LoadJob {
            tile,
            generation,
            fetcher,
            reply: self.result_tx.clone(),
        };
        let _ = WORK_QUEUE.send(job);
    }

    /// Drain completed fetches without blocking
    pub fn try_recv_results(&self) -> Vec<LoadResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            results.push(result);
        }
        results
    }
}
