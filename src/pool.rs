// src/pool.rs
//
// Bounded worker pool over the card links. Workers pull indices off a shared
// atomic cursor and send each outcome through a channel; the caller's thread
// collects results in completion order and feeds the progress sink.
//
// Shared mutable state is exactly: the cursor, the result channel, the
// throttle clock, and the cancel flag. Each fetch/parse is otherwise
// independent.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::consts::{JITTER_MS, REQUEST_PAUSE_MS, WORKERS};
use crate::data::{CardLink, CardRecord};
use crate::error::ScrapeError;
use crate::progress::Progress;

/// One outcome per submitted link, carrying the originating link so callers
/// never rely on positional correspondence.
pub type FetchResult = (CardLink, Result<CardRecord, ScrapeError>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Worker thread count. 1 = deterministic serial mode.
    pub workers: usize,
    /// Minimum spacing between request dispatches, shared across workers.
    /// Politeness, not correctness. Zero disables throttling.
    pub min_request_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: WORKERS,
            min_request_interval: Duration::from_millis(REQUEST_PAUSE_MS),
        }
    }
}

/// Cooperative whole-pool cancellation. Triggering it stops dispatch of new
/// work; in-flight requests finish or time out on their own.
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Shared rate-limiting clock. Each dispatch reserves the next free slot
/// under the lock, then sleeps outside it.
struct Throttle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    fn new(interval: Duration) -> Self {
        Self { interval, last: Mutex::new(None) }
    }

    fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        let wait = {
            let mut last = self.last.lock().unwrap();
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => (prev + self.interval).max(now),
                None => now,
            };
            *last = Some(slot);
            slot.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }
}

pub struct Pool {
    config: PoolConfig,
    cancel: CancelHandle,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        Self::with_cancel(config, CancelHandle::new())
    }

    pub fn with_cancel(config: PoolConfig, cancel: CancelHandle) -> Self {
        Self { config, cancel }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Dispatch `fetch` over every link and return one result per attempted
    /// link, in completion order. Individual failures never block or cancel
    /// sibling tasks, and nothing is retried here; retry policy belongs to
    /// the caller.
    ///
    /// Without cancellation, `results.len() == links.len()` always holds.
    pub fn run<F>(
        &self,
        links: Vec<CardLink>,
        fetch: F,
        mut progress: Option<&mut (dyn Progress + '_)>,
    ) -> Vec<FetchResult>
    where
        F: Fn(&CardLink) -> Result<CardRecord, ScrapeError> + Send + Sync,
    {
        let total = links.len();
        if let Some(p) = progress.as_deref_mut() {
            p.begin(total);
        }
        if total == 0 {
            if let Some(p) = progress.as_deref_mut() {
                p.finish();
            }
            return Vec::new();
        }

        let workers = self.config.workers.clamp(1, total);
        let cursor = AtomicUsize::new(0);
        let throttle = Throttle::new(self.config.min_request_interval);
        let (tx, rx) = mpsc::channel::<FetchResult>();

        let links = &links;
        let cursor = &cursor;
        let throttle = &throttle;
        let cancel = &self.cancel;
        let fetch = &fetch;
        let polite = !self.config.min_request_interval.is_zero();

        let mut results = Vec::with_capacity(total);

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                scope.spawn(move || {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let i = cursor.fetch_add(1, Ordering::Relaxed);
                        if i >= links.len() {
                            break;
                        }
                        throttle.acquire();
                        let link = &links[i];
                        let result = fetch(link);
                        if tx.send((link.clone(), result)).is_err() {
                            break;
                        }
                        if polite {
                            // small desync so workers don't fire in lockstep
                            let jitter = (i as u64) % JITTER_MS;
                            thread::sleep(Duration::from_millis(jitter));
                        }
                    }
                });
            }
            drop(tx); // collection loop below is the sole receiver

            for (link, result) in rx.iter() {
                if let Some(p) = progress.as_deref_mut() {
                    let done = results.len() + 1;
                    let desc = format!("{}: {}", link.event_name, link.url);
                    match &result {
                        Ok(_) => p.item_done(done, total, &desc),
                        Err(e) => p.item_failed(done, total, &format!("{desc}: {e}")),
                    }
                }
                results.push((link, result));
            }
        });

        if let Some(p) = progress.as_deref_mut() {
            p.finish();
        }
        results
    }
}
