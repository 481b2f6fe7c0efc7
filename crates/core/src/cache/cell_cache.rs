//! Per-cell wind cache with TTL, request deduplication and a three-tier throttle
//!
//! The external wind API has a per-minute quota and wind changes slowly, so
//! the cache gates *fetching* and *serving* separately:
//!
//! 1. **Per-cell cooldown**: a cell fetched within `cell_cooldown_ms` is not
//!    fetched again; whatever is cached keeps serving.
//! 2. **Global pacing**: no two dispatches closer than `global_rate_limit_ms`,
//!    whatever cells they target.
//! 3. **Concurrency cap**: at most `max_concurrent` fetches in flight.
//!
//! TTL only decides whether a stored value is still servable. Keeping it apart
//! from cooldown lets the cache ride out a rate-limit window on slightly old
//! data instead of dropping to zero vectors.
//!
//! # Concurrency
//!
//! Fetches run as tokio tasks on the runtime handle given at construction.
//! Everything else is synchronous. A frame reads through a [`CacheSnapshot`],
//! which holds the read lock for the frame's duration, so a completing fetch
//! waits for the frame to end before its write lands. The most recent
//! completion for a key always wins.
//!
//! A fetch that never resolves leaves its cell marked in flight forever. That
//! only blocks that one cell (and one concurrency slot); nothing times it out
//! beyond the data source itself.

use crate::cache::stats::{CacheCounters, CacheStats};
use crate::config::WindVizConfig;
use crate::error::FetchError;
use crate::grid::{cell_bounds, CellKey};
use crate::wind::{WindCell, WindDataSource, WindSample};
use rustc_hash::FxHashMap;
use std::pin::pin;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Result of a single [`CellCache::request`] call.
///
/// Informational only: every variant except `Dispatched` is a silent no-op
/// and callers are expected to simply try again on a later frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A fetch task was spawned for the cell
    Dispatched,
    /// The cell already has a fetch in flight
    InFlight,
    /// The cell was fetched within the cooldown window
    Cooldown,
    /// Another dispatch happened within the global pacing window
    RateLimited {
        /// Time until the pacing window reopens
        retry_in: Duration,
    },
    /// The concurrency cap is saturated
    Saturated,
}

/// What a [`CellCache::batch_request`] run did with its keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    /// Fetches spawned
    pub dispatched: usize,
    /// Keys skipped because a fresh value was already cached
    pub already_cached: usize,
    /// Keys skipped because they were in flight or cooling down
    pub skipped: usize,
}

/// Per-key fetch bookkeeping, never exposed outside the cache
#[derive(Debug, Clone, Copy)]
struct FetchState {
    last_fetch_at: Instant,
    in_flight: bool,
}

#[derive(Debug, Default)]
struct CacheState {
    cells: FxHashMap<CellKey, WindCell>,
    fetches: FxHashMap<CellKey, FetchState>,
    last_dispatch_at: Option<Instant>,
    in_flight: usize,
}

/// Throttle settings lifted out of [`WindVizConfig`]
#[derive(Debug, Clone, Copy)]
struct CacheSettings {
    resolution_deg: f64,
    ttl: Duration,
    cooldown: Duration,
    global_rate_limit: Duration,
    max_concurrent: usize,
}

struct CacheInner {
    settings: CacheSettings,
    source: Arc<dyn WindDataSource>,
    runtime: Handle,
    state: RwLock<CacheState>,
    counters: CacheCounters,
    slot_freed: Notify,
}

impl CacheInner {
    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn is_fresh(&self, cell: &WindCell, now: Instant) -> bool {
        now.saturating_duration_since(cell.fetched_at) < self.settings.ttl
    }

    /// Record a finished fetch. Failures leave any cached value untouched.
    fn complete(&self, key: CellKey, result: Result<WindSample, FetchError>) {
        {
            let mut state = self.write();
            if let Some(fetch) = state.fetches.get_mut(&key) {
                fetch.in_flight = false;
            }
            state.in_flight = state.in_flight.saturating_sub(1);

            match result {
                Ok(sample) => {
                    let cell = WindCell::from_sample(
                        key,
                        self.settings.resolution_deg,
                        sample,
                        Instant::now(),
                    );
                    debug!(
                        "Stored wind for cell {}: {} from {}",
                        key, sample.speed, sample.direction
                    );
                    state.cells.insert(key, cell);
                }
                Err(err) => {
                    CacheCounters::bump(&self.counters.fetch_failures);
                    warn!("Wind fetch for cell {} failed: {err}", key);
                }
            }
        }
        self.slot_freed.notify_waiters();
    }
}

/// Shared wind cache keyed by grid cell.
///
/// Cloning is cheap and every clone talks to the same store, so several map
/// views (say a thumbnail and a full-screen map) can share one cache and
/// deduplicate their fetches through it.
#[derive(Clone)]
pub struct CellCache {
    inner: Arc<CacheInner>,
}

impl CellCache {
    /// Create an empty cache that spawns fetches on `runtime`
    pub fn new(config: &WindVizConfig, source: Arc<dyn WindDataSource>, runtime: Handle) -> Self {
        let settings = CacheSettings {
            resolution_deg: config.grid_resolution_deg,
            ttl: config.ttl(),
            cooldown: config.cooldown(),
            global_rate_limit: config.global_rate_limit(),
            max_concurrent: config.max_concurrent.max(1),
        };
        info!(
            "Creating wind cell cache: source={}, res={}°, ttl={:?}, cooldown={:?}, pacing={:?}, max_concurrent={}",
            source.name(),
            settings.resolution_deg,
            settings.ttl,
            settings.cooldown,
            settings.global_rate_limit,
            settings.max_concurrent
        );
        Self {
            inner: Arc::new(CacheInner {
                settings,
                source,
                runtime,
                state: RwLock::new(CacheState::default()),
                counters: CacheCounters::default(),
                slot_freed: Notify::new(),
            }),
        }
    }

    /// Grid resolution the cache keys are built with
    #[must_use]
    pub fn resolution_deg(&self) -> f64 {
        self.inner.settings.resolution_deg
    }

    /// Fresh cached value for `key`, if any. Never fetches.
    ///
    /// Must not be called while a [`CacheSnapshot`] from the same thread is
    /// alive; read through the snapshot instead.
    #[must_use]
    pub fn get(&self, key: CellKey) -> Option<WindCell> {
        let now = Instant::now();
        let state = self.inner.read();
        let found = state
            .cells
            .get(&key)
            .filter(|cell| self.inner.is_fresh(cell, now))
            .copied();
        self.record_lookup(found.is_some());
        found
    }

    /// Frame-scoped read view; all lookups through it see one cache state.
    ///
    /// Drop it before calling [`request`](Self::request) or
    /// [`batch_request`](Self::batch_request) on the same thread.
    #[must_use]
    pub fn snapshot(&self) -> CacheSnapshot<'_> {
        CacheSnapshot {
            cache: self,
            state: self.inner.read(),
            now: Instant::now(),
        }
    }

    fn record_lookup(&self, hit: bool) {
        let counters = &self.inner.counters;
        CacheCounters::bump(if hit { &counters.hits } else { &counters.misses });
    }

    /// Fire-and-forget fetch for `key`, subject to all three throttles
    pub fn request(&self, key: CellKey) -> RequestOutcome {
        self.try_dispatch(key, true)
    }

    /// Core of `request`. Pacing and saturation waits from a batch are not
    /// counted as blocks, they are the batch doing its job.
    fn try_dispatch(&self, key: CellKey, count_waits: bool) -> RequestOutcome {
        let inner = &self.inner;
        let settings = inner.settings;
        let counters = &inner.counters;
        let now = Instant::now();

        {
            let mut state = inner.write();
            if let Some(fetch) = state.fetches.get(&key) {
                if fetch.in_flight {
                    CacheCounters::bump(&counters.dedup_blocks);
                    return RequestOutcome::InFlight;
                }
                if now.saturating_duration_since(fetch.last_fetch_at) < settings.cooldown {
                    CacheCounters::bump(&counters.cooldown_blocks);
                    return RequestOutcome::Cooldown;
                }
            }
            if let Some(last) = state.last_dispatch_at {
                let since = now.saturating_duration_since(last);
                if since < settings.global_rate_limit {
                    if count_waits {
                        CacheCounters::bump(&counters.rate_limit_blocks);
                    }
                    return RequestOutcome::RateLimited {
                        retry_in: settings.global_rate_limit - since,
                    };
                }
            }
            if state.in_flight >= settings.max_concurrent {
                if count_waits {
                    CacheCounters::bump(&counters.saturation_blocks);
                }
                return RequestOutcome::Saturated;
            }

            state.fetches.insert(
                key,
                FetchState {
                    last_fetch_at: now,
                    in_flight: true,
                },
            );
            state.last_dispatch_at = Some(now);
            state.in_flight += 1;
        }
        CacheCounters::bump(&counters.fetches_dispatched);

        let center = cell_bounds(key, settings.resolution_deg);
        debug!(
            "Dispatching wind fetch for cell {} at ({:.4}, {:.4})",
            key, center.center_lat, center.center_lon
        );
        let task_inner = Arc::clone(inner);
        inner.runtime.spawn(async move {
            let result = task_inner
                .source
                .fetch(center.center_lat, center.center_lon)
                .await;
            task_inner.complete(key, result);
        });
        RequestOutcome::Dispatched
    }

    /// Request every key that is not already fresh, pacing dispatches so the
    /// batch itself never bursts the provider.
    ///
    /// Waits out the global pacing window and for a free concurrency slot
    /// before each dispatch. Resolves once every key has been dispatched or
    /// skipped; it does not wait for the fetches themselves.
    pub async fn batch_request<I>(&self, keys: I) -> BatchSummary
    where
        I: IntoIterator<Item = CellKey>,
    {
        let mut summary = BatchSummary::default();
        for key in keys {
            if self.has_fresh(key) {
                summary.already_cached += 1;
                continue;
            }
            loop {
                // Registered before the attempt so a completion between the
                // attempt and the await is not missed
                let mut slot_freed = pin!(self.inner.slot_freed.notified());
                slot_freed.as_mut().enable();

                match self.try_dispatch(key, false) {
                    RequestOutcome::Dispatched => {
                        summary.dispatched += 1;
                        break;
                    }
                    RequestOutcome::InFlight | RequestOutcome::Cooldown => {
                        summary.skipped += 1;
                        break;
                    }
                    RequestOutcome::RateLimited { retry_in } => time::sleep(retry_in).await,
                    RequestOutcome::Saturated => slot_freed.await,
                }
            }
        }
        debug!(
            "Batch request finished: {} dispatched, {} cached, {} skipped",
            summary.dispatched, summary.already_cached, summary.skipped
        );
        summary
    }

    /// Run [`batch_request`](Self::batch_request) as a background task on the
    /// cache's runtime
    pub fn spawn_batch(&self, keys: Vec<CellKey>) -> JoinHandle<BatchSummary> {
        let cache = self.clone();
        self.inner
            .runtime
            .spawn(async move { cache.batch_request(keys).await })
    }

    /// Freshness check that does not count as a read
    fn has_fresh(&self, key: CellKey) -> bool {
        let now = Instant::now();
        self.inner
            .read()
            .cells
            .get(&key)
            .is_some_and(|cell| self.inner.is_fresh(cell, now))
    }

    /// Drop every cell older than the TTL; returns how many were removed.
    ///
    /// Idle fetch bookkeeping outside its cooldown is pruned too, so a
    /// long-lived session panning the globe doesn't grow without bound.
    pub fn evict_expired(&self) -> usize {
        let settings = self.inner.settings;
        let now = Instant::now();
        let evicted = {
            let mut state = self.inner.write();
            let before = state.cells.len();
            state
                .cells
                .retain(|_, cell| now.saturating_duration_since(cell.fetched_at) <= settings.ttl);
            state.fetches.retain(|_, fetch| {
                fetch.in_flight
                    || now.saturating_duration_since(fetch.last_fetch_at) < settings.cooldown
            });
            before - state.cells.len()
        };
        if evicted > 0 {
            CacheCounters::add(&self.inner.counters.evictions, evicted as u64);
            debug!("Evicted {} expired wind cells", evicted);
        }
        evicted
    }

    /// Run [`evict_expired`](Self::evict_expired) every `period` in the
    /// background. The task ends by itself once every cache handle is dropped.
    pub fn spawn_eviction_sweep(&self, period: Duration) -> JoinHandle<()> {
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        self.inner.runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                CellCache { inner }.evict_expired();
            }
        })
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        let (size, in_flight_count) = {
            let state = self.inner.read();
            (state.cells.len(), state.in_flight)
        };
        let hits = CacheCounters::load(&counters.hits);
        let misses = CacheCounters::load(&counters.misses);
        let lookups = hits + misses;
        CacheStats {
            size,
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            rate_limit_blocks: CacheCounters::load(&counters.rate_limit_blocks),
            cooldown_blocks: CacheCounters::load(&counters.cooldown_blocks),
            in_flight_count,
            saturation_blocks: CacheCounters::load(&counters.saturation_blocks),
            dedup_blocks: CacheCounters::load(&counters.dedup_blocks),
            fetches_dispatched: CacheCounters::load(&counters.fetches_dispatched),
            fetch_failures: CacheCounters::load(&counters.fetch_failures),
            evictions: CacheCounters::load(&counters.evictions),
        }
    }
}

/// Read view of the cache held for one frame.
///
/// Freshness is judged against the instant the snapshot was taken, and fetch
/// completions block until it is dropped, so every lookup in a frame agrees.
pub struct CacheSnapshot<'a> {
    cache: &'a CellCache,
    state: RwLockReadGuard<'a, CacheState>,
    now: Instant,
}

impl CacheSnapshot<'_> {
    /// Fresh cached value for `key`, if any
    #[must_use]
    pub fn get(&self, key: CellKey) -> Option<&WindCell> {
        let found = self
            .state
            .cells
            .get(&key)
            .filter(|cell| self.cache.inner.is_fresh(cell, self.now));
        self.cache.record_lookup(found.is_some());
        found
    }

    #[must_use]
    pub fn resolution_deg(&self) -> f64 {
        self.cache.resolution_deg()
    }
}
