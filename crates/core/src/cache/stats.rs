//! Cache observability counters

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters bumped on every cache read and request outcome
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub rate_limit_blocks: AtomicU64,
    pub cooldown_blocks: AtomicU64,
    pub saturation_blocks: AtomicU64,
    pub dedup_blocks: AtomicU64,
    pub fetches_dispatched: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheCounters {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of cache activity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CacheStats {
    /// Cells currently stored (fresh or not yet swept)
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 before the first read
    pub hit_rate: f64,
    /// Requests dropped by the global pacing window
    pub rate_limit_blocks: u64,
    /// Requests dropped by the per-cell cooldown
    pub cooldown_blocks: u64,
    /// Fetches currently awaiting the provider
    pub in_flight_count: usize,
    /// Requests dropped because the concurrency cap was reached
    pub saturation_blocks: u64,
    /// Requests dropped because the same cell was already in flight
    pub dedup_blocks: u64,
    pub fetches_dispatched: u64,
    pub fetch_failures: u64,
    pub evictions: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cells={} hit_rate={:.1}% ({} hits / {} misses) in_flight={} dispatched={} failed={} \
             blocked: rate={} cooldown={} saturated={} dedup={} evicted={}",
            self.size,
            self.hit_rate * 100.0,
            self.hits,
            self.misses,
            self.in_flight_count,
            self.fetches_dispatched,
            self.fetch_failures,
            self.rate_limit_blocks,
            self.cooldown_blocks,
            self.saturation_blocks,
            self.dedup_blocks,
            self.evictions
        )
    }
}
