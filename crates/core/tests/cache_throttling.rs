//! Cell cache throttling, deduplication and expiry against scripted sources

use async_trait::async_trait;
use std::future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time;
use tracing_subscriber::EnvFilter;
use wind_viz_core::{
    CellCache, CellKey, Degrees, FetchError, MetersPerSecond, RequestOutcome, WindDataSource,
    WindSample, WindVizConfig,
};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Takes `delay` per fetch and records how many fetches overlap at most
struct SlowSource {
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl SlowSource {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WindDataSource for SlowSource {
    async fn fetch(&self, _lat: f64, _lon: f64) -> Result<WindSample, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(WindSample::new(
            MetersPerSecond::new(4.0),
            Degrees::new(180.0),
        ))
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Never answers for cells north of the equator
struct HangingSource;

#[async_trait]
impl WindDataSource for HangingSource {
    async fn fetch(&self, lat: f64, _lon: f64) -> Result<WindSample, FetchError> {
        if lat > 0.0 {
            future::pending::<()>().await;
        }
        Ok(WindSample::new(
            MetersPerSecond::new(2.0),
            Degrees::new(90.0),
        ))
    }
}

fn config(pacing_ms: u64, max_concurrent: usize) -> WindVizConfig {
    WindVizConfig {
        grid_resolution_deg: 1.0,
        global_rate_limit_ms: pacing_ms,
        max_concurrent,
        ..Default::default()
    }
}

fn keys(n: i32) -> Vec<CellKey> {
    (0..n).map(|i| CellKey::new(-10, i)).collect()
}

/// Long enough for any 1 ms fetch in flight to land
async fn settle() {
    time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_blocks_second_cell_inside_window() {
    let source = Arc::new(SlowSource::new(Duration::from_millis(5)));
    let cache = CellCache::new(&config(400, 4), source.clone(), Handle::current());

    assert_eq!(cache.request(CellKey::new(0, 0)), RequestOutcome::Dispatched);
    time::advance(Duration::from_millis(150)).await;
    assert_eq!(
        cache.request(CellKey::new(0, 1)),
        RequestOutcome::RateLimited {
            retry_in: Duration::from_millis(250)
        }
    );
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().rate_limit_blocks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_twice_in_one_tick_fetches_once() {
    let source = Arc::new(SlowSource::new(Duration::from_millis(50)));
    let cache = CellCache::new(&config(0, 4), source.clone(), Handle::current());
    let key = CellKey::new(3, 3);

    assert_eq!(cache.request(key), RequestOutcome::Dispatched);
    assert_eq!(cache.request(key), RequestOutcome::InFlight);
    time::sleep(Duration::from_millis(60)).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert!(cache.get(key).is_some());
    assert_eq!(cache.stats().dedup_blocks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_never_exceeds_concurrency_cap() {
    let source = Arc::new(SlowSource::new(Duration::from_millis(100)));
    let cache = CellCache::new(&config(10, 2), source.clone(), Handle::current());

    let summary = cache.batch_request(keys(12)).await;
    assert_eq!(summary.dispatched, 12);
    time::sleep(Duration::from_millis(200)).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 12);
    assert!(source.peak.load(Ordering::SeqCst) <= 2);
    let stats = cache.stats();
    assert_eq!(stats.size, 12);
    assert_eq!(stats.in_flight_count, 0);
    // Waiting inside a batch is pacing, not a dropped request
    assert_eq!(stats.rate_limit_blocks, 0);
    assert_eq!(stats.saturation_blocks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_batch_spaces_dispatches_by_pacing_window() {
    let source = Arc::new(SlowSource::new(Duration::from_millis(1)));
    let cache = CellCache::new(&config(250, 8), source.clone(), Handle::current());

    let started = time::Instant::now();
    cache.batch_request(keys(5)).await;
    // Four gaps between five dispatches
    assert!(started.elapsed() >= Duration::from_millis(1_000));
    settle().await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_batch_skips_cells_already_fresh() {
    let source = Arc::new(SlowSource::new(Duration::from_millis(1)));
    let cache = CellCache::new(&config(0, 4), source.clone(), Handle::current());

    cache.batch_request(keys(3)).await;
    settle().await;
    let again = cache.batch_request(keys(4)).await;
    assert_eq!(again.already_cached, 3);
    assert_eq!(again.dispatched, 1);
    settle().await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_batches_share_fetches() {
    let source = Arc::new(SlowSource::new(Duration::from_millis(20)));
    let cache = CellCache::new(&config(0, 8), source.clone(), Handle::current());
    let other = cache.clone();

    let (a, b) = futures::join!(
        cache.batch_request(keys(6)),
        other.batch_request(keys(6))
    );
    assert_eq!(a.dispatched + b.dispatched, 6);
    assert_eq!(a.skipped + b.skipped, 6);
    time::sleep(Duration::from_millis(30)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn test_expired_cell_inside_cooldown_is_not_refetched() {
    let source = Arc::new(SlowSource::new(Duration::from_millis(1)));
    let cfg = WindVizConfig {
        cell_ttl_ms: 10_000,
        cell_cooldown_ms: 60_000,
        ..config(0, 4)
    };
    let cache = CellCache::new(&cfg, source.clone(), Handle::current());
    let key = CellKey::new(7, 7);

    cache.request(key);
    settle().await;
    time::advance(Duration::from_millis(10_000)).await;

    assert!(cache.get(key).is_none());
    assert_eq!(cache.request(key), RequestOutcome::Cooldown);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_fetch_only_blocks_its_own_cell() {
    let cache = CellCache::new(&config(0, 2), Arc::new(HangingSource), Handle::current());
    let hung = CellKey::new(5, 0);
    let healthy = CellKey::new(-5, 0);

    assert_eq!(cache.request(hung), RequestOutcome::Dispatched);
    time::sleep(Duration::from_secs(3_600)).await;
    assert_eq!(cache.request(hung), RequestOutcome::InFlight);

    assert_eq!(cache.request(healthy), RequestOutcome::Dispatched);
    settle().await;
    assert!(cache.get(healthy).is_some());
    assert!(cache.get(hung).is_none());
    assert_eq!(cache.stats().in_flight_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_eviction_sweep_runs_in_background_and_stops_with_cache() {
    let cfg = WindVizConfig {
        cell_ttl_ms: 1_000,
        cell_cooldown_ms: 0,
        ..config(0, 4)
    };
    let cache = CellCache::new(
        &cfg,
        Arc::new(SlowSource::new(Duration::from_millis(1))),
        Handle::current(),
    );
    let sweep = cache.spawn_eviction_sweep(Duration::from_millis(500));

    cache.request(CellKey::new(0, 0));
    settle().await;
    assert_eq!(cache.stats().size, 1);

    time::sleep(Duration::from_millis(1_600)).await;
    let stats = cache.stats();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.evictions, 1);

    drop(cache);
    time::timeout(Duration::from_secs(2), sweep)
        .await
        .expect("sweep should end once the cache is gone")
        .unwrap();
}
