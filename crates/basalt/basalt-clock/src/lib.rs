//! `basalt-clock`: syscall-free timestamps for the hot path.
//!
//! A [`CoarseClock`] owns one atomic nanosecond counter and one background
//! worker that refreshes it from the system clock every
//! [`UPDATE_INTERVAL`]. `now()` is a single relaxed atomic load: no syscall,
//! no allocation, no blocking. The trade is bounded staleness: any value
//! returned is at most one update interval plus one clock read behind wall
//! time.
//!
//! Latency arithmetic tolerates the staleness because both endpoints of a
//! same-host measurement read clocks driven from the same epoch (Unix epoch
//! via `SystemTime`), so the shared offset cancels. Across hosts it does not
//! cancel and the measurement is only as good as the hosts' clock sync.

mod latency;

pub use latency::LatencyStats;

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Refresh period of the background updater.
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("failed to spawn clock updater thread")]
    Spawn(#[source] std::io::Error),
}

struct Shared {
    cached_ns: AtomicI64,
    running: AtomicBool,
}

/// A cached wall clock with a relaxed-atomic read path.
///
/// The updater thread is joined on drop; after drop no further stores to the
/// cached value occur. The clock is not `Clone`; exactly one worker exists
/// per instance.
pub struct CoarseClock {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl CoarseClock {
    /// Primes the cached value from the system clock and starts the updater.
    /// Fails only if the worker thread cannot be spawned.
    pub fn start() -> Result<Self, ClockError> {
        let shared = Arc::new(Shared {
            cached_ns: AtomicI64::new(wall_clock_ns()),
            running: AtomicBool::new(true),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("coarse-clock".into())
            .spawn(move || {
                while worker_shared.running.load(Ordering::Relaxed) {
                    // fetch_max clamps any backward step of the wall clock,
                    // keeping now() monotonically non-decreasing.
                    worker_shared
                        .cached_ns
                        .fetch_max(wall_clock_ns(), Ordering::Relaxed);
                    thread::sleep(UPDATE_INTERVAL);
                }
            })
            .map_err(ClockError::Spawn)?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Nanoseconds since the Unix epoch, as of the last updater refresh.
    #[inline(always)]
    pub fn now(&self) -> i64 {
        self.shared.cached_ns.load(Ordering::Relaxed)
    }
}

impl Drop for CoarseClock {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[inline(always)]
fn wall_clock_ns() -> i64 {
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    t.as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonically_non_decreasing() {
        let clock = CoarseClock::start().unwrap();
        let mut prev = clock.now();
        for _ in 0..1_000_000 {
            let t = clock.now();
            assert!(t >= prev);
            prev = t;
        }
    }

    #[test]
    fn now_tracks_the_system_clock_within_one_interval() {
        let clock = CoarseClock::start().unwrap();
        thread::sleep(UPDATE_INTERVAL + Duration::from_millis(50));

        let cached = clock.now();
        let wall = wall_clock_ns();
        let lag = wall - cached;
        assert!(lag >= 0, "cached clock ran ahead of wall time");
        // One interval of staleness plus generous scheduling slack.
        assert!(
            lag < 2 * UPDATE_INTERVAL.as_nanos() as i64,
            "cached clock lagged by {lag} ns"
        );
    }

    #[test]
    fn hot_path_does_not_hit_the_system_clock() {
        let clock = CoarseClock::start().unwrap();
        let start = std::time::Instant::now();
        let mut acc = 0i64;
        for _ in 0..10_000_000 {
            acc = acc.wrapping_add(clock.now());
        }
        std::hint::black_box(acc);
        // 10M relaxed loads finish in tens of milliseconds; 10M syscalls
        // would take seconds. The generous bound keeps CI noise out.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn drop_joins_the_updater() {
        let clock = CoarseClock::start().unwrap();
        let shared = Arc::clone(&clock.shared);
        drop(clock);
        assert!(!shared.running.load(Ordering::Relaxed));
        let frozen = shared.cached_ns.load(Ordering::Relaxed);
        thread::sleep(UPDATE_INTERVAL + Duration::from_millis(50));
        assert_eq!(shared.cached_ns.load(Ordering::Relaxed), frozen);
    }
}
