//! `slate-engine`: the shared-memory consumer.
//!
//! Attaches to the publisher's segment, views its base as the SPSC ring, and
//! polls. Each record read gets a one-way latency measurement,
//! `now() - record.timestamp_ns`, against this process's own cached clock.
//! Both clocks are driven from the same epoch, so the shared offset cancels
//! on one host.
//!
//! The empty-ring policy is spin-then-yield: up to [`SPIN_LIMIT`]
//! consecutive empty polls busy-spin for minimum wake-up latency, after
//! which the loop sleeps [`IDLE_SLEEP`] so an idle producer does not pin a
//! core at 100%.
//!
//! The engine never mutates the segment beyond the read cursor and never
//! unlinks it; shutdown just drops the mapping.

use basalt_clock::{ClockError, CoarseClock, LatencyStats};
use basalt_events::QuoteTick;
use basalt_icc::{RingError, SpscRing, RING_BYTES};
use basalt_shm::{ShmError, ShmSegment};
use slate_config::SlateConfig;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Consecutive empty polls tolerated before yielding the core.
pub const SPIN_LIMIT: u32 = 1_000;

/// Sleep once the spin budget is exhausted.
pub const IDLE_SLEEP: Duration = Duration::from_micros(1);

/// Emit a status line every this many consumed records.
const STATUS_EVERY: u64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum SlateError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Segment(#[from] ShmError),

    #[error(transparent)]
    Ring(#[from] RingError),
}

pub struct SlateEngine {
    clock: CoarseClock,
    // Targets the segment mapping; only dereferenced while `segment` is
    // alive.
    ring: NonNull<SpscRing>,
    segment: ShmSegment,
    running: Arc<AtomicBool>,
    stats: LatencyStats,
    consumed: u64,
    empty_polls: u32,
}

// The ring pointer targets the owned segment mapping.
unsafe impl Send for SlateEngine {}

impl SlateEngine {
    /// Attaches to the segment at `config.shm_path`. Fails if the segment is
    /// missing, has the wrong size, or its base is misaligned for the ring.
    pub fn new(config: &SlateConfig) -> Result<Self, SlateError> {
        let clock = CoarseClock::start()?;
        let mut segment = ShmSegment::attach(&config.shm_path, RING_BYTES)?;
        let ring =
            NonNull::from(unsafe { SpscRing::from_base(segment.as_mut_ptr(), segment.len()) }?);

        info!(
            segment = %segment.path().display(),
            backlog = unsafe { ring.as_ref() }.available_for_read(),
            "slate attached"
        );

        Ok(Self {
            clock,
            ring,
            segment,
            running: Arc::new(AtomicBool::new(true)),
            stats: LatencyStats::new(),
            consumed: 0,
            empty_polls: 0,
        })
    }

    /// Polls until the running flag clears.
    pub fn run(&mut self) {
        while self.running.load(Ordering::Relaxed) {
            self.poll_once();
        }
        info!(
            consumed = self.consumed,
            mean_latency_us = self.stats.mean_us(),
            "slate stopped"
        );
    }

    /// One poll step: returns the record if one was available.
    pub fn poll_once(&mut self) -> Option<QuoteTick> {
        let mut out = QuoteTick::default();
        if self.ring().try_read(&mut out) {
            self.empty_polls = 0;
            self.consumed += 1;

            let latency_ns = self.clock.now() - out.timestamp_ns;
            self.stats.record(latency_ns);

            debug!(
                instrument = out.instrument(),
                bid = out.bid,
                ask = out.ask,
                latency_us = latency_ns as f64 / 1_000.0,
                "quote"
            );
            if self.consumed % STATUS_EVERY == 0 {
                info!(
                    consumed = self.consumed,
                    min_latency_us = self.stats.min_us(),
                    mean_latency_us = self.stats.mean_us(),
                    max_latency_us = self.stats.max_us(),
                    "slate status"
                );
            }
            return Some(out);
        }

        self.empty_polls += 1;
        if self.empty_polls >= SPIN_LIMIT {
            self.empty_polls = 0;
            std::thread::sleep(IDLE_SLEEP);
        } else {
            std::hint::spin_loop();
        }
        None
    }

    #[inline(always)]
    fn ring(&self) -> &SpscRing {
        unsafe { self.ring.as_ref() }
    }

    /// Clearing the returned flag stops `run` after the current poll.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn latency(&self) -> &LatencyStats {
        &self.stats
    }

    /// Path of the attached segment.
    pub fn segment_path(&self) -> &std::path::Path {
        self.segment.path()
    }
}
