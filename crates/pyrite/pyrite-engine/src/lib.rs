//! `pyrite-engine`: the quote publisher.
//!
//! On startup the engine acquires, in dependency order: the cached clock,
//! the shared-memory segment (creator role, ring constructed in place at its
//! base), and the TCP fan-out worker. The tick loop then produces one quote
//! per interval:
//!
//! 1. stamp a timestamp from the cached clock,
//! 2. `try_write` the record into the ring; on a full ring the record is
//!    dropped and counted, never waited for,
//! 3. frame the same record as a JSON line and queue it to the fan-out
//!    worker for every connected subscriber.
//!
//! Dropping rather than blocking keeps the producer's cadence independent of
//! any consumer; the drop counter is part of the periodic status line.
//!
//! Shutdown is cooperative: clearing the running flag ends the loop, and the
//! engine's drop releases the fan-out worker, the segment (unlinking the
//! name), and the clock worker, in that order.

mod fanout;

pub use fanout::{FanoutError, QuoteFanout};

use basalt_clock::{ClockError, CoarseClock};
use basalt_icc::{RingError, SpscRing, RING_BYTES};
use basalt_shm::{ShmError, ShmSegment};
use basalt_wire::encode_line;
use pyrite_config::PyriteConfig;
use pyrite_feed::QuoteFeed;
use std::net::SocketAddr;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Emit a status line every this many produced quotes.
const STATUS_EVERY: u64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum PyriteError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Segment(#[from] ShmError),

    #[error(transparent)]
    Ring(#[from] RingError),

    #[error(transparent)]
    Fanout(#[from] FanoutError),
}

pub struct PyriteEngine {
    config: PyriteConfig,
    feed: QuoteFeed,
    // Declaration order fixes the shutdown order: fan-out worker first, then
    // the segment (which unlinks the name), then the clock worker. The ring
    // pointer targets the segment mapping and is only dereferenced while
    // `segment` is alive.
    fanout: QuoteFanout,
    ring: NonNull<SpscRing>,
    segment: ShmSegment,
    clock: CoarseClock,
    running: Arc<AtomicBool>,
    produced: u64,
    ring_drops: u64,
}

// The ring pointer targets the owned segment mapping, which moves with the
// engine; no thread-affine state is held.
unsafe impl Send for PyriteEngine {}

impl PyriteEngine {
    pub fn new(config: PyriteConfig) -> Result<Self, PyriteError> {
        let clock = CoarseClock::start()?;
        let mut segment = ShmSegment::create(&config.shm_path, RING_BYTES)?;
        let ring =
            NonNull::from(unsafe { SpscRing::init_at(segment.as_mut_ptr(), segment.len()) }?);
        let fanout = QuoteFanout::bind(&config.listen_addr)?;

        Ok(Self {
            config,
            feed: QuoteFeed::new(),
            fanout,
            ring,
            segment,
            clock,
            running: Arc::new(AtomicBool::new(true)),
            produced: 0,
            ring_drops: 0,
        })
    }

    /// Runs the tick loop until the running flag clears or `max_ticks` is
    /// reached.
    pub fn run(&mut self) {
        let interval = Duration::from_micros(self.config.tick_interval_us);
        info!(
            listen = %self.fanout.local_addr(),
            segment = %self.segment.path().display(),
            tick_interval_us = self.config.tick_interval_us,
            "pyrite publishing"
        );

        while self.running.load(Ordering::Relaxed) {
            if self.config.max_ticks != 0 && self.produced >= self.config.max_ticks {
                break;
            }
            self.tick();
            std::thread::sleep(interval);
        }

        info!(
            produced = self.produced,
            ring_drops = self.ring_drops,
            tcp_disconnects = self.fanout.disconnect_count(),
            "pyrite stopped"
        );
    }

    fn tick(&mut self) {
        let quote = self.feed.next_quote(self.clock.now());

        if !self.ring().try_write(&quote) {
            // Backpressure policy: the producer never blocks on a slow
            // shared-memory consumer.
            self.ring_drops += 1;
        }

        match encode_line(&quote) {
            Ok(line) => self.fanout.publish(Arc::from(line)),
            Err(e) => warn!(error = %e, "quote encode failed"),
        }

        self.produced += 1;
        if self.produced % STATUS_EVERY == 0 {
            info!(
                produced = self.produced,
                ring_drops = self.ring_drops,
                subscribers = self.fanout.subscriber_count(),
                "pyrite status"
            );
        }
    }

    #[inline(always)]
    fn ring(&self) -> &SpscRing {
        unsafe { self.ring.as_ref() }
    }

    /// Clearing the returned flag stops `run` after the current tick.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Actual listening address; useful when the config asked for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.fanout.local_addr()
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn ring_drops(&self) -> u64 {
        self.ring_drops
    }
}
