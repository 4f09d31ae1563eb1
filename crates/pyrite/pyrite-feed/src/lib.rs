//! `pyrite-feed`: synthetic quote generation for the publisher.
//!
//! A small fixed instrument universe, one random-walk mid price per
//! instrument, round-robin emission. Not a market model; just a plausible,
//! bounded stream to push through the transports.

use basalt_events::QuoteTick;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Instruments cycled by the generator, with their starting mid prices.
pub const UNIVERSE: &[(&str, f64)] = &[
    ("RELIANCE", 2850.50),
    ("TCS", 3420.00),
    ("INFY", 1495.25),
    ("HDFCBANK", 1610.75),
    ("AAPL", 150.26),
    ("GOOG", 140.10),
];

/// Half-spread applied around the mid, as a fraction of price.
const HALF_SPREAD: f64 = 0.0001;

/// Largest single-step mid move, as a fraction of price.
const MAX_STEP: f64 = 0.0005;

pub struct QuoteFeed {
    rng: SmallRng,
    mids: Vec<f64>,
    next: usize,
}

impl QuoteFeed {
    /// Generator seeded from the OS; stream differs run to run.
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    /// Deterministic generator for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            rng,
            mids: UNIVERSE.iter().map(|&(_, mid)| mid).collect(),
            next: 0,
        }
    }

    /// Produces the next quote, stamped with `timestamp_ns`.
    pub fn next_quote(&mut self, timestamp_ns: i64) -> QuoteTick {
        let idx = self.next;
        self.next = (self.next + 1) % UNIVERSE.len();

        let (symbol, _) = UNIVERSE[idx];
        let step = self.rng.gen_range(-MAX_STEP..=MAX_STEP);
        let mid = (self.mids[idx] * (1.0 + step)).max(0.01);
        self.mids[idx] = mid;

        let half_spread = mid * HALF_SPREAD;
        QuoteTick::new(symbol, mid - half_spread, mid + half_spread, timestamp_ns)
    }
}

impl Default for QuoteFeed {
    fn default() -> Self {
        Self::new()
    }
}
