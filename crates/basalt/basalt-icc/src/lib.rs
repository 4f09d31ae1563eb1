//! `basalt-icc`: inter-process communication primitives for the quote
//! pipeline.
//!
//! One structure lives here: [`SpscRing`], a lock-free single-producer /
//! single-consumer ring buffer of [`basalt_events::QuoteTick`] records,
//! designed to be placed at the base of a shared memory segment.
//!
//! ```text
//! ┌──────────────┐      shared memory segment      ┌──────────────┐
//! │  publisher   │ ─────────── SpscRing ─────────► │   consumer   │
//! │ (process A)  │        (one slot = 64 B)        │ (process B)  │
//! └──────────────┘                                 └──────────────┘
//! ```
//!
//! The ring is deliberately monomorphic over the quote record: both sides of
//! a deployment compile the same slot layout, and a slot copy is exactly one
//! cache line.

mod spsc;

pub use spsc::{RingError, SpscRing, RING_BYTES, RING_SLOTS};
