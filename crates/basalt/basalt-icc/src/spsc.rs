//! Single-producer, single-consumer lock-free ring buffer over quote records.
//!
//! The ring is a plain `repr(C)` structure placed at offset 0 of a shared
//! memory segment; one process writes, one process reads, with no locks and
//! no fences beyond one acquire/release pair per operation.
//!
//! # Memory Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  write_cursor (8B atomic)  │  pad to 64B                 │   line 0
//! ├──────────────────────────────────────────────────────────┤
//! │  read_cursor  (8B atomic)  │  pad to 64B                 │   line 1
//! ├──────────────────────────────────────────────────────────┤
//! │  slots[0]  (QuoteTick, 64B)                              │
//! ├──────────────────────────────────────────────────────────┤
//! │  ...                                                     │
//! ├──────────────────────────────────────────────────────────┤
//! │  slots[RING_SLOTS - 1]                                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each cursor owns a full cache line so the producer's cursor store never
//! invalidates the line the consumer is spinning on, and vice versa. Slots
//! are themselves one cache line each.
//!
//! # Protocol
//!
//! Cursors are monotonic u64 counters; a cursor indexes its slot as
//! `cursor & (RING_SLOTS - 1)`. Unread count is `write - read`, held in
//! `[0, RING_SLOTS - 1]`: one slot is sacrificed so a full ring never looks
//! empty.
//!
//! **Producer** (sole writer of `write_cursor`):
//! 1. Load own cursor relaxed, load `read_cursor` with Acquire.
//! 2. If `write - read == RING_SLOTS - 1`, report full.
//! 3. Copy the record into `slots[write & mask]`.
//! 4. Store `write + 1` with Release; the slot bytes happen-before the
//!    cursor publication.
//!
//! **Consumer** (sole writer of `read_cursor`):
//! 1. Load own cursor relaxed, load `write_cursor` with Acquire, pairing
//!    with the producer's Release so the slot bytes are visible.
//! 2. If `read == write`, report empty.
//! 3. Copy the record out of `slots[read & mask]`.
//! 4. Store `read + 1` with Release, letting the producer reuse the slot.
//!
//! A zero-filled region is a valid empty ring, so a freshly created
//! (zero-paged) segment needs no further initialisation.
//!
//! The SPSC discipline is a precondition, not something the ring defends
//! against: a second producer or a second consumer is undefined behaviour.

use basalt_events::QuoteTick;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of slots. Power of two so the index mask replaces a modulus.
pub const RING_SLOTS: usize = 1024;

const RING_MASK: u64 = (RING_SLOTS as u64) - 1;
const CURSOR_PAD: usize = 64 - core::mem::size_of::<AtomicU64>();

const _: () = assert!(RING_SLOTS.is_power_of_two());

#[derive(Debug, thiserror::Error)]
pub enum RingError {
    #[error("ring base address {addr:#x} is not {align}-byte aligned")]
    Misaligned { addr: usize, align: usize },

    #[error("ring region is {actual} bytes, need {expected}")]
    Truncated { expected: usize, actual: usize },
}

/// The in-memory ring structure. See the module docs for layout and protocol.
#[repr(C, align(64))]
pub struct SpscRing {
    write_cursor: AtomicU64,
    _pad_write: [u8; CURSOR_PAD],
    read_cursor: AtomicU64,
    _pad_read: [u8; CURSOR_PAD],
    slots: [UnsafeCell<QuoteTick>; RING_SLOTS],
}

/// Total bytes of the ring structure: two cursor lines plus the slot array.
pub const RING_BYTES: usize = core::mem::size_of::<SpscRing>();

const _: () = assert!(RING_BYTES == 2 * 64 + RING_SLOTS * 64);

// Safe to share across threads/processes under the single-writer-per-cursor
// discipline documented above.
unsafe impl Sync for SpscRing {}

impl SpscRing {
    /// Reinterprets `base` as a ring, zeroing the region first. Used by the
    /// segment creator so a leftover same-sized segment restarts empty.
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of [`RING_BYTES`] bytes for
    /// the returned lifetime, and no other reference to the region may exist.
    pub unsafe fn init_at<'a>(base: *mut u8, len: usize) -> Result<&'a Self, RingError> {
        check_region(base, len)?;
        std::ptr::write_bytes(base, 0, RING_BYTES);
        Ok(&*(base as *const Self))
    }

    /// Reinterprets `base` as an existing ring without touching its contents.
    /// Used by the attaching consumer.
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of [`RING_BYTES`] bytes for
    /// the returned lifetime, and must contain a ring (a zero-filled region
    /// qualifies).
    pub unsafe fn from_base<'a>(base: *mut u8, len: usize) -> Result<&'a Self, RingError> {
        check_region(base, len)?;
        Ok(&*(base as *const Self))
    }

    /// Allocates a zeroed ring on the heap. For in-process use: tests and
    /// benchmarks that don't need a shared segment.
    pub fn new_boxed() -> Box<Self> {
        let layout = std::alloc::Layout::new::<Self>();
        // A zeroed allocation is the valid empty ring.
        unsafe {
            let ptr = std::alloc::alloc_zeroed(layout) as *mut Self;
            if ptr.is_null() {
                std::alloc::handle_alloc_error(layout);
            }
            Box::from_raw(ptr)
        }
    }

    /// Copies `tick` into the next slot and publishes it. Returns `false`
    /// without side effects when the ring is full.
    ///
    /// Caller must be the sole producer.
    #[inline(always)]
    pub fn try_write(&self, tick: &QuoteTick) -> bool {
        let write = self.write_cursor.load(Ordering::Relaxed);
        let read = self.read_cursor.load(Ordering::Acquire);
        if write.wrapping_sub(read) == RING_MASK {
            return false;
        }

        let slot = self.slots[(write & RING_MASK) as usize].get();
        // Sole producer, and the consumer cannot touch this slot until the
        // Release store below.
        unsafe { *slot = *tick };

        self.write_cursor
            .store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Copies the oldest unread record into `out` and releases its slot.
    /// Returns `false` without side effects when the ring is empty.
    ///
    /// Caller must be the sole consumer.
    #[inline(always)]
    pub fn try_read(&self, out: &mut QuoteTick) -> bool {
        let read = self.read_cursor.load(Ordering::Relaxed);
        let write = self.write_cursor.load(Ordering::Acquire);
        if read == write {
            return false;
        }

        let slot = self.slots[(read & RING_MASK) as usize].get();
        // The Acquire load of write_cursor ordered this slot's bytes before
        // us; the producer cannot reuse it until the Release store below.
        *out = unsafe { *slot };

        self.read_cursor
            .store(read.wrapping_add(1), Ordering::Release);
        true
    }

    /// Records currently unread. A hint unless called by the sole consumer.
    #[inline]
    pub fn available_for_read(&self) -> u64 {
        let write = self.write_cursor.load(Ordering::Relaxed);
        let read = self.read_cursor.load(Ordering::Relaxed);
        write.wrapping_sub(read)
    }

    /// Free slots remaining. A hint unless called by the sole producer.
    #[inline]
    pub fn available_for_write(&self) -> u64 {
        Self::capacity() - self.available_for_read()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.available_for_read() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.available_for_read() == RING_MASK
    }

    /// Usable capacity: one slot is sacrificed for full/empty disambiguation.
    #[inline]
    pub const fn capacity() -> u64 {
        RING_MASK
    }

    /// Current write cursor, for monitoring.
    #[inline]
    pub fn write_cursor(&self) -> u64 {
        self.write_cursor.load(Ordering::Relaxed)
    }

    /// Current read cursor, for monitoring.
    #[inline]
    pub fn read_cursor(&self) -> u64 {
        self.read_cursor.load(Ordering::Relaxed)
    }
}

fn check_region(base: *mut u8, len: usize) -> Result<(), RingError> {
    let addr = base as usize;
    let align = core::mem::align_of::<SpscRing>();
    if addr % align != 0 {
        return Err(RingError::Misaligned { addr, align });
    }
    if len < RING_BYTES {
        return Err(RingError::Truncated {
            expected: RING_BYTES,
            actual: len,
        });
    }
    Ok(())
}
