//! The row allocator: an atomic high-water counter plus a bounded, lock-free
//! free ring for recycling released rows.
//!
//! # Free ring protocol
//!
//! Producers (`free`) publish in two phases:
//!
//! 1. reserve a slot by advancing `head`,
//! 2. write the value into that slot,
//! 3. advance `published` from the reserved index to the next one.
//!
//! Step 3 spins until every earlier reservation has been published, so a
//! consumer never observes a slot that is reserved but not yet written.
//! Consumers (`pop`) advance `tail` with compare-and-swap and return the
//! `ABSENT` sentinel once `tail` has caught up with `published`.
//!
//! A full ring silently drops the freed id.  This only costs memory reuse,
//! never correctness: `Counter::next` falls back to a fresh id.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use crate::{ABSENT, RowId};

// ── FreeRing ──────────────────────────────────────────────────────────────────

/// Fixed-capacity multi-producer / multi-consumer queue of raw row ids.
pub struct FreeRing {
    slots: Box<[AtomicI32]>,
    /// Next slot index to hand to a producer.
    head: AtomicUsize,
    /// Slots below this index are written and visible to consumers.
    published: AtomicUsize,
    /// Next slot index to hand to a consumer.
    tail: AtomicUsize,
    /// Number of values dropped because the ring was full.
    dropped: AtomicUsize,
}

impl FreeRing {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity.max(1)).map(|_| AtomicI32::new(ABSENT)).collect();
        Self {
            slots,
            head: AtomicUsize::new(0),
            published: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Enqueue `value`.  Returns `false` (and drops the value) if the ring is
    /// full.
    pub fn push(&self, value: i32) -> bool {
        let cap = self.slots.len();

        // Phase 1: reserve.
        let mut reserved = self.head.load(Ordering::Acquire);
        loop {
            // `tail` only grows, so a stale read can only under-estimate room.
            if reserved.saturating_sub(self.tail.load(Ordering::Acquire)) >= cap {
                if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                    tracing::warn!(capacity = cap, "free ring full; dropping freed row ids");
                }
                return false;
            }
            match self.head.compare_exchange_weak(
                reserved,
                reserved + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => reserved = current,
            }
        }

        // Phase 2: write.
        self.slots[reserved % cap].store(value, Ordering::Release);

        // Phase 3: publish in reservation order.
        while self
            .published
            .compare_exchange_weak(reserved, reserved + 1, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
        true
    }

    /// Dequeue the oldest published value, or `ABSENT` if none is visible.
    pub fn pop(&self) -> i32 {
        let cap = self.slots.len();
        let mut tail = self.tail.load(Ordering::Acquire);
        loop {
            if tail >= self.published.load(Ordering::Acquire) {
                return ABSENT;
            }
            let value = self.slots[tail % cap].load(Ordering::Acquire);
            match self.tail.compare_exchange_weak(
                tail,
                tail + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return value,
                Err(current) => tail = current,
            }
        }
    }

    /// Number of published, not yet consumed values.
    pub fn len(&self) -> usize {
        self.published
            .load(Ordering::Acquire)
            .saturating_sub(self.tail.load(Ordering::Acquire))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total values dropped on overflow since construction.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ── Counter ───────────────────────────────────────────────────────────────────

/// Hands out row numbers for one store and recycles freed ones.
///
/// All methods take `&self` and are safe under any number of concurrent
/// callers; share it behind an `Arc`.
pub struct Counter {
    count: AtomicI32,
    free: FreeRing,
}

impl Counter {
    /// A counter starting at row 0 whose free ring holds `free_capacity` ids.
    pub fn new(free_capacity: usize) -> Self {
        Self {
            count: AtomicI32::new(0),
            free: FreeRing::new(free_capacity),
        }
    }

    /// Next row: a recycled one if the free ring has any, else a fresh one.
    pub fn next(&self) -> RowId {
        let recycled = self.free.pop();
        if recycled != ABSENT {
            return RowId(recycled);
        }
        RowId(self.count.fetch_add(1, Ordering::AcqRel))
    }

    /// Reserve `delta` contiguous fresh rows and return the first.
    ///
    /// Never consults the free ring: recycled rows are not contiguous.
    pub fn next_block(&self, delta: usize) -> RowId {
        RowId(self.count.fetch_add(delta as i32, Ordering::AcqRel))
    }

    /// Return `row` for reuse.  Dropped silently if the free ring is full.
    pub fn free(&self, row: RowId) {
        if !row.is_absent() {
            self.free.push(row.0);
        }
    }

    /// Return `delta` rows starting at `first` for reuse.
    pub fn free_block(&self, first: RowId, delta: usize) {
        if first.is_absent() {
            return;
        }
        for i in 0..delta {
            self.free.push(first.0 + i as i32);
        }
    }

    /// Current high-water mark: one past the largest row ever handed out.
    #[inline]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire) as usize
    }

    /// Raise the high-water mark to at least `n` (bulk loads that write rows
    /// directly).  Never lowers it.
    pub fn ensure_count(&self, n: usize) {
        self.count.fetch_max(n as i32, Ordering::AcqRel);
    }

    /// The free ring, for inspection.
    pub fn free_ring(&self) -> &FreeRing {
        &self.free
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new(crate::EngineConfig::DEFAULT_FREE_LIST_CAPACITY)
    }
}
