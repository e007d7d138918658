//! Lock-free SPMC (Single Producer, Multiple Consumer) event ring.
//!
//! One ring per registry slot. The producer is that slot's edge handler,
//! the consumers are delivery paths (the [`crate::fanout::Dispatcher`]).
//!
//! # Architecture
//!
//! ```text
//! edge handler ──push──▶ EventStream ──read──▶ EventCursor(s)
//!  (interrupt)           (lock-free)           (ordinary context)
//! ```
//!
//! # Rules
//!
//! - Only atomic operations for synchronization
//! - No operation shall block
//! - A full ring overwrites the oldest event; slow readers detect overrun

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::config::EVENT_RING_SIZE;
use crate::sample::EdgeEvent;

/// Lock-free SPMC ring of classified edge events.
///
/// Events are stored packed in `AtomicU64` slots, so a reader can never see
/// a half-written event; it can only see a stale or an overwritten one,
/// which `read` detects through the write index.
///
/// # Safety
///
/// No `unsafe`. Single producer is a usage contract (one interrupt context
/// per line), not a soundness requirement: a second concurrent producer can
/// only lose events.
pub struct EventStream<const N: usize = EVENT_RING_SIZE> {
    slots: [AtomicU64; N],
    /// Next write index (monotonically increasing, wraps via mask).
    write_idx: AtomicU32,
}

impl<const N: usize> EventStream<N> {
    /// Mask for wrapping index to buffer size.
    /// N must be a power of 2.
    const MASK: usize = N - 1;

    /// Readable events. The slot the next push lands in is never read.
    const DEPTH: u32 = N as u32 - 1;

    /// Create a new empty ring.
    ///
    /// # Panics
    ///
    /// Panics at compile time if N is not a power of 2.
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "Event ring size must be power of 2");

        #[allow(clippy::declare_interior_mutable_const)]
        const EMPTY: AtomicU64 = AtomicU64::new(0);
        Self {
            slots: [EMPTY; N],
            write_idx: AtomicU32::new(0),
        }
    }

    /// Append an event.
    ///
    /// O(1), never blocks, never allocates. Safe in interrupt context.
    #[inline]
    pub fn push(&self, event: EdgeEvent) {
        let idx = self.write_idx.load(Ordering::Relaxed);
        self.slots[(idx as usize) & Self::MASK].store(event.to_bits(), Ordering::Release);
        // Publish after the slot is written
        self.write_idx.store(idx.wrapping_add(1), Ordering::Release);
    }

    /// Read the event at `idx`.
    ///
    /// Returns `None` if:
    /// - Index is ahead of write head (not yet written)
    /// - Index is too far behind (overwritten, possibly while reading)
    #[inline]
    pub fn read(&self, idx: u32) -> Option<EdgeEvent> {
        let write = self.write_idx.load(Ordering::Acquire);
        let behind = write.wrapping_sub(idx);
        if behind == 0 || behind > Self::DEPTH {
            return None;
        }

        let bits = self.slots[(idx as usize) & Self::MASK].load(Ordering::Acquire);

        // The slot at `write` may already hold the next push before the
        // head moves: reject anything that was that slot during the load
        let write = self.write_idx.load(Ordering::Acquire);
        if write.wrapping_sub(idx) > Self::DEPTH {
            return None;
        }
        Some(EdgeEvent::from_bits(bits))
    }

    /// Current write head index. Cursors start here.
    #[inline]
    pub fn write_head(&self) -> u32 {
        self.write_idx.load(Ordering::Acquire)
    }

    /// How many events a reader at `reader_idx` is behind.
    #[inline]
    pub fn lag(&self, reader_idx: u32) -> u32 {
        self.write_head().wrapping_sub(reader_idx)
    }

    /// True if a reader at `reader_idx` has missed events.
    #[inline]
    pub fn is_overrun(&self, reader_idx: u32) -> bool {
        self.lag(reader_idx) > Self::DEPTH
    }

    /// Index of the oldest event a reader may still get.
    #[inline]
    pub fn oldest(&self) -> u32 {
        self.write_head().wrapping_sub(Self::DEPTH)
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Events kept readable behind the head (`capacity - 1`).
    #[inline]
    pub const fn depth(&self) -> usize {
        N - 1
    }
}

impl<const N: usize> Default for EventStream<N> {
    fn default() -> Self {
        Self::new()
    }
}
