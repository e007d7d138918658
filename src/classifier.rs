//! Edge classifier.
//!
//! Pure logic, no hardware dependencies. Turns the delay between two
//! consecutive edges of a line into a domain event. Fully testable on host.
//!
//! # Windows
//!
//! ```text
//!   0        80ms     120ms           180ms    220ms
//!   |---------(========)---------------(========)--------▶ delta
//!     ignored   ENTRY        ignored      EXIT     ignored
//! ```
//!
//! Both windows are open intervals: a delta equal to a bound is ignored.
//! Only falling edges (level low right after the edge) are classified; a
//! rising edge only moves the timestamp.
//!
//! # Interrupt path
//!
//! [`EdgeTimer::observe`] is called once per edge from interrupt context.
//! It is a single atomic swap plus arithmetic: no locks, no allocation.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::sample::{EdgeKind, Level};

/// Open interval of inter-edge delay, in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub min_us: u32,
    pub max_us: u32,
}

impl Window {
    pub const fn new(min_us: u32, max_us: u32) -> Self {
        Self { min_us, max_us }
    }

    /// Strict containment: `min < delta < max`.
    #[inline]
    pub const fn contains(&self, delta_us: u64) -> bool {
        delta_us > self.min_us as u64 && delta_us < self.max_us as u64
    }

    /// True when the interval holds at least one integer value.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.max_us > self.min_us.saturating_add(1)
    }

    /// True when the two open intervals share a value.
    #[inline]
    pub const fn overlaps(&self, other: &Window) -> bool {
        !(self.max_us <= other.min_us.saturating_add(1) || other.max_us <= self.min_us.saturating_add(1))
    }
}

/// The pair of classification windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Windows {
    /// Short pulse, counter +1.
    pub entry: Window,
    /// Long pulse, counter -1.
    pub exit: Window,
}

impl Windows {
    /// Reference thresholds: entry (80 ms, 120 ms), exit (180 ms, 220 ms).
    pub const DEFAULT: Windows = Windows {
        entry: Window::new(80_000, 120_000),
        exit: Window::new(180_000, 220_000),
    };

    /// Both windows non-empty and disjoint.
    pub const fn is_valid(&self) -> bool {
        self.entry.is_valid() && self.exit.is_valid() && !self.entry.overlaps(&self.exit)
    }
}

impl Default for Windows {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Classify one edge.
///
/// Pure function of the inter-edge delay and the edge polarity.
#[inline]
pub fn classify(delta_us: u64, falling: bool, windows: &Windows) -> EdgeKind {
    if !falling {
        return EdgeKind::Ignored;
    }
    if windows.exit.contains(delta_us) {
        EdgeKind::Exit
    } else if windows.entry.contains(delta_us) {
        EdgeKind::Entry
    } else {
        EdgeKind::Ignored
    }
}

/// Outcome of one observed edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observation {
    pub delta_us: u64,
    pub kind: EdgeKind,
}

/// Per-line edge timestamp.
///
/// Meaningful only while the line is armed; `reset` is called on arm.
pub struct EdgeTimer {
    last_edge_us: AtomicU64,
}

impl EdgeTimer {
    pub const fn new() -> Self {
        Self {
            last_edge_us: AtomicU64::new(0),
        }
    }

    /// Restart timing from `now_us`.
    #[inline]
    pub fn reset(&self, now_us: u64) {
        self.last_edge_us.store(now_us, Ordering::Release);
    }

    /// Timestamp of the most recent edge (or of the last reset).
    #[inline]
    pub fn last_edge_us(&self) -> u64 {
        self.last_edge_us.load(Ordering::Acquire)
    }

    /// Record an edge at `now_us` and classify it.
    ///
    /// The timestamp moves on every edge, including ignored ones. A level
    /// that could not be read (`None`) carries no information and is
    /// classified `Ignored`.
    #[inline]
    pub fn observe(&self, now_us: u64, level: Option<Level>, windows: &Windows) -> Observation {
        let prev = self.last_edge_us.swap(now_us, Ordering::AcqRel);
        let delta_us = now_us.saturating_sub(prev);
        let falling = matches!(level, Some(Level::Low));
        Observation {
            delta_us,
            kind: classify(delta_us, falling, windows),
        }
    }
}

impl Default for EdgeTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: Windows = Windows::DEFAULT;

    #[test]
    fn test_entry_window() {
        assert_eq!(classify(100_000, true, &W), EdgeKind::Entry);
        assert_eq!(classify(80_001, true, &W), EdgeKind::Entry);
        assert_eq!(classify(119_999, true, &W), EdgeKind::Entry);
    }

    #[test]
    fn test_exit_window() {
        assert_eq!(classify(200_000, true, &W), EdgeKind::Exit);
        assert_eq!(classify(180_001, true, &W), EdgeKind::Exit);
        assert_eq!(classify(219_999, true, &W), EdgeKind::Exit);
    }

    #[test]
    fn test_boundaries_are_ignored() {
        for delta in [80_000, 120_000, 180_000, 220_000] {
            assert_eq!(classify(delta, true, &W), EdgeKind::Ignored, "delta {}", delta);
        }
    }

    #[test]
    fn test_gap_and_fast_edges_ignored() {
        assert_eq!(classify(150_000, true, &W), EdgeKind::Ignored);
        assert_eq!(classify(0, true, &W), EdgeKind::Ignored);
        assert_eq!(classify(79_999, true, &W), EdgeKind::Ignored);
        assert_eq!(classify(10_000_000, true, &W), EdgeKind::Ignored);
    }

    #[test]
    fn test_rising_edge_never_classified() {
        for delta in [100_000, 200_000, 150_000] {
            assert_eq!(classify(delta, false, &W), EdgeKind::Ignored);
        }
    }

    #[test]
    fn test_window_validation() {
        assert!(W.is_valid());
        let overlapping = Windows {
            entry: Window::new(80_000, 190_000),
            exit: Window::new(180_000, 220_000),
        };
        assert!(!overlapping.is_valid());
        let touching = Windows {
            entry: Window::new(80_000, 120_000),
            exit: Window::new(119_999, 220_000),
        };
        assert!(touching.is_valid());
        let empty = Windows {
            entry: Window::new(100, 101),
            exit: Window::new(180_000, 220_000),
        };
        assert!(!empty.is_valid());
    }

    #[test]
    fn test_timer_updates_on_every_edge() {
        let timer = EdgeTimer::new();
        timer.reset(1_000);

        // Rising edge: timestamp moves, nothing classified
        let obs = timer.observe(101_000, Some(Level::High), &W);
        assert_eq!(obs.delta_us, 100_000);
        assert_eq!(obs.kind, EdgeKind::Ignored);
        assert_eq!(timer.last_edge_us(), 101_000);

        // Falling edge measured from the rising edge
        let obs = timer.observe(201_000, Some(Level::Low), &W);
        assert_eq!(obs.delta_us, 100_000);
        assert_eq!(obs.kind, EdgeKind::Entry);
    }

    #[test]
    fn test_unreadable_level_is_ignored() {
        let timer = EdgeTimer::new();
        timer.reset(0);
        let obs = timer.observe(100_000, None, &W);
        assert_eq!(obs.kind, EdgeKind::Ignored);
        assert_eq!(timer.last_edge_us(), 100_000);
    }
}
