//! Module: sample
//!
//! Purpose: Value types shared by the registry, the interrupt path and the
//! notification fan-out: electrical level, line direction, classified edge
//! kinds and the compact `EdgeEvent` record pushed by the interrupt path.
//!
//! Architecture:
//! - `EdgeEvent` packs into a single `u64` so the event ring can store it in
//!   an `AtomicU64` (no torn reads, no `UnsafeCell`)
//! - All types are `Copy`
//!
//! Safety: Safe. No unsafe blocks. Copy types only.

/// Electrical level of a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Level {
    Low = 0,
    High = 1,
}

impl Level {
    /// Build from a raw register value (any non-zero value is high).
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        if raw == 0 {
            Level::Low
        } else {
            Level::High
        }
    }

    /// Numeric value as reported on the attribute surface.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }
}

/// Line direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    /// High impedance, level is read from the pin.
    In = 0,
    /// Driven by us.
    Out = 1,
}

impl Direction {
    /// Attribute token (`in` / `out`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// Parse an attribute token. A single trailing newline is tolerated.
    pub fn parse(token: &str) -> Option<Self> {
        match token.strip_suffix('\n').unwrap_or(token) {
            "in" => Some(Direction::In),
            "out" => Some(Direction::Out),
            _ => None,
        }
    }
}

/// Result of classifying one edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EdgeKind {
    /// Outside both windows, rising edge, or unreadable level.
    Ignored = 0,
    /// Short pulse window: counter +1.
    Entry = 1,
    /// Long pulse window: counter -1.
    Exit = 2,
}

impl EdgeKind {
    /// Convert from raw u8 value.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => EdgeKind::Entry,
            2 => EdgeKind::Exit,
            _ => EdgeKind::Ignored,
        }
    }

    /// Counter adjustment carried by this kind.
    #[inline]
    pub const fn delta(self) -> i32 {
        match self {
            EdgeKind::Ignored => 0,
            EdgeKind::Entry => 1,
            EdgeKind::Exit => -1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Ignored => "IGNORED",
            EdgeKind::Entry => "ENTRY",
            EdgeKind::Exit => "EXIT",
        }
    }
}

/// One classified (non-ignored) edge as queued for fan-out.
///
/// Memory layout of the packed form:
/// ```text
/// [kind:8][delta_us:24][count:32] = 64 bits
/// ```
///
/// `delta_us` saturates at 2^24 - 1 (about 16.7 s), well past the widest
/// classification window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeEvent {
    pub kind: EdgeKind,
    /// Inter-edge delay that produced this event.
    pub delta_us: u32,
    /// Shared counter value right after the adjustment.
    pub count: i32,
}

impl EdgeEvent {
    /// Largest representable delta.
    pub const MAX_DELTA_US: u32 = (1 << 24) - 1;

    pub const fn new(kind: EdgeKind, delta_us: u64, count: i32) -> Self {
        let delta_us = if delta_us > Self::MAX_DELTA_US as u64 {
            Self::MAX_DELTA_US
        } else {
            delta_us as u32
        };
        Self {
            kind,
            delta_us,
            count,
        }
    }

    /// Pack into the ring representation.
    #[inline]
    pub const fn to_bits(self) -> u64 {
        ((self.kind as u64) << 56)
            | (((self.delta_us & Self::MAX_DELTA_US) as u64) << 32)
            | (self.count as u32 as u64)
    }

    /// Unpack from the ring representation.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            kind: EdgeKind::from_u8((bits >> 56) as u8),
            delta_us: ((bits >> 32) as u32) & Self::MAX_DELTA_US,
            count: bits as u32 as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_raw() {
        assert_eq!(Level::from_raw(0), Level::Low);
        assert_eq!(Level::from_raw(1), Level::High);
        assert_eq!(Level::from_raw(7), Level::High);
        assert!(Level::Low.is_low());
    }

    #[test]
    fn test_direction_tokens() {
        assert_eq!(Direction::parse("in"), Some(Direction::In));
        assert_eq!(Direction::parse("out\n"), Some(Direction::Out));
        assert_eq!(Direction::parse("OUT"), None);
        assert_eq!(Direction::parse(" in"), None);
        assert_eq!(Direction::parse(""), None);
        assert_eq!(Direction::Out.as_str(), "out");
    }

    #[test]
    fn test_event_packing_keeps_negative_count() {
        let ev = EdgeEvent::new(EdgeKind::Exit, 200_000, -3);
        let back = EdgeEvent::from_bits(ev.to_bits());
        assert_eq!(back, ev);
        assert_eq!(back.count, -3);
    }

    #[test]
    fn test_event_delta_saturates() {
        let ev = EdgeEvent::new(EdgeKind::Entry, u64::MAX, 1);
        assert_eq!(ev.delta_us, EdgeEvent::MAX_DELTA_US);
        assert_eq!(EdgeEvent::from_bits(ev.to_bits()).delta_us, EdgeEvent::MAX_DELTA_US);
    }

    #[test]
    fn test_kind_delta() {
        assert_eq!(EdgeKind::Entry.delta(), 1);
        assert_eq!(EdgeKind::Exit.delta(), -1);
        assert_eq!(EdgeKind::Ignored.delta(), 0);
        assert_eq!(EdgeKind::from_u8(9), EdgeKind::Ignored);
    }
}
