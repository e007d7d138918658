//! Best-effort event cursor.
//!
//! # Contract
//!
//! "I process when I can. I skip if I fall behind."
//!
//! A cursor never faults. If the producer laps it, it jumps forward to the
//! oldest event still in the ring and counts what it missed. Notifications
//! are "new data available" hints, so losing old events loses nothing the
//! subscriber cannot recover with `get_count()`.

use crate::sample::EdgeEvent;
use crate::stream::EventStream;

/// Read position into one [`EventStream`].
#[derive(Debug, Clone)]
pub struct EventCursor {
    read_idx: u32,
    dropped: u32,
}

impl EventCursor {
    /// Cursor positioned at the current write head (sees only new events).
    pub fn new<const N: usize>(stream: &EventStream<N>) -> Self {
        Self {
            read_idx: stream.write_head(),
            dropped: 0,
        }
    }

    /// Read the next event, skipping forward after an overrun.
    #[inline]
    pub fn tick<const N: usize>(&mut self, stream: &EventStream<N>) -> Option<EdgeEvent> {
        if stream.is_overrun(self.read_idx) {
            self.skip_to_oldest(stream);
        }

        match stream.read(self.read_idx) {
            Some(event) => {
                self.read_idx = self.read_idx.wrapping_add(1);
                Some(event)
            }
            None => {
                // Lapped between the overrun check and the read: retry once
                if stream.is_overrun(self.read_idx) {
                    self.skip_to_oldest(stream);
                }
                None
            }
        }
    }

    fn skip_to_oldest<const N: usize>(&mut self, stream: &EventStream<N>) {
        let oldest = stream.oldest();
        self.dropped = self.dropped.saturating_add(oldest.wrapping_sub(self.read_idx));
        self.read_idx = oldest;
    }

    /// Skip everything not yet read.
    #[inline]
    pub fn resync<const N: usize>(&mut self, stream: &EventStream<N>) {
        self.read_idx = stream.write_head();
    }

    /// Events lost to overruns since the last `reset_dropped`.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    #[inline]
    pub fn reset_dropped(&mut self) {
        self.dropped = 0;
    }

    #[inline]
    pub fn read_idx(&self) -> u32 {
        self.read_idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::EdgeKind;

    fn ev(count: i32) -> EdgeEvent {
        EdgeEvent::new(EdgeKind::Exit, 200_000, count)
    }

    #[test]
    fn test_cursor_starts_at_head() {
        let stream = EventStream::<8>::new();
        stream.push(ev(1));

        let mut cursor = EventCursor::new(&stream);
        assert_eq!(cursor.tick(&stream), None);

        stream.push(ev(2));
        assert_eq!(cursor.tick(&stream), Some(ev(2)));
        assert_eq!(cursor.tick(&stream), None);
    }

    #[test]
    fn test_cursor_skips_on_overrun() {
        let stream = EventStream::<8>::new();
        let mut cursor = EventCursor::new(&stream);

        for i in 0..20 {
            stream.push(ev(i));
        }

        // Oldest readable event is #13 (the slot of #12 is next to be written)
        assert_eq!(cursor.tick(&stream), Some(ev(13)));
        assert_eq!(cursor.dropped(), 13);

        let rest = core::iter::from_fn(|| cursor.tick(&stream)).count();
        assert_eq!(rest, 6);

        cursor.reset_dropped();
        assert_eq!(cursor.dropped(), 0);
    }

    #[test]
    fn test_cursor_resync() {
        let stream = EventStream::<8>::new();
        let mut cursor = EventCursor::new(&stream);
        stream.push(ev(1));
        stream.push(ev(2));
        cursor.resync(&stream);
        assert_eq!(cursor.tick(&stream), None);
        assert_eq!(cursor.read_idx(), 2);
    }
}
