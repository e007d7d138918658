//! Notification fan-out.
//!
//! Each slot keeps a [`SubscriberTable`]: one registered bit and one pending
//! bit per subscriber. Delivery is fire-and-forget: notifying sets the
//! pending bit; a subscriber that has not consumed its previous
//! notification yet just stays pending (the new one coalesces and is
//! counted as dropped). Nothing is ever queued per subscriber.
//!
//! The [`Dispatcher`] runs in ordinary context. It drains every slot's
//! event ring and notifies that slot's subscribers once per event.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::MAX_SUBSCRIBERS;
use crate::consumer::EventCursor;
use crate::error::{Error, Result};
use crate::fault::FaultCode;
use crate::hal::LineChip;
use crate::registry::Registry;
use crate::sample::EdgeEvent;

/// Subscriber position inside one slot's table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriberId(u8);

impl SubscriberId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    const fn bit(self) -> u32 {
        1 << self.0
    }
}

/// Result of notifying one table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscribers whose pending bit went from clear to set.
    pub delivered: u32,
    /// Subscribers that were already pending.
    pub coalesced: u32,
}

/// Per-slot subscriber set. Lock-free.
pub struct SubscriberTable {
    registered: AtomicU32,
    pending: AtomicU32,
    delivered: AtomicU32,
    coalesced: AtomicU32,
}

impl SubscriberTable {
    const FULL: u32 = if MAX_SUBSCRIBERS >= 32 {
        u32::MAX
    } else {
        (1 << MAX_SUBSCRIBERS) - 1
    };

    pub const fn new() -> Self {
        assert!(MAX_SUBSCRIBERS <= 32, "Subscriber table is a u32 bitmask");
        Self {
            registered: AtomicU32::new(0),
            pending: AtomicU32::new(0),
            delivered: AtomicU32::new(0),
            coalesced: AtomicU32::new(0),
        }
    }

    /// Claim a free position.
    pub fn register(&self) -> Result<SubscriberId> {
        let mut current = self.registered.load(Ordering::Acquire);
        loop {
            let free = !current & Self::FULL;
            if free == 0 {
                return Err(Error::SubscribersFull);
            }
            let id = SubscriberId(free.trailing_zeros() as u8);
            match self.registered.compare_exchange_weak(
                current,
                current | id.bit(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.pending.fetch_and(!id.bit(), Ordering::AcqRel);
                    return Ok(id);
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Withdraw a subscriber. Returns false if it was not registered.
    pub fn deregister(&self, id: SubscriberId) -> bool {
        let prev = self.registered.fetch_and(!id.bit(), Ordering::AcqRel);
        self.pending.fetch_and(!id.bit(), Ordering::AcqRel);
        prev & id.bit() != 0
    }

    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.registered.load(Ordering::Acquire) & id.bit() != 0
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> u32 {
        self.registered.load(Ordering::Acquire).count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal every registered subscriber.
    pub fn notify_all(&self) -> Delivery {
        let registered = self.registered.load(Ordering::Acquire);
        if registered == 0 {
            return Delivery::default();
        }
        let prev = self.pending.fetch_or(registered, Ordering::AcqRel);
        let delivery = Delivery {
            delivered: registered & !prev,
            coalesced: registered & prev,
        };
        self.delivered
            .fetch_add(delivery.delivered.count_ones(), Ordering::Relaxed);
        self.coalesced
            .fetch_add(delivery.coalesced.count_ones(), Ordering::Relaxed);
        delivery
    }

    /// Consume a pending notification. Returns true if one was pending.
    pub fn take_pending(&self, id: SubscriberId) -> bool {
        self.pending.fetch_and(!id.bit(), Ordering::AcqRel) & id.bit() != 0
    }

    pub fn is_pending(&self, id: SubscriberId) -> bool {
        self.pending.load(Ordering::Acquire) & id.bit() != 0
    }

    /// Drop every subscriber (slot freed or reused).
    pub fn clear(&self) {
        self.registered.store(0, Ordering::Release);
        self.pending.store(0, Ordering::Release);
    }

    /// (delivered, coalesced) totals.
    pub fn stats(&self) -> (u32, u32) {
        (
            self.delivered.load(Ordering::Relaxed),
            self.coalesced.load(Ordering::Relaxed),
        )
    }
}

impl Default for SubscriberTable {
    fn default() -> Self {
        Self::new()
    }
}

/// One event handed to the dispatcher's observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Notification {
    pub slot: usize,
    pub event: EdgeEvent,
    pub delivery: Delivery,
}

/// Drains every slot's event ring and fans out to subscribers.
pub struct Dispatcher<const N: usize> {
    cursors: [EventCursor; N],
    events: u32,
}

impl<const N: usize> Dispatcher<N> {
    /// Dispatcher positioned at every ring's current head.
    pub fn new<C: LineChip>(registry: &Registry<C, N>) -> Self {
        Self {
            cursors: core::array::from_fn(|i| EventCursor::new(registry.slot_events(i))),
            events: 0,
        }
    }

    /// Process everything pending. Returns the number of events handled.
    ///
    /// Ring overruns are recorded as [`FaultCode::EventOverrun`].
    pub fn poll<C: LineChip>(
        &mut self,
        registry: &Registry<C, N>,
        observer: &mut dyn FnMut(Notification),
    ) -> usize {
        let mut handled = 0;
        for (slot, cursor) in self.cursors.iter_mut().enumerate() {
            let stream = registry.slot_events(slot);
            let subscribers = registry.slot_subscribers(slot);

            while let Some(event) = cursor.tick(stream) {
                let delivery = subscribers.notify_all();
                observer(Notification {
                    slot,
                    event,
                    delivery,
                });
                handled += 1;
            }

            if cursor.dropped() > 0 {
                registry.faults().set(FaultCode::EventOverrun, cursor.dropped());
                cursor.reset_dropped();
            }
        }
        self.events = self.events.wrapping_add(handled as u32);
        handled
    }

    /// `poll` without an observer.
    pub fn pump<C: LineChip>(&mut self, registry: &Registry<C, N>) -> usize {
        self.poll(registry, &mut |_| {})
    }

    /// Total events handled.
    pub fn events(&self) -> u32 {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_until_full() {
        let table = SubscriberTable::new();
        for i in 0..MAX_SUBSCRIBERS {
            assert_eq!(table.register().unwrap().index(), i);
        }
        assert_eq!(table.register(), Err(Error::SubscribersFull));
        assert_eq!(table.len(), MAX_SUBSCRIBERS as u32);
    }

    #[test]
    fn test_deregister_frees_position() {
        let table = SubscriberTable::new();
        let a = table.register().unwrap();
        let b = table.register().unwrap();
        assert!(table.deregister(a));
        assert!(!table.deregister(a));
        assert!(table.is_registered(b));
        assert_eq!(table.register().unwrap(), a);
    }

    #[test]
    fn test_notify_coalesces() {
        let table = SubscriberTable::new();
        let a = table.register().unwrap();
        let b = table.register().unwrap();

        let first = table.notify_all();
        assert_eq!(first.delivered.count_ones(), 2);
        assert_eq!(first.coalesced, 0);

        assert!(table.take_pending(a));
        let second = table.notify_all();
        assert_eq!(second.delivered, 1 << a.index());
        assert_eq!(second.coalesced, 1 << b.index());

        assert!(table.take_pending(b));
        assert!(!table.take_pending(b));
        assert_eq!(table.stats(), (3, 1));
    }

    #[test]
    fn test_notify_without_subscribers() {
        let table = SubscriberTable::new();
        assert_eq!(table.notify_all(), Delivery::default());
        assert!(table.is_empty());
    }

    #[test]
    fn test_clear_withdraws_all() {
        let table = SubscriberTable::new();
        let a = table.register().unwrap();
        table.notify_all();
        table.clear();
        assert!(!table.is_registered(a));
        assert!(!table.is_pending(a));
    }
}
