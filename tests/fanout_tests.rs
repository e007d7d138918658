//! Notification fan-out tests: dispatcher, subscribers, coalescing

use edge_line_registry::config::{EVENT_RING_SIZE, MAX_SUBSCRIBERS};
use edge_line_registry::{
    Dispatcher, EdgeKind, Error, FaultCode, Level, Notification, Registry, RegistryConfig, SimChip,
};

const LINE: u32 = 17;
const HW: u32 = 512 + LINE;

fn armed() -> Registry<SimChip> {
    let reg = Registry::new(SimChip::new(), RegistryConfig::default().with_disarm_on_close(false));
    let slot = reg.export(LINE).unwrap();
    reg.lookup(slot).unwrap().enable().unwrap();
    reg
}

fn pulse(reg: &Registry<SimChip>, width_us: u64) {
    let chip = reg.chip();
    chip.advance_us(10_000);
    chip.raise(reg, HW, Level::High);
    chip.advance_us(width_us);
    chip.raise(reg, HW, Level::Low);
}

fn collect(dispatcher: &mut Dispatcher<10>, reg: &Registry<SimChip>) -> Vec<Notification> {
    let mut seen = Vec::new();
    dispatcher.poll(reg, &mut |n| seen.push(n));
    seen
}

#[test]
fn test_every_subscriber_notified() {
    let reg = armed();
    let mut dispatcher = Dispatcher::new(&reg);
    let mut a = reg.open(0).unwrap();
    let mut b = reg.open(0).unwrap();
    a.register_async().unwrap();
    b.register_async().unwrap();

    pulse(&reg, 100_000);
    let seen = collect(&mut dispatcher, &reg);

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].slot, 0);
    assert_eq!(seen[0].event.kind, EdgeKind::Entry);
    assert_eq!(seen[0].event.count, 1);
    assert_eq!(seen[0].delivery.delivered.count_ones(), 2);
    assert!(a.take_notification());
    assert!(b.take_notification());
    assert!(!a.take_notification());
}

#[test]
fn test_slow_subscriber_coalesces() {
    let reg = armed();
    let mut dispatcher = Dispatcher::new(&reg);
    let mut slow = reg.open(0).unwrap();
    slow.register_async().unwrap();

    pulse(&reg, 100_000);
    pulse(&reg, 100_000);
    pulse(&reg, 200_000);
    let seen = collect(&mut dispatcher, &reg);

    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].delivery.delivered, 1);
    assert_eq!(seen[1].delivery.coalesced, 1);
    assert_eq!(seen[2].delivery.coalesced, 1);

    // One pending hint, and the counter tells the whole story
    assert!(slow.take_notification());
    assert!(!slow.take_notification());
    assert_eq!(slow.get_count(), Ok(1));
}

#[test]
fn test_subscriber_limit() {
    let reg = armed();
    let mut handles: Vec<_> = (0..=MAX_SUBSCRIBERS).map(|_| reg.open(0).unwrap()).collect();

    for handle in handles.iter_mut().take(MAX_SUBSCRIBERS) {
        handle.register_async().unwrap();
    }
    assert_eq!(handles[MAX_SUBSCRIBERS].register_async(), Err(Error::SubscribersFull));

    // Closing one frees a position
    handles.remove(0);
    assert!(handles[MAX_SUBSCRIBERS - 1].register_async().is_ok());
}

#[test]
fn test_closed_handle_not_notified() {
    let reg = armed();
    let mut dispatcher = Dispatcher::new(&reg);
    let mut stays = reg.open(0).unwrap();
    stays.register_async().unwrap();
    {
        let mut leaves = reg.open(0).unwrap();
        leaves.register_async().unwrap();
    }

    pulse(&reg, 100_000);
    let seen = collect(&mut dispatcher, &reg);
    assert_eq!(seen[0].delivery.delivered.count_ones(), 1);
    assert!(stays.take_notification());
}

#[test]
fn test_unregister_async() {
    let reg = armed();
    let mut dispatcher = Dispatcher::new(&reg);
    let mut handle = reg.open(0).unwrap();
    handle.register_async().unwrap();
    assert!(handle.unregister_async());
    assert!(!handle.unregister_async());

    pulse(&reg, 100_000);
    let seen = collect(&mut dispatcher, &reg);
    assert_eq!(seen[0].delivery.delivered, 0);
    assert!(!handle.take_notification());
}

#[test]
fn test_only_classified_edges_notify() {
    let reg = armed();
    let mut dispatcher = Dispatcher::new(&reg);
    let mut handle = reg.open(0).unwrap();
    handle.register_async().unwrap();

    pulse(&reg, 5_000);
    pulse(&reg, 150_000);
    assert_eq!(dispatcher.pump(&reg), 0);
    assert!(!handle.take_notification());

    pulse(&reg, 200_000);
    assert_eq!(dispatcher.pump(&reg), 1);
    assert!(handle.take_notification());
    assert_eq!(dispatcher.events(), 1);
}

#[test]
fn test_ring_overrun_recorded() {
    let reg = armed();
    let mut dispatcher = Dispatcher::new(&reg);
    let pushed = EVENT_RING_SIZE + 4;
    // The slot the next push lands in is never readable
    let readable = EVENT_RING_SIZE - 1;

    for _ in 0..pushed {
        pulse(&reg, 100_000);
    }
    let seen = collect(&mut dispatcher, &reg);

    assert_eq!(seen.len(), readable);
    let lost = pushed - readable;
    assert_eq!(seen[0].event.count, lost as i32 + 1);
    assert_eq!(reg.faults().code(), FaultCode::EventOverrun);
    assert_eq!(reg.faults().data(), lost as u32);
    // Nothing lost from the counter itself
    assert_eq!(reg.count(), pushed as i32);
}

#[test]
fn test_subscribers_withdrawn_on_unexport() {
    let reg = armed();
    let mut handle = reg.open(0).unwrap();
    handle.register_async().unwrap();

    reg.unexport(LINE).unwrap();
    assert!(!handle.take_notification());

    // The reused slot starts with an empty table
    let slot = reg.export(LINE + 1).unwrap();
    assert_eq!(slot, 0);
    assert_eq!(reg.slot_info(0).unwrap().subscribers, 0);
}
