//! Control plane tests: arming state machine, handles, synchronous disarm

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use edge_line_registry::{Command, Error, FaultCode, Level, Registry, RegistryConfig, SimChip};

const LINE: u32 = 17;
const HW: u32 = 512 + LINE;

fn exported() -> Registry<SimChip> {
    let reg = Registry::new(SimChip::new(), RegistryConfig::default());
    reg.export(LINE).unwrap();
    reg
}

#[test]
fn test_open_free_slot() {
    let reg = exported();
    assert!(matches!(reg.open(1), Err(Error::NoSuchDevice)));
    assert!(matches!(reg.open(99), Err(Error::NoSuchDevice)));
}

#[test]
fn test_ioctl_commands() {
    let reg = exported();
    let handle = reg.open(0).unwrap();

    assert_eq!(handle.ioctl(Command::EnableNotification), Ok(0));
    assert_eq!(handle.ioctl(Command::GetCount), Ok(0));
    assert_eq!(handle.ioctl(Command::DisableNotification), Ok(0));

    let raw = Command::EnableNotification.to_raw();
    assert_eq!(Command::from_raw(raw), Ok(Command::EnableNotification));
    assert_eq!(handle.ioctl_raw(raw, None), Ok(()));
    assert_eq!(handle.ioctl_raw(0xdead_beef, None), Err(Error::NotSupported));
}

#[test]
fn test_read_reports_count() {
    let reg = exported();
    let mut handle = reg.open(0).unwrap();
    handle.enable().unwrap();

    let chip = reg.chip();
    chip.advance_us(5_000);
    chip.raise(&reg, HW, Level::High);
    chip.advance_us(200_000);
    chip.raise(&reg, HW, Level::Low);

    let mut buf = [0u8; 8];
    let len = handle.read(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"-1\n");
    assert_eq!(handle.read(&mut buf), Ok(0));
    assert_eq!(handle.get_count(), Ok(-1));
}

#[test]
fn test_unexport_of_armed_line_disarms_first() {
    let reg = exported();
    let handle = reg.open(0).unwrap();
    handle.enable().unwrap();
    let target = reg.chip().irq_target(HW).unwrap();

    reg.unexport(LINE).unwrap();
    assert!(reg.chip().irq_target(HW).is_none());

    // A late interrupt for the old registration is a no-op
    reg.chip().advance_us(100_000);
    use edge_line_registry::EdgeSink;
    reg.on_edge(target);
    assert_eq!(reg.count(), 0);
    assert_eq!(reg.faults().code(), FaultCode::StaleTarget);

    assert_eq!(handle.get_count(), Err(Error::NoSuchDevice));
}

#[test]
fn test_rearm_issues_fresh_target() {
    let reg = exported();
    let handle = reg.open(0).unwrap();
    handle.enable().unwrap();
    let first = reg.chip().irq_target(HW).unwrap();
    handle.disable().unwrap();
    handle.enable().unwrap();
    let second = reg.chip().irq_target(HW).unwrap();
    assert_ne!(first, second);
    assert_eq!(first.slot(), second.slot());
}

#[test]
fn test_close_disarms_by_default() {
    let reg = exported();
    reg.open(0).unwrap().enable().unwrap();
    assert!(reg.chip().irq_target(HW).is_none());
    assert!(!reg.lookup(0).unwrap().is_armed());
}

#[test]
fn test_close_of_second_handle() {
    let config = RegistryConfig::default().with_disarm_on_close(false);
    let reg = Registry::<SimChip>::new(SimChip::new(), config);
    reg.export(LINE).unwrap();

    let first = reg.open(0).unwrap();
    first.enable().unwrap();
    drop(reg.open(0).unwrap());
    assert!(reg.lookup(0).unwrap().is_armed());
    drop(first);
    assert!(reg.lookup(0).unwrap().is_armed());
}

#[test]
fn test_handle_closes_after_its_entry_is_released() {
    let (done_tx, done_rx) = mpsc::channel();

    thread::spawn(move || {
        let reg = exported();
        let handle = reg.open(0).unwrap();
        {
            let mut entry = handle.entry().unwrap();
            entry.enable().unwrap();
            assert_eq!(entry.physical_id(), Ok(LINE));
        }
        drop(handle);
        let armed = reg.lookup(0).unwrap().is_armed();
        let _ = done_tx.send(armed);
    });

    // Close must not wait on a lock the handle's own entry still holds
    let armed = done_rx
        .recv_timeout(Duration::from_secs(3))
        .expect("handle close blocked");
    assert!(!armed);
}

#[test]
fn test_disable_waits_for_in_flight_edges() {
    use edge_line_registry::EdgeSink;

    let reg = exported();
    let handle = reg.open(0).unwrap();
    handle.enable().unwrap();
    let target = reg.chip().irq_target(HW).unwrap();
    let stop = AtomicBool::new(false);

    thread::scope(|s| {
        // Plays the interrupt: every edge is a 100 ms falling edge
        s.spawn(|| {
            while !stop.load(Ordering::SeqCst) {
                reg.chip().advance_us(100_000);
                reg.on_edge(target);
            }
        });

        while reg.count() < 50 {
            thread::yield_now();
        }
        handle.disable().unwrap();

        // No handler body runs once disable has returned
        let frozen = reg.count();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(reg.count(), frozen);

        stop.store(true, Ordering::SeqCst);
    });

    assert_eq!(reg.faults().code(), FaultCode::StaleTarget);
}
