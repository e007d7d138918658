//! Line registry: fixed-capacity table of exported GPIO lines.
//!
//! # Architecture
//!
//! ```text
//!                   table lock (export / unexport / shutdown)
//!                        │
//!   slot 0  ┌────────────▼─────────────┐
//!   slot 1  │ entry: Mutex<LineEntry>  │ ◀── lookup / attributes / control
//!   ...     │ armed, hw_line, in_flight│ ◀── edge handler (atomics only)
//!   slot N-1│ timer, events, subs      │ ──▶ dispatcher (atomics only)
//!           └──────────────────────────┘
//! ```
//!
//! # Rules
//!
//! - Lock order: table, then a slot's entry lock
//! - The edge handler takes no lock: it sees the slot only through atomics
//! - `armed` is the single authoritative arm state; the handler acts only
//!   when it matches the exact target it was raised for
//! - Disarm clears `armed`, detaches, then waits for `in_flight == 0`, so no
//!   handler body runs for that entry once disarm returns
//! - Do not hold an [`EntryRef`] while calling export/unexport/shutdown on
//!   the same thread: the entry lock is a spin lock

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use spin::{Mutex, MutexGuard};

use crate::classifier::{EdgeTimer, Windows};
use crate::config::{ClassifierConfig, RegistryConfig, DEFAULT_CAPACITY};
use crate::error::{Error, Result};
use crate::fanout::SubscriberTable;
use crate::fault::{FaultCode, FaultState};
use crate::hal::{EdgeSink, EdgeTarget, LineChip};
use crate::sample::{Direction, EdgeEvent, EdgeKind, Level};
use crate::stream::EventStream;
use crate::{rt_debug, rt_info, rt_warn, BG_LOG_STREAM, RT_LOG_STREAM};

/// One exported physical line.
pub struct LineEntry<L> {
    physical_id: u32,
    hw_line: u32,
    line: L,
    /// Interrupt registration while armed.
    source: Option<EdgeTarget>,
}

impl<L> LineEntry<L> {
    pub fn physical_id(&self) -> u32 {
        self.physical_id
    }

    pub fn hw_line(&self) -> u32 {
        self.hw_line
    }

    pub fn is_armed(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<EdgeTarget> {
        self.source
    }

    pub(crate) fn line(&self) -> &L {
        &self.line
    }

    pub(crate) fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }
}

/// Registry position.
pub(crate) struct Slot<L> {
    entry: Mutex<Option<LineEntry<L>>>,
    /// Non-zero while occupied; a new value for every export.
    occupancy: AtomicU32,
    /// Physical id of the occupant (valid while `occupancy != 0`).
    physical_id: AtomicU32,
    /// Packed `EdgeTarget` while armed, 0 when disarmed.
    armed: AtomicU32,
    /// Hardware number sampled by the edge handler.
    hw_line: AtomicU32,
    /// Edge handler invocations currently inside their body.
    in_flight: AtomicU32,
    timer: EdgeTimer,
    events: EventStream,
    subscribers: SubscriberTable,
}

impl<L> Slot<L> {
    fn new() -> Self {
        Self {
            entry: Mutex::new(None),
            occupancy: AtomicU32::new(0),
            physical_id: AtomicU32::new(0),
            armed: AtomicU32::new(0),
            hw_line: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            timer: EdgeTimer::new(),
            events: EventStream::new(),
            subscribers: SubscriberTable::new(),
        }
    }
}

/// Snapshot of one occupied slot, for listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotInfo {
    pub slot: usize,
    pub physical_id: u32,
    pub armed: bool,
    pub direction: Direction,
    pub subscribers: u32,
}

/// Fixed-capacity registry of exported lines.
///
/// `N` is the capacity (at most 256 so a slot number fits an
/// [`EdgeTarget`]). The shared counter lives here: one per registry.
pub struct Registry<C: LineChip, const N: usize = DEFAULT_CAPACITY> {
    chip: C,
    config: RegistryConfig,
    classifier: ClassifierConfig,
    slots: [Slot<C::Line>; N],
    /// Serializes export/unexport/shutdown (single-writer discipline).
    table: Mutex<()>,
    count: AtomicI32,
    next_target_gen: AtomicU32,
    next_occupancy: AtomicU32,
    faults: FaultState,
}

impl<C: LineChip, const N: usize> Registry<C, N> {
    /// Create an empty registry with the reference classification windows.
    pub fn new(chip: C, config: RegistryConfig) -> Self {
        Self::with_windows(chip, config, Windows::DEFAULT)
    }

    /// Create an empty registry with custom classification windows.
    ///
    /// # Panics
    ///
    /// Panics if `N` is 0 or above 256, or if `windows` are empty or
    /// overlap (the same windows `ClassifierConfig::set_windows` refuses).
    pub fn with_windows(chip: C, config: RegistryConfig, windows: Windows) -> Self {
        assert!(N > 0 && N <= 256, "Registry capacity must be 1..=256");
        assert!(windows.is_valid(), "Classification windows must be non-empty and disjoint");

        Self {
            chip,
            config,
            classifier: ClassifierConfig::new(windows),
            slots: core::array::from_fn(|_| Slot::new()),
            table: Mutex::new(()),
            count: AtomicI32::new(0),
            next_target_gen: AtomicU32::new(1),
            next_occupancy: AtomicU32::new(1),
            faults: FaultState::new(),
        }
    }

    // --- accessors ---

    pub fn chip(&self) -> &C {
        &self.chip
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Runtime-adjustable windows.
    pub fn classifier(&self) -> &ClassifierConfig {
        &self.classifier
    }

    pub fn faults(&self) -> &FaultState {
        &self.faults
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Shared counter snapshot.
    #[inline]
    pub fn count(&self) -> i32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.occupancy.load(Ordering::Acquire) != 0)
            .count()
    }

    fn timestamp(&self) -> i64 {
        self.chip.now_us() as i64
    }

    pub(crate) fn slot(&self, idx: usize) -> &Slot<C::Line> {
        &self.slots[idx]
    }

    pub(crate) fn slot_events(&self, idx: usize) -> &EventStream {
        &self.slots[idx].events
    }

    pub(crate) fn slot_subscribers(&self, idx: usize) -> &SubscriberTable {
        &self.slots[idx].subscribers
    }

    /// Occupancy token of a slot (0 when free).
    pub(crate) fn occupancy(&self, idx: usize) -> u32 {
        self.slots
            .get(idx)
            .map(|s| s.occupancy.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    fn next_occupancy(&self) -> u32 {
        loop {
            let token = self.next_occupancy.fetch_add(1, Ordering::Relaxed);
            if token != 0 {
                return token;
            }
        }
    }

    /// Slot holding `physical_id`. Caller holds the table lock.
    fn find_occupied(&self, physical_id: u32) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.occupancy.load(Ordering::Acquire) != 0
                && s.physical_id.load(Ordering::Acquire) == physical_id
        })
    }

    // --- lifecycle ---

    /// Export a physical line into the first free slot.
    ///
    /// The line is bound, switched to input, and its node `line<id>` with
    /// the `value` and `direction` attributes becomes reachable.
    pub fn export(&self, physical_id: u32) -> Result<usize> {
        let _table = self.table.lock();

        if self.find_occupied(physical_id).is_some() {
            return Err(Error::AlreadyExported);
        }
        let idx = self
            .slots
            .iter()
            .position(|s| s.occupancy.load(Ordering::Acquire) == 0)
            .ok_or(Error::Exhausted)?;

        let hw_line = self
            .config
            .chip_base
            .checked_add(physical_id)
            .ok_or(Error::NoSuchLine)?;
        let mut line = self.chip.request(hw_line).map_err(|_| Error::NoSuchLine)?;
        if let Err(e) = self.chip.set_direction(&mut line, Direction::In) {
            let _ = self.chip.release(line);
            return Err(e.into());
        }

        let slot = &self.slots[idx];
        let mut guard = slot.entry.lock();
        *guard = Some(LineEntry {
            physical_id,
            hw_line,
            line,
            source: None,
        });
        slot.subscribers.clear();
        slot.physical_id.store(physical_id, Ordering::Release);
        slot.occupancy.store(self.next_occupancy(), Ordering::Release);
        drop(guard);

        rt_info!(BG_LOG_STREAM, self.timestamp(), "Exported line {} at slot {}", physical_id, idx);
        Ok(idx)
    }

    /// Unexport a physical line.
    ///
    /// Disarms first if armed, withdraws the node and its attributes,
    /// releases the hardware line and frees the slot. A hardware release
    /// failure is recorded as a fault; the slot is freed regardless.
    pub fn unexport(&self, physical_id: u32) -> Result<()> {
        let _table = self.table.lock();
        let idx = self.find_occupied(physical_id).ok_or(Error::NotFound)?;
        self.release_slot(idx)
    }

    /// Free slot `idx`. Caller holds the table lock.
    fn release_slot(&self, idx: usize) -> Result<()> {
        let slot = &self.slots[idx];
        let mut guard = slot.entry.lock();
        let mut entry = guard.take().ok_or(Error::NotFound)?;

        // Handles and attribute paths see NoSuchDevice from here on
        slot.occupancy.store(0, Ordering::Release);
        if entry.source.is_some() {
            self.disarm(slot, &mut entry);
        }
        slot.subscribers.clear();
        drop(guard);

        let physical_id = entry.physical_id;
        if self.chip.release(entry.line).is_err() {
            self.faults.set(FaultCode::ReleaseFailed, physical_id);
            rt_warn!(BG_LOG_STREAM, self.timestamp(), "Release of line {} failed", physical_id);
        }

        rt_info!(BG_LOG_STREAM, self.timestamp(), "Unexported line {}", physical_id);
        Ok(())
    }

    /// Unexport every occupied slot, ignoring per-entry failures.
    ///
    /// Returns the number of slots freed.
    pub fn shutdown(&self) -> usize {
        let _table = self.table.lock();
        let mut freed = 0;
        for idx in 0..N {
            if self.slots[idx].occupancy.load(Ordering::Acquire) == 0 {
                continue;
            }
            if self.release_slot(idx).is_ok() {
                freed += 1;
            }
        }
        if freed > 0 {
            rt_info!(BG_LOG_STREAM, self.timestamp(), "Shutdown released {} line(s)", freed);
        }
        freed
    }

    // --- lookup ---

    /// Resolve a slot number to its entry.
    ///
    /// Sole admission path for the control plane and the attribute surface.
    /// The returned reference holds the slot's entry lock.
    pub fn lookup(&self, slot: usize) -> Result<EntryRef<'_, C, N>> {
        let s = self.slots.get(slot).ok_or(Error::NoSuchDevice)?;
        let guard = s.entry.lock();
        if guard.is_none() {
            return Err(Error::NoSuchDevice);
        }
        Ok(EntryRef {
            registry: self,
            slot,
            guard,
        })
    }

    /// `lookup`, additionally requiring the occupant to be `occupancy`.
    pub(crate) fn lookup_occupant(&self, slot: usize, occupancy: u32) -> Result<EntryRef<'_, C, N>> {
        let entry = self.lookup(slot)?;
        if self.slots[slot].occupancy.load(Ordering::Acquire) != occupancy {
            return Err(Error::NoSuchDevice);
        }
        Ok(entry)
    }

    /// Slot currently holding `physical_id`.
    pub fn slot_of(&self, physical_id: u32) -> Option<usize> {
        let _table = self.table.lock();
        self.find_occupied(physical_id)
    }

    /// Listing entry for `slot`, `None` when free.
    pub fn slot_info(&self, slot: usize) -> Option<SlotInfo> {
        let entry = self.lookup(slot).ok()?;
        let e = entry.entry().ok()?;
        Some(SlotInfo {
            slot,
            physical_id: e.physical_id,
            armed: e.is_armed(),
            direction: self.chip.direction(&e.line),
            subscribers: self.slots[slot].subscribers.len(),
        })
    }

    /// Occupied slots in slot order.
    pub fn exported(&self) -> impl Iterator<Item = SlotInfo> + '_ {
        (0..N).filter_map(move |slot| self.slot_info(slot))
    }

    // --- arming ---

    fn arm(&self, slot_idx: usize, entry: &mut LineEntry<C::Line>) -> Result<()> {
        if entry.source.is_some() {
            return Err(Error::AlreadyArmed);
        }
        let slot = &self.slots[slot_idx];
        let gen = self.next_target_gen.fetch_add(1, Ordering::Relaxed);
        let target = EdgeTarget::new(slot_idx as u8, gen);

        slot.timer.reset(self.chip.now_us());
        slot.hw_line.store(entry.hw_line, Ordering::Release);
        // Publish before attaching so the very first edge is accepted
        slot.armed.store(target.to_raw(), Ordering::SeqCst);

        if self.chip.attach_edge_irq(&mut entry.line, target).is_err() {
            slot.armed.store(0, Ordering::SeqCst);
            Self::wait_idle(slot);
            rt_warn!(BG_LOG_STREAM, self.timestamp(), "IRQ request failed for line {}", entry.physical_id);
            return Err(Error::BindError);
        }

        entry.source = Some(target);
        rt_info!(BG_LOG_STREAM, self.timestamp(), "Armed line {} (slot {})", entry.physical_id, slot_idx);
        Ok(())
    }

    /// Detach and wait out any handler still running. Caller holds the entry lock.
    fn disarm(&self, slot: &Slot<C::Line>, entry: &mut LineEntry<C::Line>) -> bool {
        if entry.source.take().is_none() {
            return false;
        }
        slot.armed.store(0, Ordering::SeqCst);
        self.chip.detach_edge_irq(&mut entry.line);
        Self::wait_idle(slot);
        rt_info!(BG_LOG_STREAM, self.timestamp(), "Disarmed line {}", entry.physical_id);
        true
    }

    fn wait_idle(slot: &Slot<C::Line>) {
        while slot.in_flight.load(Ordering::SeqCst) != 0 {
            core::hint::spin_loop();
        }
    }

    // --- interrupt path ---

    /// Classify one edge of an armed slot. Interrupt context.
    fn handle_edge(&self, slot_idx: usize, slot: &Slot<C::Line>) {
        let now = self.chip.now_us();
        let hw_line = slot.hw_line.load(Ordering::Acquire);
        let level = match self.chip.sample_level(hw_line) {
            Ok(level) => Some(level),
            Err(_) => {
                self.faults.set(FaultCode::LevelReadFailed, hw_line);
                None
            }
        };

        let windows = self.classifier.windows();
        let obs = slot.timer.observe(now, level, &windows);

        match obs.kind {
            EdgeKind::Ignored => {
                if level == Some(Level::Low) {
                    rt_info!(RT_LOG_STREAM, now as i64, "[slot {}] Ignored pulse (delta: {} us)", slot_idx, obs.delta_us);
                } else {
                    rt_debug!(RT_LOG_STREAM, now as i64, "[slot {}] Edge (delta: {} us)", slot_idx, obs.delta_us);
                }
            }
            kind => {
                let step = kind.delta();
                let count = self.count.fetch_add(step, Ordering::SeqCst).wrapping_add(step);
                slot.events.push(EdgeEvent::new(kind, obs.delta_us, count));
                rt_info!(
                    RT_LOG_STREAM,
                    now as i64,
                    "[slot {}] Detected {} (delta: {} us), count: {}",
                    slot_idx,
                    kind.as_str(),
                    obs.delta_us,
                    count
                );
            }
        }
    }
}

impl<C: LineChip, const N: usize> EdgeSink for Registry<C, N> {
    /// Interrupt entry point: never blocks, never allocates, never fails.
    fn on_edge(&self, target: EdgeTarget) {
        let idx = target.slot();
        let Some(slot) = self.slots.get(idx) else {
            self.faults.set(FaultCode::StaleTarget, target.to_raw());
            return;
        };

        slot.in_flight.fetch_add(1, Ordering::SeqCst);
        if slot.armed.load(Ordering::SeqCst) == target.to_raw() {
            self.handle_edge(idx, slot);
        } else {
            // Disarmed (or re-armed) after the interrupt was raised
            self.faults.set(FaultCode::StaleTarget, target.to_raw());
        }
        slot.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<C: LineChip, const N: usize> Drop for Registry<C, N> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Locked reference to an occupied slot's entry.
///
/// Attribute accessors live in [`crate::attr`], control-plane operations in
/// [`crate::control`].
pub struct EntryRef<'r, C: LineChip, const N: usize> {
    pub(crate) registry: &'r Registry<C, N>,
    pub(crate) slot: usize,
    guard: MutexGuard<'r, Option<LineEntry<C::Line>>>,
}

impl<'r, C: LineChip, const N: usize> EntryRef<'r, C, N> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn entry(&self) -> Result<&LineEntry<C::Line>> {
        self.guard.as_ref().ok_or(Error::NoSuchDevice)
    }

    pub(crate) fn entry_mut(&mut self) -> Result<&mut LineEntry<C::Line>> {
        self.guard.as_mut().ok_or(Error::NoSuchDevice)
    }

    pub fn physical_id(&self) -> Result<u32> {
        self.entry().map(|e| e.physical_id)
    }

    pub fn is_armed(&self) -> bool {
        self.entry().map(|e| e.is_armed()).unwrap_or(false)
    }

    /// Occupancy token of this slot's current occupant.
    pub(crate) fn occupancy(&self) -> u32 {
        self.registry.slot(self.slot).occupancy.load(Ordering::Acquire)
    }

    pub(crate) fn arm(&mut self) -> Result<()> {
        let registry = self.registry;
        let slot = self.slot;
        let entry = self.entry_mut()?;
        registry.arm(slot, entry)
    }

    pub(crate) fn disarm(&mut self) -> Result<()> {
        let registry = self.registry;
        let slot = registry.slot(self.slot);
        let entry = self.entry_mut()?;
        if registry.disarm(slot, entry) {
            Ok(())
        } else {
            Err(Error::NotArmed)
        }
    }
}
