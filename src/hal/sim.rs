//! Simulated GPIO controller.
//!
//! Register model built from atomics only, so it can be shared between the
//! test thread playing "hardware" and the threads using the registry. The
//! clock is manual: nothing moves unless `advance_us` is called.
//!
//! Edges are injected with [`SimChip::set_input`] (returns the pending
//! interrupt, if any) or [`SimChip::raise`] (also delivers it to a sink).
//! Writes through `set_level` never raise interrupts.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use super::{EdgeSink, EdgeTarget, HwError, LineChip};
use crate::sample::{Direction, Level};

/// Number of simulated pins.
pub const SIM_LINES: usize = 64;

struct SimPin {
    level: AtomicU8,
    direction: AtomicU8,
    /// Packed `EdgeTarget`, 0 when no interrupt is attached.
    irq: AtomicU32,
    requested: AtomicBool,
}

impl SimPin {
    const fn new() -> Self {
        Self {
            level: AtomicU8::new(0),
            direction: AtomicU8::new(Direction::In as u8),
            irq: AtomicU32::new(0),
            requested: AtomicBool::new(false),
        }
    }
}

/// Bound simulated line.
#[derive(Debug)]
pub struct SimLine {
    pin: usize,
}

/// Simulated controller covering hardware lines `base .. base + SIM_LINES`.
pub struct SimChip {
    base: u32,
    pins: [SimPin; SIM_LINES],
    clock_us: AtomicU64,
    /// Bitmask of pins that refuse `request`.
    missing: AtomicU64,
    /// Bitmask of pins without interrupt capability.
    no_irq: AtomicU64,
    fail_release: AtomicBool,
    fail_level_reads: AtomicBool,
}

impl SimChip {
    /// Controller whose first line is hardware number `base`.
    pub fn with_base(base: u32) -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const IDLE_PIN: SimPin = SimPin::new();
        Self {
            base,
            pins: [IDLE_PIN; SIM_LINES],
            clock_us: AtomicU64::new(0),
            missing: AtomicU64::new(0),
            no_irq: AtomicU64::new(0),
            fail_release: AtomicBool::new(false),
            fail_level_reads: AtomicBool::new(false),
        }
    }

    /// Controller matching the default registry base (512).
    pub fn new() -> Self {
        Self::with_base(crate::config::DEFAULT_CHIP_BASE)
    }

    fn index(&self, hw_line: u32) -> Result<usize, HwError> {
        let idx = hw_line.checked_sub(self.base).ok_or(HwError::NoSuchLine)? as usize;
        if idx >= SIM_LINES {
            return Err(HwError::NoSuchLine);
        }
        Ok(idx)
    }

    // --- clock ---

    /// Move the monotonic clock forward.
    pub fn advance_us(&self, us: u64) {
        self.clock_us.fetch_add(us, Ordering::SeqCst);
    }

    /// Jump the monotonic clock to `us` (never backwards).
    pub fn set_time_us(&self, us: u64) {
        self.clock_us.fetch_max(us, Ordering::SeqCst);
    }

    // --- failure injection ---

    /// Make `request` of `hw_line` fail with `NoSuchLine`.
    pub fn mark_missing(&self, hw_line: u32) {
        if let Ok(idx) = self.index(hw_line) {
            self.missing.fetch_or(1 << idx, Ordering::SeqCst);
        }
    }

    /// Make `attach_edge_irq` on `hw_line` fail with `NoIrq`.
    pub fn mark_no_irq(&self, hw_line: u32) {
        if let Ok(idx) = self.index(hw_line) {
            self.no_irq.fetch_or(1 << idx, Ordering::SeqCst);
        }
    }

    pub fn fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    pub fn fail_level_reads(&self, fail: bool) {
        self.fail_level_reads.store(fail, Ordering::SeqCst);
    }

    // --- inspection ---

    /// Current level of a pin, regardless of whether it is bound.
    pub fn pin_level(&self, hw_line: u32) -> Option<Level> {
        let idx = self.index(hw_line).ok()?;
        Some(Level::from_raw(self.pins[idx].level.load(Ordering::SeqCst) as u32))
    }

    /// True while `hw_line` is bound by a `request` that was not released.
    pub fn is_requested(&self, hw_line: u32) -> bool {
        self.index(hw_line)
            .map(|idx| self.pins[idx].requested.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Attached interrupt target of `hw_line`, if any.
    pub fn irq_target(&self, hw_line: u32) -> Option<EdgeTarget> {
        let idx = self.index(hw_line).ok()?;
        EdgeTarget::from_raw(self.pins[idx].irq.load(Ordering::SeqCst))
    }

    // --- edge injection ---

    /// Drive the external side of a pin.
    ///
    /// Returns the attached target when the level actually changed, i.e. the
    /// interrupt the controller would raise.
    pub fn set_input(&self, hw_line: u32, level: Level) -> Option<EdgeTarget> {
        let idx = self.index(hw_line).ok()?;
        let pin = &self.pins[idx];
        let prev = pin.level.swap(level.as_u8(), Ordering::SeqCst);
        if prev == level.as_u8() {
            return None;
        }
        EdgeTarget::from_raw(pin.irq.load(Ordering::SeqCst))
    }

    /// `set_input` followed by delivery of the resulting interrupt.
    ///
    /// Returns true when an interrupt was delivered.
    pub fn raise(&self, sink: &dyn EdgeSink, hw_line: u32, level: Level) -> bool {
        match self.set_input(hw_line, level) {
            Some(target) => {
                sink.on_edge(target);
                true
            }
            None => false,
        }
    }
}

impl Default for SimChip {
    fn default() -> Self {
        Self::new()
    }
}

impl LineChip for SimChip {
    type Line = SimLine;

    fn request(&self, hw_line: u32) -> Result<SimLine, HwError> {
        let idx = self.index(hw_line)?;
        if self.missing.load(Ordering::SeqCst) & (1 << idx) != 0 {
            return Err(HwError::NoSuchLine);
        }
        self.pins[idx].requested.store(true, Ordering::SeqCst);
        Ok(SimLine { pin: idx })
    }

    fn release(&self, line: SimLine) -> Result<(), HwError> {
        let pin = &self.pins[line.pin];
        pin.irq.store(0, Ordering::SeqCst);
        pin.requested.store(false, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(HwError::Io);
        }
        Ok(())
    }

    fn hw_line(&self, line: &SimLine) -> u32 {
        self.base + line.pin as u32
    }

    fn level(&self, line: &SimLine) -> Result<Level, HwError> {
        self.sample_level(self.hw_line(line))
    }

    fn set_level(&self, line: &mut SimLine, level: Level) -> Result<(), HwError> {
        self.pins[line.pin].level.store(level.as_u8(), Ordering::SeqCst);
        Ok(())
    }

    fn direction(&self, line: &SimLine) -> Direction {
        match self.pins[line.pin].direction.load(Ordering::SeqCst) {
            0 => Direction::In,
            _ => Direction::Out,
        }
    }

    fn set_direction(&self, line: &mut SimLine, direction: Direction) -> Result<(), HwError> {
        let pin = &self.pins[line.pin];
        if direction == Direction::Out {
            pin.level.store(Level::Low.as_u8(), Ordering::SeqCst);
        }
        pin.direction.store(direction as u8, Ordering::SeqCst);
        Ok(())
    }

    fn sample_level(&self, hw_line: u32) -> Result<Level, HwError> {
        if self.fail_level_reads.load(Ordering::SeqCst) {
            return Err(HwError::Io);
        }
        let idx = self.index(hw_line)?;
        Ok(Level::from_raw(self.pins[idx].level.load(Ordering::SeqCst) as u32))
    }

    fn attach_edge_irq(&self, line: &mut SimLine, target: EdgeTarget) -> Result<(), HwError> {
        if self.no_irq.load(Ordering::SeqCst) & (1 << line.pin) != 0 {
            return Err(HwError::NoIrq);
        }
        self.pins[line.pin].irq.store(target.to_raw(), Ordering::SeqCst);
        Ok(())
    }

    fn detach_edge_irq(&self, line: &mut SimLine) {
        self.pins[line.pin].irq.store(0, Ordering::SeqCst);
    }

    fn now_us(&self) -> u64 {
        self.clock_us.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_out_of_range() {
        let chip = SimChip::with_base(512);
        assert!(matches!(chip.request(511), Err(HwError::NoSuchLine)));
        assert!(matches!(chip.request(512 + SIM_LINES as u32), Err(HwError::NoSuchLine)));
        assert!(chip.request(529).is_ok());
        assert!(chip.is_requested(529));
    }

    #[test]
    fn test_output_starts_low() {
        let chip = SimChip::new();
        let mut line = chip.request(530).unwrap();
        chip.set_input(530, Level::High);
        chip.set_direction(&mut line, Direction::Out).unwrap();
        assert_eq!(chip.level(&line), Ok(Level::Low));
        assert_eq!(chip.direction(&line), Direction::Out);
    }

    #[test]
    fn test_set_input_reports_only_changes() {
        let chip = SimChip::new();
        let mut line = chip.request(529).unwrap();
        let target = EdgeTarget::new(0, 5);
        chip.attach_edge_irq(&mut line, target).unwrap();

        assert_eq!(chip.set_input(529, Level::High), Some(target));
        assert_eq!(chip.set_input(529, Level::High), None);
        assert_eq!(chip.set_input(529, Level::Low), Some(target));

        chip.detach_edge_irq(&mut line);
        assert_eq!(chip.set_input(529, Level::High), None);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let chip = SimChip::new();
        chip.advance_us(100);
        chip.set_time_us(50);
        assert_eq!(chip.now_us(), 100);
        chip.set_time_us(1_000);
        assert_eq!(chip.now_us(), 1_000);
    }
}
