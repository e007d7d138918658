//! Fault state for EdgeLineRegistry.
//!
//! The edge handler never returns errors to anyone. Whatever goes wrong in
//! interrupt context (unreadable level, interrupt for an entry that was
//! disarmed meanwhile) and whatever teardown tolerates (release failures)
//! is recorded here for diagnostics instead.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Fault codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault (normal operation).
    None = 0,

    /// Event ring overrun: the dispatcher fell behind an edge handler.
    /// Data: number of events skipped.
    EventOverrun = 1,

    /// Level read failed inside the edge handler.
    /// Data: hardware line number.
    LevelReadFailed = 2,

    /// Interrupt arrived for a slot that is no longer armed with that target.
    /// Data: packed edge target.
    StaleTarget = 3,

    /// Hardware refused to release a line during unexport/shutdown.
    /// Data: physical line id.
    ReleaseFailed = 4,
}

impl FaultCode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => FaultCode::None,
            1 => FaultCode::EventOverrun,
            2 => FaultCode::LevelReadFailed,
            3 => FaultCode::StaleTarget,
            4 => FaultCode::ReleaseFailed,
            _ => FaultCode::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::None => "none",
            FaultCode::EventOverrun => "event-overrun",
            FaultCode::LevelReadFailed => "level-read-failed",
            FaultCode::StaleTarget => "stale-target",
            FaultCode::ReleaseFailed => "release-failed",
        }
    }
}

/// Thread-safe, interrupt-safe fault state.
///
/// Holds the most recent fault and a running count. Setting never blocks.
///
/// # Usage
///
/// ```ignore
/// // In the edge handler:
/// let level = match chip.sample_level(hw_line) {
///     Ok(level) => Some(level),
///     Err(_) => {
///         faults.set(FaultCode::LevelReadFailed, hw_line);
///         None
///     }
/// };
///
/// // In the console `stats` command:
/// let snap = faults.snapshot();
/// ```
pub struct FaultState {
    /// True if fault is active.
    active: AtomicBool,

    /// Fault code (reason for fault).
    code: AtomicU8,

    /// Additional data (meaning depends on code).
    data: AtomicU32,

    /// Total fault count since boot (never cleared).
    count: AtomicU32,
}

impl FaultState {
    /// Create new fault state (no fault).
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            code: AtomicU8::new(0),
            data: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }

    /// Set fault state.
    ///
    /// This atomically sets the fault as active with the given code and data.
    /// Increments the fault counter.
    #[inline]
    pub fn set(&self, code: FaultCode, data: u32) {
        self.code.store(code as u8, Ordering::Release);
        self.data.store(data, Ordering::Release);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    /// Check if fault is currently active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Get fault code (only meaningful if `is_active()` is true).
    #[inline]
    pub fn code(&self) -> FaultCode {
        FaultCode::from_u8(self.code.load(Ordering::Acquire))
    }

    /// Get fault data (meaning depends on fault code).
    #[inline]
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Acquire)
    }

    /// Get total fault count since boot.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Clear fault state (after it was reported).
    ///
    /// Note: This clears the active flag but does NOT reset the counter.
    /// Fault history is preserved for diagnostics.
    #[inline]
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Get a snapshot of the current fault state.
    #[inline]
    pub fn snapshot(&self) -> FaultSnapshot {
        FaultSnapshot {
            active: self.is_active(),
            code: self.code(),
            data: self.data(),
            count: self.count(),
        }
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of fault state at a point in time.
#[derive(Clone, Copy, Debug)]
pub struct FaultSnapshot {
    pub active: bool,
    pub code: FaultCode,
    pub data: u32,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_state_basic() {
        let fault = FaultState::new();

        assert!(!fault.is_active());
        assert_eq!(fault.code(), FaultCode::None);
        assert_eq!(fault.count(), 0);

        fault.set(FaultCode::LevelReadFailed, 529);

        assert!(fault.is_active());
        assert_eq!(fault.code(), FaultCode::LevelReadFailed);
        assert_eq!(fault.data(), 529);
        assert_eq!(fault.count(), 1);

        fault.clear();

        assert!(!fault.is_active());
        assert_eq!(fault.count(), 1); // Count preserved
    }

    #[test]
    fn test_fault_count_accumulates() {
        let fault = FaultState::new();

        fault.set(FaultCode::EventOverrun, 1);
        fault.clear();
        fault.set(FaultCode::StaleTarget, 2);
        fault.clear();
        fault.set(FaultCode::ReleaseFailed, 3);

        assert_eq!(fault.count(), 3);
        assert_eq!(fault.snapshot().code, FaultCode::ReleaseFailed);
    }

    #[test]
    fn test_fault_code_roundtrip() {
        for code in [
            FaultCode::None,
            FaultCode::EventOverrun,
            FaultCode::LevelReadFailed,
            FaultCode::StaleTarget,
            FaultCode::ReleaseFailed,
        ] {
            assert_eq!(FaultCode::from_u8(code as u8), code);
        }
        assert_eq!(FaultCode::from_u8(200), FaultCode::None);
    }
}
