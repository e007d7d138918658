//! Module: config
//!
//! Purpose: Configuration for EdgeLineRegistry.
//!
//! Architecture:
//! - `RegistryConfig`: fixed at construction (hardware base, close policy)
//! - `ClassifierConfig`: window bounds, changeable at runtime, read by the
//!   interrupt path through atomics guarded by a generation counter
//! - `PARAMS`: descriptor table driving the console `set`/`show` commands
//!
//! Safety: RT-safe. Classifier config access is atomics only, no locks.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::classifier::{Window, Windows};

/// Default hardware number of physical line 0.
pub const DEFAULT_CHIP_BASE: u32 = 512;

/// Default number of concurrently exported lines.
pub const DEFAULT_CAPACITY: usize = 10;

/// Subscriber positions per entry.
pub const MAX_SUBSCRIBERS: usize = 8;

/// Slots in each entry's event ring (power of 2). One slot is the
/// producer's landing zone, so `EVENT_RING_SIZE - 1` events stay readable.
pub const EVENT_RING_SIZE: usize = 16;

/// Construction-time registry settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Hardware line number = `chip_base + physical_id`.
    pub chip_base: u32,
    /// Closing a handle disarms its entry if it is armed.
    pub disarm_on_close: bool,
}

impl RegistryConfig {
    pub const fn new() -> Self {
        Self {
            chip_base: DEFAULT_CHIP_BASE,
            disarm_on_close: true,
        }
    }

    pub const fn with_chip_base(mut self, chip_base: u32) -> Self {
        self.chip_base = chip_base;
        self
    }

    pub const fn with_disarm_on_close(mut self, disarm: bool) -> Self {
        self.disarm_on_close = disarm;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a parameter change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSetError {
    /// Value outside the descriptor's min/max.
    OutOfRange,
    /// Resulting windows are empty or overlap.
    InvalidWindows,
}

/// Runtime-adjustable classification windows.
///
/// Writers bump `generation` to an odd value, store, then bump it back to
/// even. Readers retry while the generation is odd or moved under them.
pub struct ClassifierConfig {
    entry_min_us: AtomicU32,
    entry_max_us: AtomicU32,
    exit_min_us: AtomicU32,
    exit_max_us: AtomicU32,
    generation: AtomicU32,
}

impl ClassifierConfig {
    /// Reader attempts before settling for the last value read.
    const MAX_READ_RETRIES: u32 = 8;

    pub const fn new(windows: Windows) -> Self {
        Self {
            entry_min_us: AtomicU32::new(windows.entry.min_us),
            entry_max_us: AtomicU32::new(windows.entry.max_us),
            exit_min_us: AtomicU32::new(windows.exit.min_us),
            exit_max_us: AtomicU32::new(windows.exit.max_us),
            generation: AtomicU32::new(0),
        }
    }

    /// Even generation; increments by 2 on every applied change.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Consistent snapshot of both windows (interrupt-safe, never blocks).
    ///
    /// If a writer keeps the bounds moving for every retry, the last read
    /// is used only when it still forms valid windows; otherwise the
    /// reference windows are.
    #[inline]
    pub fn windows(&self) -> Windows {
        let mut last = self.load_fields();
        for _ in 0..Self::MAX_READ_RETRIES {
            let before = self.generation.load(Ordering::Acquire);
            if before & 1 == 1 {
                core::hint::spin_loop();
                continue;
            }
            last = self.load_fields();
            if self.generation.load(Ordering::Acquire) == before {
                return last;
            }
        }
        if last.is_valid() {
            last
        } else {
            Windows::DEFAULT
        }
    }

    fn load_fields(&self) -> Windows {
        Windows {
            entry: Window::new(
                self.entry_min_us.load(Ordering::Acquire),
                self.entry_max_us.load(Ordering::Acquire),
            ),
            exit: Window::new(
                self.exit_min_us.load(Ordering::Acquire),
                self.exit_max_us.load(Ordering::Acquire),
            ),
        }
    }

    /// Replace both windows atomically with respect to readers.
    pub fn set_windows(&self, windows: Windows) -> Result<(), ParamSetError> {
        if !windows.is_valid() {
            return Err(ParamSetError::InvalidWindows);
        }
        self.update(|_| Some(windows)).map(|_| ())
    }

    /// Read-modify-write under the writer side of the generation counter.
    fn update(&self, f: impl FnOnce(Windows) -> Option<Windows>) -> Result<Windows, ParamSetError> {
        // Writer claim: even -> odd
        let mut gen = self.generation.load(Ordering::Acquire);
        loop {
            if gen & 1 == 1 {
                core::hint::spin_loop();
                gen = self.generation.load(Ordering::Acquire);
                continue;
            }
            match self.generation.compare_exchange_weak(
                gen,
                gen.wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => gen = actual,
            }
        }

        match f(self.load_fields()) {
            Some(next) if next.is_valid() => {
                self.entry_min_us.store(next.entry.min_us, Ordering::Release);
                self.entry_max_us.store(next.entry.max_us, Ordering::Release);
                self.exit_min_us.store(next.exit.min_us, Ordering::Release);
                self.exit_max_us.store(next.exit.max_us, Ordering::Release);
                self.generation.store(gen.wrapping_add(2), Ordering::Release);
                Ok(next)
            }
            _ => {
                // Nothing applied: release without moving the generation forward
                self.generation.store(gen, Ordering::Release);
                Err(ParamSetError::InvalidWindows)
            }
        }
    }

    /// Restore the reference windows.
    pub fn reset(&self) {
        let _ = self.set_windows(Windows::DEFAULT);
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::new(Windows::DEFAULT)
    }
}

/// Runtime parameter descriptor.
pub struct ParamDescriptor {
    pub name: &'static str,
    pub brief: &'static str,
    pub min: u32,
    pub max: u32,
    pub get_fn: fn(&ClassifierConfig) -> u32,
    field: fn(&mut Windows) -> &mut u32,
}

impl ParamDescriptor {
    /// Apply `value`, rejecting out-of-range values and invalid windows.
    pub fn set(&self, config: &ClassifierConfig, value: u32) -> Result<(), ParamSetError> {
        if value < self.min || value > self.max {
            return Err(ParamSetError::OutOfRange);
        }
        let field = self.field;
        config
            .update(|mut w| {
                *field(&mut w) = value;
                Some(w)
            })
            .map(|_| ())
    }

    pub fn get(&self, config: &ClassifierConfig) -> u32 {
        (self.get_fn)(config)
    }
}

fn entry_min_field(w: &mut Windows) -> &mut u32 {
    &mut w.entry.min_us
}

fn entry_max_field(w: &mut Windows) -> &mut u32 {
    &mut w.entry.max_us
}

fn exit_min_field(w: &mut Windows) -> &mut u32 {
    &mut w.exit.min_us
}

fn exit_max_field(w: &mut Windows) -> &mut u32 {
    &mut w.exit.max_us
}

/// Upper bound accepted for any window edge (10 s).
const MAX_WINDOW_US: u32 = 10_000_000;

/// All runtime parameters.
pub static PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor {
        name: "entry_min_us",
        brief: "Entry window lower bound (exclusive)",
        min: 0,
        max: MAX_WINDOW_US,
        get_fn: |c| c.windows().entry.min_us,
        field: entry_min_field,
    },
    ParamDescriptor {
        name: "entry_max_us",
        brief: "Entry window upper bound (exclusive)",
        min: 0,
        max: MAX_WINDOW_US,
        get_fn: |c| c.windows().entry.max_us,
        field: entry_max_field,
    },
    ParamDescriptor {
        name: "exit_min_us",
        brief: "Exit window lower bound (exclusive)",
        min: 0,
        max: MAX_WINDOW_US,
        get_fn: |c| c.windows().exit.min_us,
        field: exit_min_field,
    },
    ParamDescriptor {
        name: "exit_max_us",
        brief: "Exit window upper bound (exclusive)",
        min: 0,
        max: MAX_WINDOW_US,
        get_fn: |c| c.windows().exit.max_us,
        field: exit_max_field,
    },
];

/// Look up a parameter by exact name.
pub fn find_param(name: &str) -> Option<&'static ParamDescriptor> {
    PARAMS.iter().find(|p| p.name == name)
}

/// Parameters whose name starts with `prefix` (a trailing `*` is ignored).
pub fn find_params_matching(pattern: &str) -> impl Iterator<Item = &'static ParamDescriptor> + '_ {
    let prefix = pattern.trim_end_matches('*');
    PARAMS.iter().filter(move |p| p.name.starts_with(prefix))
}
