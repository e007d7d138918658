//! Hardware Abstraction Layer for EdgeLineRegistry.
//!
//! Thin seam between the registry and a GPIO controller.
//! Business logic stays in core modules, HAL is just I/O.
//!
//! # Interrupt path
//!
//! ```text
//! pin edge ──▶ chip ISR glue ──▶ EdgeSink::on_edge(target) ──▶ classifier
//!              (platform)        (registry)
//! ```
//!
//! The chip never learns about slots: it stores the opaque [`EdgeTarget`]
//! handed to `attach_edge_irq` and passes it back untouched.

pub mod sim;

#[cfg(target_os = "espidf")]
pub mod esp;

use crate::sample::{Direction, Level};

pub use sim::SimChip;

#[cfg(target_os = "espidf")]
pub use esp::EspChip;

/// Hardware-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwError {
    /// The controller has no such line.
    NoSuchLine,
    /// The line cannot raise interrupts.
    NoIrq,
    /// Register access failed.
    Io,
}

/// Token identifying the armed entry an interrupt belongs to.
///
/// Packed into a `u32` so it survives a round trip through a C interrupt
/// argument: `[slot:8][generation:24]`. Generation 0 is never issued, so a
/// zero word always means "no target".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeTarget {
    slot: u8,
    generation: u32,
}

impl EdgeTarget {
    /// Generation mask (24 bits).
    pub const GENERATION_MASK: u32 = 0x00FF_FFFF;

    /// Build a target. Generation is truncated to 24 bits; 0 becomes 1.
    pub const fn new(slot: u8, generation: u32) -> Self {
        let generation = generation & Self::GENERATION_MASK;
        Self {
            slot,
            generation: if generation == 0 { 1 } else { generation },
        }
    }

    #[inline]
    pub const fn slot(&self) -> usize {
        self.slot as usize
    }

    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Packed representation (never zero).
    #[inline]
    pub const fn to_raw(self) -> u32 {
        ((self.slot as u32) << 24) | self.generation
    }

    /// Unpack; `None` for the zero word.
    #[inline]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        if raw & Self::GENERATION_MASK == 0 {
            None
        } else {
            Some(Self {
                slot: (raw >> 24) as u8,
                generation: raw & Self::GENERATION_MASK,
            })
        }
    }
}

/// Receiver of hardware edge interrupts.
///
/// `on_edge` runs in interrupt context: it must not block, allocate or
/// perform I/O. Implemented by [`crate::registry::Registry`].
pub trait EdgeSink: Sync {
    fn on_edge(&self, target: EdgeTarget);
}

/// A GPIO controller.
///
/// Line numbers passed to the chip are hardware numbers (`chip_base +
/// physical id`); the registry does the translation.
pub trait LineChip: Sync {
    /// Exclusive hardware resource for one line.
    type Line: Send;

    /// Bind a hardware line.
    fn request(&self, hw_line: u32) -> Result<Self::Line, HwError>;

    /// Give a line back. Any attached interrupt has already been detached.
    fn release(&self, line: Self::Line) -> Result<(), HwError>;

    /// Hardware number of a bound line.
    fn hw_line(&self, line: &Self::Line) -> u32;

    fn level(&self, line: &Self::Line) -> Result<Level, HwError>;

    fn set_level(&self, line: &mut Self::Line, level: Level) -> Result<(), HwError>;

    fn direction(&self, line: &Self::Line) -> Direction;

    /// Switch direction. `Out` starts driving level 0.
    fn set_direction(&self, line: &mut Self::Line, direction: Direction) -> Result<(), HwError>;

    /// Lock-free level read used from the interrupt path.
    fn sample_level(&self, hw_line: u32) -> Result<Level, HwError>;

    /// Route both-edge interrupts of `line` to `target`.
    fn attach_edge_irq(&self, line: &mut Self::Line, target: EdgeTarget) -> Result<(), HwError>;

    /// Stop routing interrupts. Must not return while the chip itself is
    /// still inside a dispatch for this line.
    fn detach_edge_irq(&self, line: &mut Self::Line);

    /// Monotonic time in microseconds.
    fn now_us(&self) -> u64;
}
