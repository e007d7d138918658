//! Error types for the line registry.
//!
//! Every operation reports synchronously; nothing is retried internally.
//! Each variant maps to the errno a character-device driver would return.

use crate::hal::HwError;

/// Registry, control-plane and attribute errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Every slot is occupied.
    Exhausted,
    /// The chip cannot bind the requested physical line.
    NoSuchLine,
    /// No occupied slot carries the given physical line id.
    NotFound,
    /// Slot number out of range, unoccupied, or reused since the handle was opened.
    NoSuchDevice,
    /// The physical line is already exported in another slot.
    AlreadyExported,
    /// `enable` on an armed entry.
    AlreadyArmed,
    /// `disable` on a disarmed entry.
    NotArmed,
    /// The chip cannot supply an interrupt source for the line.
    BindError,
    /// Value write while the line is an input.
    PermissionDenied,
    /// Malformed token or identifier.
    InvalidArgument,
    /// Unknown control command.
    NotSupported,
    /// Data could not be transferred across the caller boundary.
    Fault,
    /// Hardware rejected an attribute access.
    Io,
    /// Every subscriber position of the entry is taken.
    SubscribersFull,
}

impl Error {
    /// Linux errno equivalent.
    pub fn errno(&self) -> i32 {
        match self {
            Self::Exhausted => 12,          // ENOMEM
            Self::NoSuchLine => 19,         // ENODEV
            Self::NotFound => 2,            // ENOENT
            Self::NoSuchDevice => 19,       // ENODEV
            Self::AlreadyExported => 16,    // EBUSY
            Self::AlreadyArmed => 16,       // EBUSY
            Self::NotArmed => 22,           // EINVAL
            Self::BindError => 5,           // EIO
            Self::PermissionDenied => 1,    // EPERM
            Self::InvalidArgument => 22,    // EINVAL
            Self::NotSupported => 25,       // ENOTTY
            Self::Fault => 14,              // EFAULT
            Self::Io => 5,                  // EIO
            Self::SubscribersFull => 24,    // EMFILE
        }
    }

    /// Short human readable message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Exhausted => "no free slot",
            Self::NoSuchLine => "no such line",
            Self::NotFound => "line not exported",
            Self::NoSuchDevice => "no such device",
            Self::AlreadyExported => "line already exported",
            Self::AlreadyArmed => "notification already armed",
            Self::NotArmed => "notification not armed",
            Self::BindError => "interrupt bind failed",
            Self::PermissionDenied => "line is an input",
            Self::InvalidArgument => "invalid argument",
            Self::NotSupported => "command not supported",
            Self::Fault => "bad address",
            Self::Io => "hardware i/o error",
            Self::SubscribersFull => "subscriber table full",
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (errno {})", self.message(), self.errno())
    }
}

impl From<HwError> for Error {
    fn from(e: HwError) -> Self {
        match e {
            HwError::NoSuchLine => Error::NoSuchLine,
            HwError::NoIrq => Error::BindError,
            HwError::Io => Error::Io,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;
