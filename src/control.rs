//! Control plane: per-slot handles and control commands.
//!
//! Opening a slot yields a [`LineHandle`]. The handle remembers which
//! occupant it was opened on; once that line is unexported (even if the
//! slot is reused) every operation fails with `NoSuchDevice`. Dropping the
//! handle deregisters its subscription and, with
//! `RegistryConfig::disarm_on_close`, disarms the entry.

use crate::attr::{format_into, token};
use crate::error::{Error, Result};
use crate::fanout::SubscriberId;
use crate::hal::LineChip;
use crate::registry::{EntryRef, Registry};
use crate::sample::{Direction, Level};

/// Command group letter.
pub const IOC_MAGIC: u8 = b'G';

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;
const IOC_INT_SIZE: u32 = core::mem::size_of::<i32>() as u32;

const fn ioc(dir: u32, nr: u32) -> u32 {
    (dir << 30) | (IOC_INT_SIZE << 16) | ((IOC_MAGIC as u32) << 8) | nr
}

/// Device write payloads this long or longer are rejected.
pub const MAX_WRITE_LEN: usize = 8;

/// Control commands of a per-slot handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    EnableNotification,
    DisableNotification,
    GetCount,
}

impl Command {
    /// `_IOW('G', 1, int)`
    pub const ENABLE_RAW: u32 = ioc(IOC_WRITE, 1);
    /// `_IOW('G', 2, int)`
    pub const DISABLE_RAW: u32 = ioc(IOC_WRITE, 2);
    /// `_IOR('G', 3, int)`
    pub const GET_COUNT_RAW: u32 = ioc(IOC_READ, 3);

    pub const fn to_raw(self) -> u32 {
        match self {
            Command::EnableNotification => Self::ENABLE_RAW,
            Command::DisableNotification => Self::DISABLE_RAW,
            Command::GetCount => Self::GET_COUNT_RAW,
        }
    }

    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            Self::ENABLE_RAW => Ok(Command::EnableNotification),
            Self::DISABLE_RAW => Ok(Command::DisableNotification),
            Self::GET_COUNT_RAW => Ok(Command::GetCount),
            _ => Err(Error::NotSupported),
        }
    }
}

impl<C: LineChip, const N: usize> EntryRef<'_, C, N> {
    /// Arm edge notification: `Disarmed -> Armed`.
    pub fn enable(&mut self) -> Result<()> {
        self.arm()
    }

    /// Disarm edge notification: `Armed -> Disarmed`.
    ///
    /// When this returns no edge handler for the entry is running or will
    /// run.
    pub fn disable(&mut self) -> Result<()> {
        self.disarm()
    }

    /// Shared counter snapshot.
    pub fn get_count(&self) -> i32 {
        self.registry.count()
    }
}

impl<C: LineChip, const N: usize> Registry<C, N> {
    /// Open a handle on an occupied slot.
    pub fn open(&self, slot: usize) -> Result<LineHandle<'_, C, N>> {
        let occupancy = self.lookup(slot)?.occupancy();
        Ok(LineHandle {
            registry: self,
            slot,
            occupancy,
            subscriber: None,
            offset: 0,
        })
    }
}

/// Open handle on one slot. Scoped: see the module docs for what `Drop` does.
pub struct LineHandle<'r, C: LineChip, const N: usize> {
    registry: &'r Registry<C, N>,
    slot: usize,
    occupancy: u32,
    subscriber: Option<SubscriberId>,
    offset: usize,
}

impl<'r, C: LineChip, const N: usize> LineHandle<'r, C, N> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Entry this handle was opened on, if it is still exported.
    ///
    /// The reference holds the entry lock that the handle's `Drop` needs,
    /// so it borrows the handle and cannot outlive it:
    ///
    /// ```compile_fail
    /// use edge_line_registry::{Registry, RegistryConfig, SimChip};
    ///
    /// let reg: Registry<SimChip> = Registry::new(SimChip::new(), RegistryConfig::default());
    /// reg.export(17).unwrap();
    /// let entry = reg.open(0).unwrap().entry().unwrap();
    /// assert!(!entry.is_armed());
    /// ```
    pub fn entry<'h>(&'h self) -> Result<EntryRef<'h, C, N>> {
        let registry: &'h Registry<C, N> = self.registry;
        registry.lookup_occupant(self.slot, self.occupancy)
    }

    pub fn enable(&self) -> Result<()> {
        self.entry()?.enable()
    }

    pub fn disable(&self) -> Result<()> {
        self.entry()?.disable()
    }

    pub fn get_count(&self) -> Result<i32> {
        Ok(self.entry()?.get_count())
    }

    /// Execute a control command. `GetCount` returns the counter, the
    /// others return 0.
    pub fn ioctl(&self, command: Command) -> Result<i32> {
        match command {
            Command::EnableNotification => self.enable().map(|_| 0),
            Command::DisableNotification => self.disable().map(|_| 0),
            Command::GetCount => self.get_count(),
        }
    }

    /// Execute a raw command number. `GetCount` stores into `arg`, which
    /// must then be present (`Fault` otherwise).
    pub fn ioctl_raw(&self, raw: u32, arg: Option<&mut i32>) -> Result<()> {
        let command = Command::from_raw(raw)?;
        match command {
            Command::GetCount => {
                let out = arg.ok_or(Error::Fault)?;
                *out = self.get_count()?;
                Ok(())
            }
            other => self.ioctl(other).map(|_| ()),
        }
    }

    /// Read `"<count>\n"`, once per offset.
    ///
    /// Returns 0 (end of stream) when the offset is non-zero or `buf` cannot
    /// hold the whole line.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let count = self.get_count()?;
        if self.offset > 0 {
            return Ok(0);
        }
        let mut text = [0u8; 16];
        let len = format_into(&mut text, format_args!("{}\n", count))?;
        let Some(dst) = buf.get_mut(..len) else {
            return Ok(0);
        };
        dst.copy_from_slice(&text[..len]);
        self.offset += len;
        Ok(len)
    }

    /// Move the read offset back to the start.
    pub fn rewind(&mut self) {
        self.offset = 0;
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Write a `0`/`1`/`in`/`out` token.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() >= MAX_WRITE_LEN {
            return Err(Error::InvalidArgument);
        }
        let mut entry = self.entry()?;
        match token(data)? {
            "0" => entry.set_value(Level::Low)?,
            "1" => entry.set_value(Level::High)?,
            "in" => entry.set_direction(Direction::In)?,
            "out" => entry.set_direction(Direction::Out)?,
            _ => return Err(Error::InvalidArgument),
        }
        Ok(data.len())
    }

    /// Opt in to asynchronous notification. Idempotent.
    pub fn register_async(&mut self) -> Result<SubscriberId> {
        if let Some(id) = self.subscriber {
            return Ok(id);
        }
        // Entry lock held: unexport cannot clear the table underneath us
        let registry = self.registry;
        let _entry = registry.lookup_occupant(self.slot, self.occupancy)?;
        let id = registry.slot_subscribers(self.slot).register()?;
        self.subscriber = Some(id);
        Ok(id)
    }

    /// Opt out again. Returns false if not registered.
    pub fn unregister_async(&mut self) -> bool {
        let Some(id) = self.subscriber.take() else {
            return false;
        };
        match self.entry() {
            Ok(_entry) => self.registry.slot_subscribers(self.slot).deregister(id),
            Err(_) => false,
        }
    }

    pub fn is_async(&self) -> bool {
        self.subscriber.is_some()
    }

    /// Consume a pending "new data" notification.
    pub fn take_notification(&self) -> bool {
        let Some(id) = self.subscriber else {
            return false;
        };
        if self.registry.occupancy(self.slot) != self.occupancy {
            return false;
        }
        self.registry.slot_subscribers(self.slot).take_pending(id)
    }
}

impl<C: LineChip, const N: usize> Drop for LineHandle<'_, C, N> {
    fn drop(&mut self) {
        let registry = self.registry;
        let Ok(mut entry) = registry.lookup_occupant(self.slot, self.occupancy) else {
            return;
        };
        if let Some(id) = self.subscriber.take() {
            registry.slot_subscribers(self.slot).deregister(id);
        }
        if registry.config().disarm_on_close && entry.is_armed() {
            let _ = entry.disable();
        }
    }
}
