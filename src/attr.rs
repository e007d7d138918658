//! Attribute surface: the `value` and `direction` files of each exported line.
//!
//! Every exported line publishes a node named `line<physical_id>` carrying
//! two attributes. Tokens are ASCII: `0`/`1` for `value`, `in`/`out` for
//! `direction`. A single trailing newline is accepted on writes and always
//! produced on reads. Once the line is unexported the node is gone and
//! every path-based access fails with `NoSuchDevice`.

use core::fmt::{self, Write};

use crate::error::{Error, Result};
use crate::hal::LineChip;
use crate::logging::BufWriter;
use crate::registry::{EntryRef, Registry};
use crate::sample::{Direction, Level};
use crate::{rt_info, BG_LOG_STREAM};

/// Prefix of every published node name.
pub const NODE_PREFIX: &str = "line";

/// The two published attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attribute {
    Value,
    Direction,
}

impl Attribute {
    pub const ALL: [Attribute; 2] = [Attribute::Value, Attribute::Direction];

    pub const fn name(self) -> &'static str {
        match self {
            Attribute::Value => "value",
            Attribute::Direction => "direction",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }
}

/// Name of the node published for a physical line (`line17`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeName(pub u32);

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NODE_PREFIX, self.0)
    }
}

impl NodeName {
    /// Parse `line<decimal>`.
    pub fn parse(name: &str) -> Option<Self> {
        let digits = name.strip_prefix(NODE_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(NodeName)
    }
}

/// Strip one trailing newline and require UTF-8.
pub(crate) fn token(data: &[u8]) -> Result<&str> {
    let text = core::str::from_utf8(data).map_err(|_| Error::InvalidArgument)?;
    Ok(text.strip_suffix('\n').unwrap_or(text))
}

/// Parse a decimal line identifier as written to the management surface.
///
/// Surrounding whitespace (trailing newline included) and a leading `+`
/// are accepted.
pub fn parse_line_id(data: &[u8]) -> Result<u32> {
    let text = core::str::from_utf8(data).map_err(|_| Error::InvalidArgument)?.trim();
    let digits = text.strip_prefix('+').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidArgument);
    }
    digits.parse().map_err(|_| Error::InvalidArgument)
}

fn parse_value(text: &str) -> Result<Level> {
    match text {
        "0" => Ok(Level::Low),
        "1" => Ok(Level::High),
        _ => Err(Error::InvalidArgument),
    }
}

/// Longest rendered attribute or counter text.
const RENDER_MAX: usize = 16;

/// Format into `buf`, returning the length. `Fault` if `buf` is too small.
pub(crate) fn format_into(buf: &mut [u8], args: fmt::Arguments<'_>) -> Result<usize> {
    let mut scratch = [0u8; RENDER_MAX];
    let mut writer = BufWriter { buf: &mut scratch, pos: 0 };
    let _ = writer.write_fmt(args);
    let len = writer.pos;
    buf.get_mut(..len)
        .ok_or(Error::Fault)?
        .copy_from_slice(&scratch[..len]);
    Ok(len)
}

impl<C: LineChip, const N: usize> EntryRef<'_, C, N> {
    /// Published node name.
    pub fn node_name(&self) -> Result<NodeName> {
        self.physical_id().map(NodeName)
    }

    /// Current electrical level.
    pub fn value(&self) -> Result<Level> {
        let entry = self.entry()?;
        self.registry.chip().level(entry.line()).map_err(|_| Error::Io)
    }

    /// Drive the line. Refused while it is an input.
    pub fn set_value(&mut self, level: Level) -> Result<()> {
        let registry = self.registry;
        let chip = registry.chip();
        let entry = self.entry_mut()?;
        if chip.direction(entry.line()) == Direction::In {
            return Err(Error::PermissionDenied);
        }
        chip.set_level(entry.line_mut(), level).map_err(|_| Error::Io)
    }

    pub fn direction(&self) -> Result<Direction> {
        let entry = self.entry()?;
        Ok(self.registry.chip().direction(entry.line()))
    }

    /// Switch direction. Switching to output drives 0.
    pub fn set_direction(&mut self, direction: Direction) -> Result<()> {
        let registry = self.registry;
        let entry = self.entry_mut()?;
        registry
            .chip()
            .set_direction(entry.line_mut(), direction)
            .map_err(|_| Error::Io)?;
        rt_info!(
            BG_LOG_STREAM,
            registry.chip().now_us() as i64,
            "Line {} direction {}",
            entry.physical_id(),
            direction.as_str()
        );
        Ok(())
    }

    /// Textual read of an attribute: `"0\n"`, `"1\n"`, `"in\n"` or `"out\n"`.
    pub fn show(&self, attr: Attribute, buf: &mut [u8]) -> Result<usize> {
        match attr {
            Attribute::Value => {
                let level = self.value()?;
                format_into(buf, format_args!("{}\n", level.as_u8()))
            }
            Attribute::Direction => {
                let direction = self.direction()?;
                format_into(buf, format_args!("{}\n", direction.as_str()))
            }
        }
    }

    /// Textual write of an attribute. Returns the number of bytes consumed.
    pub fn store(&mut self, attr: Attribute, data: &[u8]) -> Result<usize> {
        match attr {
            Attribute::Value => {
                // Direction is checked before the token is looked at
                if self.direction()? == Direction::In {
                    return Err(Error::PermissionDenied);
                }
                let level = parse_value(token(data)?)?;
                self.set_value(level)?;
            }
            Attribute::Direction => {
                let text = core::str::from_utf8(data).map_err(|_| Error::InvalidArgument)?;
                let direction = Direction::parse(text).ok_or(Error::InvalidArgument)?;
                self.set_direction(direction)?;
            }
        }
        Ok(data.len())
    }
}

impl<C: LineChip, const N: usize> Registry<C, N> {
    /// Resolve a published node name to its slot.
    pub fn find_node(&self, name: &str) -> Result<usize> {
        let node = NodeName::parse(name).ok_or(Error::NoSuchDevice)?;
        self.slot_of(node.0).ok_or(Error::NoSuchDevice)
    }

    /// Path-style read: `node`/`attr`.
    pub fn attr_read(&self, node: &str, attr: &str, buf: &mut [u8]) -> Result<usize> {
        let attr = Attribute::from_name(attr).ok_or(Error::NoSuchDevice)?;
        let slot = self.find_node(node)?;
        self.lookup(slot)?.show(attr, buf)
    }

    /// Path-style write: `node`/`attr`.
    pub fn attr_write(&self, node: &str, attr: &str, data: &[u8]) -> Result<usize> {
        let attr = Attribute::from_name(attr).ok_or(Error::NoSuchDevice)?;
        let slot = self.find_node(node)?;
        self.lookup(slot)?.store(attr, data)
    }

    /// Management surface: write a decimal id to export it.
    pub fn store_export(&self, data: &[u8]) -> Result<usize> {
        let id = parse_line_id(data)?;
        self.export(id)?;
        Ok(data.len())
    }

    /// Management surface: write a decimal id to unexport it.
    pub fn store_unexport(&self, data: &[u8]) -> Result<usize> {
        let id = parse_line_id(data)?;
        self.unexport(id)?;
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::hal::SimChip;

    fn exported(id: u32) -> Registry<SimChip, 2> {
        let reg = Registry::new(SimChip::new(), RegistryConfig::default());
        reg.export(id).unwrap();
        reg
    }

    fn read(reg: &Registry<SimChip, 2>, node: &str, attr: &str) -> Result<std::string::String> {
        let mut buf = [0u8; 16];
        let len = reg.attr_read(node, attr, &mut buf)?;
        Ok(std::string::String::from_utf8_lossy(&buf[..len]).into_owned())
    }

    #[test]
    fn test_node_name_format_and_parse() {
        assert_eq!(std::format!("{}", NodeName(17)), "line17");
        assert_eq!(NodeName::parse("line17"), Some(NodeName(17)));
        assert_eq!(NodeName::parse("line"), None);
        assert_eq!(NodeName::parse("gpio17"), None);
        assert_eq!(NodeName::parse("line1x"), None);
    }

    #[test]
    fn test_parse_line_id() {
        assert_eq!(parse_line_id(b"17\n"), Ok(17));
        assert_eq!(parse_line_id(b"+4"), Ok(4));
        assert_eq!(parse_line_id(b"-4"), Err(Error::InvalidArgument));
        assert_eq!(parse_line_id(b" 4 \n"), Ok(4));
        assert_eq!(parse_line_id(b"4 4"), Err(Error::InvalidArgument));
        assert_eq!(parse_line_id(b""), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_fresh_export_reads_input() {
        let reg = exported(17);
        assert_eq!(read(&reg, "line17", "direction").unwrap(), "in\n");
        assert_eq!(read(&reg, "line17", "value").unwrap(), "0\n");
    }

    #[test]
    fn test_value_write_refused_on_input() {
        let reg = exported(17);
        assert_eq!(reg.attr_write("line17", "value", b"1"), Err(Error::PermissionDenied));
        assert_eq!(reg.attr_write("line17", "value", b"x"), Err(Error::PermissionDenied));
    }

    #[test]
    fn test_output_drives_zero_then_value() {
        let reg = exported(17);
        assert_eq!(reg.attr_write("line17", "direction", b"out\n"), Ok(4));
        assert_eq!(read(&reg, "line17", "value").unwrap(), "0\n");
        assert_eq!(reg.attr_write("line17", "value", b"1\n"), Ok(2));
        assert_eq!(read(&reg, "line17", "value").unwrap(), "1\n");
        assert_eq!(reg.chip().pin_level(512 + 17), Some(Level::High));
        assert_eq!(reg.attr_write("line17", "value", b"2"), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_direction_rejects_garbage() {
        let reg = exported(17);
        assert_eq!(reg.attr_write("line17", "direction", b"sideways"), Err(Error::InvalidArgument));
        assert_eq!(reg.attr_write("line17", "direction", b"in\n\n"), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_node_withdrawn_after_unexport() {
        let reg = exported(17);
        reg.unexport(17).unwrap();
        assert_eq!(read(&reg, "line17", "value"), Err(Error::NoSuchDevice));
        assert_eq!(reg.attr_write("line17", "direction", b"out"), Err(Error::NoSuchDevice));
    }

    #[test]
    fn test_management_surface() {
        let reg: Registry<SimChip, 2> = Registry::new(SimChip::new(), RegistryConfig::default());
        assert_eq!(reg.store_export(b"3\n"), Ok(2));
        assert_eq!(reg.store_export(b"3\n"), Err(Error::AlreadyExported));
        assert_eq!(reg.store_export(b"abc"), Err(Error::InvalidArgument));
        assert_eq!(reg.store_unexport(b"9"), Err(Error::NotFound));
        assert_eq!(reg.store_unexport(b"3"), Ok(1));
    }
}
