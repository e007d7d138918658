//! Command handlers

use core::fmt::Write;

use super::parser::ParsedCommand;
use super::ConsoleError;
use crate::config::{find_param, find_params_matching, ClassifierConfig, ParamSetError, PARAMS};
use crate::error::Result;
use crate::fault::FaultState;
use crate::hal::LineChip;
use crate::registry::{Registry, SlotInfo};
use crate::sample::{Direction, Level};
use crate::{BG_LOG_STREAM, RT_LOG_STREAM};

/// What the console needs from a registry.
///
/// Object-safe so the command table below stays non-generic.
pub trait LineControl {
    fn export(&self, physical_id: u32) -> Result<usize>;
    fn unexport(&self, physical_id: u32) -> Result<()>;
    fn capacity(&self) -> usize;
    fn slot_info(&self, slot: usize) -> Option<SlotInfo>;
    fn enable(&self, slot: usize) -> Result<()>;
    fn disable(&self, slot: usize) -> Result<()>;
    fn count(&self) -> i32;
    fn value(&self, slot: usize) -> Result<Level>;
    fn set_value(&self, slot: usize, level: Level) -> Result<()>;
    fn direction(&self, slot: usize) -> Result<Direction>;
    fn set_direction(&self, slot: usize, direction: Direction) -> Result<()>;
    fn classifier(&self) -> &ClassifierConfig;
    fn faults(&self) -> &FaultState;
}

impl<C: LineChip, const N: usize> LineControl for Registry<C, N> {
    fn export(&self, physical_id: u32) -> Result<usize> {
        Registry::export(self, physical_id)
    }

    fn unexport(&self, physical_id: u32) -> Result<()> {
        Registry::unexport(self, physical_id)
    }

    fn capacity(&self) -> usize {
        N
    }

    fn slot_info(&self, slot: usize) -> Option<SlotInfo> {
        Registry::slot_info(self, slot)
    }

    fn enable(&self, slot: usize) -> Result<()> {
        self.lookup(slot)?.enable()
    }

    fn disable(&self, slot: usize) -> Result<()> {
        self.lookup(slot)?.disable()
    }

    fn count(&self) -> i32 {
        Registry::count(self)
    }

    fn value(&self, slot: usize) -> Result<Level> {
        self.lookup(slot)?.value()
    }

    fn set_value(&self, slot: usize, level: Level) -> Result<()> {
        self.lookup(slot)?.set_value(level)
    }

    fn direction(&self, slot: usize) -> Result<Direction> {
        self.lookup(slot)?.direction()
    }

    fn set_direction(&self, slot: usize, direction: Direction) -> Result<()> {
        self.lookup(slot)?.set_direction(direction)
    }

    fn classifier(&self) -> &ClassifierConfig {
        Registry::classifier(self)
    }

    fn faults(&self) -> &FaultState {
        Registry::faults(self)
    }
}

type Handler = fn(&ParsedCommand<'_>, &dyn LineControl, &mut dyn Write) -> core::result::Result<(), ConsoleError>;

/// Command descriptor
pub struct CommandDescriptor {
    pub name: &'static str,
    pub brief: &'static str,
    pub handler: Handler,
}

/// All available commands
pub static COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor { name: "help", brief: "List commands", handler: cmd_help },
    CommandDescriptor { name: "export", brief: "Export line <id>", handler: cmd_export },
    CommandDescriptor { name: "unexport", brief: "Unexport line <id>", handler: cmd_unexport },
    CommandDescriptor { name: "list", brief: "List exported lines", handler: cmd_list },
    CommandDescriptor { name: "enable", brief: "Arm edge notification on <slot>", handler: cmd_enable },
    CommandDescriptor { name: "disable", brief: "Disarm edge notification on <slot>", handler: cmd_disable },
    CommandDescriptor { name: "count", brief: "Show shared counter", handler: cmd_count },
    CommandDescriptor { name: "value", brief: "Read/write <slot> [0|1]", handler: cmd_value },
    CommandDescriptor { name: "direction", brief: "Read/write <slot> [in|out]", handler: cmd_direction },
    CommandDescriptor { name: "set", brief: "Set classifier parameter", handler: cmd_set },
    CommandDescriptor { name: "show", brief: "Show classifier parameters", handler: cmd_show },
    CommandDescriptor { name: "stats", brief: "Registry statistics", handler: cmd_stats },
];

/// Execute a parsed command
pub fn execute(
    cmd: &ParsedCommand<'_>,
    lines: &dyn LineControl,
    out: &mut dyn Write,
) -> core::result::Result<(), ConsoleError> {
    if cmd.command.is_empty() {
        return Ok(()); // Empty line, do nothing
    }

    let handler = COMMANDS
        .iter()
        .find(|c| c.name == cmd.command)
        .ok_or(ConsoleError::UnknownCommand)?;

    (handler.handler)(cmd, lines, out)
}

/// All command names
pub fn command_names() -> impl Iterator<Item = &'static str> {
    COMMANDS.iter().map(|c| c.name)
}

// --- Command Implementations ---

type CmdResult = core::result::Result<(), ConsoleError>;

fn cmd_help(cmd: &ParsedCommand<'_>, _lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    if let Some(name) = cmd.arg(0) {
        let c = COMMANDS
            .iter()
            .find(|c| c.name == name)
            .ok_or(ConsoleError::UnknownCommand)?;
        let _ = writeln!(out, "{}: {}", c.name, c.brief);
    } else {
        for c in COMMANDS {
            let _ = writeln!(out, "  {:<14} {}", c.name, c.brief);
        }
    }
    Ok(())
}

fn cmd_export(cmd: &ParsedCommand<'_>, lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    let id: u32 = cmd.parse_arg(0)?;
    let slot = lines.export(id)?;
    let _ = writeln!(out, "line{} -> slot {}", id, slot);
    Ok(())
}

fn cmd_unexport(cmd: &ParsedCommand<'_>, lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    let id: u32 = cmd.parse_arg(0)?;
    lines.unexport(id)?;
    let _ = writeln!(out, "line{} unexported", id);
    Ok(())
}

fn cmd_list(_cmd: &ParsedCommand<'_>, lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    let _ = writeln!(out, "SLOT  NODE       DIR  ARMED  SUBS");
    let mut shown = 0;
    for info in (0..lines.capacity()).filter_map(|s| lines.slot_info(s)) {
        let _ = writeln!(
            out,
            "{:<5} line{:<6} {:<4} {:<6} {}",
            info.slot,
            info.physical_id,
            info.direction.as_str(),
            if info.armed { "yes" } else { "no" },
            info.subscribers
        );
        shown += 1;
    }
    let _ = writeln!(out, "{}/{} slots in use", shown, lines.capacity());
    Ok(())
}

fn slot_arg(cmd: &ParsedCommand<'_>, lines: &dyn LineControl) -> core::result::Result<usize, ConsoleError> {
    let slot: usize = cmd.parse_arg(0)?;
    if slot >= lines.capacity() {
        return Err(ConsoleError::OutOfRange);
    }
    Ok(slot)
}

fn cmd_enable(cmd: &ParsedCommand<'_>, lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    let slot = slot_arg(cmd, lines)?;
    lines.enable(slot)?;
    let _ = writeln!(out, "slot {} armed", slot);
    Ok(())
}

fn cmd_disable(cmd: &ParsedCommand<'_>, lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    let slot = slot_arg(cmd, lines)?;
    lines.disable(slot)?;
    let _ = writeln!(out, "slot {} disarmed", slot);
    Ok(())
}

fn cmd_count(_cmd: &ParsedCommand<'_>, lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    let _ = writeln!(out, "{}", lines.count());
    Ok(())
}

fn cmd_value(cmd: &ParsedCommand<'_>, lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    let slot = slot_arg(cmd, lines)?;
    match cmd.arg(1) {
        None => {
            let _ = writeln!(out, "{}", lines.value(slot)?.as_u8());
        }
        Some(token) => {
            let level = match token {
                "0" => Level::Low,
                "1" => Level::High,
                _ => return Err(ConsoleError::InvalidValue),
            };
            lines.set_value(slot, level)?;
            let _ = writeln!(out, "value={}", level.as_u8());
        }
    }
    Ok(())
}

fn cmd_direction(cmd: &ParsedCommand<'_>, lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    let slot = slot_arg(cmd, lines)?;
    match cmd.arg(1) {
        None => {
            let _ = writeln!(out, "{}", lines.direction(slot)?.as_str());
        }
        Some(token) => {
            let direction = Direction::parse(token).ok_or(ConsoleError::InvalidValue)?;
            lines.set_direction(slot, direction)?;
            let _ = writeln!(out, "direction={}", direction.as_str());
        }
    }
    Ok(())
}

fn cmd_set(cmd: &ParsedCommand<'_>, lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    let name = cmd.arg(0).ok_or(ConsoleError::MissingArg)?;
    let value: u32 = cmd.parse_arg(1)?;
    let param = find_param(name).ok_or(ConsoleError::UnknownCommand)?;

    param.set(lines.classifier(), value).map_err(|e| match e {
        ParamSetError::OutOfRange => ConsoleError::OutOfRange,
        ParamSetError::InvalidWindows => ConsoleError::InvalidValue,
    })?;
    let _ = writeln!(out, "{}={}", name, value);
    Ok(())
}

fn cmd_show(cmd: &ParsedCommand<'_>, lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    let config = lines.classifier();
    match cmd.arg(0) {
        Some(pattern) if pattern.ends_with('*') => {
            for p in find_params_matching(pattern) {
                let _ = writeln!(out, "{}={}", p.name, p.get(config));
            }
        }
        Some(name) => {
            let param = find_param(name).ok_or(ConsoleError::UnknownCommand)?;
            let _ = writeln!(out, "{}={}", param.name, param.get(config));
        }
        None => {
            for p in PARAMS {
                let _ = writeln!(out, "{}={}", p.name, p.get(config));
            }
        }
    }
    Ok(())
}

fn cmd_stats(_cmd: &ParsedCommand<'_>, lines: &dyn LineControl, out: &mut dyn Write) -> CmdResult {
    let occupied = (0..lines.capacity())
        .filter(|&s| lines.slot_info(s).is_some())
        .count();
    let fault = lines.faults().snapshot();

    let _ = writeln!(out, "count: {}", lines.count());
    let _ = writeln!(out, "slots: {}/{}", occupied, lines.capacity());
    let _ = writeln!(out, "windows gen: {}", lines.classifier().generation());
    let _ = writeln!(
        out,
        "fault: {} (data {}, total {}{})",
        fault.code.as_str(),
        fault.data,
        fault.count,
        if fault.active { ", active" } else { "" }
    );
    let _ = writeln!(
        out,
        "log dropped: rt={} bg={}",
        RT_LOG_STREAM.dropped(),
        BG_LOG_STREAM.dropped()
    );
    Ok(())
}
