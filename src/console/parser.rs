//! Command line parser
//!
//! Whitespace split, command plus at most 3 arguments. Extra tokens are
//! dropped.

use core::str::FromStr;

use super::ConsoleError;

/// Maximum number of arguments kept per command.
pub const MAX_ARGS: usize = 3;

/// Parsed command with up to 3 arguments
#[derive(Debug, Clone)]
pub struct ParsedCommand<'a> {
    /// The command name (first token)
    pub command: &'a str,
    pub args: [Option<&'a str>; MAX_ARGS],
}

impl<'a> ParsedCommand<'a> {
    pub const fn empty() -> Self {
        Self {
            command: "",
            args: [None; MAX_ARGS],
        }
    }

    /// Argument by index (0-based)
    pub fn arg(&self, idx: usize) -> Option<&'a str> {
        self.args.get(idx).copied().flatten()
    }

    /// Number of arguments present
    pub fn arg_count(&self) -> usize {
        self.args.iter().filter(|a| a.is_some()).count()
    }

    /// Required argument parsed as `T`.
    pub fn parse_arg<T: FromStr>(&self, idx: usize) -> Result<T, ConsoleError> {
        self.arg(idx)
            .ok_or(ConsoleError::MissingArg)?
            .parse()
            .map_err(|_| ConsoleError::InvalidValue)
    }
}

/// Parse a command line into command and arguments
pub fn parse_line(line: &str) -> ParsedCommand<'_> {
    let mut parts = line.split_whitespace();
    let mut cmd = ParsedCommand::empty();
    cmd.command = parts.next().unwrap_or("");
    for (slot, arg) in cmd.args.iter_mut().zip(parts) {
        *slot = Some(arg);
    }
    cmd
}
