//! Console state machine: byte input, echo, dispatch

use core::fmt::Write;

use super::{execute, parse_line, ConsoleError, LineBuffer, LineControl};

/// Version string (set by build.rs, includes git hash)
pub const VERSION: &str = env!("VERSION_STRING");

/// Console state machine
pub struct Console {
    line: LineBuffer,
    escape_state: EscapeState,
}

#[derive(Clone, Copy, PartialEq)]
enum EscapeState {
    Normal,
    Escape,  // Got ESC
    Bracket, // Got ESC [
}

impl Console {
    pub const fn new() -> Self {
        Self {
            line: LineBuffer::new(),
            escape_state: EscapeState::Normal,
        }
    }

    /// Process a single input byte
    ///
    /// Returns Some(result) if a command completed, None if more input is needed.
    pub fn process_byte(
        &mut self,
        byte: u8,
        lines: &dyn LineControl,
        out: &mut dyn Write,
    ) -> Option<Result<(), ConsoleError>> {
        match self.escape_state {
            EscapeState::Normal => self.process_normal(byte, lines, out),
            EscapeState::Escape => {
                self.escape_state = if byte == b'[' {
                    EscapeState::Bracket
                } else {
                    EscapeState::Normal
                };
                None
            }
            EscapeState::Bracket => {
                // Cursor keys are swallowed
                self.escape_state = EscapeState::Normal;
                None
            }
        }
    }

    /// Feed a whole string, as from a script.
    ///
    /// Returns the result of the last completed command.
    pub fn feed(
        &mut self,
        input: &str,
        lines: &dyn LineControl,
        out: &mut dyn Write,
    ) -> Option<Result<(), ConsoleError>> {
        let mut last = None;
        for byte in input.bytes() {
            if let Some(result) = self.process_byte(byte, lines, out) {
                last = Some(result);
            }
        }
        last
    }

    fn process_normal(
        &mut self,
        byte: u8,
        lines: &dyn LineControl,
        out: &mut dyn Write,
    ) -> Option<Result<(), ConsoleError>> {
        match byte {
            // Enter
            b'\r' | b'\n' => {
                let _ = writeln!(out);
                let line = self.line.as_str();

                if !line.is_empty() {
                    let cmd = parse_line(line);
                    let result = execute(&cmd, lines, out);
                    if let Err(e) = result {
                        let _ = writeln!(out, "{}", e);
                    }
                    self.line.clear();
                    self.print_prompt(out);
                    return Some(result);
                }

                self.print_prompt(out);
                None
            }

            // Backspace
            0x7F | 0x08 => {
                if !self.line.is_empty() {
                    self.line.backspace();
                    // Echo: backspace, space, backspace
                    let _ = write!(out, "\x08 \x08");
                }
                None
            }

            0x1B => {
                self.escape_state = EscapeState::Escape;
                None
            }

            // Ctrl+C
            0x03 => {
                let _ = writeln!(out, "^C");
                self.line.clear();
                self.print_prompt(out);
                None
            }

            // Ctrl+U (clear line)
            0x15 => {
                for _ in 0..self.line.len() {
                    let _ = write!(out, "\x08 \x08");
                }
                self.line.clear();
                None
            }

            0x20..=0x7E => {
                if !self.line.is_full() {
                    self.line.push(byte);
                    let _ = write!(out, "{}", byte as char);
                }
                None
            }

            _ => None,
        }
    }

    pub fn print_prompt(&self, out: &mut dyn Write) {
        let _ = write!(out, "linectl> ");
    }

    /// Print welcome banner
    pub fn print_banner(&self, out: &mut dyn Write) {
        let _ = writeln!(out, "\r\n{}", VERSION);
        let _ = writeln!(out, "Type 'help' for commands.\r");
        self.print_prompt(out);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
