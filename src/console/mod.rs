//! Management console: line-oriented text front end over the registry.
//!
//! Lazy polling from whatever task owns the input stream.
//! Zero heap allocation - all static buffers.

pub mod commands;
#[allow(clippy::module_inception)]
pub mod console;
pub mod error;
pub mod line_buffer;
pub mod parser;

pub use commands::{command_names, execute, LineControl, COMMANDS};
pub use console::Console;
pub use error::ConsoleError;
pub use line_buffer::LineBuffer;
pub use parser::{parse_line, ParsedCommand};
