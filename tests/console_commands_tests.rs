//! Command handler tests

use edge_line_registry::console::commands::{execute, COMMANDS};
use edge_line_registry::console::parser::parse_line;
use edge_line_registry::console::{Console, ConsoleError};
use edge_line_registry::{Error, Registry, RegistryConfig, SimChip};

fn registry() -> Registry<SimChip, 4> {
    Registry::new(SimChip::new(), RegistryConfig::default())
}

fn run(reg: &Registry<SimChip, 4>, line: &str) -> (Result<(), ConsoleError>, TestOutput) {
    let mut output = TestOutput::new();
    let result = execute(&parse_line(line), reg, &mut output);
    (result, output)
}

#[test]
fn test_command_registry_has_all_commands() {
    let expected = [
        "help", "export", "unexport", "list", "enable", "disable", "count", "value",
        "direction", "set", "show", "stats",
    ];

    for name in expected {
        assert!(
            COMMANDS.iter().any(|c| c.name == name),
            "Command '{}' should be in registry",
            name
        );
    }
}

#[test]
fn test_execute_unknown_command() {
    let reg = registry();
    let (result, _) = run(&reg, "foobar");
    assert_eq!(result, Err(ConsoleError::UnknownCommand));
}

#[test]
fn test_execute_help() {
    let reg = registry();
    let (result, output) = run(&reg, "help");
    assert!(result.is_ok());
    assert!(output.contains("export"));
    assert!(output.contains("stats"));
}

#[test]
fn test_export_list_unexport() {
    let reg = registry();

    let (result, output) = run(&reg, "export 17");
    assert!(result.is_ok());
    assert!(output.contains("line17 -> slot 0"));

    let (_, output) = run(&reg, "list");
    assert!(output.contains("line17"));
    assert!(output.contains("1/4 slots in use"));

    assert_eq!(run(&reg, "export 17").0, Err(ConsoleError::Line(Error::AlreadyExported)));
    assert!(run(&reg, "unexport 17").0.is_ok());
    assert_eq!(run(&reg, "unexport 17").0, Err(ConsoleError::Line(Error::NotFound)));
}

#[test]
fn test_export_requires_numeric_id() {
    let reg = registry();
    assert_eq!(run(&reg, "export").0, Err(ConsoleError::MissingArg));
    assert_eq!(run(&reg, "export seventeen").0, Err(ConsoleError::InvalidValue));
}

#[test]
fn test_enable_disable_state_errors() {
    let reg = registry();
    run(&reg, "export 5").0.unwrap();

    assert_eq!(run(&reg, "disable 0").0, Err(ConsoleError::Line(Error::NotArmed)));
    assert!(run(&reg, "enable 0").0.is_ok());
    assert_eq!(run(&reg, "enable 0").0, Err(ConsoleError::Line(Error::AlreadyArmed)));
    assert_eq!(run(&reg, "enable 9").0, Err(ConsoleError::OutOfRange));
    assert_eq!(run(&reg, "enable 1").0, Err(ConsoleError::Line(Error::NoSuchDevice)));
}

#[test]
fn test_value_and_direction() {
    let reg = registry();
    run(&reg, "export 5").0.unwrap();

    assert_eq!(run(&reg, "value 0 1").0, Err(ConsoleError::Line(Error::PermissionDenied)));
    assert!(run(&reg, "direction 0 out").0.is_ok());
    assert!(run(&reg, "value 0 1").0.is_ok());

    let (_, output) = run(&reg, "value 0");
    assert!(output.contains("1"));
    let (_, output) = run(&reg, "direction 0");
    assert!(output.contains("out"));
    assert_eq!(run(&reg, "direction 0 up").0, Err(ConsoleError::InvalidValue));
}

#[test]
fn test_set_and_show_params() {
    let reg = registry();

    assert!(run(&reg, "set entry_max_us 130000").0.is_ok());
    let (_, output) = run(&reg, "show entry_max_us");
    assert!(output.contains("entry_max_us=130000"));

    // Would overlap the exit window
    assert_eq!(run(&reg, "set entry_max_us 190000").0, Err(ConsoleError::InvalidValue));
    assert_eq!(run(&reg, "set entry_max_us 99999999").0, Err(ConsoleError::OutOfRange));
    assert_eq!(run(&reg, "set bogus 1").0, Err(ConsoleError::UnknownCommand));

    let (_, output) = run(&reg, "show exit*");
    assert!(output.contains("exit_min_us=180000"));
    assert!(!output.contains("entry"));
}

#[test]
fn test_stats() {
    let reg = registry();
    let (result, output) = run(&reg, "stats");
    assert!(result.is_ok());
    assert!(output.contains("count: 0"));
    assert!(output.contains("slots: 0/4"));
}

#[test]
fn test_console_feeds_bytes() {
    let reg = registry();
    let mut console = Console::new();
    let mut output = TestOutput::new();

    let result = console.feed("export 3\r", &reg, &mut output);
    assert_eq!(result, Some(Ok(())));
    assert!(reg.slot_of(3).is_some());

    // Backspace edits the line before it runs
    let result = console.feed("unexport 34\x7f\n", &reg, &mut output);
    assert_eq!(result, Some(Ok(())));
    assert!(reg.slot_of(3).is_none());

    let result = console.feed("nope\n", &reg, &mut output);
    assert_eq!(result, Some(Err(ConsoleError::UnknownCommand)));
    assert!(output.contains("E01"));
}

// Test output buffer
struct TestOutput {
    buf: [u8; 2048],
    len: usize,
}

impl TestOutput {
    fn new() -> Self {
        Self { buf: [0u8; 2048], len: 0 }
    }

    fn contains(&self, s: &str) -> bool {
        if let Ok(content) = core::str::from_utf8(&self.buf[..self.len]) {
            content.contains(s)
        } else {
            false
        }
    }
}

impl core::fmt::Write for TestOutput {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let available = self.buf.len() - self.len;
        let to_copy = bytes.len().min(available);
        self.buf[self.len..self.len + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.len += to_copy;
        Ok(())
    }
}
