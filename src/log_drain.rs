//! Log drain: moves entries out of the global log streams.
//!
//! Runs in an ordinary context (it may block on its sink). Drains
//! `RT_LOG_STREAM` first, then `BG_LOG_STREAM`, and periodically reports
//! how many messages the rings had to drop.
//!
//! On ESP-IDF the sink is a TX-only UART; on host any `core::fmt::Write`.

use core::fmt::Write;

use crate::logging::{BufWriter, LogEntry, LogStream};
use crate::{BG_LOG_STREAM, RT_LOG_STREAM};

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::gpio;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::peripheral::Peripheral;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::uart::{self, UartTxDriver};

/// Interval between dropped-message reports.
pub const DROP_REPORT_INTERVAL_US: i64 = 10_000_000;

/// Format log entry.
///
/// Format: `[timestamp_us] LEVEL: message\n`
pub fn format_log_entry(entry: &LogEntry, buf: &mut [u8]) -> usize {
    let mut writer = BufWriter { buf, pos: 0 };
    let _ = writeln!(
        writer,
        "[{:10}] {}: {}",
        entry.timestamp_us,
        entry.level.as_str(),
        entry.message()
    );
    writer.pos
}

fn write_entry(out: &mut dyn Write, entry: &LogEntry) {
    let mut format_buf = [0u8; 256];
    let len = format_log_entry(entry, &mut format_buf);
    if let Ok(text) = core::str::from_utf8(&format_buf[..len]) {
        let _ = out.write_str(text);
    }
}

fn drain_stream<const N: usize>(stream: &LogStream<N>, out: &mut dyn Write) -> usize {
    let mut written = 0;
    while let Some(entry) = stream.drain() {
        write_entry(out, &entry);
        written += 1;
    }
    written
}

/// Drain both global streams into `out`. Returns the number of entries.
pub fn drain_once(out: &mut dyn Write) -> usize {
    // Interrupt-path logs first
    drain_stream(&RT_LOG_STREAM, out) + drain_stream(&BG_LOG_STREAM, out)
}

/// Write a warning if any messages were dropped, then reset the counters.
///
/// Returns true if a report was written.
pub fn report_dropped(out: &mut dyn Write) -> bool {
    let rt_dropped = RT_LOG_STREAM.dropped();
    let bg_dropped = BG_LOG_STREAM.dropped();
    if rt_dropped == 0 && bg_dropped == 0 {
        return false;
    }
    let _ = writeln!(out, "[WARN] Dropped: RT={}, BG={}", rt_dropped, bg_dropped);
    RT_LOG_STREAM.reset_dropped();
    BG_LOG_STREAM.reset_dropped();
    true
}

/// Stateful drain with periodic drop reporting.
pub struct LogDrain {
    last_dropped_report_us: i64,
}

impl LogDrain {
    pub const fn new() -> Self {
        Self {
            last_dropped_report_us: 0,
        }
    }

    /// One pass: drain everything, report drops if the interval elapsed.
    ///
    /// Returns true if any work was done.
    pub fn poll(&mut self, now_us: i64, out: &mut dyn Write) -> bool {
        let mut work_done = drain_once(out) > 0;
        if now_us - self.last_dropped_report_us > DROP_REPORT_INTERVAL_US {
            work_done |= report_dropped(out);
            self.last_dropped_report_us = now_us;
        }
        work_done
    }
}

impl Default for LogDrain {
    fn default() -> Self {
        Self::new()
    }
}

/// UART configuration for logging.
#[cfg(target_os = "espidf")]
pub struct UartLoggerConfig {
    pub baud_rate: u32,
}

#[cfg(target_os = "espidf")]
impl Default for UartLoggerConfig {
    fn default() -> Self {
        Self { baud_rate: 115200 }
    }
}

/// Initialize UART1 TX-only for logging output.
#[cfg(target_os = "espidf")]
pub fn init_uart_logger<'d>(
    uart: impl Peripheral<P = esp_idf_svc::hal::uart::UART1> + 'd,
    tx_pin: impl Peripheral<P = impl gpio::OutputPin> + 'd,
    config: &UartLoggerConfig,
) -> Result<UartTxDriver<'d>, esp_idf_svc::sys::EspError> {
    let uart_config = uart::config::Config::default()
        .baudrate(esp_idf_svc::hal::units::Hertz(config.baud_rate));

    UartTxDriver::new(
        uart,
        tx_pin,
        Option::<gpio::AnyIOPin>::None, // CTS
        Option::<gpio::AnyIOPin>::None, // RTS
        &uart_config,
    )
}

/// `core::fmt::Write` adapter over a UART TX driver.
#[cfg(target_os = "espidf")]
pub struct UartSink<'a, 'd>(pub &'a mut UartTxDriver<'d>);

#[cfg(target_os = "espidf")]
impl Write for UartSink<'_, '_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.write(s.as_bytes()).map(|_| ()).map_err(|_| core::fmt::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MAX_MSG_LEN};

    fn entry(ts: i64, level: LogLevel, text: &[u8], len: u8) -> LogEntry {
        let mut msg = [0u8; MAX_MSG_LEN];
        msg[..text.len()].copy_from_slice(text);
        LogEntry {
            timestamp_us: ts,
            level,
            len,
            msg,
        }
    }

    #[test]
    fn test_format_log_entry() {
        let e = entry(1234567, LogLevel::Info, b"Exported line 17", 16);
        let mut buf = [0u8; 256];
        let len = format_log_entry(&e, &mut buf);

        let formatted = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(formatted.contains("1234567"));
        assert!(formatted.contains("INFO"));
        assert!(formatted.contains("Exported line 17"));
        assert!(formatted.ends_with('\n'));
    }

    #[test]
    fn test_format_truncated_message() {
        let e = entry(999, LogLevel::Error, b"TEST12345X", 5);
        let mut buf = [0u8; 256];
        let len = format_log_entry(&e, &mut buf);

        let formatted = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(formatted.contains("ERROR"));
        assert!(formatted.contains("TEST1"));
        assert!(!formatted.contains('X'));
    }

    #[test]
    fn test_drain_private_stream() {
        let stream = LogStream::<8>::new();
        stream.push(1, LogLevel::Info, b"one");
        stream.push(2, LogLevel::Warn, b"two");

        let mut out = std::string::String::new();
        assert_eq!(drain_stream(&stream, &mut out), 2);
        assert!(out.contains("INFO: one"));
        assert!(out.contains("WARN: two"));
        assert_eq!(drain_stream(&stream, &mut out), 0);
    }
}
