//! Global log stream instances.
//!
//! Two streams so the interrupt path never competes with chatty ordinary
//! contexts for ring space:
//! - `RT_LOG_STREAM`: edge handlers (classification diagnostics)
//! - `BG_LOG_STREAM`: lifecycle and control-plane events

use crate::logging::LogStream;

/// Interrupt-path log stream.
///
/// Producers: every armed line's edge handler. Consumer: the log drain.
pub static RT_LOG_STREAM: LogStream = LogStream::new();

/// Background log stream.
///
/// Producers: export/unexport, enable/disable, shutdown, dispatcher.
/// Consumer: the log drain.
pub static BG_LOG_STREAM: LogStream = LogStream::new();
