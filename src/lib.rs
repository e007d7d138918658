//! # EdgeLineRegistry
//!
//! GPIO lines exported as independently managed logical devices, with an
//! interrupt-context edge classifier and best-effort notification fan-out.
//!
//! ## Architecture
//!
//! ```text
//!  export/unexport ──▶ Registry ◀── lookup ── control plane / attributes
//!                         │
//!  hardware edge ──▶ on_edge (lock-free) ──▶ EventStream (per slot)
//!                                                │
//!                               Dispatcher ◀─────┘──▶ subscribers (pending bits)
//! ```
//!
//! - The edge handler never blocks, allocates or fails
//! - Delivery is decoupled from the handler through per-slot event rings
//! - Logging from the handler goes through the RT-safe log stream

#![cfg_attr(not(test), no_std)]

pub mod attr;
pub mod classifier;
pub mod config;
pub mod console;
pub mod consumer;
pub mod control;
pub mod error;
pub mod fanout;
pub mod fault;
pub mod hal;
pub mod log_drain;
pub mod log_globals;
pub mod logging;
pub mod registry;
pub mod sample;
pub mod stream;

pub use attr::{Attribute, NodeName};
pub use classifier::{classify, Window, Windows};
pub use config::{ClassifierConfig, RegistryConfig};
pub use control::{Command, LineHandle};
pub use error::{Error, Result};
pub use fanout::{Dispatcher, Notification, SubscriberId};
pub use fault::{FaultCode, FaultState};
pub use hal::{EdgeSink, EdgeTarget, LineChip, SimChip};
pub use log_globals::{BG_LOG_STREAM, RT_LOG_STREAM};
pub use registry::{EntryRef, Registry, SlotInfo};
pub use sample::{Direction, EdgeEvent, EdgeKind, Level};
