//! Decode a raw terminal byte stream into key-press events.
//!
//! A [`Listener`] runs two threads per session: a [`RawByteReader`] that
//! keeps the terminal in raw mode and forwards single bytes, and a
//! [`SequenceDecoder`] that drains those bytes on a short fixed interval and
//! turns them into [`KeyEvent`]s. Both hand data over through
//! [`HandoffQueue`]s, and deactivating the event queue ends the session.
//!
//! ```no_run
//! use std::sync::Arc;
//! use keystroke_events::{default_backend, KeyTables, Listener, ListenerConfig};
//!
//! # fn main() -> keystroke_events::Result<()> {
//! let tables = Arc::new(KeyTables::detect()?);
//! let config = ListenerConfig::new();
//! let listener = Listener::spawn(default_backend(config.wake_interval_duration())?, tables, config)?;
//! loop {
//!     if let Some(event) = listener.try_next() {
//!         if event.matches("q") {
//!             break;
//!         }
//!         println!("You pressed {event}");
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(1));
//! }
//! listener.stop()
//! # }
//! ```

pub mod backend;
pub mod classify;
pub mod decoder;
pub mod error;
pub mod event;
pub mod listener;
pub mod queue;
pub mod reader;
pub mod tables;

pub use backend::{default_backend, RawModeGuard, RawModeKind, ReadOutcome, TerminalBackend};
pub use decoder::{DecoderConfig, SequenceDecoder};
pub use error::{Error, Result};
pub use event::{ControlCode, KeyEvent};
pub use listener::{Listener, ListenerConfig};
pub use queue::HandoffQueue;
pub use reader::{RawByteReader, RawInput};
pub use tables::{ControlCodeTable, CsiTable, KeyTables, ScanCodeTable, TerminalType};
