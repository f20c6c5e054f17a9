//! A listening session: one reader thread and one decoder thread joined by
//! two handoff queues, with the event queue exposed to the caller.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::backend::{RawModeKind, TerminalBackend};
use crate::decoder::{DecoderConfig, SequenceDecoder};
use crate::error::{Error, Result};
use crate::event::KeyEvent;
use crate::queue::HandoffQueue;
use crate::reader::{RawByteReader, RawInput};
use crate::tables::KeyTables;

pub const DEFAULT_WAKE_INTERVAL: Duration = Duration::from_millis(50);

/// Session options, assembled builder-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    decoder: DecoderConfig,
    raw_mode: RawModeKind,
    wake_interval: Option<Duration>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            decoder: DecoderConfig::default(),
            raw_mode: RawModeKind::default(),
            wake_interval: Some(DEFAULT_WAKE_INTERVAL),
        }
    }
}

impl ListenerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.decoder.poll_interval = poll_interval;
        self
    }

    pub fn carry_partial_escape(mut self, carry: bool) -> Self {
        self.decoder.carry_partial_escape = carry;
        self
    }

    pub fn escape_timeout(mut self, escape_timeout: Duration) -> Self {
        self.decoder.escape_timeout = escape_timeout;
        self
    }

    pub fn raw_mode(mut self, raw_mode: RawModeKind) -> Self {
        self.raw_mode = raw_mode;
        self
    }

    /// Upper bound on how long the reader blocks before rechecking for shutdown.
    /// `None` blocks until the next byte.
    pub fn wake_interval(mut self, wake_interval: Option<Duration>) -> Self {
        self.wake_interval = wake_interval;
        self
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        self.decoder
    }

    pub fn raw_mode_kind(&self) -> RawModeKind {
        self.raw_mode
    }

    pub fn wake_interval_duration(&self) -> Option<Duration> {
        self.wake_interval
    }
}

pub struct Listener {
    events: Arc<HandoffQueue<KeyEvent>>,
    raw: Arc<HandoffQueue<RawInput>>,
    decoder: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<Result<()>>>,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("active", &self.events.is_active())
            .field("pending_events", &self.events.len())
            .field("pending_input", &self.raw.len())
            .finish()
    }
}

impl Listener {
    /// Start reading from `backend` and decoding with `tables`.
    ///
    /// Raw mode is entered before any thread starts; if that fails, the error
    /// is returned and nothing runs.
    pub fn spawn<B>(backend: B, tables: Arc<KeyTables>, config: ListenerConfig) -> Result<Self>
    where
        B: TerminalBackend + 'static,
    {
        let reader = RawByteReader::new(backend, config.raw_mode)?;

        let raw = Arc::new(HandoffQueue::new());
        let events = Arc::new(HandoffQueue::new());
        raw.activate();
        events.activate();

        let reader = {
            let raw = Arc::clone(&raw);
            thread::Builder::new()
                .name("keystroke-reader".into())
                .spawn(move || reader.run(&raw))
        };
        let reader = match reader {
            Ok(handle) => handle,
            Err(e) => {
                raw.deactivate();
                events.deactivate();
                return Err(Error::Spawn(e));
            }
        };

        let decoder = {
            let raw = Arc::clone(&raw);
            let events = Arc::clone(&events);
            let mut decoder = SequenceDecoder::new(tables, config.decoder);
            thread::Builder::new()
                .name("keystroke-decoder".into())
                .spawn(move || {
                    decoder.run(&raw, &events);
                    raw.deactivate();
                    raw.empty();
                })
        };
        let decoder = match decoder {
            Ok(handle) => handle,
            Err(e) => {
                // The reader exits once it sees the deactivated queue.
                raw.deactivate();
                events.deactivate();
                return Err(Error::Spawn(e));
            }
        };

        tracing::info!(
            target: "listener",
            raw_mode = ?config.raw_mode,
            poll_interval_us = config.decoder.poll_interval.as_micros() as u64,
            "listening session started"
        );

        Ok(Self {
            events,
            raw,
            decoder: Some(decoder),
            reader: Some(reader),
        })
    }

    /// The queue decoded key events are published to.
    pub fn events(&self) -> Arc<HandoffQueue<KeyEvent>> {
        Arc::clone(&self.events)
    }

    /// Next decoded event, if one is ready.
    pub fn try_next(&self) -> Option<KeyEvent> {
        self.events.get()
    }

    pub fn is_active(&self) -> bool {
        self.events.is_active()
    }

    /// Whether the reader thread has exited (input closed, read failure, or shutdown).
    pub fn reader_finished(&self) -> bool {
        self.reader.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Shut the session down and wait for both threads.
    ///
    /// With a blocking backend this returns only after one more byte arrives.
    pub fn stop(mut self) -> Result<()> {
        self.events.deactivate();

        let decoder = self.decoder.take().map(JoinHandle::join);
        // The decoder deactivates the raw queue on exit; do it here too in case it panicked.
        self.raw.deactivate();
        let reader = self.reader.take().map(JoinHandle::join);
        self.events.empty();
        self.raw.empty();
        tracing::info!(target: "listener", "listening session stopped");

        if let Some(Err(_)) = decoder {
            return Err(Error::ThreadPanicked("keystroke-decoder"));
        }
        match reader {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(Error::ThreadPanicked("keystroke-reader")),
            None => Ok(()),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        // Signal both threads if `stop` was never called; they are left to exit on their own.
        self.events.deactivate();
        self.raw.deactivate();
    }
}
