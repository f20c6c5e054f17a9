use crate::backend::{RawModeGuard, RawModeKind, ReadOutcome, TerminalBackend};
use crate::error::{Error, Result};
use crate::queue::HandoffQueue;

/// One unit handed from the reader to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    Byte(u8),
    /// A special key the backend already named from its scan code.
    Key(&'static str),
}

/// Pumps single bytes from a terminal backend into a queue while the queue is active.
pub struct RawByteReader<B: TerminalBackend> {
    guard: RawModeGuard<B>,
    kind: RawModeKind,
}

impl<B: TerminalBackend> RawByteReader<B> {
    /// Switch the terminal to raw mode. The captured mode is restored when
    /// [`RawByteReader::run`] returns, or when the reader is dropped unused.
    pub fn new(backend: B, kind: RawModeKind) -> Result<Self> {
        let guard = RawModeGuard::new(backend, kind)?;
        Ok(Self { guard, kind })
    }

    /// Forward every byte read into `output` until `output` is deactivated,
    /// input ends, or a read fails.
    ///
    /// The captured terminal mode is restored before returning on every path.
    /// A blocking backend notices deactivation only after its next byte.
    pub fn run(mut self, output: &HandoffQueue<RawInput>) -> Result<()> {
        tracing::info!(target: "raw_byte_reader", kind = ?self.kind, "reader started");

        let mut forwarded = 0usize;
        let outcome = loop {
            if !output.is_active() {
                break Ok(());
            }
            match self.guard.read_byte() {
                Ok(ReadOutcome::Byte(byte)) => {
                    output.put(RawInput::Byte(byte));
                    forwarded += 1;
                }
                Ok(ReadOutcome::ScanCode(scan_code)) => {
                    match self.guard.translate_scan_code(scan_code) {
                        Some(name) => {
                            output.put(RawInput::Key(name));
                            forwarded += 1;
                        }
                        None => {
                            tracing::debug!(target: "raw_byte_reader", scan_code, "unmapped scan code")
                        }
                    }
                }
                Ok(ReadOutcome::Idle) => {}
                Ok(ReadOutcome::Closed) => {
                    tracing::debug!(target: "raw_byte_reader", "input closed");
                    break Ok(());
                }
                Err(err) => {
                    tracing::error!(
                        target: "raw_byte_reader",
                        kind = ?err.kind(),
                        forwarded,
                        "read failed: {}",
                        err
                    );
                    break Err(Error::Read(err));
                }
            }
        };

        let restored = self.guard.restore();
        tracing::info!(target: "raw_byte_reader", forwarded, "reader stopped");
        outcome.and(restored)
    }

    pub fn backend(&self) -> &B {
        &self.guard
    }
}
