//! Timed accumulation of raw bytes into key events.
//!
//! A lone ESC key press and the first byte of a multi-byte escape sequence
//! look the same until either more bytes arrive or time passes. The decoder
//! drains everything the reader produced once per poll interval and treats
//! each drain as one unit, which resolves the ambiguity as long as a
//! terminal delivers a whole sequence within one interval.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::classify::{classify, ESC};
use crate::event::KeyEvent;
use crate::queue::HandoffQueue;
use crate::reader::RawInput;
use crate::tables::KeyTables;

/// Default poll interval: shorter than two separate key presses, longer than
/// the arrival spread of one escape sequence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(100);

pub const DEFAULT_ESCAPE_TIMEOUT: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    pub poll_interval: Duration,
    /// Hold an incomplete trailing escape sequence (or UTF-8 character) until
    /// the next drain instead of classifying it immediately.
    pub carry_partial_escape: bool,
    /// How long held bytes wait for a continuation before being classified as they are.
    pub escape_timeout: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            carry_partial_escape: false,
            escape_timeout: DEFAULT_ESCAPE_TIMEOUT,
        }
    }
}

#[derive(Debug)]
pub struct SequenceDecoder {
    tables: Arc<KeyTables>,
    config: DecoderConfig,
    pending: Vec<u8>,
    last_byte_at: Option<Instant>,
}

impl SequenceDecoder {
    pub fn new(tables: Arc<KeyTables>, config: DecoderConfig) -> Self {
        Self {
            tables,
            config,
            pending: Vec::new(),
            last_byte_at: None,
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Classify one drain worth of bytes.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<KeyEvent> {
        self.decode_at(bytes, Instant::now())
    }

    /// Like [`SequenceDecoder::decode`], with the drain time supplied by the caller.
    pub fn decode_at(&mut self, bytes: &[u8], now: Instant) -> Vec<KeyEvent> {
        if !bytes.is_empty() {
            self.pending.extend_from_slice(bytes);
            self.last_byte_at = Some(now);
        }
        if self.pending.is_empty() {
            return Vec::new();
        }
        if !self.config.carry_partial_escape {
            return self.flush();
        }

        if bytes.is_empty() {
            let timed_out = self
                .last_byte_at
                .map_or(true, |at| {
                    now.saturating_duration_since(at) >= self.config.escape_timeout
                });
            return if timed_out { self.flush() } else { Vec::new() };
        }

        let complete = self.complete_len();
        let events = classify(&self.pending[..complete], &self.tables);
        self.pending.drain(..complete);
        events
    }

    /// Classify whatever is held, complete or not.
    pub fn flush(&mut self) -> Vec<KeyEvent> {
        let events = classify(&self.pending, &self.tables);
        self.pending.clear();
        self.last_byte_at = None;
        events
    }

    /// Decode one drain of reader output. A named key ends any held sequence
    /// and is published in its arrival position.
    pub fn decode_inputs_at(&mut self, inputs: &[RawInput], now: Instant) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        let mut bytes = Vec::new();
        for input in inputs {
            match *input {
                RawInput::Byte(byte) => bytes.push(byte),
                RawInput::Key(name) => {
                    if !bytes.is_empty() {
                        events.extend(self.decode_at(&bytes, now));
                        bytes.clear();
                    }
                    events.extend(self.flush());
                    events.push(KeyEvent::key(name));
                }
            }
        }
        events.extend(self.decode_at(&bytes, now));
        events
    }

    /// Length of the prefix of `pending` that cannot grow any further.
    fn complete_len(&self) -> usize {
        let pending = &self.pending;
        if let Some(start) = pending.iter().rposition(|&b| b == ESC) {
            let group = &pending[start..];
            if group.len() == 1 || self.tables.csi.is_partial(group) {
                return start;
            }
        }

        let tail_start = pending.len().saturating_sub(3);
        for (idx, &byte) in pending.iter().enumerate().skip(tail_start).rev() {
            if byte & 0xC0 == 0x80 {
                continue;
            }
            let width = utf8_char_width(byte);
            return if idx + width > pending.len() {
                idx
            } else {
                pending.len()
            };
        }
        pending.len()
    }

    /// Drain `raw` once per poll interval and publish the decoded events to
    /// `events`, until `events` is deactivated.
    pub fn run(&mut self, raw: &HandoffQueue<RawInput>, events: &HandoffQueue<KeyEvent>) {
        tracing::debug!(
            target: "sequence_decoder",
            poll_interval_us = self.config.poll_interval.as_micros() as u64,
            carry_partial_escape = self.config.carry_partial_escape,
            "decoder started"
        );

        let mut drained = Vec::new();
        while events.is_active() {
            let tick = Instant::now();
            while let Some(input) = raw.get() {
                drained.push(input);
            }

            let decoded = self.decode_inputs_at(&drained, tick);
            if !decoded.is_empty() {
                tracing::trace!(
                    target: "sequence_decoder",
                    input = ?drained,
                    events = ?decoded,
                    held = self.pending.len(),
                    "decoded drain"
                );
            }
            for event in decoded {
                events.put(event);
            }
            drained.clear();

            if let Some(rest) = self.config.poll_interval.checked_sub(tick.elapsed()) {
                thread::sleep(rest);
            }
        }

        tracing::debug!(
            target: "sequence_decoder",
            dropped_pending = self.pending.len(),
            "decoder stopped"
        );
    }
}

fn utf8_char_width(first_byte: u8) -> usize {
    if first_byte < 0x80 {
        1
    } else if first_byte >> 5 == 0b110 {
        2
    } else if first_byte >> 4 == 0b1110 {
        3
    } else if first_byte >> 3 == 0b11110 {
        4
    } else {
        1
    }
}
