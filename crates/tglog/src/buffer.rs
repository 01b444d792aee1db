//! Accumulation buffer.
//!
//! Holds forwarded text until the scheduler decides to flush, then hands out
//! a prefix of it as a [`Batch`]. Undelivered batches go back to the front so
//! ordering is preserved.

use crate::backoff::Backoff;
use crate::split::{document_end, text_chunk_end};
use std::time::{Duration, Instant};

/// Size limits applied when cutting a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest text chunk, before decoration.
    pub working_limit: usize,
    /// Buffer size above which a document is uploaded instead.
    pub pending_size: usize,
}

/// A prefix of the buffer ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    /// Appended to the live message.
    Text(String),
    /// Uploaded as a file attachment.
    Document(String),
}

impl Batch {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) | Self::Document(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct Accumulator {
    buffer: String,
    lines: usize,
    last_flush: Option<Instant>,
    backoff: Backoff,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one write, newline-terminated.
    pub fn append(&mut self, text: &str) {
        self.buffer.push_str(text);
        if !text.ends_with('\n') {
            self.buffer.push('\n');
        }
        self.lines += 1;
    }

    /// Start a flush attempt at `now`.
    ///
    /// Clears the backoff and resets the line counter and flush timestamp,
    /// even when there is nothing to send.
    pub fn begin_flush(&mut self, limits: &Limits, now: Instant) -> Option<Batch> {
        self.backoff.clear();
        self.lines = 0;
        self.last_flush = Some(now);
        self.take_batch(limits)
    }

    fn take_batch(&mut self, limits: &Limits) -> Option<Batch> {
        if self.buffer.len() > limits.pending_size {
            let end = document_end(&self.buffer, limits.pending_size);
            return Some(Batch::Document(self.take_prefix(end)));
        }

        match text_chunk_end(&self.buffer, limits.working_limit) {
            0 => None,
            end => Some(Batch::Text(self.take_prefix(end))),
        }
    }

    fn take_prefix(&mut self, end: usize) -> String {
        let rest = self.buffer.split_off(end);
        std::mem::replace(&mut self.buffer, rest)
    }

    /// Put undelivered text back in front of newer writes.
    pub fn restore(&mut self, unsent: &str) {
        if unsent.is_empty() {
            return;
        }
        self.buffer.insert_str(0, unsent);
        self.lines += unsent.lines().count().max(1);
    }

    /// Hold off further flushes for `wait`, counted from `now`.
    pub fn throttle(&mut self, wait: Duration, now: Instant) {
        self.backoff.set(wait);
        self.last_flush = Some(now);
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn last_flush(&self) -> Option<Instant> {
        self.last_flush
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }
}
