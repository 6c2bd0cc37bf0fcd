// src/relay/line_buffer.rs
//! Growable byte buffer that splits an arbitrarily chunked byte stream into
//! `\n`-terminated lines. Bytes after the last newline stay pending until the
//! next chunk completes them.

use bytes::{Bytes, BytesMut};

const INITIAL_CAPACITY: usize = 8 * 1024;

/// Longest unterminated line kept in memory.
pub const DEFAULT_MAX_LINE: usize = 1024 * 1024;

#[derive(Debug)]
pub struct LineBuffer {
    buf: BytesMut,
    /// Everything before this offset is known not to contain `\n`.
    scanned: usize,
    max_line: usize,
    /// Inside a line that was shed for being too long; skip up to its `\n`.
    overflowing: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_CAPACITY.min(max_line)),
            scanned: 0,
            max_line,
            overflowing: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Split off the next complete line, without its terminator.
    /// A trailing `\r` is stripped as well.
    pub fn next_line(&mut self) -> Option<Bytes> {
        loop {
            let Some(pos) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') else {
                self.scanned = self.buf.len();
                return None;
            };
            let end = self.scanned + pos;
            let mut line = self.buf.split_to(end + 1);
            self.scanned = 0;
            if std::mem::take(&mut self.overflowing) {
                continue;
            }
            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(end - 1);
            }
            return Some(line.freeze());
        }
    }

    /// Drop the pending tail once it exceeds the line cap. The rest of that
    /// line, up to its `\n`, is dropped by `next_line` as it arrives.
    /// Call after draining complete lines; returns the bytes dropped now.
    pub fn shed_overflow(&mut self) -> Option<usize> {
        if self.buf.len() <= self.max_line {
            return None;
        }
        let n = self.discard();
        self.overflowing = true;
        Some(n)
    }

    /// True while skipping the remainder of a shed line.
    pub fn is_overflowing(&self) -> bool {
        self.overflowing
    }

    /// Bytes still waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop the unterminated tail and return how many bytes were discarded.
    pub fn discard(&mut self) -> usize {
        let n = self.buf.len();
        self.buf.clear();
        self.scanned = 0;
        self.overflowing = false;
        n
    }
}
