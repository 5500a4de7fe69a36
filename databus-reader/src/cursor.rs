//! Line-at-a-time reading over a growing file.
//!
//! The cursor reads fixed-size chunks through [`StreamFs::read_range`] and
//! splits them on `\n`. Bytes after the last newline stay buffered until the
//! writer finishes the line, or until the caller asks to drain them because
//! the file has been rotated out.
//!
//! A line longer than the cursor's limit is reported once as
//! [`NextLine::TooLong`] and its bytes are dropped up to the next newline, so
//! the buffer never holds more than one limit's worth of a single line.

use std::path::Path;

use bytes::{Buf, Bytes, BytesMut};
use databus_fs::{FsResult, StreamFs};

/// One step of a [`LineCursor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextLine {
    /// A complete line without its terminator.
    Line(Bytes),
    /// A line longer than the limit. Counts as one line.
    TooLong,
}

/// Position within one file plus read-ahead buffer.
///
/// # Invariants
///
/// - `offset` is the byte position just after the last consumed byte.
/// - `pending` holds the file bytes `offset..offset + pending.len()`.
/// - `pending.len() <= max_line_bytes + chunk` outside of `next_line`.
/// - While `discarding`, the bytes up to the next newline belong to a line
///   already reported as too long.
#[derive(Debug)]
pub struct LineCursor {
    offset: u64,
    pending: BytesMut,
    max_line_bytes: usize,
    discarding: bool,
}

impl LineCursor {
    /// Creates a cursor at the start of a file.
    ///
    /// # Panics
    ///
    /// Panics if `max_line_bytes` is zero.
    #[must_use]
    pub fn new(max_line_bytes: u32) -> Self {
        assert!(max_line_bytes > 0, "max_line_bytes must be positive");
        Self {
            offset: 0,
            pending: BytesMut::new(),
            max_line_bytes: max_line_bytes as usize,
            discarding: false,
        }
    }

    /// Returns the byte offset just after the last consumed line.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the number of read-ahead bytes not yet returned.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Moves back to the start of a (new) file.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.pending.clear();
        self.discarding = false;
    }

    /// Returns the next line, or `None` at end of data.
    ///
    /// Lines end with `\n`; a preceding `\r` is stripped. With `drain` set, an
    /// unterminated trailing line is returned as well.
    ///
    /// On error the cursor is unchanged apart from extra buffered bytes, so
    /// the call can be retried.
    ///
    /// # Errors
    ///
    /// Returns the filesystem error from the underlying read.
    pub async fn next_line<F: StreamFs + ?Sized>(
        &mut self,
        fs: &F,
        path: &Path,
        chunk_bytes: u32,
        drain: bool,
    ) -> FsResult<Option<NextLine>> {
        assert!(chunk_bytes > 0, "chunk_bytes must be positive");

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                if self.discarding {
                    self.consume(pos + 1);
                    self.discarding = false;
                    continue;
                }
                if pos > self.max_line_bytes {
                    self.consume(pos + 1);
                    return Ok(Some(NextLine::TooLong));
                }
                let mut line = self.pending.split_to(pos + 1);
                self.offset += (pos + 1) as u64;
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                return Ok(Some(NextLine::Line(line.freeze())));
            }

            if self.discarding {
                self.consume(self.pending.len());
            } else if self.pending.len() > self.max_line_bytes {
                self.consume(self.pending.len());
                self.discarding = true;
                return Ok(Some(NextLine::TooLong));
            }

            let read_at = self.offset + self.pending.len() as u64;
            let chunk = fs.read_range(path, read_at, chunk_bytes).await?;
            if chunk.is_empty() {
                if drain && self.discarding {
                    // The too-long line ends at end of file.
                    self.discarding = false;
                    return Ok(None);
                }
                if drain && !self.pending.is_empty() {
                    let mut line = self.pending.split();
                    self.offset += line.len() as u64;
                    if line.last() == Some(&b'\r') {
                        line.truncate(line.len() - 1);
                    }
                    return Ok(Some(NextLine::Line(line.freeze())));
                }
                return Ok(None);
            }
            self.pending.extend_from_slice(&chunk);
        }
    }

    /// Drops `len` buffered bytes.
    fn consume(&mut self, len: usize) {
        self.pending.advance(len);
        self.offset += len as u64;
    }
}
