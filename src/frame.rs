//! # Line Framing
//!
//! The transport is a raw byte stream with no message boundaries, so the
//! framer supplies them: bytes accumulate in a bounded buffer until the
//! two-byte `\r\n` terminator appears, at which point one complete line is
//! handed out and the consumed bytes slide out of the buffer.
//!
//! The framer knows nothing about mnemonics or parameters; it only finds
//! terminators.

use heapless::Vec;

/// The two-byte line terminator used in both directions.
pub const TERMINATOR: &[u8; 2] = b"\r\n";

/// The line buffer filled up without a terminator arriving.
///
/// Once this is returned the stream can no longer be re-synchronized; the
/// caller should escalate rather than keep feeding bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FramerOverflow;

/// Accumulates raw transport bytes and yields complete, terminator-stripped
/// command lines.
///
/// `CAP` bounds the number of bytes that may be buffered while waiting for a
/// terminator; it is the hard cap on the length of one line plus any bytes of
/// the next line already received.
#[derive(Default)]
pub struct LineFramer<const CAP: usize> {
    buf: Vec<u8, CAP>,
}

impl<const CAP: usize> LineFramer<CAP> {
    /// Creates an empty framer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Appends freshly received bytes to the internal buffer.
    ///
    /// Complete lines are not extracted here; call [`next_line`] in a loop
    /// afterwards. Fails with [`FramerOverflow`] when the bytes do not fit.
    ///
    /// [`next_line`]: LineFramer::next_line
    pub fn push(&mut self, data: &[u8]) -> Result<(), FramerOverflow> {
        self.buf.extend_from_slice(data).map_err(|_| FramerOverflow)
    }

    /// Extracts the next complete line, if one is buffered.
    ///
    /// The returned line has the terminator stripped. A carriage return that
    /// is not immediately followed by a line feed does not terminate a line:
    /// it stays buffered as ordinary content until more bytes arrive.
    pub fn next_line(&mut self) -> Option<Vec<u8, CAP>> {
        let end = self.find_terminator()?;

        let mut line = Vec::new();
        // Cannot fail: end < buf.len() <= CAP.
        let _ = line.extend_from_slice(&self.buf[..end]);

        let consumed = end + TERMINATOR.len();
        let remaining = self.buf.len() - consumed;
        self.buf.copy_within(consumed.., 0);
        self.buf.truncate(remaining);

        Some(line)
    }

    /// Number of bytes currently buffered (partial line content).
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Discards all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn find_terminator(&self) -> Option<usize> {
        if self.buf.len() < TERMINATOR.len() {
            return None;
        }
        (0..self.buf.len() - 1)
            .find(|&i| self.buf[i] == TERMINATOR[0] && self.buf[i + 1] == TERMINATOR[1])
    }
}
