//! The vocabulary detectors use to steer the engine.
//!
//! Every call to a detector's dimension step yields exactly one [`Command`].
//! The engine applies it in full before it hands control back to the caller:
//! it reshapes its window, records what to wait for, and either returns to
//! wait for more input or invokes the detector again when the bytes are
//! already buffered.

use crate::types::Dimensions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Final (or provisional, for JPEG awaiting EXIF) answer.
    Dimensions(Dimensions),
    /// Drop the whole window and wait for new bytes.
    Discard,
    /// Keep only the last `n` bytes of the window, drop the rest.
    Keep(usize),
    /// Wait for the exact absolute byte interval `[start, end]` (inclusive).
    /// Bytes before `start` are dropped; bytes not yet read before `start` are
    /// skipped without buffering.
    Range { start: u64, end: u64 },
    /// Wait for `n` more bytes beyond the current window. Negative amounts are a
    /// detector bug and fail the stream.
    Add(i64),
}

impl Command {
    /// Request the bytes starting at `start`, enough to read a JPEG-style
    /// marker pair. Used to jump past a block without buffering it.
    pub fn skip_to(start: u64) -> Self {
        Command::Range {
            start,
            end: start + 1,
        }
    }

    /// Request `len` bytes starting at `start`.
    pub fn span(start: u64, len: u64) -> Self {
        Command::Range {
            start,
            end: start + len.max(1) - 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_is_inclusive() {
        assert_eq!(Command::span(18, 8), Command::Range { start: 18, end: 25 });
    }

    #[test]
    fn span_of_zero_still_covers_one_byte() {
        assert_eq!(Command::span(4, 0), Command::Range { start: 4, end: 4 });
    }

    #[test]
    fn skip_to_covers_marker_pair() {
        assert_eq!(Command::skip_to(100), Command::Range { start: 100, end: 101 });
    }
}
