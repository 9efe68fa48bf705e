//! Failure reasons surfaced by the engine.
//!
//! Two families live here:
//!
//! - **Policy-gated**: [`ProbeError::MimeTypeNotFound`], [`ProbeError::DimensionsNotFound`]
//!   and [`ProbeError::InvalidExif`]. Whether they are raised is decided by the
//!   `require_*` predicates in [`ProbeOptions`](crate::config::ProbeOptions); when a
//!   predicate says no, the engine quietly stops and bytes keep flowing.
//! - **Protocol violations**: [`ProbeError::RequestNegativeBytes`] and
//!   [`ProbeError::RequestRangeBytes`]. These mean a detector asked for something
//!   the engine can never deliver. They are always fatal.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Couldn't determine mime type")]
    MimeTypeNotFound,

    #[error("Couldn't determine dimensions{}", budget_detail(.buffer_size, .max_buffer_size, .requested_size))]
    DimensionsNotFound {
        buffer_size: usize,
        max_buffer_size: usize,
        requested_size: usize,
    },

    #[error("Got request for {bytes} bytes. You can't request for negative amount of bytes")]
    RequestNegativeBytes { bytes: i64 },

    #[error("Got request for range ({start}, {end}) bytes. {reason}")]
    RequestRangeBytes {
        start: u64,
        end: u64,
        current: u64,
        reason: RangeViolation,
    },

    #[error("Invalid EXIF: {0}")]
    InvalidExif(#[from] ExifError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Whether this error reports a detector/engine contract violation rather
    /// than unusual input.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ProbeError::RequestNegativeBytes { .. } | ProbeError::RequestRangeBytes { .. }
        )
    }
}

fn budget_detail(buffer_size: &usize, max_buffer_size: &usize, requested_size: &usize) -> String {
    if buffer_size >= max_buffer_size {
        format!(". Buffer {buffer_size} bytes exceeded max size of {max_buffer_size} bytes")
    } else if requested_size >= max_buffer_size {
        format!(
            ". Requested buffer size {requested_size} bytes exceeded max size of {max_buffer_size} bytes"
        )
    } else {
        String::new()
    }
}

/// Why a range request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeViolation {
    /// Same `(start, end)` as the request the detector was just answered with.
    Repeated,
    /// `start` lies before bytes the engine already let go of.
    Drained,
    /// `start > end`.
    Inverted,
}

impl fmt::Display for RangeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeViolation::Repeated => write!(
                f,
                "You requested the same offsets that you received on the previous step. \
                 This would cause an infinite loop"
            ),
            RangeViolation::Drained => write!(
                f,
                "Start is before the current window. \
                 You can't request for the bytes that have been already drained"
            ),
            RangeViolation::Inverted => write!(f, "Start bigger than end"),
        }
    }
}

/// Structural problems found while reading a JPEG APP1/EXIF segment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExifError {
    #[error("missing Exif signature")]
    MissingSignature,
    #[error("unknown byte order marker {0:#06x}")]
    ByteOrder(u16),
    #[error("bad TIFF magic {0:#06x}")]
    TiffMagic(u16),
    #[error("IFD0 offset {0} points inside the TIFF header")]
    Ifd0Offset(u32),
    #[error("IFD0 at offset {offset} with {entries} entries runs past the APP1 segment")]
    IfdOutOfSegment { offset: u64, entries: u16 },
}
