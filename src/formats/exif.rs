//! Incremental reader for the orientation tag in a JPEG APP1/EXIF segment.
//!
//! APP1 payload layout:
//!
//! ```text
//! "Exif\0\0"  TIFF header (8 bytes)            IFD0
//! 6 bytes     II|MM, 42, u32 offset to IFD0    u16 count, count × 12-byte entries
//! ```
//!
//! The reader never holds bytes itself. Each stage names the exact absolute
//! range it needs next, and the JPEG detector forwards that as a
//! [`Command::Range`]. Offsets inside the TIFF structure are relative to the
//! byte-order marker and are turned into absolute stream offsets here.

use crate::command::Command;
use crate::error::ExifError;
use crate::window::{Endian, Window};

const SIGNATURE: &[u8] = b"Exif\0\0";
/// Signature plus TIFF header.
const HEADER_LEN: u64 = 14;
const TIFF_HEADER_LEN: u32 = 8;
const TIFF_MAGIC: u16 = 42;
const ENTRY_LEN: u64 = 12;
const ORIENTATION_TAG: u16 = 0x0112;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header { payload: u64 },
    IfdCount { endian: Endian, ifd: u64 },
    IfdEntries { endian: Endian, ifd: u64, count: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExifStep {
    Need(Command),
    /// Reading finished. `None` when IFD0 has no usable orientation.
    Orientation(Option<u16>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExifReader {
    segment_end: u64,
    stage: Stage,
}

impl ExifReader {
    /// Start on an APP1 segment whose payload spans `[payload, segment_end)`.
    pub(crate) fn begin(payload: u64, segment_end: u64) -> Result<(Self, Command), ExifError> {
        if payload + HEADER_LEN > segment_end {
            return Err(ExifError::MissingSignature);
        }
        let reader = Self {
            segment_end,
            stage: Stage::Header { payload },
        };
        Ok((reader, Command::span(payload, HEADER_LEN)))
    }

    pub(crate) fn step(&mut self, window: &Window) -> Result<ExifStep, ExifError> {
        match self.stage {
            Stage::Header { payload } => self.read_header(window, payload),
            Stage::IfdCount { endian, ifd } => self.read_count(window, endian, ifd),
            Stage::IfdEntries { endian, ifd, count } => Ok(ExifStep::Orientation(
                read_orientation(window, endian, ifd, count),
            )),
        }
    }

    fn read_header(&mut self, window: &Window, payload: u64) -> Result<ExifStep, ExifError> {
        let Some(header) = window.slice(payload, HEADER_LEN as usize) else {
            return Ok(ExifStep::Need(Command::span(payload, HEADER_LEN)));
        };
        if &header[..6] != SIGNATURE {
            return Err(ExifError::MissingSignature);
        }

        let endian = match u16::from_be_bytes([header[6], header[7]]) {
            0x4949 => Endian::Little,
            0x4d4d => Endian::Big,
            other => return Err(ExifError::ByteOrder(other)),
        };
        let magic = endian.u16([header[8], header[9]]);
        if magic != TIFF_MAGIC {
            return Err(ExifError::TiffMagic(magic));
        }
        let offset = endian.u32([header[10], header[11], header[12], header[13]]);
        if offset < TIFF_HEADER_LEN {
            return Err(ExifError::Ifd0Offset(offset));
        }

        let ifd = payload + SIGNATURE.len() as u64 + u64::from(offset);
        if ifd + 2 > self.segment_end {
            return Err(ExifError::IfdOutOfSegment {
                offset: ifd,
                entries: 0,
            });
        }
        self.stage = Stage::IfdCount { endian, ifd };
        Ok(ExifStep::Need(Command::span(ifd, 2)))
    }

    fn read_count(&mut self, window: &Window, endian: Endian, ifd: u64) -> Result<ExifStep, ExifError> {
        let Some(count) = window.u16_at(ifd, endian) else {
            return Ok(ExifStep::Need(Command::span(ifd, 2)));
        };
        if count == 0 {
            return Ok(ExifStep::Orientation(None));
        }
        let table = ENTRY_LEN * u64::from(count);
        if ifd + 2 + table > self.segment_end {
            return Err(ExifError::IfdOutOfSegment {
                offset: ifd,
                entries: count,
            });
        }
        self.stage = Stage::IfdEntries { endian, ifd, count };
        Ok(ExifStep::Need(Command::span(ifd + 2, table)))
    }
}

/// Scan IFD0 for the orientation tag. The SHORT value sits in the first two
/// bytes of the entry's value field, 8 bytes into the entry.
fn read_orientation(window: &Window, endian: Endian, ifd: u64, count: u16) -> Option<u16> {
    (0..u64::from(count))
        .map(|i| ifd + 2 + i * ENTRY_LEN)
        .find(|&entry| window.u16_at(entry, endian) == Some(ORIENTATION_TAG))
        .and_then(|entry| window.u16_at(entry + 8, endian))
        .filter(|o| (1..=8).contains(o))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// APP1 payload (starting with the Exif signature) holding IFD0 entries.
    fn payload(big_endian: bool, entries: &[(u16, u16)]) -> Vec<u8> {
        let u16b = |v: u16| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
        let u32b = |v: u32| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };

        let mut bytes = SIGNATURE.to_vec();
        bytes.extend_from_slice(if big_endian { b"MM" } else { b"II" });
        bytes.extend_from_slice(&u16b(42));
        bytes.extend_from_slice(&u32b(8));
        bytes.extend_from_slice(&u16b(entries.len() as u16));
        for &(tag, value) in entries {
            bytes.extend_from_slice(&u16b(tag));
            bytes.extend_from_slice(&u16b(3));
            bytes.extend_from_slice(&u32b(1));
            bytes.extend_from_slice(&u16b(value));
            bytes.extend_from_slice(&[0, 0]);
        }
        bytes.extend_from_slice(&u32b(0));
        bytes
    }

    /// Drive a reader over a fully buffered payload placed at `base`.
    fn run(base: u64, bytes: Vec<u8>) -> Result<Option<u16>, ExifError> {
        let end = base + bytes.len() as u64;
        let window = Window::at(base, bytes);
        let (mut reader, _) = ExifReader::begin(base, end)?;
        loop {
            match reader.step(&window)? {
                ExifStep::Need(Command::Range { start, end }) => {
                    assert!(window.covers(start, end), "range {start}..={end} not buffered");
                }
                ExifStep::Need(other) => panic!("unexpected {other:?}"),
                ExifStep::Orientation(o) => return Ok(o),
            }
        }
    }

    #[test]
    fn big_endian_orientation() {
        let bytes = payload(true, &[(0x010f, 0), (ORIENTATION_TAG, 6)]);
        assert_eq!(run(100, bytes), Ok(Some(6)));
    }

    #[test]
    fn little_endian_orientation() {
        let bytes = payload(false, &[(ORIENTATION_TAG, 3)]);
        assert_eq!(run(0, bytes), Ok(Some(3)));
    }

    #[test]
    fn out_of_range_orientation_is_ignored() {
        let bytes = payload(true, &[(ORIENTATION_TAG, 9)]);
        assert_eq!(run(0, bytes), Ok(None));
    }

    #[test]
    fn ifd_without_orientation() {
        assert_eq!(run(0, payload(false, &[(0x0110, 1)])), Ok(None));
        assert_eq!(run(0, payload(false, &[])), Ok(None));
    }

    #[test]
    fn requests_follow_the_structure() {
        let bytes = payload(true, &[(ORIENTATION_TAG, 1)]);
        let end = 50 + bytes.len() as u64;
        let window = Window::at(50, bytes);
        let (mut reader, first) = ExifReader::begin(50, end).unwrap();
        assert_eq!(first, Command::Range { start: 50, end: 63 });
        assert_eq!(
            reader.step(&window),
            Ok(ExifStep::Need(Command::Range { start: 64, end: 65 }))
        );
        assert_eq!(
            reader.step(&window),
            Ok(ExifStep::Need(Command::Range { start: 66, end: 77 }))
        );
        assert_eq!(reader.step(&window), Ok(ExifStep::Orientation(Some(1))));
    }

    #[test]
    fn missing_signature() {
        let mut bytes = payload(true, &[]);
        bytes[0] = b'X';
        assert_eq!(run(0, bytes), Err(ExifError::MissingSignature));
    }

    #[test]
    fn unknown_byte_order() {
        let mut bytes = payload(true, &[]);
        bytes[6..8].copy_from_slice(b"MI");
        assert_eq!(run(0, bytes), Err(ExifError::ByteOrder(0x4d49)));
    }

    #[test]
    fn wrong_tiff_magic() {
        let mut bytes = payload(false, &[]);
        bytes[8] = 43;
        assert_eq!(run(0, bytes), Err(ExifError::TiffMagic(43)));
    }

    #[test]
    fn ifd0_inside_tiff_header() {
        let mut bytes = payload(true, &[]);
        bytes[10..14].copy_from_slice(&4u32.to_be_bytes());
        assert_eq!(run(0, bytes), Err(ExifError::Ifd0Offset(4)));
    }

    #[test]
    fn ifd_past_segment_end() {
        let mut bytes = payload(true, &[(ORIENTATION_TAG, 6)]);
        bytes.truncate(20);
        assert_eq!(
            run(0, bytes),
            Err(ExifError::IfdOutOfSegment {
                offset: 14,
                entries: 1
            })
        );
    }

    #[test]
    fn segment_too_short_for_header() {
        assert_eq!(
            ExifReader::begin(10, 20).unwrap_err(),
            ExifError::MissingSignature
        );
    }
}
