//! JPEG: a resumable scan over the marker segments until a start-of-frame
//! header is found, with an optional detour through APP1 for the EXIF
//! orientation.
//!
//! Each call processes as much of the window as it can. Progress is kept in
//! an absolute `cursor`, so a call after a pause (or after the engine dropped
//! bytes) picks up exactly where the previous one stopped.
//!
//! When EXIF is enabled and the frame header comes first, the raw frame
//! dimensions are returned provisionally and scanning continues. If an
//! orientation shows up later, corrected dimensions are returned once more.
//! The first scan (SOS) ends the search: metadata segments never follow it.

use memchr::memchr;

use super::FormatDetector;
use super::exif::{ExifReader, ExifStep};
use crate::command::Command;
use crate::error::{ExifError, ProbeError};
use crate::types::Dimensions;
use crate::window::{Endian, Window};

pub const MIME: &str = "image/jpeg";
pub const MAGIC: &[u8] = &[0xff, 0xd8, 0xff];

/// Baseline, extended sequential and progressive start-of-frame markers.
const SOF_MARKERS: [u8; 3] = [0xc0, 0xc1, 0xc2];
const APP1: u8 = 0xe1;
const SOS: u8 = 0xda;

#[derive(Debug)]
enum ExifState {
    Disabled,
    /// Enabled, no APP1 seen yet.
    Pending,
    Reading(ExifReader),
    Done(Option<u16>),
}

#[derive(Debug)]
pub struct JpegDetector {
    cursor: u64,
    exif: ExifState,
    /// Raw frame dimensions, before any orientation is applied.
    frame: Option<Dimensions>,
    finished: bool,
}

impl JpegDetector {
    pub fn new(exif: bool) -> Self {
        Self {
            cursor: 0,
            exif: if exif {
                ExifState::Pending
            } else {
                ExifState::Disabled
            },
            frame: None,
            finished: false,
        }
    }

    fn continue_exif(&mut self, window: &Window) -> Option<Result<Command, ProbeError>> {
        let ExifState::Reading(reader) = &mut self.exif else {
            return None;
        };
        match reader.step(window) {
            Ok(ExifStep::Need(command)) => Some(Ok(command)),
            Ok(ExifStep::Orientation(orientation)) => {
                self.exif = ExifState::Done(orientation);
                let frame = self.frame?;
                self.finished = true;
                Some(Ok(match orientation {
                    Some(_) => Command::Dimensions(oriented(frame, orientation)),
                    None => Command::Discard,
                }))
            }
            Err(err) => Some(Err(self.exif_failed(err))),
        }
    }

    /// An APP1 without the Exif signature (XMP, for one) is some other
    /// metadata block, so a later APP1 may still carry the orientation.
    /// Any other failure ends the EXIF search.
    fn exif_failed(&mut self, err: ExifError) -> ProbeError {
        if err == ExifError::MissingSignature {
            self.exif = ExifState::Pending;
        } else {
            self.exif = ExifState::Done(None);
            self.finished = self.frame.is_some();
        }
        err.into()
    }

    fn scan(&mut self, window: &Window) -> Result<Command, ProbeError> {
        let mut pos = self.cursor.max(window.start());

        loop {
            let Some(rest) = window.tail_from(pos) else {
                self.cursor = pos;
                return Ok(Command::skip_to(pos));
            };
            let Some(idx) = memchr(0xff, rest) else {
                self.cursor = window.end();
                return Ok(Command::Discard);
            };
            let ff = pos + idx as u64;
            self.cursor = ff;

            let Some(marker) = window.byte_at(ff + 1) else {
                return Ok(Command::Keep(1));
            };
            match marker {
                0xff => {
                    pos = ff + 1;
                    continue;
                }
                0x00 | 0xd0..=0xd9 => {
                    pos = ff + 2;
                    continue;
                }
                SOS if self.frame.is_some() => {
                    self.finished = true;
                    return Ok(Command::Discard);
                }
                _ => {}
            }

            let Some(len) = window.u16_at(ff + 2, Endian::Big) else {
                return Ok(Command::span(ff, 4));
            };
            let next = ff + 2 + u64::from(len.max(2));

            if SOF_MARKERS.contains(&marker) && self.frame.is_none() {
                let (Some(height), Some(width)) = (
                    window.u16_at(ff + 5, Endian::Big),
                    window.u16_at(ff + 7, Endian::Big),
                ) else {
                    return Ok(Command::span(ff, 9));
                };
                let frame = Dimensions::new(width.into(), height.into());
                self.frame = Some(frame);
                self.cursor = next;
                return Ok(Command::Dimensions(match self.exif {
                    ExifState::Pending => frame,
                    ExifState::Done(orientation) => {
                        self.finished = true;
                        oriented(frame, orientation)
                    }
                    ExifState::Disabled | ExifState::Reading(_) => {
                        self.finished = true;
                        frame
                    }
                }));
            }

            if marker == APP1 && matches!(self.exif, ExifState::Pending) {
                self.cursor = next;
                return match ExifReader::begin(ff + 4, next) {
                    Ok((reader, command)) => {
                        self.exif = ExifState::Reading(reader);
                        Ok(command)
                    }
                    Err(err) => Err(self.exif_failed(err)),
                };
            }

            pos = next;
        }
    }
}

/// Apply an EXIF orientation to raw frame dimensions. Orientations 5–8 are
/// rotated a quarter turn, so width and height trade places.
fn oriented(frame: Dimensions, orientation: Option<u16>) -> Dimensions {
    match orientation {
        Some(o) if o >= 5 => frame.swapped().with_orientation(o),
        Some(o) => frame.with_orientation(o),
        None => frame,
    }
}

impl FormatDetector for JpegDetector {
    fn extract_dimensions(&mut self, window: &Window) -> Result<Command, ProbeError> {
        if let Some(result) = self.continue_exif(window) {
            return result;
        }
        self.scan(window)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
