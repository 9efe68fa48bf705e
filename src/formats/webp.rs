//! WebP in its three RIFF flavours: lossy `VP8 `, lossless `VP8L` and
//! extended `VP8X`. All three keep their size fields in bytes 20..=29.

use super::{FormatDetector, read_fixed};
use crate::command::Command;
use crate::error::ProbeError;
use crate::types::Dimensions;
use crate::window::Window;

pub const MIME: &str = "image/webp";
pub const RIFF: &[u8] = b"RIFF";
pub const MIN_BYTES_TO_DECIDE: usize = 26;

const WEBP_VP8: &[u8] = b"WEBPVP8";
const VP8_START_CODE: &[u8] = &[0x9d, 0x01, 0x2a];
const LOSSLESS_SIGNATURE: u8 = 0x2f;
const FIELDS_OFFSET: u64 = 20;
const FIELDS_LEN: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebpVariant {
    Lossy,
    Lossless,
    Extended,
}

impl WebpVariant {
    fn from_chunk_header(header: &[u8]) -> Option<Self> {
        match header {
            b"VP8 " => Some(WebpVariant::Lossy),
            b"VP8L" => Some(WebpVariant::Lossless),
            b"VP8X" => Some(WebpVariant::Extended),
            _ => None,
        }
    }

    /// Header-bit sanity check, run before the variant is trusted.
    fn validate(self, window: &Window) -> bool {
        match self {
            WebpVariant::Lossy => window
                .byte_at(FIELDS_OFFSET)
                .is_some_and(|b| b != LOSSLESS_SIGNATURE),
            WebpVariant::Lossless => window
                .slice(23, 3)
                .is_some_and(|code| code != VP8_START_CODE),
            WebpVariant::Extended => window
                .byte_at(FIELDS_OFFSET)
                .is_some_and(|flags| flags & 0xc0 == 0 && flags & 0x01 == 0),
        }
    }

    /// Decode the ten bytes at 20..=29.
    fn dimensions(self, b: &[u8]) -> Dimensions {
        let u = |i: usize| u32::from(b[i]);
        match self {
            WebpVariant::Lossy => Dimensions::new(
                u32::from(u16::from_le_bytes([b[6], b[7]]) & 0x3fff),
                u32::from(u16::from_le_bytes([b[8], b[9]]) & 0x3fff),
            ),
            WebpVariant::Lossless => Dimensions::new(
                1 + (((u(2) & 0x3f) << 8) | u(1)),
                1 + (((u(4) & 0x0f) << 10) | (u(3) << 2) | ((u(2) & 0xc0) >> 6)),
            ),
            WebpVariant::Extended => Dimensions::new(
                1 + (u(4) | u(5) << 8 | u(6) << 16),
                1 + (u(7) | u(8) << 8 | u(9) << 16),
            ),
        }
    }
}

pub fn confirm(window: &Window) -> Option<WebpVariant> {
    if !window.bytes().starts_with(RIFF) || window.slice(8, WEBP_VP8.len())? != WEBP_VP8 {
        return None;
    }
    let variant = WebpVariant::from_chunk_header(window.slice(12, 4)?)?;
    variant.validate(window).then_some(variant)
}

#[derive(Debug)]
pub struct WebpDetector {
    variant: WebpVariant,
    finished: bool,
}

impl WebpDetector {
    pub fn new(variant: WebpVariant) -> Self {
        Self {
            variant,
            finished: false,
        }
    }
}

impl FormatDetector for WebpDetector {
    fn extract_dimensions(&mut self, window: &Window) -> Result<Command, ProbeError> {
        let variant = self.variant;
        let command = read_fixed(window, FIELDS_OFFSET, FIELDS_LEN, |w| {
            let fields = w.slice(FIELDS_OFFSET, FIELDS_LEN as usize)?;
            Some(variant.dimensions(fields))
        });
        self.finished = matches!(command, Command::Dimensions(_));
        Ok(command)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
