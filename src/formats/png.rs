//! PNG, including Apple's `CgBI` "fried" variant produced by Xcode's
//! `pngcrush`, which inserts a 16-byte chunk in front of `IHDR`.

use super::{FormatDetector, read_fixed};
use crate::command::Command;
use crate::error::ProbeError;
use crate::types::Dimensions;
use crate::window::{Endian, Window};

pub const MIME: &str = "image/png";
pub const MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
pub const MIN_BYTES_TO_DECIDE: usize = MAGIC.len() + 24;

const IHDR: &[u8] = b"IHDR";
const CGBI: &[u8] = b"CgBI";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngVariant {
    Standard,
    Fried,
}

impl PngVariant {
    /// Absolute offset of the `IHDR` chunk tag.
    fn ihdr_offset(self) -> u64 {
        match self {
            PngVariant::Standard => 12,
            PngVariant::Fried => 28,
        }
    }
}

pub fn confirm(window: &Window) -> Option<PngVariant> {
    if !window.bytes().starts_with(MAGIC) {
        return None;
    }
    let variant = match window.slice(12, 4)? {
        tag if tag == CGBI => PngVariant::Fried,
        _ => PngVariant::Standard,
    };
    (window.slice(variant.ihdr_offset(), 4)? == IHDR).then_some(variant)
}

#[derive(Debug)]
pub struct PngDetector {
    variant: PngVariant,
    finished: bool,
}

impl PngDetector {
    pub fn new(variant: PngVariant) -> Self {
        Self {
            variant,
            finished: false,
        }
    }
}

impl FormatDetector for PngDetector {
    fn extract_dimensions(&mut self, window: &Window) -> Result<Command, ProbeError> {
        let offset = self.variant.ihdr_offset() + 4;
        let command = read_fixed(window, offset, 8, |w| {
            let width = w.u32_at(offset, Endian::Big)?;
            let height = w.u32_at(offset + 4, Endian::Big)?;
            Some(Dimensions::new(width, height))
        });
        self.finished = matches!(command, Command::Dimensions(_));
        Ok(command)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ihdr(width: u32, height: u32) -> Vec<u8> {
        let mut chunk = 13u32.to_be_bytes().to_vec();
        chunk.extend_from_slice(IHDR);
        chunk.extend_from_slice(&width.to_be_bytes());
        chunk.extend_from_slice(&height.to_be_bytes());
        chunk.extend_from_slice(&[8, 6, 0, 0, 0]);
        chunk.extend_from_slice(&[0; 4]);
        chunk
    }

    fn standard(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend(ihdr(width, height));
        bytes
    }

    fn fried(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(CGBI);
        bytes.extend_from_slice(&[0x50, 0, 0x20, 0x06]);
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend(ihdr(width, height));
        bytes
    }

    #[test]
    fn confirms_standard_layout() {
        let window = Window::at(0, standard(1, 1));
        assert_eq!(confirm(&window), Some(PngVariant::Standard));
    }

    #[test]
    fn confirms_fried_layout() {
        let window = Window::at(0, fried(1, 1));
        assert_eq!(confirm(&window), Some(PngVariant::Fried));
    }

    #[test]
    fn rejects_signature_without_ihdr() {
        let mut bytes = standard(1, 1);
        bytes[12..16].copy_from_slice(b"IDAT");
        assert_eq!(confirm(&Window::at(0, bytes)), None);
    }

    #[test]
    fn standard_dimensions() {
        let mut detector = PngDetector::new(PngVariant::Standard);
        let cmd = detector
            .extract_dimensions(&Window::at(0, standard(800, 600)))
            .unwrap();
        assert_eq!(cmd, Command::Dimensions(Dimensions::new(800, 600)));
        assert!(detector.is_finished());
    }

    #[test]
    fn fried_dimensions_are_shifted() {
        let mut detector = PngDetector::new(PngVariant::Fried);
        let bytes = fried(57, 57);
        let cmd = detector
            .extract_dimensions(&Window::at(0, bytes[..32].to_vec()))
            .unwrap();
        assert_eq!(cmd, Command::Range { start: 32, end: 39 });

        let cmd = detector.extract_dimensions(&Window::at(0, bytes)).unwrap();
        assert_eq!(cmd, Command::Dimensions(Dimensions::new(57, 57)));
    }
}
