//! GIF87a / GIF89a. The logical screen descriptor follows the 6-byte
//! signature: width and height as little-endian u16s.

use super::{FormatDetector, read_fixed};
use crate::command::Command;
use crate::error::ProbeError;
use crate::types::Dimensions;
use crate::window::{Endian, Window};

pub const MIME: &str = "image/gif";
pub const MAGIC: &[u8] = b"GIF";

const SCREEN_OFFSET: u64 = 6;

#[derive(Debug, Default)]
pub struct GifDetector {
    finished: bool,
}

impl FormatDetector for GifDetector {
    fn extract_dimensions(&mut self, window: &Window) -> Result<Command, ProbeError> {
        let command = read_fixed(window, SCREEN_OFFSET, 4, |w| {
            let width = w.u16_at(SCREEN_OFFSET, Endian::Little)?;
            let height = w.u16_at(SCREEN_OFFSET + 2, Endian::Little)?;
            Some(Dimensions::new(width.into(), height.into()))
        });
        self.finished = matches!(command, Command::Dimensions(_));
        Ok(command)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
