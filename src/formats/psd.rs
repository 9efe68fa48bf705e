//! Photoshop document. The file header stores height then width as big-endian
//! u32s at 14 and 18.

use super::{FormatDetector, read_fixed};
use crate::command::Command;
use crate::error::ProbeError;
use crate::types::Dimensions;
use crate::window::{Endian, Window};

pub const MIME: &str = "image/psd";
pub const MAGIC: &[u8] = b"8BPS";

const HEIGHT_OFFSET: u64 = 14;
const WIDTH_OFFSET: u64 = 18;

#[derive(Debug, Default)]
pub struct PsdDetector {
    finished: bool,
}

impl FormatDetector for PsdDetector {
    fn extract_dimensions(&mut self, window: &Window) -> Result<Command, ProbeError> {
        let command = read_fixed(window, HEIGHT_OFFSET, 8, |w| {
            let height = w.u32_at(HEIGHT_OFFSET, Endian::Big)?;
            let width = w.u32_at(WIDTH_OFFSET, Endian::Big)?;
            Some(Dimensions::new(width, height))
        });
        self.finished = matches!(command, Command::Dimensions(_));
        Ok(command)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
