//! DirectDraw Surface. The `DDS_HEADER` follows the 4-byte magic; its height
//! and width fields are little-endian u32s at 12 and 16.

use super::{FormatDetector, read_fixed};
use crate::command::Command;
use crate::error::ProbeError;
use crate::types::Dimensions;
use crate::window::{Endian, Window};

pub const MIME: &str = "image/dds";
pub const MAGIC: &[u8] = b"DDS ";

const HEIGHT_OFFSET: u64 = 12;
const WIDTH_OFFSET: u64 = 16;

#[derive(Debug, Default)]
pub struct DdsDetector {
    finished: bool,
}

impl FormatDetector for DdsDetector {
    fn extract_dimensions(&mut self, window: &Window) -> Result<Command, ProbeError> {
        let command = read_fixed(window, HEIGHT_OFFSET, 8, |w| {
            let height = w.u32_at(HEIGHT_OFFSET, Endian::Little)?;
            let width = w.u32_at(WIDTH_OFFSET, Endian::Little)?;
            Some(Dimensions::new(width, height))
        });
        self.finished = matches!(command, Command::Dimensions(_));
        Ok(command)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
