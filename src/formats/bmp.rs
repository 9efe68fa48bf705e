//! Windows bitmap. The `BITMAPINFOHEADER` stores width and height as signed
//! little-endian 32-bit integers; a negative height means top-down row order.

use super::{FormatDetector, read_fixed};
use crate::command::Command;
use crate::error::ProbeError;
use crate::types::Dimensions;
use crate::window::Window;

pub const MIME: &str = "image/bmp";
pub const MAGIC: &[u8] = b"BM";

const WIDTH_OFFSET: u64 = 18;
const HEIGHT_OFFSET: u64 = 22;

#[derive(Debug, Default)]
pub struct BmpDetector {
    finished: bool,
}

impl FormatDetector for BmpDetector {
    fn extract_dimensions(&mut self, window: &Window) -> Result<Command, ProbeError> {
        let command = read_fixed(window, WIDTH_OFFSET, 8, |w| {
            let width = w.i32_le_at(WIDTH_OFFSET)?;
            let height = w.i32_le_at(HEIGHT_OFFSET)?;
            Some(Dimensions::new(width.unsigned_abs(), height.unsigned_abs()))
        });
        self.finished = matches!(command, Command::Dimensions(_));
        Ok(command)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
