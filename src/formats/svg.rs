//! SVG, sniffed as text. Dimensions come from the root `viewBox` if one shows
//! up in the first [`SCAN_LIMIT`] bytes of the document.

use std::sync::LazyLock;

use regex::bytes::Regex;

use super::FormatDetector;
use crate::command::Command;
use crate::error::ProbeError;
use crate::types::Dimensions;
use crate::window::Window;

pub const MIME: &str = "image/svg+xml";
pub const MIN_BYTES_TO_DECIDE: usize = 200;

/// How far into the document a `viewBox` is searched for.
pub const SCAN_LIMIT: u64 = 500;

// `s` lets `.` cross line breaks, so a multi-line XML prolog still matches.
static SNIFF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is-u)^(<\?xml\s.*<svg|<svg)").expect("svg sniff pattern is valid")
});

static VIEW_BOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"viewBox="(\d+)\s+(\d+)\s+(\d+)\s+(\d+)""#).expect("viewBox pattern is valid")
});

pub fn confirm(window: &Window) -> bool {
    window.start() == 0 && SNIFF.is_match(window.bytes())
}

/// `(x2 - x1) × (y2 - y1)` from the first `viewBox="x1 y1 x2 y2"`, clamped at 0.
fn view_box(text: &[u8]) -> Option<Dimensions> {
    let caps = VIEW_BOX.captures(text)?;
    let num = |i: usize| -> Option<u64> { std::str::from_utf8(&caps[i]).ok()?.parse().ok() };
    let (x1, y1, x2, y2) = (num(1)?, num(2)?, num(3)?, num(4)?);
    let clamp = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
    Some(Dimensions::new(
        clamp(x2.saturating_sub(x1)),
        clamp(y2.saturating_sub(y1)),
    ))
}

#[derive(Debug, Default)]
pub struct SvgDetector {
    finished: bool,
}

impl FormatDetector for SvgDetector {
    fn extract_dimensions(&mut self, window: &Window) -> Result<Command, ProbeError> {
        let scanned = SCAN_LIMIT.saturating_sub(window.start()).min(window.len() as u64) as usize;
        let text = &window.bytes()[..scanned];

        if let Some(dimensions) = view_box(text) {
            self.finished = true;
            return Ok(Command::Dimensions(dimensions));
        }

        if window.end() < SCAN_LIMIT && !window.is_stream_end() {
            return Ok(Command::Add((SCAN_LIMIT - window.end()) as i64));
        }

        // No viewBox within reach: report an unsized document.
        self.finished = true;
        Ok(Command::Dimensions(Dimensions::new(0, 0)))
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
