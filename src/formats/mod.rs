//! Per-format detectors and the detection registry.
//!
//! Every supported container has two halves:
//!
//! - a **static** half on [`Format`]: magic bytes, mime string, how many leading
//!   bytes it needs before it can decide, and [`Format::confirm`], which looks at
//!   the stream prefix and either recognizes the format (returning per-instance
//!   metadata) or not;
//! - an **instance** half, a [`FormatDetector`] created once the format is
//!   confirmed, which is called repeatedly with the engine's [`Window`] until it
//!   produces dimensions.
//!
//! | Format | Magic | Dimensions |
//! |---|---|---|
//! | BMP | `BM` | LE i32 at 18 (width) / 22 (height, abs) |
//! | DDS | `DDS ` | LE u32 at 12 (height) / 16 (width) |
//! | GIF | `GIF` | LE u16 at 6 (width) / 8 (height) |
//! | PSD | `8BPS` | BE u32 at 14 (height) / 18 (width) |
//! | PNG | `\x89PNG\r\n\x1a\n` | BE u32 after `IHDR` at 12 (or 28 for Apple `CgBI`) |
//! | WebP | `RIFF....WEBPVP8` | bit-packed at 20..=29, per VP8 / VP8L / VP8X |
//! | SVG | text sniff | `viewBox` in the first 500 bytes |
//! | JPEG | `FF D8 FF` | marker scan to SOF0/1/2, optional EXIF orientation |
//!
//! The set of formats is closed, so dispatch goes through the [`Detector`] enum
//! rather than trait objects. The registry tries formats in [`Format::REGISTRY`]
//! order and the first match wins.

pub mod bmp;
pub mod dds;
pub(crate) mod exif;
pub mod gif;
pub mod jpeg;
pub mod png;
pub mod psd;
pub mod svg;
pub mod webp;

use crate::command::Command;
use crate::error::ProbeError;
use crate::types::Dimensions;
use crate::window::Window;

pub use bmp::BmpDetector;
pub use dds::DdsDetector;
pub use gif::GifDetector;
pub use jpeg::JpegDetector;
pub use png::{PngDetector, PngVariant};
pub use psd::PsdDetector;
pub use svg::SvgDetector;
pub use webp::{WebpDetector, WebpVariant};

/// Instance half of a format: turns windows of the stream into dimensions.
pub trait FormatDetector {
    /// Look at the window and say what happens next.
    ///
    /// Must depend only on the window and the detector's own progress, so a
    /// call can be repeated after the engine pauses for more input.
    fn extract_dimensions(&mut self, window: &Window) -> Result<Command, ProbeError>;

    /// True once no more bytes are needed, even if the stream continues.
    fn is_finished(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Bmp,
    Dds,
    Gif,
    Psd,
    Png,
    Webp,
    Svg,
    Jpeg,
}

/// A format recognized by [`Format::confirm`], with whatever the prefix told
/// about the instance. Consumed by [`Detector::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Bmp,
    Dds,
    Gif,
    Psd,
    Png(PngVariant),
    Webp(WebpVariant),
    Svg,
    Jpeg,
}

impl Format {
    /// Registry order: formats are tried first to last.
    pub const REGISTRY: [Format; 8] = [
        Format::Bmp,
        Format::Dds,
        Format::Gif,
        Format::Psd,
        Format::Png,
        Format::Webp,
        Format::Svg,
        Format::Jpeg,
    ];

    pub fn mime(self) -> &'static str {
        match self {
            Format::Bmp => bmp::MIME,
            Format::Dds => dds::MIME,
            Format::Gif => gif::MIME,
            Format::Psd => psd::MIME,
            Format::Png => png::MIME,
            Format::Webp => webp::MIME,
            Format::Svg => svg::MIME,
            Format::Jpeg => jpeg::MIME,
        }
    }

    /// Exact leading bytes this format requires. Empty for text-sniffed formats.
    pub fn magic(self) -> &'static [u8] {
        match self {
            Format::Bmp => bmp::MAGIC,
            Format::Dds => dds::MAGIC,
            Format::Gif => gif::MAGIC,
            Format::Psd => psd::MAGIC,
            Format::Png => png::MAGIC,
            Format::Webp => webp::RIFF,
            Format::Svg => b"",
            Format::Jpeg => jpeg::MAGIC,
        }
    }

    /// Bytes that must be buffered before [`Format::confirm`] can decide.
    pub fn min_bytes_to_decide(self) -> usize {
        match self {
            Format::Png => png::MIN_BYTES_TO_DECIDE,
            Format::Webp => webp::MIN_BYTES_TO_DECIDE,
            Format::Svg => svg::MIN_BYTES_TO_DECIDE,
            _ => self.magic().len(),
        }
    }

    /// Largest [`Format::min_bytes_to_decide`] in the registry.
    pub fn max_min_bytes_to_decide() -> usize {
        Self::REGISTRY
            .iter()
            .map(|f| f.min_bytes_to_decide())
            .max()
            .unwrap_or(0)
    }

    /// Check whether the stream prefix in `window` is this format.
    pub fn confirm(self, window: &Window) -> Option<Confirmation> {
        let magic = || window.bytes().starts_with(self.magic());
        match self {
            Format::Bmp => magic().then_some(Confirmation::Bmp),
            Format::Dds => magic().then_some(Confirmation::Dds),
            Format::Gif => magic().then_some(Confirmation::Gif),
            Format::Psd => magic().then_some(Confirmation::Psd),
            Format::Png => png::confirm(window).map(Confirmation::Png),
            Format::Webp => webp::confirm(window).map(Confirmation::Webp),
            Format::Svg => svg::confirm(window).then_some(Confirmation::Svg),
            Format::Jpeg => magic().then_some(Confirmation::Jpeg),
        }
    }
}

/// Outcome of one registry probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Matched {
        format: Format,
        confirmation: Confirmation,
    },
    /// Nothing matched yet, but some formats could not decide: retry once at
    /// least `need` bytes are buffered.
    Undecided { need: usize },
    /// Every format had enough bytes and none matched.
    NoMatch,
}

/// Try every registered format against the buffered prefix.
///
/// Formats that need more bytes than are buffered are skipped unless `relaxed`
/// is set (used once at end of input, when no more bytes will come).
pub fn detect(window: &Window, relaxed: bool) -> Detection {
    let mut need: Option<usize> = None;

    for format in Format::REGISTRY {
        let min = format.min_bytes_to_decide();
        if !relaxed && window.len() < min {
            need = Some(need.map_or(min, |n| n.min(min)));
            continue;
        }
        if let Some(confirmation) = format.confirm(window) {
            return Detection::Matched {
                format,
                confirmation,
            };
        }
    }

    match need {
        Some(need) => Detection::Undecided { need },
        None => Detection::NoMatch,
    }
}

/// A live detector for one confirmed format.
#[derive(Debug)]
pub enum Detector {
    Bmp(BmpDetector),
    Dds(DdsDetector),
    Gif(GifDetector),
    Psd(PsdDetector),
    Png(PngDetector),
    Webp(WebpDetector),
    Svg(SvgDetector),
    Jpeg(JpegDetector),
}

impl Detector {
    /// Build the detector for a confirmed format. `exif` only matters for JPEG.
    pub fn new(confirmation: Confirmation, exif: bool) -> Self {
        match confirmation {
            Confirmation::Bmp => Detector::Bmp(BmpDetector::default()),
            Confirmation::Dds => Detector::Dds(DdsDetector::default()),
            Confirmation::Gif => Detector::Gif(GifDetector::default()),
            Confirmation::Psd => Detector::Psd(PsdDetector::default()),
            Confirmation::Png(variant) => Detector::Png(PngDetector::new(variant)),
            Confirmation::Webp(variant) => Detector::Webp(WebpDetector::new(variant)),
            Confirmation::Svg => Detector::Svg(SvgDetector::default()),
            Confirmation::Jpeg => Detector::Jpeg(JpegDetector::new(exif)),
        }
    }
}

impl FormatDetector for Detector {
    fn extract_dimensions(&mut self, window: &Window) -> Result<Command, ProbeError> {
        match self {
            Detector::Bmp(d) => d.extract_dimensions(window),
            Detector::Dds(d) => d.extract_dimensions(window),
            Detector::Gif(d) => d.extract_dimensions(window),
            Detector::Psd(d) => d.extract_dimensions(window),
            Detector::Png(d) => d.extract_dimensions(window),
            Detector::Webp(d) => d.extract_dimensions(window),
            Detector::Svg(d) => d.extract_dimensions(window),
            Detector::Jpeg(d) => d.extract_dimensions(window),
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            Detector::Bmp(d) => d.is_finished(),
            Detector::Dds(d) => d.is_finished(),
            Detector::Gif(d) => d.is_finished(),
            Detector::Psd(d) => d.is_finished(),
            Detector::Png(d) => d.is_finished(),
            Detector::Webp(d) => d.is_finished(),
            Detector::Svg(d) => d.is_finished(),
            Detector::Jpeg(d) => d.is_finished(),
        }
    }
}

/// Shared step for formats whose dimensions sit at a fixed header offset.
///
/// If `[offset, offset + len)` is buffered, `read` pulls the dimensions out of
/// the window; otherwise the exact range is requested.
pub(crate) fn read_fixed(
    window: &Window,
    offset: u64,
    len: u64,
    read: impl FnOnce(&Window) -> Option<Dimensions>,
) -> Command {
    if window.covers(offset, offset + len - 1)
        && let Some(dimensions) = read(window)
    {
        return Command::Dimensions(dimensions);
    }
    Command::span(offset, len)
}
