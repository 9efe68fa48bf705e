//! Shared types emitted at the engine boundary.
//!
//! These are what a consumer of the stream sees: the mime string once a format
//! is confirmed, and one or more [`Dimensions`] answers. They serialize to JSON
//! for the CLI report.

use serde::{Deserialize, Serialize};

/// Format-specific extras attached to a dimensions answer.
///
/// Only JPEG fills this in today, with the EXIF orientation (1–8) when one
/// was found in the APP1 segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionsMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u16>,
}

impl DimensionsMeta {
    pub fn is_empty(&self) -> bool {
        self.orientation.is_none()
    }
}

/// Pixel dimensions of an image as read from its container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "DimensionsMeta::is_empty")]
    pub meta: DimensionsMeta,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            meta: DimensionsMeta::default(),
        }
    }

    pub fn with_orientation(mut self, orientation: u16) -> Self {
        self.meta.orientation = Some(orientation);
        self
    }

    /// Width and height exchanged, meta preserved.
    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
            meta: self.meta,
        }
    }
}

/// Notification emitted by the engine while the stream flows.
///
/// `Mime` is sent exactly once, the first time a format is confirmed.
/// `Dimensions` is sent once per answer: a JPEG whose EXIF orientation turns up
/// after its frame header sends a second, corrected event for the same image.
/// Consumers should treat a later `Dimensions` as replacing the earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    Mime(&'static str),
    Dimensions(Dimensions),
}
