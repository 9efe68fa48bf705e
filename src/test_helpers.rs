//! Shared test utilities for the imgprobe test suite.
//!
//! Builds minimal but structurally valid image headers in memory, so tests
//! never depend on fixture files, and drives an engine over them chunk by chunk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let data = JpegBuilder::new()
//!     .sof(0xc0, 64, 48)
//!     .app1(&exif_payload(true, Some(6)))
//!     .sos()
//!     .build();
//!
//! let (events, result) = probe_chunks(&data, 7, ProbeOptions::default().exif(|_, _| true));
//! assert!(result.is_ok());
//! assert_eq!(last_dimensions(&events), Some(Dimensions::new(48, 64).with_orientation(6)));
//! ```

use std::sync::mpsc;

use crate::config::ProbeOptions;
use crate::engine::ProbeEngine;
use crate::error::ProbeError;
use crate::types::{Dimensions, ProbeEvent};

// =========================================================================
// Fixed-header formats
// =========================================================================

pub fn bmp(width: i32, height: i32) -> Vec<u8> {
    let mut bytes = b"BM".to_vec();
    bytes.extend_from_slice(&[0; 12]);
    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.extend_from_slice(&[1, 0, 24, 0]);
    bytes.resize(64, 0);
    bytes
}

pub fn dds(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = b"DDS ".to_vec();
    bytes.extend_from_slice(&124u32.to_le_bytes());
    bytes.extend_from_slice(&0x1007u32.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.resize(128, 0);
    bytes
}

pub fn gif(width: u16, height: u16) -> Vec<u8> {
    let mut bytes = b"GIF89a".to_vec();
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.extend_from_slice(&[0xf7, 0, 0]);
    bytes.extend_from_slice(b";");
    bytes
}

pub fn psd(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = b"8BPS".to_vec();
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&[0; 6]);
    bytes.extend_from_slice(&3u16.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&8u16.to_be_bytes());
    bytes.extend_from_slice(&3u16.to_be_bytes());
    bytes
}

fn png_ihdr(width: u32, height: u32) -> Vec<u8> {
    let mut chunk = 13u32.to_be_bytes().to_vec();
    chunk.extend_from_slice(b"IHDR");
    chunk.extend_from_slice(&width.to_be_bytes());
    chunk.extend_from_slice(&height.to_be_bytes());
    chunk.extend_from_slice(&[8, 6, 0, 0, 0]);
    chunk.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    chunk
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend(png_ihdr(width, height));
    bytes.extend_from_slice(&0u32.to_be_bytes());
    bytes.extend_from_slice(b"IEND");
    bytes.extend_from_slice(&[0xae, 0x42, 0x60, 0x82]);
    bytes
}

/// Apple `CgBI` PNG: a 16-byte chunk in front of `IHDR`.
pub fn fried_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&4u32.to_be_bytes());
    bytes.extend_from_slice(b"CgBI");
    bytes.extend_from_slice(&[0x50, 0x00, 0x20, 0x06, 0, 0, 0, 0]);
    bytes.extend(png_ihdr(width, height));
    bytes
}

fn riff(chunk: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&(payload.len() as u32 + 12).to_le_bytes());
    bytes.extend_from_slice(b"WEBP");
    bytes.extend_from_slice(chunk);
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

pub fn webp_lossy(width: u16, height: u16) -> Vec<u8> {
    let mut payload = vec![0x30, 0x01, 0x00, 0x9d, 0x01, 0x2a];
    payload.extend_from_slice(&width.to_le_bytes());
    payload.extend_from_slice(&height.to_le_bytes());
    payload.resize(32, 0);
    riff(b"VP8 ", &payload)
}

pub fn webp_lossless(width: u32, height: u32) -> Vec<u8> {
    let bits = (width - 1) | ((height - 1) << 14);
    let mut payload = vec![0x2f];
    payload.extend_from_slice(&bits.to_le_bytes());
    payload.resize(32, 0);
    riff(b"VP8L", &payload)
}

pub fn webp_extended(width: u32, height: u32) -> Vec<u8> {
    let mut payload = vec![0x10, 0, 0, 0];
    payload.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
    payload.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
    riff(b"VP8X", &payload)
}

/// An SVG document padded past the sniffing threshold, with `attrs` on the
/// root element.
pub fn svg(attrs: &str) -> Vec<u8> {
    let mut doc = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\" {attrs}>\n");
    doc.push_str("  <rect x=\"0\" y=\"0\" width=\"10\" height=\"10\" fill=\"#000\"/>\n");
    while doc.len() < 700 {
        doc.push_str("  <circle cx=\"5\" cy=\"5\" r=\"4\"/>\n");
    }
    doc.push_str("</svg>\n");
    doc.into_bytes()
}

// =========================================================================
// JPEG
// =========================================================================

/// Assembles a JPEG marker stream. Starts with SOI; nothing is validated.
pub struct JpegBuilder {
    bytes: Vec<u8>,
}

impl JpegBuilder {
    pub fn new() -> Self {
        Self {
            bytes: vec![0xff, 0xd8],
        }
    }

    /// A length-prefixed marker segment.
    pub fn segment(marker: u8, body: &[u8]) -> Vec<u8> {
        let len = u16::try_from(body.len() + 2).expect("segment body fits in u16");
        let mut bytes = vec![0xff, marker];
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    pub fn marker(mut self, marker: u8, body: &[u8]) -> Self {
        self.bytes.extend(Self::segment(marker, body));
        self
    }

    pub fn app0(self) -> Self {
        self.marker(0xe0, b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0")
    }

    pub fn app1(self, payload: &[u8]) -> Self {
        self.marker(0xe1, payload)
    }

    pub fn sof(self, marker: u8, width: u16, height: u16) -> Self {
        self.marker(marker, &frame_body(width, height))
    }

    /// Scan header followed by a little entropy-coded data and EOI.
    pub fn sos(mut self) -> Self {
        self.bytes.extend(Self::segment(0xda, &[1, 1, 0, 0, 0x3f, 0]));
        self.bytes
            .extend_from_slice(&[0x12, 0xff, 0x00, 0x34, 0xff, 0xd0, 0x56, 0xff, 0xd9]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// SOF body: precision, height, width, one component.
pub fn frame_body(width: u16, height: u16) -> Vec<u8> {
    let mut body = vec![8];
    body.extend_from_slice(&height.to_be_bytes());
    body.extend_from_slice(&width.to_be_bytes());
    body.extend_from_slice(&[1, 1, 0x11, 0]);
    body
}

/// APP1 payload: Exif signature, TIFF header and an IFD0 holding a make tag
/// and, when given, an orientation tag.
pub fn exif_payload(big_endian: bool, orientation: Option<u16>) -> Vec<u8> {
    let u16b = |v: u16| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
    let u32b = |v: u32| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };

    let mut entries: Vec<(u16, u16, u32, [u8; 4])> = vec![(0x010f, 2, 4, *b"ACM\0")];
    if let Some(o) = orientation {
        let mut value = [0u8; 4];
        value[..2].copy_from_slice(&u16b(o));
        entries.push((0x0112, 3, 1, value));
    }

    let mut bytes = b"Exif\0\0".to_vec();
    bytes.extend_from_slice(if big_endian { b"MM" } else { b"II" });
    bytes.extend_from_slice(&u16b(42));
    bytes.extend_from_slice(&u32b(8));
    bytes.extend_from_slice(&u16b(entries.len() as u16));
    for (tag, kind, count, value) in entries {
        bytes.extend_from_slice(&u16b(tag));
        bytes.extend_from_slice(&u16b(kind));
        bytes.extend_from_slice(&u32b(count));
        bytes.extend_from_slice(&value);
    }
    bytes.extend_from_slice(&u32b(0));
    bytes
}

// =========================================================================
// Engine drivers
// =========================================================================

/// Feed `data` in `chunk_size` pieces, then finish. Returns every event and
/// the first error, if any.
pub fn probe_chunks(
    data: &[u8],
    chunk_size: usize,
    options: ProbeOptions,
) -> (Vec<ProbeEvent>, Result<(), ProbeError>) {
    let (tx, rx) = mpsc::channel();
    let mut engine = ProbeEngine::with_events(options, tx);
    let result = data
        .chunks(chunk_size.max(1))
        .try_for_each(|chunk| engine.write(chunk))
        .and_then(|()| engine.finish());
    drop(engine);
    (rx.into_iter().collect(), result)
}

/// Last dimensions event, i.e. the final answer.
pub fn last_dimensions(events: &[ProbeEvent]) -> Option<Dimensions> {
    events.iter().rev().find_map(|e| match e {
        ProbeEvent::Dimensions(d) => Some(*d),
        ProbeEvent::Mime(_) => None,
    })
}

/// The single mime event. Panics if there is not exactly one.
pub fn only_mime(events: &[ProbeEvent]) -> &'static str {
    let mimes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProbeEvent::Mime(m) => Some(*m),
            ProbeEvent::Dimensions(_) => None,
        })
        .collect();
    match mimes.as_slice() {
        [mime] => mime,
        other => panic!("expected exactly one mime event, got {other:?}"),
    }
}
