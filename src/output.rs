//! CLI output formatting for probe results.
//!
//! # Output Format
//!
//! ## Text
//!
//! One line per input, path first, then what was found:
//!
//! ```text
//! photos/dawn.jpg: image/jpeg 4000x3000 (orientation 6)
//! icons/logo.svg: image/svg+xml 0x0
//! notes.txt: error: Couldn't determine mime type
//! ```
//!
//! ## JSON
//!
//! An array with one object per input, in input order:
//!
//! ```text
//! [
//!   { "path": "photos/dawn.jpg", "mime": "image/jpeg",
//!     "dimensions": { "width": 4000, "height": 3000, "meta": { "orientation": 6 } },
//!     "read_bytes": 65536 }
//! ]
//! ```
//!
//! # Architecture
//!
//! `format_*` functions return strings for testability; `print_*` wrappers
//! write to stdout. Format functions are pure: no I/O, no side effects.

use serde::Serialize;

use crate::error::ProbeError;
use crate::stream::ProbeReport;
use crate::types::Dimensions;

/// Outcome of probing one input, as shown to the user.
#[derive(Debug, Serialize)]
pub struct ProbeEntry {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeEntry {
    pub fn new(path: impl Into<String>, result: &Result<ProbeReport, ProbeError>) -> Self {
        let path = path.into();
        match result {
            Ok(report) => Self {
                path,
                mime: report.mime,
                dimensions: report.dimensions,
                read_bytes: Some(report.read_bytes),
                error: None,
            },
            Err(err) => Self {
                path,
                mime: None,
                dimensions: None,
                read_bytes: None,
                error: Some(err.to_string()),
            },
        }
    }
}

// ============================================================================
// Text
// ============================================================================

/// `WxH`, with the orientation appended when one was found.
///
/// ```text
/// 640x480
/// 48x64 (orientation 6)
/// ```
pub fn format_dimensions(dimensions: &Dimensions) -> String {
    match dimensions.meta.orientation {
        Some(o) => format!(
            "{}x{} (orientation {o})",
            dimensions.width, dimensions.height
        ),
        None => format!("{}x{}", dimensions.width, dimensions.height),
    }
}

pub fn format_entry(entry: &ProbeEntry) -> String {
    if let Some(err) = &entry.error {
        return format!("{}: error: {err}", entry.path);
    }
    let mime = entry.mime.unwrap_or("unknown");
    match &entry.dimensions {
        Some(d) => format!("{}: {mime} {}", entry.path, format_dimensions(d)),
        None => format!("{}: {mime}", entry.path),
    }
}

pub fn format_entries(entries: &[ProbeEntry]) -> Vec<String> {
    entries.iter().map(format_entry).collect()
}

pub fn print_entries(entries: &[ProbeEntry]) {
    for line in format_entries(entries) {
        println!("{line}");
    }
}

// ============================================================================
// JSON
// ============================================================================

pub fn format_entries_json(entries: &[ProbeEntry]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(entries)
}

pub fn print_entries_json(entries: &[ProbeEntry]) -> serde_json::Result<()> {
    println!("{}", format_entries_json(entries)?);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
