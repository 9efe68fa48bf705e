//! # imgprobe
//!
//! Streaming detection of an image's mime type and pixel dimensions from the
//! first bytes of a byte stream, without decoding the image and without
//! buffering more than a small, configurable prefix.
//!
//! # Architecture: Engine + Detectors
//!
//! ```text
//! chunks ──▶ ProbeEngine ──▶ registry (confirm format) ──▶ FormatDetector
//!              ▲    │                                         │
//!              │    └──────── Window (absolute offsets) ◀─────┘
//!              └────────────── Command (Range / Add / Keep / Discard / Dimensions)
//! ```
//!
//! The engine owns the only buffer. Detectors never read the stream directly:
//! they look at the engine's [`Window`] and answer with a [`Command`] that says
//! which bytes they need next. That split keeps every detector a small,
//! resumable state machine, and keeps every byte budget in one place.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Chunk-driven state machine: format detection, command handling, budgets, policies |
//! | [`formats`] | Format registry and one detector per container (BMP, DDS, GIF, PSD, PNG, WebP, SVG, JPEG) |
//! | [`window`] | The engine's byte window, addressed by absolute stream offset |
//! | [`command`] | What a detector can ask of the engine |
//! | [`stream`] | Pass-through [`Write`](std::io::Write) adapter and reader helpers |
//! | [`config`] | `probe.toml` loading and the runtime [`ProbeOptions`] with policy predicates |
//! | [`error`] | [`ProbeError`] and the EXIF failure reasons |
//! | [`types`] | [`Dimensions`] and [`ProbeEvent`], what consumers see |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Absolute Offsets Everywhere
//!
//! Detectors address bytes by their position in the stream, never by their
//! position in the buffer. After the engine drops a prefix or jumps over an
//! unneeded segment, a detector's saved positions are still valid, and a
//! request for bytes the engine already let go of is detectable as a bug.
//!
//! ## Closed Format Set
//!
//! Formats are an enum, not a plugin point. Registry order is fixed and the
//! first match wins, so detection is deterministic for every prefix.
//!
//! ## Policies as Predicates
//!
//! Whether a missing mime, missing dimensions or broken EXIF is an error is
//! decided by caller-supplied predicates that see the context (mime, bytes
//! read so far). A proxy can then treat "not an image" as fine for one route
//! and fatal for another without a second engine type.
//!
//! ## Pass-Through First
//!
//! [`ProbeWriter`] writes every byte downstream before the engine sees it.
//! Whatever the engine decides, including failing, the copy stays exact.

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod formats;
pub mod output;
pub mod stream;
pub mod types;
pub mod window;

pub use command::Command;
pub use config::{ProbeConfig, ProbeOptions};
pub use engine::{EngineState, ProbeEngine};
pub use error::{ExifError, ProbeError, RangeViolation};
pub use formats::{Format, FormatDetector};
pub use stream::{ProbeReport, ProbeWriter, probe_prefix, probe_reader};
pub use types::{Dimensions, DimensionsMeta, ProbeEvent};
pub use window::{Endian, Window};

#[cfg(test)]
pub(crate) mod test_helpers;
