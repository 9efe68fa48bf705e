//! The streaming engine: turns an ordered sequence of chunks into a mime type
//! and image dimensions without ever buffering more than the configured budget.
//!
//! ```text
//!            chunk                     chunk
//!  ──────────────▶ AwaitingFormat ───────────▶ AwaitingBytes ──▶ Terminated
//!                   │ registry probe             │ detector + Command
//!                   │ (mime budget)              │ (dimensions budget)
//!                   └───────────── budget / policy ─────────────┘
//! ```
//!
//! ## Command handling
//!
//! A detector answers every call with one [`Command`]. The engine reshapes its
//! [`Window`] accordingly and records `peek_until`, the absolute stream offset
//! that must be reached before the detector is worth calling again:
//!
//! | Command | Window | Wait until |
//! |---|---|---|
//! | `Discard` | emptied | any new byte |
//! | `Keep(n)` | last `n` bytes | any new byte |
//! | `Add(n)` | unchanged | `n` more bytes (at least one) |
//! | `Range{s, e}` | bytes before `s` dropped | byte `e` has been read |
//! | `Dimensions` | unchanged | re-invoked at once unless finished |
//!
//! A range already covered by the bytes read so far re-invokes the detector in
//! the same call. Every such loop either moves the requested offsets forward
//! or trips the repeated-range check, so it always ends.
//!
//! Budgets are checked only when the engine is about to wait for more input.

use std::sync::mpsc::Sender;

use tracing::{debug, trace};

use crate::command::Command;
use crate::config::{DimensionsContext, MimeContext, ProbeOptions};
use crate::error::{ProbeError, RangeViolation};
use crate::formats::{self, Detection, Detector, FormatDetector};
use crate::types::{Dimensions, ProbeEvent};
use crate::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    AwaitingFormat,
    AwaitingBytes,
    Terminated,
}

pub struct ProbeEngine {
    options: ProbeOptions,
    state: EngineState,
    window: Window,
    detector: Option<Detector>,
    mime: Option<&'static str>,
    dimensions: Option<Dimensions>,
    read_bytes: u64,
    /// Registry is not consulted again until this many bytes are buffered.
    mime_peek: usize,
    /// Absolute offset `read_bytes` must pass before the detector runs again.
    peek_until: u64,
    /// Size of the window the last command asks for, for budget checks.
    requested: usize,
    last_range: Option<(u64, u64)>,
    events: Option<Sender<ProbeEvent>>,
}

impl ProbeEngine {
    pub fn new(options: ProbeOptions) -> Self {
        Self {
            options,
            state: EngineState::AwaitingFormat,
            window: Window::new(),
            detector: None,
            mime: None,
            dimensions: None,
            read_bytes: 0,
            mime_peek: 0,
            peek_until: 0,
            requested: 0,
            last_range: None,
            events: None,
        }
    }

    /// Engine that reports [`ProbeEvent`]s on `events` as they are determined.
    pub fn with_events(options: ProbeOptions, events: Sender<ProbeEvent>) -> Self {
        Self {
            events: Some(events),
            ..Self::new(options)
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == EngineState::Terminated
    }

    pub fn mime(&self) -> Option<&'static str> {
        self.mime
    }

    /// Latest dimensions answer. For a JPEG this may be replaced once by an
    /// orientation-corrected value.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    /// Stream bytes seen so far. Stops counting once the engine terminates.
    pub fn read_bytes(&self) -> u64 {
        self.read_bytes
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.window.len()
    }

    /// Feed the next chunk of the stream.
    ///
    /// Empty chunks and chunks arriving after the engine terminated are
    /// ignored. An error terminates the engine; later chunks are ignored too.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), ProbeError> {
        if chunk.is_empty() || self.is_terminated() {
            return Ok(());
        }

        let chunk_start = self.read_bytes;
        self.read_bytes += chunk.len() as u64;
        self.window.append(chunk, chunk_start);
        trace!(
            chunk_start,
            len = chunk.len(),
            buffered = self.window.len(),
            "chunk"
        );

        let result = self.process(chunk_start);
        if result.is_err() {
            self.teardown();
        }
        result
    }

    /// Signal end of input and apply the missing-mime / missing-dimensions
    /// policies. Always leaves the engine terminated.
    pub fn finish(&mut self) -> Result<(), ProbeError> {
        if self.is_terminated() {
            return Ok(());
        }
        self.window.mark_stream_end();
        let result = self.finish_stream();
        self.teardown();
        result
    }

    /// Stop early. Releases the detector and buffer; later writes are no-ops.
    pub fn stop(&mut self) {
        if !self.is_terminated() {
            debug!(read_bytes = self.read_bytes, "probe stopped");
            self.teardown();
        }
    }

    fn process(&mut self, chunk_start: u64) -> Result<(), ProbeError> {
        if self.state == EngineState::AwaitingFormat {
            self.detect_format(Some(chunk_start))?;
        }
        if self.state == EngineState::AwaitingBytes && self.read_bytes >= self.peek_until {
            self.run_detector()?;
        }
        Ok(())
    }

    fn finish_stream(&mut self) -> Result<(), ProbeError> {
        if self.state == EngineState::AwaitingFormat && !self.window.is_empty() {
            self.detect_format(None)?;
        }
        // An outstanding range can never be satisfied now; anything else gets
        // one last look at what is buffered.
        if self.state == EngineState::AwaitingBytes
            && self.dimensions.is_none()
            && self.last_range.is_none()
            && !self.window.is_empty()
        {
            self.run_detector()?;
        }
        if self.is_terminated() {
            return Ok(());
        }

        if self.mime.is_none() {
            return self.mime_missing();
        }
        if self.dimensions.is_none() {
            return self.dimensions_missing();
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Format detection
    // -------------------------------------------------------------------------

    /// Probe the registry. `chunk_start` is `None` at end of input, where
    /// formats may decide on fewer bytes than they normally need and the
    /// budget no longer applies.
    fn detect_format(&mut self, chunk_start: Option<u64>) -> Result<(), ProbeError> {
        let relaxed = chunk_start.is_none();
        if !relaxed && self.window.len() < self.mime_peek {
            // Still short of what the undecided formats need, but the budget
            // bounds the buffer either way.
            return self.check_mime_budget(chunk_start);
        }

        match formats::detect(&self.window, relaxed) {
            Detection::Matched {
                format,
                confirmation,
            } => {
                let mime = format.mime();
                let exif = (self.options.exif)(mime, self.read_bytes);
                debug!(mime, exif, read_bytes = self.read_bytes, "format confirmed");
                self.detector = Some(Detector::new(confirmation, exif));
                self.mime = Some(mime);
                self.state = EngineState::AwaitingBytes;
                self.peek_until = 0;
                self.emit(ProbeEvent::Mime(mime));
                Ok(())
            }
            Detection::Undecided { need } => {
                self.mime_peek = need;
                self.check_mime_budget(chunk_start)
            }
            Detection::NoMatch => self.check_mime_budget(chunk_start),
        }
    }

    fn check_mime_budget(&mut self, chunk_start: Option<u64>) -> Result<(), ProbeError> {
        let Some(chunk_start) = chunk_start else {
            return Ok(());
        };
        if chunk_start > self.options.max_mime_chunk_offset
            && self.window.len() > self.options.max_mime_buffer_size
        {
            debug!(
                chunk_start,
                buffered = self.window.len(),
                "mime budget exhausted"
            );
            return self.mime_missing();
        }
        Ok(())
    }

    fn mime_missing(&mut self) -> Result<(), ProbeError> {
        let ctx = MimeContext {
            mime: self.mime,
            read_bytes: self.read_bytes,
        };
        if (self.options.require_mime)(&ctx) {
            return Err(ProbeError::MimeTypeNotFound);
        }
        debug!(read_bytes = self.read_bytes, "mime not required, giving up");
        self.teardown();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Dimension detection
    // -------------------------------------------------------------------------

    fn run_detector(&mut self) -> Result<(), ProbeError> {
        loop {
            let Some(detector) = self.detector.as_mut() else {
                return Ok(());
            };
            let command = match detector.extract_dimensions(&self.window) {
                Ok(command) => command,
                Err(ProbeError::InvalidExif(err)) => {
                    let mime = self.mime.unwrap_or_default();
                    if (self.options.require_valid_exif)(&err, mime) {
                        return Err(err.into());
                    }
                    debug!(%err, "ignoring invalid EXIF");
                    if self.detector_finished() {
                        return self.complete();
                    }
                    continue;
                }
                Err(err) => return Err(err),
            };
            trace!(
                ?command,
                window_start = self.window.start(),
                window_end = self.window.end(),
                "detector"
            );

            let again = match command {
                Command::Dimensions(dimensions) => {
                    self.set_dimensions(dimensions);
                    true
                }
                other => self.apply(other)?,
            };

            if self.detector_finished() {
                return self.complete();
            }
            if !again {
                return self.check_dimensions_budget();
            }
        }
    }

    /// Apply a window command. Returns true when the requested bytes are
    /// already read, so the detector should run again right away.
    fn apply(&mut self, command: Command) -> Result<bool, ProbeError> {
        match command {
            Command::Dimensions(_) => Ok(true),
            Command::Discard => {
                self.last_range = None;
                self.window.clear_to(self.read_bytes);
                self.requested = 0;
                self.peek_until = self.read_bytes + 1;
                Ok(false)
            }
            Command::Keep(n) => {
                self.last_range = None;
                self.window.keep_tail(n);
                self.requested = self.window.len();
                self.peek_until = self.read_bytes + 1;
                Ok(false)
            }
            Command::Add(n) => {
                let Ok(n) = u64::try_from(n) else {
                    return Err(ProbeError::RequestNegativeBytes { bytes: n });
                };
                self.last_range = None;
                self.requested = self.window.len().saturating_add(n as usize);
                self.peek_until = (self.window.end() + n).max(self.read_bytes + 1);
                Ok(false)
            }
            Command::Range { start, end } => {
                self.check_range(start, end)?;
                self.last_range = Some((start, end));
                self.window.drop_before(start);
                self.requested = usize::try_from(end - start + 1).unwrap_or(usize::MAX);
                self.peek_until = end + 1;
                Ok(self.read_bytes > end)
            }
        }
    }

    fn check_range(&self, start: u64, end: u64) -> Result<(), ProbeError> {
        let current = self.window.start();
        let reason = if start > end {
            RangeViolation::Inverted
        } else if start < current {
            RangeViolation::Drained
        } else if self.last_range == Some((start, end)) {
            RangeViolation::Repeated
        } else {
            return Ok(());
        };
        Err(ProbeError::RequestRangeBytes {
            start,
            end,
            current,
            reason,
        })
    }

    fn check_dimensions_budget(&mut self) -> Result<(), ProbeError> {
        let max = self.options.max_dimensions_buffer_size;
        if self.window.len() < max && self.requested <= max {
            return Ok(());
        }
        if self.dimensions.is_some() {
            // Only a late EXIF orientation was still pending.
            debug!(
                buffered = self.window.len(),
                requested = self.requested,
                "dimensions budget reached, keeping unoriented dimensions"
            );
            return self.complete();
        }
        debug!(
            buffered = self.window.len(),
            requested = self.requested,
            max,
            "dimensions budget exhausted"
        );
        self.dimensions_missing()
    }

    fn dimensions_missing(&mut self) -> Result<(), ProbeError> {
        let ctx = DimensionsContext {
            dimensions: self.dimensions.as_ref(),
            mime: self.mime,
            read_bytes: self.read_bytes,
        };
        if (self.options.require_dimensions)(&ctx) {
            return Err(ProbeError::DimensionsNotFound {
                buffer_size: self.window.len(),
                max_buffer_size: self.options.max_dimensions_buffer_size,
                requested_size: self.requested,
            });
        }
        debug!(read_bytes = self.read_bytes, "dimensions not required, giving up");
        self.teardown();
        Ok(())
    }

    fn set_dimensions(&mut self, dimensions: Dimensions) {
        debug!(
            width = dimensions.width,
            height = dimensions.height,
            orientation = dimensions.meta.orientation,
            read_bytes = self.read_bytes,
            "dimensions"
        );
        self.dimensions = Some(dimensions);
        self.emit(ProbeEvent::Dimensions(dimensions));
    }

    fn detector_finished(&self) -> bool {
        self.detector.as_ref().is_some_and(|d| d.is_finished())
    }

    /// Detector is done. Missing dimensions still go through the policy.
    fn complete(&mut self) -> Result<(), ProbeError> {
        if self.dimensions.is_none() {
            return self.dimensions_missing();
        }
        debug!(read_bytes = self.read_bytes, "probe complete");
        self.teardown();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    fn emit(&self, event: ProbeEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening any more.
            let _ = tx.send(event);
        }
    }

    fn teardown(&mut self) {
        if self.is_terminated() {
            return;
        }
        self.detector = None;
        self.window.release();
        self.last_range = None;
        self.state = EngineState::Terminated;
    }
}

impl std::fmt::Debug for ProbeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeEngine")
            .field("state", &self.state)
            .field("mime", &self.mime)
            .field("dimensions", &self.dimensions)
            .field("read_bytes", &self.read_bytes)
            .field("buffered", &self.window.len())
            .finish_non_exhaustive()
    }
}
