//! Pass-through adapters around [`ProbeEngine`].
//!
//! [`ProbeWriter`] sits in front of any [`Write`] sink: every byte is handed to
//! the sink first and only then shown to the engine, so the copy is exact no
//! matter what the engine decides. Engine failures never interrupt the copy.
//! They are held back and reported by [`ProbeWriter::finish`].
//!
//! ```no_run
//! use std::fs::File;
//! use std::io;
//! use imgprobe::{ProbeOptions, ProbeWriter};
//!
//! let mut source = File::open("photo.jpg")?;
//! let mut probe = ProbeWriter::new(File::create("copy.jpg")?, ProbeOptions::default());
//! io::copy(&mut source, &mut probe)?;
//! let (_copy, report) = probe.finish()?;
//! println!("{:?} {:?}", report.mime, report.dimensions);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{self, Read, Write};
use std::sync::mpsc::Sender;

use serde::Serialize;
use tracing::debug;

use crate::config::ProbeOptions;
use crate::engine::ProbeEngine;
use crate::error::ProbeError;
use crate::types::{Dimensions, ProbeEvent};

/// What was learned about a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub mime: Option<&'static str>,
    pub dimensions: Option<Dimensions>,
    pub read_bytes: u64,
}

impl ProbeReport {
    fn of(engine: &ProbeEngine) -> Self {
        Self {
            mime: engine.mime(),
            dimensions: engine.dimensions(),
            read_bytes: engine.read_bytes(),
        }
    }
}

pub struct ProbeWriter<W: Write> {
    inner: W,
    engine: ProbeEngine,
    error: Option<ProbeError>,
}

impl<W: Write> ProbeWriter<W> {
    pub fn new(inner: W, options: ProbeOptions) -> Self {
        Self::from_engine(inner, ProbeEngine::new(options))
    }

    pub fn with_events(inner: W, options: ProbeOptions, events: Sender<ProbeEvent>) -> Self {
        Self::from_engine(inner, ProbeEngine::with_events(options, events))
    }

    fn from_engine(inner: W, engine: ProbeEngine) -> Self {
        Self {
            inner,
            engine,
            error: None,
        }
    }

    pub fn engine(&self) -> &ProbeEngine {
        &self.engine
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Snapshot of what is known so far.
    pub fn report(&self) -> ProbeReport {
        ProbeReport::of(&self.engine)
    }

    /// End of input: flush the sink, settle the engine and hand both back.
    ///
    /// Returns the first engine error if one occurred while writing, or the
    /// missing-mime / missing-dimensions error if the policies require one.
    /// The sink is dropped on error; use [`ProbeWriter::into_parts`] to keep it.
    pub fn finish(self) -> Result<(W, ProbeReport), ProbeError> {
        let (inner, result) = self.into_parts();
        result.map(|report| (inner, report))
    }

    /// Like [`ProbeWriter::finish`], but the sink comes back whatever the
    /// outcome, so a failed detection never costs the copied bytes.
    pub fn into_parts(mut self) -> (W, Result<ProbeReport, ProbeError>) {
        let result = self.settle();
        (self.inner, result)
    }

    fn settle(&mut self) -> Result<ProbeReport, ProbeError> {
        self.inner.flush()?;
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.engine.finish()?;
        Ok(ProbeReport::of(&self.engine))
    }

    fn observe(&mut self, chunk: &[u8]) {
        if let Err(err) = self.engine.write(chunk) {
            debug!(
                %err,
                read_bytes = self.engine.read_bytes(),
                "probe failed, passing bytes through"
            );
            self.error.get_or_insert(err);
        }
    }
}

impl<W: Write> Write for ProbeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.observe(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Copy `reader` into `writer` in chunks of at most `chunk_size` bytes while
/// probing the stream.
pub fn probe_reader<R: Read, W: Write>(
    mut reader: R,
    writer: W,
    chunk_size: usize,
    options: ProbeOptions,
) -> Result<(W, ProbeReport), ProbeError> {
    let mut probe = ProbeWriter::new(writer, options);
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = read_chunk(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        probe.write_all(&buf[..n])?;
    }
    probe.finish()
}

/// Probe `reader` without copying it, reading only until the answer is known.
pub fn probe_prefix<R: Read>(
    mut reader: R,
    chunk_size: usize,
    options: ProbeOptions,
) -> Result<ProbeReport, ProbeError> {
    let mut engine = ProbeEngine::new(options);
    let mut buf = vec![0u8; chunk_size.max(1)];
    while !engine.is_terminated() {
        let n = read_chunk(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        engine.write(&buf[..n])?;
    }
    engine.finish()?;
    Ok(ProbeReport::of(&engine))
}

fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
