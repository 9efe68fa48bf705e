//! The engine's byte window.
//!
//! A [`Window`] is the slice of the stream the engine currently holds, pinned
//! to its absolute position. Detectors address it by absolute stream offset
//! only, so the same detector code works whether the window starts at byte 0
//! or at byte 40 000 after a jump.
//!
//! ```text
//! stream:  0 ............ start ============ end ...........
//!                         |<--- bytes() --->|
//! ```
//!
//! Invariant: `end() - start() == len()`. The window is always contiguous,
//! but not necessarily with the start of the stream: bytes before `start()`
//! have been dropped or were never buffered.

/// Byte order for multi-byte integer reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    pub fn u16(self, b: [u8; 2]) -> u16 {
        match self {
            Endian::Big => u16::from_be_bytes(b),
            Endian::Little => u16::from_le_bytes(b),
        }
    }

    pub fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            Endian::Big => u32::from_be_bytes(b),
            Endian::Little => u32::from_le_bytes(b),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Window {
    bytes: Vec<u8>,
    start: u64,
    stream_end: bool,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    /// A window holding `bytes` at absolute offset `start`.
    pub fn at(start: u64, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            start,
            stream_end: false,
        }
    }

    /// Absolute offset of the first buffered byte.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Absolute offset one past the last buffered byte.
    pub fn end(&self) -> u64 {
        self.start + self.bytes.len() as u64
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True once the engine has seen the end of the input: no byte after
    /// `end()` will ever arrive.
    pub fn is_stream_end(&self) -> bool {
        self.stream_end
    }

    /// Whether `[start, end]` (inclusive) is fully buffered.
    pub fn covers(&self, start: u64, end: u64) -> bool {
        start >= self.start && start <= end && end < self.end()
    }

    /// `len` bytes at absolute `offset`, if all of them are buffered.
    pub fn slice(&self, offset: u64, len: usize) -> Option<&[u8]> {
        let rel = usize::try_from(offset.checked_sub(self.start)?).ok()?;
        self.bytes.get(rel..rel.checked_add(len)?)
    }

    /// Buffered bytes from absolute `offset` to the end of the window.
    pub fn tail_from(&self, offset: u64) -> Option<&[u8]> {
        let rel = usize::try_from(offset.checked_sub(self.start)?).ok()?;
        self.bytes.get(rel..)
    }

    pub fn byte_at(&self, offset: u64) -> Option<u8> {
        self.slice(offset, 1).map(|b| b[0])
    }

    pub fn u16_at(&self, offset: u64, endian: Endian) -> Option<u16> {
        self.array::<2>(offset).map(|b| endian.u16(b))
    }

    pub fn u32_at(&self, offset: u64, endian: Endian) -> Option<u32> {
        self.array::<4>(offset).map(|b| endian.u32(b))
    }

    pub fn i32_le_at(&self, offset: u64) -> Option<i32> {
        self.array::<4>(offset).map(i32::from_le_bytes)
    }

    fn array<const N: usize>(&self, offset: u64) -> Option<[u8; N]> {
        self.slice(offset, N)?.try_into().ok()
    }

    // -------------------------------------------------------------------------
    // Engine-side mutation
    // -------------------------------------------------------------------------

    /// Append a chunk that begins at absolute `chunk_start`.
    ///
    /// Only the part at or after the window's next expected offset is kept, so
    /// an empty window positioned ahead of the stream (after a range request
    /// into unread bytes) skips everything before its start.
    pub(crate) fn append(&mut self, chunk: &[u8], chunk_start: u64) {
        if self.bytes.is_empty() && self.start < chunk_start {
            self.start = chunk_start;
        }
        debug_assert!(self.bytes.is_empty() || self.end() == chunk_start);
        let skip = self.end().saturating_sub(chunk_start);
        if let Ok(skip) = usize::try_from(skip)
            && skip < chunk.len()
        {
            self.bytes.extend_from_slice(&chunk[skip..]);
        }
    }

    /// Drop everything and position the empty window at `offset`.
    pub(crate) fn clear_to(&mut self, offset: u64) {
        self.bytes.clear();
        self.start = offset;
    }

    /// Keep only the last `n` bytes.
    pub(crate) fn keep_tail(&mut self, n: usize) {
        let drop = self.bytes.len().saturating_sub(n);
        self.bytes.drain(..drop);
        self.start += drop as u64;
    }

    /// Drop buffered bytes before absolute `offset`. If `offset` lies beyond the
    /// window, the window becomes empty and waits at `offset`.
    pub(crate) fn drop_before(&mut self, offset: u64) {
        if offset >= self.end() {
            self.clear_to(offset);
        } else if offset > self.start {
            self.bytes.drain(..(offset - self.start) as usize);
            self.start = offset;
        }
    }

    pub(crate) fn mark_stream_end(&mut self) {
        self.stream_end = true;
    }

    pub(crate) fn release(&mut self) {
        self.bytes = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_track_length() {
        let w = Window::at(10, vec![1, 2, 3]);
        assert_eq!(w.start(), 10);
        assert_eq!(w.end(), 13);
        assert_eq!(w.len(), 3);
        assert!(Window::new().is_empty());
    }

    #[test]
    fn reads_are_absolute() {
        let w = Window::at(100, vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(w.u16_at(100, Endian::Big), Some(0x1234));
        assert_eq!(w.u16_at(102, Endian::Little), Some(0x7856));
        assert_eq!(w.u32_at(100, Endian::Big), Some(0x12345678));
        assert_eq!(w.u16_at(99, Endian::Big), None);
        assert_eq!(w.u16_at(103, Endian::Big), None);
    }

    #[test]
    fn negative_i32() {
        let w = Window::at(0, (-200i32).to_le_bytes().to_vec());
        assert_eq!(w.i32_le_at(0), Some(-200));
    }

    #[test]
    fn covers_is_inclusive() {
        let w = Window::at(18, vec![0; 8]);
        assert!(w.covers(18, 25));
        assert!(!w.covers(18, 26));
        assert!(!w.covers(17, 20));
        assert!(!w.covers(20, 19));
    }

    #[test]
    fn append_skips_bytes_before_a_forward_start() {
        let mut w = Window::new();
        w.clear_to(5);
        w.append(&[0, 1, 2, 3, 4, 5, 6, 7], 0);
        assert_eq!(w.start(), 5);
        assert_eq!(w.bytes(), &[5, 6, 7]);
    }

    #[test]
    fn append_to_empty_window_behind_the_stream() {
        let mut w = Window::new();
        w.append(&[9, 9], 40);
        assert_eq!(w.start(), 40);
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn append_chunk_entirely_before_start_is_ignored() {
        let mut w = Window::new();
        w.clear_to(100);
        w.append(&[1, 2, 3], 10);
        assert!(w.is_empty());
        assert_eq!(w.start(), 100);
    }

    #[test]
    fn keep_tail_moves_start() {
        let mut w = Window::at(0, vec![1, 2, 3, 4]);
        w.keep_tail(1);
        assert_eq!(w.start(), 3);
        assert_eq!(w.bytes(), &[4]);
        w.keep_tail(0);
        assert_eq!(w.start(), 4);
        assert!(w.is_empty());
    }

    #[test]
    fn drop_before_inside_and_beyond() {
        let mut w = Window::at(0, vec![0, 1, 2, 3, 4]);
        w.drop_before(2);
        assert_eq!(w.bytes(), &[2, 3, 4]);
        w.drop_before(1);
        assert_eq!(w.start(), 2);
        w.drop_before(50);
        assert!(w.is_empty());
        assert_eq!(w.start(), 50);
    }
}
