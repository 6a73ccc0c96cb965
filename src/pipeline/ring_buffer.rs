//! Mirrored circular sample buffer.

use std::ops::Range;

use crate::Sample;

/// The storage ranges covering one read.
///
/// Ranges index the buffer's raw storage and are resolved with
/// [`MirroredRingBuffer::range`] or [`MirroredRingBuffer::range_mut`]. The
/// mirrored layout makes every read contiguous, so `second` is always empty;
/// it is kept so callers handle the general two-part shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRanges {
    /// Samples starting at the read cursor.
    pub first: Range<usize>,
    /// Wrapped remainder of the read.
    pub second: Range<usize>,
}

impl ReadRanges {
    /// Total number of samples covered.
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    /// Returns `true` if the read covers no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fixed-capacity circular buffer of complex samples that stores every
/// sample twice, at `i` and `i + capacity`.
///
/// Because of the mirror, any run of up to `capacity` samples starting
/// anywhere in the first half is contiguous in memory. Reads therefore hand
/// out a single slice, which consumers and the corrector process in place.
///
/// A single owner writes and reads. Writing into a full buffer, or reading or
/// committing more than is buffered, is a caller bug: debug builds assert,
/// release builds drop the oldest samples or clamp the request.
///
/// # Example
///
/// ```
/// use sdr_router::{MirroredRingBuffer, Sample};
///
/// let mut ring = MirroredRingBuffer::new(4);
/// ring.write_slice(&[Sample::new(1.0, 0.0), Sample::new(2.0, 0.0), Sample::new(3.0, 0.0)]);
///
/// let ranges = ring.read_begin(8);
/// assert_eq!(ranges.len(), 3);
/// assert_eq!(ring.range(ranges.first.clone())[2], Sample::new(3.0, 0.0));
///
/// assert_eq!(ring.read_commit(ranges.len()), 3);
/// assert_eq!(ring.fill(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MirroredRingBuffer {
    data: Vec<Sample>,
    size: usize,
    read: usize,
    write: usize,
    fill: usize,
}

impl MirroredRingBuffer {
    /// Creates a zeroed buffer holding up to `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be > 0");
        Self {
            data: vec![Sample::new(0.0, 0.0); capacity * 2],
            size: capacity,
            read: 0,
            write: 0,
            fill: 0,
        }
    }

    /// Maximum number of buffered samples.
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Number of samples written and not yet committed as read.
    pub fn fill(&self) -> usize {
        self.fill
    }

    /// Number of samples that can be written without overwriting unread data.
    pub fn free(&self) -> usize {
        self.size - self.fill
    }

    /// Position of the read cursor in `0..capacity`.
    pub fn read_index(&self) -> usize {
        self.read
    }

    /// Zeroes the storage and rewinds both cursors.
    pub fn reset(&mut self) {
        self.data.fill(Sample::new(0.0, 0.0));
        self.read = 0;
        self.write = 0;
        self.fill = 0;
    }

    /// Appends one sample.
    pub fn write(&mut self, sample: Sample) {
        *self.write_slot() = sample;
        self.bump_index();
    }

    /// The slot at the write cursor, for filling in place.
    ///
    /// The write is published by [`bump_index`](Self::bump_index).
    pub fn write_slot(&mut self) -> &mut Sample {
        &mut self.data[self.write]
    }

    /// Mirrors the slot at the write cursor and advances it.
    pub fn bump_index(&mut self) {
        self.data[self.write + self.size] = self.data[self.write];
        self.write = (self.write + 1) % self.size;
        self.note_written(1);
    }

    /// Appends a batch of samples. Returns the number written.
    pub fn write_slice(&mut self, samples: &[Sample]) -> usize {
        debug_assert!(samples.len() <= self.free(), "write past ring capacity");
        // Only the newest `size` samples can survive.
        let samples = &samples[samples.len().saturating_sub(self.size)..];
        let mut remaining = samples;
        while !remaining.is_empty() {
            let run = remaining.len().min(self.size - self.write);
            let (head, tail) = remaining.split_at(run);
            self.data[self.write..self.write + run].copy_from_slice(head);
            self.data[self.write + self.size..self.write + self.size + run].copy_from_slice(head);
            self.write = (self.write + run) % self.size;
            remaining = tail;
        }
        self.note_written(samples.len());
        samples.len()
    }

    /// The contiguous free run starting at the write cursor.
    ///
    /// Fill it and publish with [`advance_write`](Self::advance_write). The
    /// run stops at the end of the first half, so draining a source fully
    /// can take two rounds.
    pub fn vacant_run(&mut self) -> &mut [Sample] {
        let len = self.free().min(self.size - self.write);
        &mut self.data[self.write..self.write + len]
    }

    /// Publishes `n` samples filled through [`vacant_run`](Self::vacant_run).
    pub fn advance_write(&mut self, n: usize) {
        debug_assert!(n <= self.free().min(self.size - self.write));
        let n = n.min(self.size - self.write);
        self.data
            .copy_within(self.write..self.write + n, self.write + self.size);
        self.write = (self.write + n) % self.size;
        self.note_written(n);
    }

    /// Storage ranges covering up to `count` unread samples from the read cursor.
    pub fn read_begin(&self, count: usize) -> ReadRanges {
        debug_assert!(count <= self.size, "read larger than ring capacity");
        let n = count.min(self.fill);
        ReadRanges {
            first: self.read..self.read + n,
            second: self.read + n..self.read + n,
        }
    }

    /// Samples of a range returned by [`read_begin`](Self::read_begin).
    pub fn range(&self, range: Range<usize>) -> &[Sample] {
        &self.data[range]
    }

    /// Mutable samples of a range returned by [`read_begin`](Self::read_begin).
    pub fn range_mut(&mut self, range: Range<usize>) -> &mut [Sample] {
        &mut self.data[range]
    }

    /// Marks `n` samples as read and returns `n`.
    ///
    /// The returned count is the buffer's "data consumed" signal.
    pub fn read_commit(&mut self, n: usize) -> usize {
        debug_assert!(n <= self.fill, "commit past buffered samples");
        let n = n.min(self.fill);
        self.read = (self.read + n) % self.size;
        self.fill -= n;
        n
    }

    /// The unread samples from the read cursor onwards, without consuming them.
    pub fn read_iterator(&self) -> &[Sample] {
        &self.data[self.read..self.read + self.fill]
    }

    /// The `n` samples immediately behind the read cursor, i.e. the ones
    /// most recently committed.
    pub fn last_consumed(&self, n: usize) -> &[Sample] {
        debug_assert!(n <= self.size);
        let n = n.min(self.size);
        let end = self.read + self.size;
        &self.data[end - n..end]
    }

    fn note_written(&mut self, n: usize) {
        let overflow = (self.fill + n).saturating_sub(self.size);
        debug_assert!(overflow == 0, "ring buffer overrun by {overflow} samples");
        if overflow > 0 {
            self.read = (self.read + overflow) % self.size;
        }
        self.fill = (self.fill + n).min(self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, len: usize) -> Vec<Sample> {
        (start..start + len).map(|n| Sample::new(n as f32, 0.0)).collect()
    }

    fn values(samples: &[Sample]) -> Vec<f32> {
        samples.iter().map(|s| s.re).collect()
    }

    #[test]
    fn test_new_is_empty() {
        let ring = MirroredRingBuffer::new(8);
        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.fill(), 0);
        assert_eq!(ring.free(), 8);
        assert!(ring.read_begin(8).is_empty());
    }

    #[test]
    fn test_read_across_wrap_is_contiguous() {
        let mut ring = MirroredRingBuffer::new(8);
        ring.write_slice(&ramp(0, 6));
        ring.read_commit(6);

        // Cursor at 6: the next five samples wrap in logical space.
        ring.write_slice(&ramp(6, 5));
        let ranges = ring.read_begin(5);
        assert_eq!(ranges.first, 6..11);
        assert!(ranges.second.is_empty());
        assert_eq!(values(ring.range(ranges.first)), vec![6.0, 7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_fill_plus_free_is_capacity() {
        let mut ring = MirroredRingBuffer::new(16);
        for step in 0..40 {
            ring.write_slice(&ramp(step, step % 5));
            ring.read_commit(ring.fill() / 2);
            assert_eq!(ring.fill() + ring.free(), 16);
        }
    }

    #[test]
    fn test_read_begin_clamps_to_fill() {
        let mut ring = MirroredRingBuffer::new(8);
        ring.write_slice(&ramp(0, 3));
        assert_eq!(ring.read_begin(8).len(), 3);
    }

    #[test]
    fn test_write_slot_and_bump() {
        let mut ring = MirroredRingBuffer::new(4);
        for n in 0..6 {
            *ring.write_slot() = Sample::new(n as f32, 1.0);
            ring.bump_index();
            ring.read_commit(1);
        }
        // Read cursor sits at 6 % 4 = 2; the mirror keeps the last four contiguous.
        assert_eq!(values(ring.last_consumed(4)), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_vacant_run_and_advance() {
        let mut ring = MirroredRingBuffer::new(8);
        ring.write_slice(&ramp(0, 5));
        ring.read_commit(5);

        let run = ring.vacant_run();
        assert_eq!(run.len(), 3);
        run.copy_from_slice(&ramp(100, 3));
        ring.advance_write(3);

        assert_eq!(ring.vacant_run().len(), 5);
        let ranges = ring.read_begin(3);
        assert_eq!(values(ring.range(ranges.first)), vec![100.0, 101.0, 102.0]);
    }

    #[test]
    fn test_in_place_modification() {
        let mut ring = MirroredRingBuffer::new(4);
        ring.write_slice(&ramp(1, 4));
        let ranges = ring.read_begin(4);
        for sample in ring.range_mut(ranges.first.clone()) {
            sample.re *= 2.0;
        }
        assert_eq!(values(ring.read_iterator()), vec![2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_last_consumed_follows_commit() {
        let mut ring = MirroredRingBuffer::new(8);
        ring.write_slice(&ramp(0, 7));
        ring.read_commit(4);
        assert_eq!(values(ring.last_consumed(2)), vec![2.0, 3.0]);
        assert_eq!(ring.read_index(), 4);
    }

    #[test]
    fn test_reset() {
        let mut ring = MirroredRingBuffer::new(4);
        ring.write_slice(&ramp(1, 3));
        ring.reset();
        assert_eq!(ring.fill(), 0);
        assert_eq!(ring.read_index(), 0);
        assert_eq!(values(ring.last_consumed(4)), vec![0.0; 4]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "overrun")]
    fn test_overrun_asserts_in_debug() {
        let mut ring = MirroredRingBuffer::new(2);
        ring.write(Sample::new(0.0, 0.0));
        ring.write(Sample::new(0.0, 0.0));
        ring.write(Sample::new(0.0, 0.0));
    }
}
