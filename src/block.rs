//! Shared block of samples handed to queued consumers.

use std::sync::Arc;
use std::time::Duration;

use crate::device::StreamKey;
use crate::{Sample, SignalParams};

/// An immutable copy of one pumped sample range, with its metadata.
///
/// The engine delivers ranges to inline consumers as borrowed slices straight
/// out of the ring buffer. Consumers running on their own execution context
/// cannot borrow, so the range is copied once into a `SampleBlock` and the
/// same `Arc` is shared by every dedicated consumer of the stream.
///
/// # Example
///
/// ```
/// use sdr_router::{Sample, SampleBlock, SignalParams};
/// use std::time::Duration;
///
/// let block = SampleBlock::new(vec![Sample::new(0.0, 0.0); 1000], 0, SignalParams::new(10_000, 0));
/// assert_eq!(block.duration(), Duration::from_millis(100));
///
/// let shared = block.clone(); // Cheap clone - shares sample data
/// assert_eq!(shared.len(), 1000);
/// ```
#[derive(Debug, Clone)]
pub struct SampleBlock {
    /// Complex samples, shared between all receivers of the block.
    pub samples: Arc<[Sample]>,

    /// Index of the first sample since the stream started delivering.
    pub position: u64,

    /// Signal parameters in effect when the block was pumped.
    pub params: SignalParams,

    /// Stream the samples came from.
    ///
    /// `None` for blocks built outside the engine.
    pub key: Option<StreamKey>,
}

impl SampleBlock {
    /// Creates a block that is not tied to an engine stream.
    pub fn new(samples: impl Into<Arc<[Sample]>>, position: u64, params: SignalParams) -> Self {
        Self {
            samples: samples.into(),
            position,
            params,
            key: None,
        }
    }

    /// Creates a block for the given stream.
    pub fn with_key(
        samples: impl Into<Arc<[Sample]>>,
        position: u64,
        params: SignalParams,
        key: StreamKey,
    ) -> Self {
        Self {
            samples: samples.into(),
            position,
            params,
            key: Some(key),
        }
    }

    /// Number of samples in the block.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if this block contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time covered by the block at its sample rate.
    pub fn duration(&self) -> Duration {
        if self.params.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.params.sample_rate))
    }

    /// Stream time of the first sample.
    pub fn timestamp(&self) -> Duration {
        if self.params.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.position as f64 / f64::from(self.params.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeros(len: usize) -> Vec<Sample> {
        vec![Sample::new(0.0, 0.0); len]
    }

    #[test]
    fn test_duration() {
        let block = SampleBlock::new(zeros(48_000), 0, SignalParams::new(96_000, 0));
        assert_eq!(block.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_timestamp() {
        let block = SampleBlock::new(zeros(10), 250_000, SignalParams::new(1_000_000, 0));
        assert_eq!(block.timestamp(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_sample_rate() {
        let block = SampleBlock::new(zeros(100), 100, SignalParams::default());
        assert_eq!(block.duration(), Duration::ZERO);
        assert_eq!(block.timestamp(), Duration::ZERO);
    }

    #[test]
    fn test_empty_block() {
        let block = SampleBlock::new(zeros(0), 0, SignalParams::new(1000, 0));
        assert!(block.is_empty());
        assert_eq!(block.len(), 0);
    }

    #[test]
    fn test_clone_shares_samples() {
        let block = SampleBlock::with_key(zeros(8), 0, SignalParams::default(), StreamKey::rx(0));
        let other = block.clone();
        assert!(Arc::ptr_eq(&block.samples, &other.samples));
        assert_eq!(other.key, Some(StreamKey::rx(0)));
    }
}
