//! Mock device for testing without hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use ringbuf::traits::Producer;

use super::{
    sample_queue, Device, DeviceLink, SampleReader, SampleWriter, StreamDirection, StreamKey,
};
use crate::{DeviceError, Sample, SignalParams};

/// Signal parameters of mock streams that were not configured explicitly.
const DEFAULT_SIGNAL: SignalParams = SignalParams::new(48_000, 100_000_000);

struct MockShared {
    rx_streams: usize,
    tx_streams: usize,
    signals: Mutex<HashMap<StreamKey, SignalParams>>,
    writers: Mutex<HashMap<StreamKey, SampleWriter>>,
    link: Mutex<Option<DeviceLink>>,
    fail_on_start: Mutex<Option<String>>,
    running: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

/// A scripted multi-stream device.
///
/// The device itself is moved into the engine; tests and demos drive it
/// through a cloneable [`MockDeviceHandle`].
///
/// # Example
///
/// ```
/// use sdr_router::device::{MockDevice, StreamKey};
/// use sdr_router::SignalParams;
///
/// let device = MockDevice::new(2, 1)
///     .with_signal(StreamKey::rx(0), SignalParams::new(2_000_000, 433_920_000));
/// let handle = device.handle();
///
/// // Nothing is opened until the device is attached to an engine.
/// assert_eq!(handle.push(StreamKey::rx(0), &[]), 0);
/// assert!(!handle.is_running());
/// ```
pub struct MockDevice {
    shared: Arc<MockShared>,
    description: String,
    journal: Option<Arc<Mutex<Vec<String>>>>,
}

impl MockDevice {
    /// Creates a device with `rx_streams` receive and `tx_streams` transmit streams.
    pub fn new(rx_streams: usize, tx_streams: usize) -> Self {
        Self {
            shared: Arc::new(MockShared {
                rx_streams,
                tx_streams,
                signals: Mutex::new(HashMap::new()),
                writers: Mutex::new(HashMap::new()),
                link: Mutex::new(None),
                fail_on_start: Mutex::new(None),
                running: AtomicBool::new(false),
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
            }),
            description: format!("mock device ({rx_streams} rx, {tx_streams} tx)"),
            journal: None,
        }
    }

    fn record(&self, entry: &str) {
        if let Some(journal) = &self.journal {
            journal.lock().push(entry.to_string());
        }
    }

    /// Overrides the description reported to the engine.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the initial signal parameters of one stream.
    #[must_use]
    pub fn with_signal(self, key: StreamKey, params: SignalParams) -> Self {
        self.shared.signals.lock().insert(key, params);
        self
    }

    /// Records `device start` and `device stop` entries into a shared journal.
    ///
    /// Useful with consumers that write into the same journal to check call order.
    #[must_use]
    pub fn with_journal(mut self, journal: Arc<Mutex<Vec<String>>>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Returns a handle for driving the device after it has been attached.
    pub fn handle(&self) -> MockDeviceHandle {
        MockDeviceHandle {
            shared: self.shared.clone(),
        }
    }
}

/// Cloneable control handle of a [`MockDevice`].
#[derive(Clone)]
pub struct MockDeviceHandle {
    shared: Arc<MockShared>,
}

impl MockDeviceHandle {
    /// Queues samples on `key` and wakes the engine.
    ///
    /// Returns the number of samples queued, which is less than
    /// `samples.len()` when the stream queue is full and 0 when the stream
    /// has not been opened.
    pub fn push(&self, key: StreamKey, samples: &[Sample]) -> usize {
        let pushed = match self.shared.writers.lock().get_mut(&key) {
            Some(writer) => writer.push_slice(samples),
            None => return 0,
        };
        if let Some(link) = self.shared.link.lock().as_ref() {
            link.data_ready(key);
        }
        pushed
    }

    /// Changes the signal parameters of `key` and notifies the engine.
    pub fn retune(&self, key: StreamKey, params: SignalParams) {
        self.shared.signals.lock().insert(key, params);
        if let Some(link) = self.shared.link.lock().as_ref() {
            link.signal_changed(key, params);
        }
    }

    /// Makes every following start fail with `reason`.
    pub fn fail_on_start(&self, reason: impl Into<String>) {
        *self.shared.fail_on_start.lock() = Some(reason.into());
    }

    /// Lets following starts succeed again.
    pub fn clear_failure(&self) {
        *self.shared.fail_on_start.lock() = None;
    }

    /// Returns true between a successful start and the next stop.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Number of start calls, failed ones included.
    pub fn start_count(&self) -> usize {
        self.shared.starts.load(Ordering::SeqCst)
    }

    /// Number of stop calls.
    pub fn stop_count(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }

    /// Returns true once the engine has bound its link.
    pub fn is_bound(&self) -> bool {
        self.shared.link.lock().is_some()
    }
}

#[async_trait]
impl Device for MockDevice {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn stream_count(&self, direction: StreamDirection) -> usize {
        match direction {
            StreamDirection::Rx => self.shared.rx_streams,
            StreamDirection::Tx => self.shared.tx_streams,
        }
    }

    fn signal(&self, key: StreamKey) -> SignalParams {
        self.shared
            .signals
            .lock()
            .get(&key)
            .copied()
            .unwrap_or(DEFAULT_SIGNAL)
    }

    fn bind(&mut self, link: DeviceLink) {
        *self.shared.link.lock() = Some(link);
    }

    fn open_stream(&mut self, key: StreamKey, capacity: usize) -> Result<SampleReader, DeviceError> {
        if key.index >= self.stream_count(key.direction) {
            return Err(DeviceError::StreamUnavailable { key });
        }
        let (writer, reader) = sample_queue(capacity);
        self.shared.writers.lock().insert(key, writer);
        Ok(reader)
    }

    async fn start(&mut self) -> Result<(), DeviceError> {
        self.shared.starts.fetch_add(1, Ordering::SeqCst);
        let failure = self.shared.fail_on_start.lock().clone();
        if let Some(reason) = failure {
            self.record("device start failed");
            return Err(DeviceError::start_failed(reason));
        }
        self.shared.running.store(true, Ordering::SeqCst);
        self.record("device start");
        Ok(())
    }

    async fn stop(&mut self) {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        self.shared.running.store(false, Ordering::SeqCst);
        self.record("device stop");
    }
}

/// Generates a complex tone.
///
/// `cycles_per_sample` is the normalized frequency (0.25 is a quarter of the
/// sample rate) and `offset` is added to every sample, which makes the tone
/// useful for exercising DC removal.
///
/// # Example
///
/// ```
/// use sdr_router::device::tone;
/// use sdr_router::Sample;
///
/// let samples = tone(4, 0.25, 1.0, Sample::new(0.0, 0.0));
/// assert!((samples[1].im - 1.0).abs() < 1e-6);
/// ```
pub fn tone(len: usize, cycles_per_sample: f64, amplitude: f32, offset: Sample) -> Vec<Sample> {
    (0..len)
        .map(|n| {
            let phase = std::f64::consts::TAU * cycles_per_sample * n as f64;
            Sample::from_polar(amplitude, phase as f32) + offset
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Consumer, Observer};

    #[test]
    fn test_open_stream_bounds() {
        let mut device = MockDevice::new(1, 1);
        assert!(device.open_stream(StreamKey::rx(0), 16).is_ok());
        assert!(device.open_stream(StreamKey::tx(0), 16).is_ok());
        assert!(matches!(
            device.open_stream(StreamKey::rx(1), 16),
            Err(DeviceError::StreamUnavailable { .. })
        ));
    }

    #[test]
    fn test_push_reaches_reader() {
        let mut device = MockDevice::new(1, 0);
        let handle = device.handle();
        let mut reader = device.open_stream(StreamKey::rx(0), 8).unwrap();

        let pushed = handle.push(StreamKey::rx(0), &tone(10, 0.1, 1.0, Sample::new(0.0, 0.0)));
        assert_eq!(pushed, 8);
        assert_eq!(reader.occupied_len(), 8);
        assert!(reader.try_pop().is_some());
    }

    #[test]
    fn test_default_and_configured_signal() {
        let device = MockDevice::new(2, 0).with_signal(StreamKey::rx(1), SignalParams::new(1000, 7));
        assert_eq!(device.signal(StreamKey::rx(0)), DEFAULT_SIGNAL);
        assert_eq!(device.signal(StreamKey::rx(1)), SignalParams::new(1000, 7));
    }

    #[tokio::test]
    async fn test_start_failure_and_counts() {
        let mut device = MockDevice::new(1, 0);
        let handle = device.handle();

        handle.fail_on_start("no usb");
        let err = device.start().await.unwrap_err();
        assert_eq!(err.to_string(), "start failed: no usb");
        assert!(!handle.is_running());

        handle.clear_failure();
        device.start().await.unwrap();
        assert!(handle.is_running());

        device.stop().await;
        assert!(!handle.is_running());
        assert_eq!(handle.start_count(), 2);
        assert_eq!(handle.stop_count(), 1);
    }

    #[test]
    fn test_tone_offset() {
        let samples = tone(8, 0.25, 0.5, Sample::new(0.1, -0.1));
        assert!((samples[0].re - 0.6).abs() < 1e-6);
        assert!((samples[0].im + 0.1).abs() < 1e-6);
        assert!((samples[2].re + 0.4).abs() < 1e-6);
    }
}
