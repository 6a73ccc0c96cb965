//! Device abstraction: the hardware side of the routing engine.
//!
//! A [`Device`] exposes receive and transmit streams. For every stream the
//! engine asks the device for a [`SampleReader`], the consumer end of a
//! lock-free single-producer queue. The device keeps the producer end on its
//! own thread, pushes samples into it and pokes the engine through its
//! [`DeviceLink`]:
//!
//! - Rx streams carry samples received from the hardware.
//! - Tx streams carry the samples the hardware has just taken for
//!   transmission. The engine only observes them for the spectrum tap.

mod mock;
mod stream_key;

pub use mock::{tone, MockDevice, MockDeviceHandle};
pub use stream_key::{StreamDirection, StreamKey};

use async_trait::async_trait;
use ringbuf::traits::Split;
use ringbuf::HeapRb;
use tokio::sync::mpsc;

use crate::{DeviceError, Sample, SignalNotification, SignalParams};

/// Engine end of a device stream queue.
pub type SampleReader = ringbuf::HeapCons<Sample>;

/// Device end of a device stream queue.
pub type SampleWriter = ringbuf::HeapProd<Sample>;

/// Creates a stream queue holding up to `capacity` samples.
///
/// Returns the producer (for the device thread) and the consumer (for the engine).
pub fn sample_queue(capacity: usize) -> (SampleWriter, SampleReader) {
    HeapRb::<Sample>::new(capacity).split()
}

/// The device's way back into the engine loop.
///
/// Both methods are non-blocking and may be called from any thread,
/// including real-time driver callbacks.
#[derive(Debug, Clone)]
pub struct DeviceLink {
    wakeups: mpsc::Sender<StreamKey>,
    signals: mpsc::UnboundedSender<SignalNotification>,
}

impl DeviceLink {
    pub(crate) fn new(
        wakeups: mpsc::Sender<StreamKey>,
        signals: mpsc::UnboundedSender<SignalNotification>,
    ) -> Self {
        Self { wakeups, signals }
    }

    /// Tells the engine that new samples are queued for `key`.
    ///
    /// Wake-ups coalesce: when the engine already has wake-ups pending this
    /// one is dropped. Every pass the engine runs for a pending wake-up also
    /// schedules the other pumpable streams with queued samples, so a dropped
    /// wake-up never strands data.
    pub fn data_ready(&self, key: StreamKey) {
        let _ = self.wakeups.try_send(key);
    }

    /// Reports a sample rate or center frequency change on `key`.
    pub fn signal_changed(&self, key: StreamKey, params: SignalParams) {
        let _ = self.signals.send(SignalNotification { key, params });
    }
}

/// A multi-stream sample source and sink.
///
/// Only the engine loop calls these methods, one at a time.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use sdr_router::device::{sample_queue, Device, SampleReader, StreamDirection, StreamKey};
/// use sdr_router::{DeviceError, SignalParams};
///
/// struct NullDevice;
///
/// #[async_trait]
/// impl Device for NullDevice {
///     fn description(&self) -> String {
///         "null".to_string()
///     }
///
///     fn stream_count(&self, direction: StreamDirection) -> usize {
///         match direction {
///             StreamDirection::Rx => 1,
///             StreamDirection::Tx => 0,
///         }
///     }
///
///     fn signal(&self, _key: StreamKey) -> SignalParams {
///         SignalParams::new(48_000, 0)
///     }
///
///     fn open_stream(&mut self, _key: StreamKey, capacity: usize) -> Result<SampleReader, DeviceError> {
///         let (_writer, reader) = sample_queue(capacity);
///         Ok(reader)
///     }
///
///     async fn start(&mut self) -> Result<(), DeviceError> {
///         Ok(())
///     }
///
///     async fn stop(&mut self) {}
/// }
/// ```
#[async_trait]
pub trait Device: Send {
    /// Human-readable description, cached by the engine at init.
    fn description(&self) -> String;

    /// Number of streams the device exposes in `direction`.
    fn stream_count(&self, direction: StreamDirection) -> usize;

    /// Current sample rate and center frequency of `key`.
    fn signal(&self, key: StreamKey) -> SignalParams;

    /// Hands the device its link to the engine.
    ///
    /// Called once when the device is attached. Default implementation does nothing.
    fn bind(&mut self, link: DeviceLink) {
        let _ = link;
    }

    /// Opens the queue for `key`.
    ///
    /// Called once per engine stream when the device is attached and when a
    /// stream is added while the device is attached. Opening a key again
    /// replaces the previous queue.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::StreamUnavailable`] if the device has no such stream.
    fn open_stream(&mut self, key: StreamKey, capacity: usize)
        -> Result<SampleReader, DeviceError>;

    /// Starts streaming.
    ///
    /// # Errors
    ///
    /// A failure moves the engine to the error state with this error's message.
    async fn start(&mut self) -> Result<(), DeviceError>;

    /// Stops streaming. Called after every consumer has been stopped.
    async fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Consumer, Observer, Producer};

    #[test]
    fn test_sample_queue_roundtrip() {
        let (mut writer, mut reader) = sample_queue(4);
        assert_eq!(writer.push_slice(&[Sample::new(1.0, 2.0); 6]), 4);
        assert_eq!(reader.occupied_len(), 4);
        assert_eq!(reader.try_pop(), Some(Sample::new(1.0, 2.0)));
    }

    #[tokio::test]
    async fn test_device_link_coalesces_wakeups() {
        let (wake_tx, mut wake_rx) = mpsc::channel(1);
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let link = DeviceLink::new(wake_tx, signal_tx);

        link.data_ready(StreamKey::rx(0));
        link.data_ready(StreamKey::rx(0));
        link.signal_changed(StreamKey::rx(0), SignalParams::new(1000, 5));

        assert_eq!(wake_rx.recv().await, Some(StreamKey::rx(0)));
        assert!(wake_rx.try_recv().is_err());

        let notification = signal_rx.recv().await.unwrap();
        assert_eq!(notification.params, SignalParams::new(1000, 5));
    }
}
