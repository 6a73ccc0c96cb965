//! Tokio mpsc channel consumer implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::consumer::Consumer;
use crate::{Sample, SampleBlock, SignalParams};

/// A consumer that copies every range it receives into a [`SampleBlock`] and
/// sends it to a tokio mpsc channel.
///
/// Sending never blocks: when the channel is full the block is dropped and
/// counted. Attach it as [`ExecutionMode::Dedicated`](crate::ExecutionMode::Dedicated)
/// to keep the copy off the engine loop.
///
/// # Example
///
/// ```
/// use sdr_router::{ChannelConsumer, SampleBlock};
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::channel::<SampleBlock>(100);
/// let consumer = ChannelConsumer::new(tx);
///
/// // Attach the consumer to an engine stream...
/// // Then receive blocks:
/// // while let Some(block) = rx.recv().await { ... }
/// ```
pub struct ChannelConsumer {
    name: String,
    sender: mpsc::Sender<SampleBlock>,
    signals: Option<mpsc::UnboundedSender<SignalParams>>,
    params: SignalParams,
    position: u64,
    dropped: Arc<AtomicU64>,
}

impl ChannelConsumer {
    /// Creates a new channel consumer with the given sender.
    pub fn new(sender: mpsc::Sender<SampleBlock>) -> Self {
        Self::with_name("channel", sender)
    }

    /// Creates a new channel consumer with a custom name.
    pub fn with_name(name: impl Into<String>, sender: mpsc::Sender<SampleBlock>) -> Self {
        Self {
            name: name.into(),
            sender,
            signals: None,
            params: SignalParams::default(),
            position: 0,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Also forwards every signal change to `signals`.
    #[must_use]
    pub fn with_signal_sender(mut self, signals: mpsc::UnboundedSender<SignalParams>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Shared counter of blocks dropped because the channel was full.
    ///
    /// Stays readable after the consumer has been moved into the engine.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        self.dropped.clone()
    }
}

impl Consumer for ChannelConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_signal_changed(&mut self, params: SignalParams) {
        self.params = params;
        if let Some(signals) = &self.signals {
            let _ = signals.send(params);
        }
    }

    fn accept(&mut self, samples: &[Sample]) {
        let block = SampleBlock::new(samples, self.position, self.params);
        self.position += samples.len() as u64;
        if self.sender.try_send(block).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_consumer_sends_blocks() {
        let (tx, mut rx) = mpsc::channel::<SampleBlock>(10);
        let mut consumer = ChannelConsumer::new(tx);

        consumer.on_signal_changed(SignalParams::new(1000, 0));
        consumer.accept(&[Sample::new(1.0, 0.0); 3]);
        consumer.accept(&[Sample::new(0.0, 1.0); 2]);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first.position, 0);
        assert_eq!(first.params.sample_rate, 1000);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.position, 3);
        assert_eq!(second.samples[0], Sample::new(0.0, 1.0));
    }

    #[tokio::test]
    async fn test_channel_consumer_counts_drops() {
        let (tx, _rx) = mpsc::channel::<SampleBlock>(1);
        let mut consumer = ChannelConsumer::with_name("slow", tx);
        let dropped = consumer.dropped_counter();

        consumer.accept(&[Sample::new(0.0, 0.0); 4]);
        consumer.accept(&[Sample::new(0.0, 0.0); 4]);
        consumer.accept(&[Sample::new(0.0, 0.0); 4]);

        assert_eq!(consumer.name(), "slow");
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_channel_consumer_forwards_signal_changes() {
        let (tx, _rx) = mpsc::channel::<SampleBlock>(1);
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let mut consumer = ChannelConsumer::new(tx).with_signal_sender(signal_tx);

        consumer.on_signal_changed(SignalParams::new(250_000, 7_000_000));
        assert_eq!(
            signal_rx.recv().await,
            Some(SignalParams::new(250_000, 7_000_000))
        );
    }
}
