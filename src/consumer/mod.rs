//! Consumer trait and implementations for sample destinations.
//!
//! A [`Consumer`] is any downstream processor of one stream's samples:
//! a demodulator, a spectrum analyzer, a recorder. The crate provides:
//!
//! - [`ChannelConsumer`]: Forwards sample blocks to a tokio mpsc channel
//!
//! Consumers run either [`ExecutionMode::Inline`] on the engine loop, or
//! [`ExecutionMode::Dedicated`] on a worker thread of their own.

mod channel;
pub(crate) mod dedicated;

pub use channel::ChannelConsumer;

use std::fmt;

use crate::{Sample, SignalParams};

/// A destination for one stream's samples.
///
/// # Implementation Notes
///
/// - Inline consumers run on the engine loop: keep `accept` short and never block
/// - The engine calls `on_signal_changed` before the first `accept`, and again
///   whenever the stream is retuned
/// - `start` and `stop` bracket the running phase of the engine; an attached
///   consumer may see several start/stop cycles
///
/// # Example
///
/// ```
/// use sdr_router::{Consumer, Sample, SignalParams};
///
/// struct PowerMeter {
///     energy: f64,
/// }
///
/// impl Consumer for PowerMeter {
///     fn name(&self) -> &str {
///         "power"
///     }
///
///     fn accept(&mut self, samples: &[Sample]) {
///         self.energy += samples.iter().map(|s| f64::from(s.norm_sqr())).sum::<f64>();
///     }
/// }
/// ```
pub trait Consumer: Send {
    /// Human-readable name for logging and events.
    fn name(&self) -> &str;

    /// Called with the stream's sample rate and center frequency.
    ///
    /// Default implementation does nothing.
    fn on_signal_changed(&mut self, params: SignalParams) {
        let _ = params;
    }

    /// Processes a contiguous range of samples.
    ///
    /// The slice is only valid for the duration of the call.
    fn accept(&mut self, samples: &[Sample]);

    /// Called when the engine starts running.
    ///
    /// Default implementation does nothing.
    fn start(&mut self) {}

    /// Called when the engine stops, before the device is stopped.
    ///
    /// Default implementation does nothing.
    fn stop(&mut self) {}
}

/// Where a consumer's `accept` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// On the engine loop, with a borrowed slice straight out of the ring buffer.
    #[default]
    Inline,
    /// On a worker thread fed through a bounded queue of shared sample blocks.
    ///
    /// Blocks are dropped when the consumer falls behind.
    ///
    /// `on_signal_changed`, `start` and `stop` still run on the engine loop
    /// and wait for an in-progress `accept` to return, so a slow `accept`
    /// delays control requests and signal changes by up to its own duration.
    Dedicated,
}

/// Identifier of an attached consumer, unique for the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingConsumer {
        samples: usize,
        rate: u32,
    }

    impl Consumer for CountingConsumer {
        fn name(&self) -> &str {
            "counting"
        }

        fn on_signal_changed(&mut self, params: SignalParams) {
            self.rate = params.sample_rate;
        }

        fn accept(&mut self, samples: &[Sample]) {
            self.samples += samples.len();
        }
    }

    #[test]
    fn test_consumer_as_trait_object() {
        let mut consumer: Box<dyn Consumer> = Box::new(CountingConsumer { samples: 0, rate: 0 });
        consumer.on_signal_changed(SignalParams::new(96_000, 0));
        consumer.start();
        consumer.accept(&[Sample::new(0.0, 0.0); 32]);
        consumer.stop();
        assert_eq!(consumer.name(), "counting");
    }

    #[test]
    fn test_execution_mode_default() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Inline);
    }

    #[test]
    fn test_consumer_id_display() {
        assert_eq!(ConsumerId::new(7).to_string(), "#7");
    }
}
