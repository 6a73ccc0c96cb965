//! Signal parameters carried by lifecycle and retune notifications.

use std::fmt;

use crate::device::StreamKey;

/// Sample rate and center frequency of one stream.
///
/// Delivered to consumers through
/// [`Consumer::on_signal_changed`](crate::Consumer::on_signal_changed) at init,
/// when a consumer is attached, and whenever the device retunes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SignalParams {
    /// Samples per second.
    pub sample_rate: u32,
    /// Center frequency in Hz.
    pub center_frequency: u64,
}

impl SignalParams {
    /// Creates signal parameters.
    pub const fn new(sample_rate: u32, center_frequency: u64) -> Self {
        Self {
            sample_rate,
            center_frequency,
        }
    }
}

impl fmt::Display for SignalParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} S/s @ {} Hz", self.sample_rate, self.center_frequency)
    }
}

/// A runtime signal change for one stream.
///
/// Pushed without blocking through
/// [`EngineHandle::notify_signal_changed`](crate::EngineHandle::notify_signal_changed)
/// or [`DeviceLink::signal_changed`](crate::device::DeviceLink::signal_changed)
/// and processed later by the engine loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalNotification {
    /// The stream whose parameters changed.
    pub key: StreamKey,
    /// The new parameters.
    pub params: SignalParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_params_display() {
        let params = SignalParams::new(2_000_000, 433_920_000);
        assert_eq!(params.to_string(), "2000000 S/s @ 433920000 Hz");
    }

    #[test]
    fn test_signal_params_default_is_zero() {
        let params = SignalParams::default();
        assert_eq!(params.sample_rate, 0);
        assert_eq!(params.center_frequency, 0);
    }
}
