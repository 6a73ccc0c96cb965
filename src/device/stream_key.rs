//! Stream identification types.

use std::fmt;

/// Which side of the device a stream belongs to.
///
/// Receive and transmit streams have independent index spaces: `rx0` and
/// `tx0` can both exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamDirection {
    /// Device source stream: samples received from the hardware.
    Rx,
    /// Device sink stream: samples sent to the hardware.
    Tx,
}

impl fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rx => f.write_str("rx"),
            Self::Tx => f.write_str("tx"),
        }
    }
}

/// Identifies one stream of the device: a direction plus an index.
///
/// Indices are stable for the lifetime of a stream because only the highest
/// index of a direction may ever be removed.
///
/// # Example
///
/// ```
/// use sdr_router::device::{StreamDirection, StreamKey};
///
/// let key = StreamKey::rx(1);
/// assert_eq!(key.direction, StreamDirection::Rx);
/// assert_eq!(key.to_string(), "rx1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey {
    /// Side of the device.
    pub direction: StreamDirection,
    /// Position in that side's stream list.
    pub index: usize,
}

impl StreamKey {
    /// Creates a key from its parts.
    pub const fn new(direction: StreamDirection, index: usize) -> Self {
        Self { direction, index }
    }

    /// Key of receive stream `index`.
    pub const fn rx(index: usize) -> Self {
        Self::new(StreamDirection::Rx, index)
    }

    /// Key of transmit stream `index`.
    pub const fn tx(index: usize) -> Self {
        Self::new(StreamDirection::Tx, index)
    }

    /// Returns true for receive streams.
    pub const fn is_rx(&self) -> bool {
        matches!(self.direction, StreamDirection::Rx)
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.direction, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_key_equality() {
        assert_eq!(StreamKey::rx(0), StreamKey::new(StreamDirection::Rx, 0));
        assert_ne!(StreamKey::rx(0), StreamKey::tx(0));
        assert_ne!(StreamKey::rx(0), StreamKey::rx(1));
    }

    #[test]
    fn test_stream_key_display() {
        assert_eq!(format!("{}", StreamKey::rx(2)), "rx2");
        assert_eq!(format!("{}", StreamKey::tx(0)), "tx0");
    }

    #[test]
    fn test_stream_key_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(StreamKey::rx(0));
        set.insert(StreamKey::tx(0));
        set.insert(StreamKey::rx(0)); // duplicate

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_is_rx() {
        assert!(StreamKey::rx(5).is_rx());
        assert!(!StreamKey::tx(5).is_rx());
    }
}
