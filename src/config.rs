//! Configuration types for the routing engine.

use crate::EngineError;

/// Per-stream correction switches.
///
/// DC removal is the outer switch: I/Q imbalance correction only runs on top
/// of DC removal, so `iq_imbalance` alone leaves the stream untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CorrectionSettings {
    /// Track and subtract the DC offset of each axis.
    pub dc_offset: bool,
    /// Estimate and remove gain/phase imbalance between the axes.
    pub iq_imbalance: bool,
}

impl CorrectionSettings {
    /// Both corrections disabled.
    pub const OFF: Self = Self {
        dc_offset: false,
        iq_imbalance: false,
    };

    /// DC removal only.
    pub const DC_ONLY: Self = Self {
        dc_offset: true,
        iq_imbalance: false,
    };

    /// DC removal and imbalance correction.
    pub const FULL: Self = Self {
        dc_offset: true,
        iq_imbalance: true,
    };
}

/// Averaging windows of the adaptive corrector.
///
/// Each estimate is an exponential moving average that behaves as an exact
/// cumulative mean for its first `window` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionConfig {
    /// Window of the DC estimates.
    ///
    /// Default: 1024
    pub dc_window: u32,

    /// Window of the phase and amplitude imbalance estimates.
    ///
    /// Default: 128
    pub imbalance_window: u32,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            dc_window: 1024,
            imbalance_window: 128,
        }
    }
}

/// Configuration for engine behavior.
///
/// Use [`EngineConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use sdr_router::EngineConfig;
///
/// let config = EngineConfig {
///     ring_capacity: 1 << 12,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity, in samples, of each stream's mirrored ring buffer.
    ///
    /// This is also the largest range a single pump step hands to consumers.
    /// Default: 65536
    pub ring_capacity: usize,

    /// Capacity, in samples, of the lock-free queue between the device and
    /// the engine for each stream.
    ///
    /// Default: 262144
    pub port_capacity: usize,

    /// Number of sample blocks queued for each dedicated consumer before
    /// further blocks are dropped.
    ///
    /// Default: 64
    pub dedicated_queue_depth: usize,

    /// Number of control requests that may wait for the engine loop.
    ///
    /// Default: 16
    pub control_queue_depth: usize,

    /// Number of coalesced data-ready wake-ups buffered from the device.
    ///
    /// Default: 64
    pub wakeup_queue_depth: usize,

    /// Corrector averaging windows.
    pub correction: CorrectionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 1 << 16,
            port_capacity: 1 << 18,
            dedicated_queue_depth: 64,
            control_queue_depth: 16,
            wakeup_queue_depth: 64,
            correction: CorrectionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Checks that every size is usable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] naming the first zero-sized field.
    pub fn validate(&self) -> Result<(), EngineError> {
        let sizes = [
            ("ring_capacity", self.ring_capacity),
            ("port_capacity", self.port_capacity),
            ("dedicated_queue_depth", self.dedicated_queue_depth),
            ("control_queue_depth", self.control_queue_depth),
            ("wakeup_queue_depth", self.wakeup_queue_depth),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, size)| *size == 0) {
            return Err(EngineError::invalid_config(format!("{name} must be > 0")));
        }
        if self.correction.dc_window == 0 || self.correction.imbalance_window == 0 {
            return Err(EngineError::invalid_config("correction windows must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.ring_capacity, 65536);
        assert_eq!(config.port_capacity, 262_144);
        assert_eq!(config.dedicated_queue_depth, 64);
        assert_eq!(config.control_queue_depth, 16);
        assert_eq!(config.wakeup_queue_depth, 64);
        assert_eq!(config.correction, CorrectionConfig::default());
    }

    #[test]
    fn test_correction_config_defaults() {
        let config = CorrectionConfig::default();
        assert_eq!(config.dc_window, 1024);
        assert_eq!(config.imbalance_window, 128);
    }

    #[test]
    fn test_correction_settings_default_off() {
        assert_eq!(CorrectionSettings::default(), CorrectionSettings::OFF);
    }

    #[test]
    fn test_validate_rejects_zero_ring() {
        let config = EngineConfig {
            ring_capacity: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ring_capacity"));
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = EngineConfig {
            correction: CorrectionConfig {
                dc_window: 0,
                imbalance_window: 128,
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig { .. })
        ));
    }
}
