//! Error types for sdr-router.
//!
//! Errors are split into two categories:
//! - **Control errors** ([`EngineError`]): returned synchronously to the caller
//!   of a control request
//! - **Device errors** ([`DeviceError`]): reported by a [`Device`](crate::device::Device)
//!   implementation and either returned to the caller or recorded as the
//!   engine's error message
//!
//! Runtime issues on the sample path (queue overflow, degenerate signals) are
//! never errors. They surface as [`EngineEvent`](crate::EngineEvent)s or are
//! absorbed by the corrector.

use crate::device::{StreamDirection, StreamKey};
use crate::engine::EngineState;
use crate::ConsumerId;

/// Errors returned by the engine's control API.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The request needs a device but none is attached.
    #[error("no device attached")]
    NoDevice,

    /// A stream index is outside the current stream list.
    #[error("stream {key} out of range ({count} {direction} streams)")]
    StreamOutOfRange {
        /// The rejected stream.
        key: StreamKey,
        /// Direction of the stream list that was checked.
        direction: StreamDirection,
        /// Number of streams currently in that list.
        count: usize,
    },

    /// Only the highest-indexed stream of a direction may be removed.
    #[error("cannot remove stream {key}: only {last} may be removed")]
    NotLastStream {
        /// The stream the caller asked to remove.
        key: StreamKey,
        /// The stream that is currently removable.
        last: StreamKey,
    },

    /// The stream list of the given direction is empty.
    #[error("no {direction} streams to remove")]
    NoStreams {
        /// Direction of the empty stream list.
        direction: StreamDirection,
    },

    /// No consumer with this id is attached to the stream.
    #[error("consumer {id} not attached to stream {key}")]
    ConsumerNotFound {
        /// The unknown consumer id.
        id: ConsumerId,
        /// The stream that was searched.
        key: StreamKey,
    },

    /// The spectrum slot is empty.
    #[error("no spectrum consumer bound")]
    NoSpectrumConsumer,

    /// The request is not allowed in the engine's current state.
    #[error("{operation} not allowed while {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The engine state at the time of the request.
        state: EngineState,
    },

    /// The engine configuration is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The attached device reported an error.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// The engine was built outside a tokio runtime.
    #[error("routing engine must be spawned within a tokio runtime")]
    NoRuntime,

    /// The engine loop has exited and no longer accepts requests.
    #[error("routing engine stopped")]
    EngineStopped,
}

impl EngineError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Errors that can occur within a [`Device`](crate::device::Device) implementation.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The hardware refused to start streaming.
    #[error("start failed: {reason}")]
    StartFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// The device does not expose the requested stream.
    #[error("stream {key} unavailable")]
    StreamUnavailable {
        /// The requested stream.
        key: StreamKey,
    },

    /// Custom error for user-implemented devices.
    #[error("{0}")]
    Custom(String),
}

impl DeviceError {
    /// Creates a custom device error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a start failed error with the given reason.
    pub fn start_failed(reason: impl Into<String>) -> Self {
        Self::StartFailed {
            reason: reason.into(),
        }
    }
}
