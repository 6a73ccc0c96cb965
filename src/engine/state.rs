//! Lifecycle state and the counters shared between handles and the loop.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::device::StreamKey;
use crate::SignalParams;

/// Lifecycle state of the engine.
///
/// ```text
/// NotStarted ──spawn──▶ Idle ──init──▶ Ready ──start──▶ Running
///                        ▲               │                │
///                        └─────stop──────┴────────────────┘
/// Error ──stop──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EngineState {
    /// The loop is not running.
    NotStarted = 0,
    /// The loop runs; the engine is not initialized.
    Idle = 1,
    /// Initialized and ready to start.
    Ready = 2,
    /// Samples are flowing.
    Running = 3,
    /// A device failure occurred; only stop recovers.
    Error = 4,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Idle,
            2 => Self::Ready,
            3 => Self::Running,
            4 => Self::Error,
            _ => Self::NotStarted,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "not started",
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Error => "error",
        })
    }
}

/// State visible to handles without a round trip through the loop.
#[derive(Debug)]
pub(crate) struct SharedState {
    state: AtomicU8,
    pending: AtomicUsize,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(EngineState::NotStarted as u8),
            pending: AtomicUsize::new(0),
        }
    }

    pub(crate) fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Counts a control request queued by a handle.
    pub(crate) fn request_queued(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Counts a control request taken off the queue by the loop.
    pub(crate) fn request_taken(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// True while control requests wait; the pump yields to them.
    pub(crate) fn has_pending_requests(&self) -> bool {
        self.pending.load(Ordering::Acquire) > 0
    }
}

/// Snapshot of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStats {
    /// The stream.
    pub key: StreamKey,
    /// Current sample rate and center frequency.
    pub params: SignalParams,
    /// Whether the stream's own data-ready drives its pump.
    pub connected: bool,
    /// Samples waiting in the stream's ring buffer.
    pub buffered: usize,
    /// Samples handed to consumers since the stream was added.
    pub delivered: u64,
    /// Number of attached consumers.
    pub consumers: usize,
    /// Blocks dropped by this stream's dedicated consumers.
    pub dropped_blocks: u64,
}

/// Snapshot of the whole engine, returned by
/// [`EngineHandle::stats`](crate::EngineHandle::stats).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    /// Lifecycle state.
    pub state: EngineState,
    /// Receive streams in index order.
    pub rx: Vec<StreamStats>,
    /// Transmit streams in index order.
    pub tx: Vec<StreamStats>,
    /// Whether a single receive stream drives every pump pass.
    pub synchronous: bool,
    /// Stream feeding the spectrum tap, if a spectrum consumer is bound.
    pub spectrum_input: Option<StreamKey>,
}
