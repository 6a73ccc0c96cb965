//! Control requests carried from handles to the engine loop.

use tokio::sync::oneshot;

use super::{EngineState, EngineStats};
use crate::device::{Device, StreamDirection, StreamKey};
use crate::{Consumer, ConsumerId, CorrectionSettings, EngineError, ExecutionMode};

pub(crate) type Reply<T> = oneshot::Sender<T>;

/// One synchronous control request. Every variant carries the sender its
/// caller awaits.
pub(crate) enum Command {
    AttachDevice {
        device: Box<dyn Device>,
        reply: Reply<Result<(), EngineError>>,
    },
    DetachDevice {
        reply: Reply<Result<(), EngineError>>,
    },
    Init {
        reply: Reply<EngineState>,
    },
    Start {
        reply: Reply<EngineState>,
    },
    Stop {
        reply: Reply<EngineState>,
    },
    Shutdown {
        reply: Reply<()>,
    },
    AddStream {
        direction: StreamDirection,
        connect: bool,
        reply: Reply<Result<usize, EngineError>>,
    },
    RemoveLastStream {
        direction: StreamDirection,
        reply: Reply<Result<usize, EngineError>>,
    },
    RemoveStream {
        key: StreamKey,
        reply: Reply<Result<(), EngineError>>,
    },
    AttachConsumer {
        index: usize,
        consumer: Box<dyn Consumer>,
        mode: ExecutionMode,
        reply: Reply<Result<ConsumerId, EngineError>>,
    },
    DetachConsumer {
        index: usize,
        id: ConsumerId,
        reply: Reply<Result<(), EngineError>>,
    },
    BindSpectrum {
        consumer: Box<dyn Consumer>,
        reply: Reply<Result<(), EngineError>>,
    },
    UnbindSpectrum {
        reply: Reply<Result<(), EngineError>>,
    },
    SetSpectrumInput {
        key: StreamKey,
        reply: Reply<Result<(), EngineError>>,
    },
    ConfigureCorrection {
        index: usize,
        settings: CorrectionSettings,
        reply: Reply<Result<(), EngineError>>,
    },
    DeviceDescription {
        reply: Reply<Option<String>>,
    },
    ErrorMessage {
        reply: Reply<Option<String>>,
    },
    Stats {
        reply: Reply<EngineStats>,
    },
}

impl Command {
    /// Short name for logs.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::AttachDevice { .. } => "attach_device",
            Self::DetachDevice { .. } => "detach_device",
            Self::Init { .. } => "init",
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::Shutdown { .. } => "shutdown",
            Self::AddStream { .. } => "add_stream",
            Self::RemoveLastStream { .. } => "remove_last_stream",
            Self::RemoveStream { .. } => "remove_stream",
            Self::AttachConsumer { .. } => "attach_consumer",
            Self::DetachConsumer { .. } => "detach_consumer",
            Self::BindSpectrum { .. } => "bind_spectrum",
            Self::UnbindSpectrum { .. } => "unbind_spectrum",
            Self::SetSpectrumInput { .. } => "set_spectrum_input",
            Self::ConfigureCorrection { .. } => "configure_correction",
            Self::DeviceDescription { .. } => "device_description",
            Self::ErrorMessage { .. } => "error_message",
            Self::Stats { .. } => "stats",
        }
    }
}
