//! Caller-side handle of a running engine.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::command::{Command, Reply};
use super::state::SharedState;
use super::{EngineState, EngineStats};
use crate::device::{Device, StreamDirection, StreamKey};
use crate::{
    Consumer, ConsumerId, CorrectionSettings, EngineError, ExecutionMode, SignalNotification,
};

/// Handle for controlling a spawned [`RoutingEngine`](crate::RoutingEngine).
///
/// Every control method is a rendezvous: the request is queued to the engine
/// loop and the method returns once the loop has handled it, with the
/// engine's answer. Handles are cheap to clone; when the last one is dropped
/// the engine stops and its loop exits.
///
/// # Example
///
/// ```no_run
/// use sdr_router::device::{MockDevice, StreamDirection};
/// use sdr_router::{EngineState, RoutingEngine};
///
/// # async fn example() -> Result<(), sdr_router::EngineError> {
/// let engine = RoutingEngine::builder().spawn()?;
/// engine.attach_device(MockDevice::new(1, 0)).await?;
/// engine.add_stream(StreamDirection::Rx, true).await?;
///
/// assert_eq!(engine.init().await?, EngineState::Ready);
/// assert_eq!(engine.start().await?, EngineState::Running);
/// engine.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    signals: mpsc::UnboundedSender<SignalNotification>,
    shared: Arc<SharedState>,
}

impl EngineHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        signals: mpsc::UnboundedSender<SignalNotification>,
        shared: Arc<SharedState>,
    ) -> Self {
        Self {
            commands,
            signals,
            shared,
        }
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, EngineError> {
        let (reply, response) = oneshot::channel();
        // Counted only once the command is in the queue, so a caller dropped
        // while waiting for a slot leaves no pending request behind.
        let permit = self
            .commands
            .reserve()
            .await
            .map_err(|_| EngineError::EngineStopped)?;
        self.shared.request_queued();
        permit.send(make(reply));
        response.await.map_err(|_| EngineError::EngineStopped)
    }

    /// Current lifecycle state, read without a round trip.
    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// Attaches the device and opens a queue for every existing stream it exposes.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidState`] while ready or running.
    pub async fn attach_device(&self, device: impl Device + 'static) -> Result<(), EngineError> {
        let device: Box<dyn Device> = Box::new(device);
        self.request(|reply| Command::AttachDevice { device, reply })
            .await?
    }

    /// Detaches the device and closes every stream queue.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoDevice`] without a device, [`EngineError::InvalidState`]
    /// while ready or running.
    pub async fn detach_device(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::DetachDevice { reply }).await?
    }

    /// Initializes the engine. Returns the resulting state.
    ///
    /// From idle this moves to ready when a device is attached, and to error
    /// otherwise. In every other state it changes nothing.
    ///
    /// # Errors
    ///
    /// [`EngineError::EngineStopped`] if the loop has exited.
    pub async fn init(&self) -> Result<EngineState, EngineError> {
        self.request(|reply| Command::Init { reply }).await
    }

    /// Starts the device and all consumers. Returns the resulting state.
    ///
    /// # Errors
    ///
    /// [`EngineError::EngineStopped`] if the loop has exited. A device start
    /// failure is not an error here: it shows as [`EngineState::Error`].
    pub async fn start(&self) -> Result<EngineState, EngineError> {
        self.request(|reply| Command::Start { reply }).await
    }

    /// Stops all consumers, then the device. Returns the resulting state.
    ///
    /// # Errors
    ///
    /// [`EngineError::EngineStopped`] if the loop has exited.
    pub async fn stop(&self) -> Result<EngineState, EngineError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Stops the engine and ends its loop. Other handles then get
    /// [`EngineError::EngineStopped`].
    ///
    /// # Errors
    ///
    /// [`EngineError::EngineStopped`] if the loop had already exited.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Appends a stream. Returns its index within `direction`.
    ///
    /// A connected stream's own data-ready drives its pump; see
    /// [`EngineStats::synchronous`].
    ///
    /// # Errors
    ///
    /// [`EngineError::Device`] if the attached device cannot open the stream.
    pub async fn add_stream(
        &self,
        direction: StreamDirection,
        connect: bool,
    ) -> Result<usize, EngineError> {
        self.request(|reply| Command::AddStream {
            direction,
            connect,
            reply,
        })
        .await?
    }

    /// Removes the highest-indexed stream of `direction`. Returns its index.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoStreams`] if there is none.
    pub async fn remove_last_stream(&self, direction: StreamDirection) -> Result<usize, EngineError> {
        self.request(|reply| Command::RemoveLastStream { direction, reply })
            .await?
    }

    /// Removes `key`, which must be the highest-indexed stream of its direction.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotLastStream`] for any other index,
    /// [`EngineError::StreamOutOfRange`] for an unknown one.
    pub async fn remove_stream(&self, key: StreamKey) -> Result<(), EngineError> {
        self.request(|reply| Command::RemoveStream { key, reply })
            .await?
    }

    /// Attaches a consumer to receive stream `index`.
    ///
    /// The consumer gets the stream's signal parameters right away, and is
    /// started if the engine is running.
    ///
    /// # Errors
    ///
    /// [`EngineError::StreamOutOfRange`] if there is no such receive stream.
    pub async fn attach_consumer(
        &self,
        index: usize,
        consumer: impl Consumer + 'static,
        mode: ExecutionMode,
    ) -> Result<ConsumerId, EngineError> {
        let consumer: Box<dyn Consumer> = Box::new(consumer);
        self.request(|reply| Command::AttachConsumer {
            index,
            consumer,
            mode,
            reply,
        })
        .await?
    }

    /// Detaches a consumer, stopping it first if it is running.
    ///
    /// # Errors
    ///
    /// [`EngineError::StreamOutOfRange`] or [`EngineError::ConsumerNotFound`].
    pub async fn detach_consumer(&self, index: usize, id: ConsumerId) -> Result<(), EngineError> {
        self.request(|reply| Command::DetachConsumer { index, id, reply })
            .await?
    }

    /// Installs the spectrum consumer, replacing any previous one.
    ///
    /// # Errors
    ///
    /// [`EngineError::EngineStopped`] if the loop has exited.
    pub async fn bind_spectrum(&self, consumer: impl Consumer + 'static) -> Result<(), EngineError> {
        let consumer: Box<dyn Consumer> = Box::new(consumer);
        self.request(|reply| Command::BindSpectrum { consumer, reply })
            .await?
    }

    /// Removes the spectrum consumer.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSpectrumConsumer`] if none is bound.
    pub async fn unbind_spectrum(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::UnbindSpectrum { reply }).await?
    }

    /// Feeds the spectrum consumer from `key`, receive or transmit side.
    ///
    /// # Errors
    ///
    /// [`EngineError::StreamOutOfRange`] if the stream does not exist.
    pub async fn set_spectrum_input(&self, key: StreamKey) -> Result<(), EngineError> {
        self.request(|reply| Command::SetSpectrumInput { key, reply })
            .await?
    }

    /// Enables or disables correction on receive stream `index`.
    ///
    /// # Errors
    ///
    /// [`EngineError::StreamOutOfRange`] if there is no such receive stream.
    pub async fn configure_correction(
        &self,
        index: usize,
        settings: CorrectionSettings,
    ) -> Result<(), EngineError> {
        self.request(|reply| Command::ConfigureCorrection {
            index,
            settings,
            reply,
        })
        .await?
    }

    /// Device description cached at init.
    ///
    /// # Errors
    ///
    /// [`EngineError::EngineStopped`] if the loop has exited.
    pub async fn device_description(&self) -> Result<Option<String>, EngineError> {
        self.request(|reply| Command::DeviceDescription { reply })
            .await
    }

    /// Message of the last failure that moved the engine to error.
    ///
    /// # Errors
    ///
    /// [`EngineError::EngineStopped`] if the loop has exited.
    pub async fn error_message(&self) -> Result<Option<String>, EngineError> {
        self.request(|reply| Command::ErrorMessage { reply }).await
    }

    /// Snapshot of the engine and its streams.
    ///
    /// # Errors
    ///
    /// [`EngineError::EngineStopped`] if the loop has exited.
    pub async fn stats(&self) -> Result<EngineStats, EngineError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Reports a signal change without waiting for the loop.
    ///
    /// The loop updates the stream and forwards the change to its consumers
    /// later. Notifications to an exited engine are dropped.
    pub fn notify_signal_changed(&self, notification: SignalNotification) {
        let _ = self.signals.send(notification);
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
