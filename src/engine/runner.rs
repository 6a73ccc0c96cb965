//! The engine loop: lifecycle, topology and the sample pump.
//!
//! Everything here runs on one tokio task. Control requests, signal
//! notifications and data-ready wake-ups are serialized through a biased
//! `select!`, so a pump pass and a topology change never interleave.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::command::{Command, Reply};
use super::state::SharedState;
use super::stream::Stream;
use super::{EngineState, EngineStats};
use crate::device::{Device, DeviceLink, SampleReader, StreamDirection, StreamKey};
use crate::pipeline::registry::SpectrumTap;
use crate::{
    Consumer, ConsumerId, CorrectionSettings, EngineConfig, EngineError, EngineEvent,
    EventCallback, ExecutionMode, SignalNotification,
};

/// Which data-ready wake-ups trigger pump passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriveMode {
    /// No connected stream: nothing is pumped.
    Idle,
    /// One connected receive stream and no connected transmit stream: every
    /// wake-up pumps every stream.
    Synchronous,
    /// Each connected stream's wake-up pumps that stream only.
    Asynchronous,
}

fn respond<T>(
    operation: &'static str,
    reply: Reply<Result<T, EngineError>>,
    result: Result<T, EngineError>,
) {
    if let Err(e) = &result {
        tracing::warn!(operation, error = %e, "control request rejected");
    }
    let _ = reply.send(result);
}

pub(crate) struct EngineCore {
    config: EngineConfig,
    shared: Arc<SharedState>,
    on_event: Option<EventCallback>,
    link: DeviceLink,
    state: EngineState,
    device: Option<Box<dyn Device>>,
    device_running: bool,
    rx: Vec<Stream>,
    tx: Vec<Stream>,
    spectrum: SpectrumTap,
    drive: DriveMode,
    description: Option<String>,
    error_message: Option<String>,
    next_consumer: u64,
    deferred: VecDeque<StreamKey>,
}

impl EngineCore {
    pub(crate) fn new(
        config: EngineConfig,
        shared: Arc<SharedState>,
        on_event: Option<EventCallback>,
        link: DeviceLink,
    ) -> Self {
        Self {
            config,
            shared,
            on_event,
            link,
            state: EngineState::NotStarted,
            device: None,
            device_running: false,
            rx: Vec::new(),
            tx: Vec::new(),
            spectrum: SpectrumTap::default(),
            drive: DriveMode::Idle,
            description: None,
            error_message: None,
            next_consumer: 1,
            deferred: VecDeque::new(),
        }
    }

    /// Runs until a shutdown request, or until every handle is dropped.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut signals: mpsc::UnboundedReceiver<SignalNotification>,
        mut wakeups: mpsc::Receiver<StreamKey>,
    ) {
        tracing::debug!("engine loop started");

        loop {
            let repump = !self.deferred.is_empty();
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("all engine handles dropped");
                        break;
                    };
                    self.shared.request_taken();
                    if let Some(reply) = self.handle(command).await {
                        self.shutdown().await;
                        let _ = reply.send(());
                        return;
                    }
                }

                Some(notification) = signals.recv() => self.signal_changed(notification),

                Some(key) = wakeups.recv() => self.data_ready(key),

                () = tokio::task::yield_now(), if repump => self.pump_deferred(),
            }
        }

        self.shutdown().await;
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(callback) = &self.on_event {
            callback(event);
        }
    }

    fn set_state(&mut self, state: EngineState) -> EngineState {
        if self.state != state {
            let previous = self.state;
            self.state = state;
            self.shared.set_state(state);
            tracing::info!(%previous, current = %state, "engine state changed");
            self.emit(EngineEvent::StateChanged {
                previous,
                current: state,
            });
        }
        state
    }

    /// Marks the engine as running its loop.
    pub(crate) fn enter_idle(&mut self) {
        self.set_state(EngineState::Idle);
    }

    /// Handles one control request. Returns the reply of a shutdown request,
    /// which the loop answers once everything is stopped.
    async fn handle(&mut self, command: Command) -> Option<Reply<()>> {
        let operation = command.name();
        tracing::trace!(operation, "control request");

        match command {
            Command::AttachDevice { device, reply } => {
                respond(operation, reply, self.attach_device(device));
            }
            Command::DetachDevice { reply } => respond(operation, reply, self.detach_device()),
            Command::Init { reply } => {
                let _ = reply.send(self.goto_init());
            }
            Command::Start { reply } => {
                let _ = reply.send(self.goto_running().await);
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.goto_idle().await);
            }
            Command::Shutdown { reply } => return Some(reply),
            Command::AddStream {
                direction,
                connect,
                reply,
            } => respond(operation, reply, self.add_stream(direction, connect)),
            Command::RemoveLastStream { direction, reply } => {
                respond(operation, reply, self.remove_last_stream(direction));
            }
            Command::RemoveStream { key, reply } => {
                respond(operation, reply, self.remove_stream(key));
            }
            Command::AttachConsumer {
                index,
                consumer,
                mode,
                reply,
            } => respond(operation, reply, self.attach_consumer(index, consumer, mode)),
            Command::DetachConsumer { index, id, reply } => {
                respond(operation, reply, self.detach_consumer(index, id));
            }
            Command::BindSpectrum { consumer, reply } => {
                self.bind_spectrum(consumer);
                let _ = reply.send(Ok(()));
            }
            Command::UnbindSpectrum { reply } => respond(operation, reply, self.unbind_spectrum()),
            Command::SetSpectrumInput { key, reply } => {
                respond(operation, reply, self.set_spectrum_input(key));
            }
            Command::ConfigureCorrection {
                index,
                settings,
                reply,
            } => respond(operation, reply, self.configure_correction(index, settings)),
            Command::DeviceDescription { reply } => {
                let _ = reply.send(self.description.clone());
            }
            Command::ErrorMessage { reply } => {
                let _ = reply.send(self.error_message.clone());
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
        None
    }

    // ---- lifecycle ----

    fn goto_error(&mut self, message: impl Into<String>) -> EngineState {
        let message = message.into();
        tracing::warn!(error = %message, "engine failed");
        self.error_message = Some(message);
        self.set_state(EngineState::Error)
    }

    fn goto_init(&mut self) -> EngineState {
        match self.state {
            EngineState::Idle => {}
            state => return state,
        }
        let Some(device) = &self.device else {
            return self.goto_error(EngineError::NoDevice.to_string());
        };

        self.description = Some(device.description());
        for stream in self.rx.iter_mut().chain(self.tx.iter_mut()) {
            if stream.port.is_some() {
                stream.params = device.signal(stream.key);
            }
            stream.flush();
            stream.corrector.reset();
        }
        for stream in &mut self.rx {
            stream.consumers.notify_all(stream.params);
        }
        let input = self.spectrum.input();
        if let Some(params) = self.stream(input).map(|s| s.params) {
            self.spectrum.notify(params);
        }

        tracing::info!(
            device = self.description.as_deref().unwrap_or_default(),
            rx_streams = self.rx.len(),
            tx_streams = self.tx.len(),
            "engine initialized"
        );
        self.set_state(EngineState::Ready)
    }

    async fn goto_running(&mut self) -> EngineState {
        match self.state {
            EngineState::Ready => {}
            state => return state,
        }
        let Some(device) = self.device.as_mut() else {
            return self.goto_error(EngineError::NoDevice.to_string());
        };

        if let Err(e) = device.start().await {
            let message = e.to_string();
            self.emit(EngineEvent::DeviceFailed {
                message: message.clone(),
            });
            return self.goto_error(message);
        }
        self.device_running = true;

        for stream in &mut self.rx {
            stream.consumers.start_inline();
        }
        for stream in &self.rx {
            stream.consumers.start_dedicated();
        }
        self.spectrum.start();

        let state = self.set_state(EngineState::Running);
        // Samples queued while starting arrived before the engine was running.
        self.schedule_all();
        state
    }

    async fn goto_idle(&mut self) -> EngineState {
        match self.state {
            EngineState::Ready | EngineState::Running => {}
            EngineState::Error => {
                self.description = None;
                return self.set_state(EngineState::Idle);
            }
            state => return state,
        }

        for stream in &mut self.rx {
            stream.consumers.stop_inline();
        }
        for stream in &self.rx {
            stream.consumers.stop_dedicated();
        }
        self.spectrum.stop();

        if self.device_running {
            if let Some(device) = self.device.as_mut() {
                device.stop().await;
            }
            self.device_running = false;
        }

        self.description = None;
        self.deferred.clear();
        self.set_state(EngineState::Idle)
    }

    async fn shutdown(&mut self) {
        self.goto_idle().await;
        self.set_state(EngineState::NotStarted);
        tracing::info!("engine shut down");
    }

    // ---- topology ----

    fn streams(&self, direction: StreamDirection) -> &Vec<Stream> {
        match direction {
            StreamDirection::Rx => &self.rx,
            StreamDirection::Tx => &self.tx,
        }
    }

    fn streams_mut(&mut self, direction: StreamDirection) -> &mut Vec<Stream> {
        match direction {
            StreamDirection::Rx => &mut self.rx,
            StreamDirection::Tx => &mut self.tx,
        }
    }

    fn stream(&self, key: StreamKey) -> Option<&Stream> {
        self.streams(key.direction).get(key.index)
    }

    fn out_of_range(&self, key: StreamKey) -> EngineError {
        EngineError::StreamOutOfRange {
            key,
            direction: key.direction,
            count: self.streams(key.direction).len(),
        }
    }

    fn rx_stream_mut(&mut self, index: usize) -> Result<&mut Stream, EngineError> {
        if index >= self.rx.len() {
            return Err(self.out_of_range(StreamKey::rx(index)));
        }
        Ok(&mut self.rx[index])
    }

    fn update_drive_mode(&mut self) {
        let rx = self.rx.iter().filter(|s| s.connected).count();
        let tx = self.tx.iter().filter(|s| s.connected).count();
        let drive = match (rx, tx) {
            (0, 0) => DriveMode::Idle,
            (1, 0) => DriveMode::Synchronous,
            _ => DriveMode::Asynchronous,
        };
        if drive != self.drive {
            tracing::debug!(?drive, "drive mode changed");
            self.drive = drive;
        }
    }

    fn open_port(
        device: &mut dyn Device,
        key: StreamKey,
        capacity: usize,
    ) -> Result<Option<SampleReader>, EngineError> {
        if key.index >= device.stream_count(key.direction) {
            return Ok(None);
        }
        Ok(Some(device.open_stream(key, capacity)?))
    }

    fn attach_device(&mut self, mut device: Box<dyn Device>) -> Result<(), EngineError> {
        if matches!(self.state, EngineState::Ready | EngineState::Running) {
            return Err(EngineError::InvalidState {
                operation: "attach_device",
                state: self.state,
            });
        }

        device.bind(self.link.clone());
        let mut ports = Vec::with_capacity(self.rx.len() + self.tx.len());
        for stream in self.rx.iter().chain(self.tx.iter()) {
            let port = Self::open_port(device.as_mut(), stream.key, self.config.port_capacity)?;
            ports.push((port, device.signal(stream.key)));
        }
        for (stream, (port, params)) in self.rx.iter_mut().chain(self.tx.iter_mut()).zip(ports) {
            if port.is_some() {
                stream.params = params;
            }
            stream.port = port;
        }

        tracing::info!(device = %device.description(), "device attached");
        self.device = Some(device);
        self.update_drive_mode();
        Ok(())
    }

    fn detach_device(&mut self) -> Result<(), EngineError> {
        if matches!(self.state, EngineState::Ready | EngineState::Running) {
            return Err(EngineError::InvalidState {
                operation: "detach_device",
                state: self.state,
            });
        }
        let device = self.device.take().ok_or(EngineError::NoDevice)?;
        for stream in self.rx.iter_mut().chain(self.tx.iter_mut()) {
            stream.port = None;
        }
        self.description = None;
        tracing::info!(device = %device.description(), "device detached");
        Ok(())
    }

    fn add_stream(&mut self, direction: StreamDirection, connect: bool) -> Result<usize, EngineError> {
        let index = self.streams(direction).len();
        let key = StreamKey::new(direction, index);
        let mut stream = Stream::new(key, connect, &self.config);

        if let Some(device) = self.device.as_mut() {
            stream.port = Self::open_port(device.as_mut(), key, self.config.port_capacity)?;
            if stream.port.is_some() {
                stream.params = device.signal(key);
            }
        }

        // The tap keeps its input across removal; a stream re-added at that
        // key may come back with different parameters.
        if self.spectrum.is_bound_to(key) {
            self.spectrum.notify(stream.params);
        }
        self.streams_mut(direction).push(stream);
        self.update_drive_mode();
        tracing::info!(stream = %key, connect, "stream added");
        Ok(index)
    }

    fn remove_last_stream(&mut self, direction: StreamDirection) -> Result<usize, EngineError> {
        let mut stream = self
            .streams_mut(direction)
            .pop()
            .ok_or(EngineError::NoStreams { direction })?;

        stream.consumers.stop_inline();
        stream.consumers.stop_dedicated();

        let key = stream.key;
        self.deferred.retain(|k| *k != key);
        self.update_drive_mode();
        tracing::info!(stream = %key, "stream removed");
        Ok(key.index)
    }

    fn remove_stream(&mut self, key: StreamKey) -> Result<(), EngineError> {
        let count = self.streams(key.direction).len();
        if key.index >= count {
            return Err(self.out_of_range(key));
        }
        if key.index + 1 != count {
            return Err(EngineError::NotLastStream {
                key,
                last: StreamKey::new(key.direction, count - 1),
            });
        }
        self.remove_last_stream(key.direction).map(|_| ())
    }

    fn attach_consumer(
        &mut self,
        index: usize,
        mut consumer: Box<dyn Consumer>,
        mode: ExecutionMode,
    ) -> Result<ConsumerId, EngineError> {
        let running = self.state == EngineState::Running;
        let id = ConsumerId::new(self.next_consumer);
        let stream = self.rx_stream_mut(index)?;

        consumer.on_signal_changed(stream.params);
        let name = consumer.name().to_string();
        stream.consumers.push(id, consumer, mode);
        if running {
            stream.consumers.start_one(id);
        }

        tracing::debug!(stream = %stream.key, consumer = %name, %id, ?mode, "consumer attached");
        self.next_consumer += 1;
        Ok(id)
    }

    fn detach_consumer(&mut self, index: usize, id: ConsumerId) -> Result<(), EngineError> {
        let stream = self.rx_stream_mut(index)?;
        let key = stream.key;
        let detached = stream
            .consumers
            .remove(id)
            .ok_or(EngineError::ConsumerNotFound { id, key })?;
        tracing::debug!(stream = %key, consumer = detached.name(), %id, "consumer detached");
        Ok(())
    }

    fn bind_spectrum(&mut self, mut consumer: Box<dyn Consumer>) {
        if let Some(stream) = self.stream(self.spectrum.input()) {
            consumer.on_signal_changed(stream.params);
        }
        let name = consumer.name().to_string();
        if let Some(previous) = self.spectrum.bind(consumer) {
            tracing::debug!(consumer = previous.name(), "spectrum consumer replaced");
        }
        if self.state == EngineState::Running {
            self.spectrum.start();
        }
        tracing::debug!(consumer = %name, input = %self.spectrum.input(), "spectrum consumer bound");
    }

    fn unbind_spectrum(&mut self) -> Result<(), EngineError> {
        let consumer = self.spectrum.unbind().ok_or(EngineError::NoSpectrumConsumer)?;
        tracing::debug!(consumer = consumer.name(), "spectrum consumer unbound");
        Ok(())
    }

    fn set_spectrum_input(&mut self, key: StreamKey) -> Result<(), EngineError> {
        let params = self
            .stream(key)
            .map(|s| s.params)
            .ok_or_else(|| self.out_of_range(key))?;
        if self.spectrum.input() == key {
            return Ok(());
        }
        self.spectrum.set_input(key);
        self.spectrum.notify(params);
        tracing::debug!(input = %key, "spectrum input changed");
        Ok(())
    }

    fn configure_correction(
        &mut self,
        index: usize,
        settings: CorrectionSettings,
    ) -> Result<(), EngineError> {
        let stream = self.rx_stream_mut(index)?;
        if stream.corrector.configure(settings) {
            tracing::debug!(
                stream = %stream.key,
                dc_offset = settings.dc_offset,
                iq_imbalance = settings.iq_imbalance,
                "correction configured"
            );
        }
        Ok(())
    }

    fn stats(&self) -> EngineStats {
        EngineStats {
            state: self.state,
            rx: self.rx.iter().map(Stream::stats).collect(),
            tx: self.tx.iter().map(Stream::stats).collect(),
            synchronous: self.drive == DriveMode::Synchronous,
            spectrum_input: self.spectrum.is_bound().then(|| self.spectrum.input()),
        }
    }

    // ---- notifications ----

    fn signal_changed(&mut self, notification: SignalNotification) {
        let SignalNotification { key, params } = notification;
        let streams = match key.direction {
            StreamDirection::Rx => &mut self.rx,
            StreamDirection::Tx => &mut self.tx,
        };
        let Some(stream) = streams.get_mut(key.index) else {
            tracing::warn!(stream = %key, "signal change for unknown stream ignored");
            return;
        };

        stream.params = params;
        if key.is_rx() {
            stream.consumers.notify_all(params);
        }
        if self.spectrum.is_bound_to(key) {
            self.spectrum.notify(params);
        }
        tracing::debug!(stream = %key, %params, "signal changed");
        self.emit(EngineEvent::SignalChanged { key, params });
    }

    // ---- sample pump ----

    fn data_ready(&mut self, key: StreamKey) {
        if self.state != EngineState::Running {
            return;
        }
        match self.drive {
            DriveMode::Idle => {}
            DriveMode::Synchronous => self.pump_all(),
            DriveMode::Asynchronous => {
                if self.stream(key).is_some_and(|s| s.connected) {
                    self.pump_stream(key);
                }
                self.schedule_waiting();
            }
        }
    }

    /// Queues every connected stream whose port holds samples.
    ///
    /// All streams share one wake-up queue and a full queue drops wake-ups,
    /// so one stream's wake-up stands in for any dropped ones.
    fn schedule_waiting(&mut self) {
        for stream in self.rx.iter().chain(self.tx.iter()) {
            if stream.connected && stream.port_has_data() && !self.deferred.contains(&stream.key) {
                self.deferred.push_back(stream.key);
            }
        }
    }

    fn pump_all(&mut self) {
        for index in 0..self.rx.len() {
            self.pump_stream(StreamKey::rx(index));
        }
        for index in 0..self.tx.len() {
            self.pump_stream(StreamKey::tx(index));
        }
    }

    fn pump_stream(&mut self, key: StreamKey) {
        let streams = match key.direction {
            StreamDirection::Rx => &mut self.rx,
            StreamDirection::Tx => &mut self.tx,
        };
        let Some(stream) = streams.get_mut(key.index) else {
            return;
        };
        let shared = &self.shared;
        let on_event = &self.on_event;

        let outcome = stream.pump(
            &mut self.spectrum,
            || shared.has_pending_requests(),
            |key, consumer, dropped_blocks| {
                tracing::warn!(stream = %key, consumer, dropped_blocks, "dedicated consumer overflow");
                if let Some(callback) = on_event {
                    callback(EngineEvent::ConsumerOverflow {
                        key,
                        consumer: consumer.to_string(),
                        dropped_blocks,
                    });
                }
            },
        );

        tracing::trace!(stream = %key, delivered = outcome.delivered, more = outcome.more, "pump pass");
        if outcome.more && !self.deferred.contains(&key) {
            self.deferred.push_back(key);
        }
    }

    /// Queues a pass for every stream the current drive mode pumps.
    fn schedule_all(&mut self) {
        let synchronous = match self.drive {
            DriveMode::Idle => return,
            DriveMode::Synchronous => true,
            DriveMode::Asynchronous => false,
        };
        for stream in self.rx.iter().chain(self.tx.iter()) {
            if stream.port.is_some()
                && (synchronous || stream.connected)
                && !self.deferred.contains(&stream.key)
            {
                self.deferred.push_back(stream.key);
            }
        }
    }

    fn pump_deferred(&mut self) {
        if self.state != EngineState::Running {
            self.deferred.clear();
            return;
        }
        let keys = std::mem::take(&mut self.deferred);
        for key in keys {
            if self.shared.has_pending_requests() {
                if !self.deferred.contains(&key) {
                    self.deferred.push_back(key);
                }
                continue;
            }
            self.pump_stream(key);
        }
    }
}
