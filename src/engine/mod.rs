//! The routing engine: lifecycle state machine, control API and sample pump.

mod command;
mod handle;
mod runner;
mod state;
mod stream;

pub use handle::EngineHandle;
pub use state::{EngineState, EngineStats, StreamStats};

use std::sync::Arc;

use tokio::sync::mpsc;

use self::runner::EngineCore;
use self::state::SharedState;
use crate::device::DeviceLink;
use crate::{EngineConfig, EngineError, EngineEvent, EventCallback};

/// Entry point for building a routing engine.
///
/// # Example
///
/// ```no_run
/// use sdr_router::{EngineConfig, RoutingEngine};
///
/// # async fn example() -> Result<(), sdr_router::EngineError> {
/// let engine = RoutingEngine::builder()
///     .with_config(EngineConfig::default())
///     .on_event(|event| tracing::info!(?event, "engine event"))
///     .spawn()?;
///
/// println!("engine is {}", engine.state());
/// # Ok(())
/// # }
/// ```
pub struct RoutingEngine;

impl RoutingEngine {
    /// Creates a new builder.
    pub fn builder() -> RoutingEngineBuilder {
        RoutingEngineBuilder::default()
    }
}

/// Builder for configuring and spawning a [`RoutingEngine`].
#[derive(Default)]
pub struct RoutingEngineBuilder {
    config: EngineConfig,
    event_callback: Option<EventCallback>,
}

impl RoutingEngineBuilder {
    /// Sets the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a callback for runtime events.
    ///
    /// The callback runs on the engine loop for every [`EngineEvent`].
    #[must_use]
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(Arc::new(callback));
        self
    }

    /// Spawns the engine loop on the current tokio runtime.
    ///
    /// The engine starts in [`EngineState::Idle`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] for an unusable configuration and
    /// [`EngineError::NoRuntime`] outside a tokio runtime.
    pub fn spawn(self) -> Result<EngineHandle, EngineError> {
        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let (command_tx, command_rx) = mpsc::channel(self.config.control_queue_depth);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (wakeup_tx, wakeup_rx) = mpsc::channel(self.config.wakeup_queue_depth);

        let shared = Arc::new(SharedState::new());
        let link = DeviceLink::new(wakeup_tx, signal_tx.clone());
        let mut core = EngineCore::new(self.config, shared.clone(), self.event_callback, link);
        core.enter_idle();

        runtime.spawn(core.run(command_rx, signal_rx, wakeup_rx));
        tracing::info!("routing engine spawned");

        Ok(EngineHandle::new(command_tx, signal_tx, shared))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let result = RoutingEngine::builder().spawn();
        assert!(matches!(result, Err(EngineError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_spawn_rejects_invalid_config() {
        let result = RoutingEngine::builder()
            .with_config(EngineConfig {
                control_queue_depth: 0,
                ..Default::default()
            })
            .spawn();
        assert!(matches!(result, Err(EngineError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_spawned_engine_is_idle() {
        let engine = RoutingEngine::builder().spawn().unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_ends_loop() {
        let engine = RoutingEngine::builder().spawn().unwrap();
        let other = engine.clone();

        engine.shutdown().await.unwrap();
        assert_eq!(engine.state(), EngineState::NotStarted);
        assert!(matches!(other.init().await, Err(EngineError::EngineStopped)));
    }
}
