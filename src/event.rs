//! Runtime events for monitoring the routing engine.
//!
//! Events are non-fatal notifications. The engine keeps running after an
//! event is emitted; they exist for logging, metrics and for external
//! observers that track stream parameters.

use std::sync::Arc;

use crate::device::StreamKey;
use crate::engine::EngineState;
use crate::SignalParams;

/// Runtime events emitted by the engine loop.
///
/// # Example
///
/// ```
/// use sdr_router::EngineEvent;
///
/// fn handle_event(event: EngineEvent) {
///     match event {
///         EngineEvent::StateChanged { previous, current } => {
///             eprintln!("engine {previous} -> {current}");
///         }
///         EngineEvent::SignalChanged { key, params } => {
///             eprintln!("{key} retuned to {params}");
///         }
///         EngineEvent::ConsumerOverflow { key, consumer, dropped_blocks } => {
///             eprintln!("{consumer} on {key} dropped {dropped_blocks} blocks");
///         }
///         EngineEvent::DeviceFailed { message } => {
///             eprintln!("device failed: {message}");
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The lifecycle state changed.
    StateChanged {
        /// State before the transition.
        previous: EngineState,
        /// State after the transition.
        current: EngineState,
    },

    /// A stream's sample rate or center frequency changed.
    ///
    /// Emitted after the change has been forwarded to the stream's consumers.
    SignalChanged {
        /// The retuned stream.
        key: StreamKey,
        /// The new parameters.
        params: SignalParams,
    },

    /// A dedicated consumer's queue was full and blocks were dropped.
    ///
    /// The consumer is slower than real time. Consider a larger
    /// `dedicated_queue_depth` or lighter processing.
    ConsumerOverflow {
        /// Stream the consumer is attached to.
        key: StreamKey,
        /// Name of the consumer.
        consumer: String,
        /// Total blocks dropped for this consumer so far.
        dropped_blocks: u64,
    },

    /// The device failed and the engine moved to the error state.
    DeviceFailed {
        /// The recorded error message.
        message: String,
    },
}

/// Callback type for receiving runtime events.
///
/// The callback runs on the engine loop; keep it short.
pub type EventCallback = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use sdr_router::{event_callback, EngineEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(EngineEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
