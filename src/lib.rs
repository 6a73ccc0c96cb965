//! # sdr-router
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Real-time sample routing for software-defined radio.
//!
//! `sdr-router` moves continuous streams of complex I/Q samples from a
//! multi-channel device to a dynamic set of consumers (demodulators,
//! spectrum analyzers, recorders), removes DC offset and I/Q imbalance per
//! stream, and coordinates init, start and stop across everything attached.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sdr_router::device::{MockDevice, StreamDirection};
//! use sdr_router::{ChannelConsumer, CorrectionSettings, ExecutionMode, RoutingEngine, SampleBlock};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), sdr_router::EngineError> {
//! let (tx, mut rx) = mpsc::channel::<SampleBlock>(32);
//!
//! let engine = RoutingEngine::builder()
//!     .on_event(|e| tracing::warn!(?e, "engine event"))
//!     .spawn()?;
//!
//! engine.attach_device(MockDevice::new(1, 0)).await?;
//! let rx0 = engine.add_stream(StreamDirection::Rx, true).await?;
//! engine.configure_correction(rx0, CorrectionSettings::FULL).await?;
//! engine
//!     .attach_consumer(rx0, ChannelConsumer::new(tx), ExecutionMode::Dedicated)
//!     .await?;
//!
//! engine.init().await?;
//! engine.start().await?;
//!
//! while let Some(block) = rx.recv().await {
//!     // Demodulate, analyze, record...
//! #   break;
//! }
//!
//! engine.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Device Thread**: Pushes into a lock-free SPSC queue per stream and never blocks
//! - **Engine Loop**: One tokio task owns every stream, serializes control
//!   requests and pumps samples through a mirrored ring buffer
//! - **Dedicated Workers**: Slow consumers run on blocking-pool threads fed
//!   by bounded queues; they drop blocks rather than stall the loop

#![warn(missing_docs)]
// DSP code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod block;
mod config;
pub mod consumer;
pub mod device;
mod engine;
mod error;
mod event;
pub mod pipeline;
mod signal;

/// One complex I/Q sample.
pub type Sample = num_complex::Complex32;

pub use block::SampleBlock;
pub use config::{CorrectionConfig, CorrectionSettings, EngineConfig};
pub use consumer::{ChannelConsumer, Consumer, ConsumerId, ExecutionMode};
pub use engine::{
    EngineHandle, EngineState, EngineStats, RoutingEngine, RoutingEngineBuilder, StreamStats,
};
pub use error::{DeviceError, EngineError};
pub use event::{event_callback, EngineEvent, EventCallback};
pub use pipeline::{MirroredRingBuffer, StreamCorrector};
pub use signal::{SignalNotification, SignalParams};
