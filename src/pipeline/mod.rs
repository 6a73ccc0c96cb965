//! Sample pipeline components.
//!
//! Each engine stream moves samples through:
//!
//! ```text
//! Device Thread → Port (SPSC) → Mirrored Ring → Corrector → Consumers
//! ```
//!
//! - **Port**: Lock-free queue the device fills without ever blocking
//! - **Mirrored Ring**: Engine-owned store that always yields contiguous ranges
//! - **Corrector**: Adaptive DC and I/Q imbalance removal, applied in place
//! - **Registry**: Inline and dedicated consumers, plus the spectrum tap

pub mod corrector;
pub(crate) mod registry;
mod ring_buffer;

pub use corrector::{
    CorrectionBackend, DefaultBackend, FixedBackend, FloatBackend, StreamCorrector,
};
pub use ring_buffer::{MirroredRingBuffer, ReadRanges};
