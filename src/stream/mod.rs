//! PCM streams: buffer geometry, ring memory, trigger state and lifecycle.

pub mod geometry;
pub mod lifecycle;
pub mod ring;
pub mod trigger;

pub use geometry::{HardwareLimits, RingBufferGeometry, StreamParams};
pub use lifecycle::{Stream, StreamEvent, StreamStats};
pub use trigger::{TriggerCommand, TriggerState};
