//! Virtual playback devices and the sinks they write to.

pub mod card;
pub mod registry;
pub mod sink;

pub use card::{Device, DeviceId, DeviceInfo};
pub use registry::{Registry, RegistryBuilder};
pub use sink::{CollectorSink, FifoOpener, FifoSink, FifoValidator, Sink, SinkOpener, SinkValidator};
