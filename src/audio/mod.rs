pub mod format;
pub mod wav;

pub use format::SampleFormat;
pub use wav::PcmClip;
