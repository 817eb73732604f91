//! PCM sample formats a stream can be prepared with.

use crate::error::VsndError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interleaved PCM sample format.
///
/// Names follow the ALSA spelling (`S16_LE`, `FLOAT_LE`, ...) so configuration
/// files read the same as `aplay -f` arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    #[serde(rename = "U8")]
    U8,
    #[serde(rename = "S8")]
    S8,
    #[serde(rename = "S16_LE")]
    S16Le,
    #[serde(rename = "S16_BE")]
    S16Be,
    /// 24-bit samples in the low bits of a 32-bit container.
    #[serde(rename = "S24_LE")]
    S24Le,
    /// Packed 24-bit samples.
    #[serde(rename = "S24_3LE")]
    S24Packed,
    #[serde(rename = "S32_LE")]
    S32Le,
    #[serde(rename = "FLOAT_LE")]
    F32Le,
    /// 4-bit ADPCM; a mono frame is half a byte.
    #[serde(rename = "IMA_ADPCM")]
    ImaAdpcm,
}

impl SampleFormat {
    pub const ALL: [SampleFormat; 9] = [
        Self::U8,
        Self::S8,
        Self::S16Le,
        Self::S16Be,
        Self::S24Le,
        Self::S24Packed,
        Self::S32Le,
        Self::F32Le,
        Self::ImaAdpcm,
    ];

    /// Bits one sample occupies in memory, including container padding.
    pub fn physical_width(self) -> u32 {
        match self {
            Self::ImaAdpcm => 4,
            Self::U8 | Self::S8 => 8,
            Self::S16Le | Self::S16Be => 16,
            Self::S24Packed => 24,
            Self::S24Le | Self::S32Le | Self::F32Le => 32,
        }
    }

    /// Bytes per interleaved frame, truncated. Zero for sub-byte frames.
    pub fn frame_bytes(self, channels: u32) -> u32 {
        self.physical_width().saturating_mul(channels) / 8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "U8",
            Self::S8 => "S8",
            Self::S16Le => "S16_LE",
            Self::S16Be => "S16_BE",
            Self::S24Le => "S24_LE",
            Self::S24Packed => "S24_3LE",
            Self::S32Le => "S32_LE",
            Self::F32Le => "FLOAT_LE",
            Self::ImaAdpcm => "IMA_ADPCM",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = VsndError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| VsndError::config_invalid(format!("unknown sample format '{s}'")))
    }
}
