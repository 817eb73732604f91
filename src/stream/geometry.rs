//! Ring buffer sizing derived from a stream's hardware parameters.

use crate::audio::format::SampleFormat;
use crate::defaults;
use crate::error::{Result, VsndError};
use serde::{Deserialize, Serialize};

/// Parameters a producer hands to `prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamParams {
    pub format: SampleFormat,
    pub rate: u32,
    pub channels: u32,
    pub buffer_frames: u32,
    pub period_frames: u32,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            format: defaults::PCM_FORMAT,
            rate: defaults::PCM_RATE,
            channels: defaults::PCM_CHANNELS,
            buffer_frames: defaults::BUFFER_FRAMES,
            period_frames: defaults::PERIOD_FRAMES,
        }
    }
}

/// How a prepared stream's ring buffer is sized and segmented, in bytes.
///
/// `buffer_size` and `period_size` are whole multiples of `sample_alignment`,
/// `0 < period_size <= buffer_size` and `bytes_per_second > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingBufferGeometry {
    pub buffer_size: usize,
    pub period_size: usize,
    pub sample_alignment: usize,
    pub bytes_per_second: u64,
}

impl RingBufferGeometry {
    /// Derive the geometry for `params`, rejecting anything the clock cannot pace.
    pub fn from_params(params: &StreamParams) -> Result<Self> {
        let alignment = params.format.frame_bytes(params.channels) as u64;
        let bytes_per_second = alignment * params.rate as u64;
        if alignment == 0 {
            return Err(VsndError::config_invalid(format!(
                "{} x {} channel(s) does not fill a whole byte per frame",
                params.format, params.channels
            )));
        }
        if bytes_per_second == 0 {
            return Err(VsndError::config_invalid("rate must be positive"));
        }
        if params.period_frames == 0 {
            return Err(VsndError::config_invalid("period must hold at least one frame"));
        }
        if params.period_frames > params.buffer_frames {
            return Err(VsndError::config_invalid(format!(
                "period of {} frames exceeds buffer of {} frames",
                params.period_frames, params.buffer_frames
            )));
        }

        let to_bytes = |frames: u32| -> Result<usize> {
            usize::try_from(frames as u64 * alignment)
                .map_err(|_| VsndError::config_invalid("buffer does not fit in memory"))
        };

        Ok(Self {
            buffer_size: to_bytes(params.buffer_frames)?,
            period_size: to_bytes(params.period_frames)?,
            sample_alignment: alignment as usize,
            bytes_per_second,
        })
    }

    /// Check the invariants [`from_params`](Self::from_params) establishes,
    /// for geometries built by hand.
    pub fn validate(&self) -> Result<()> {
        if self.sample_alignment == 0 || self.bytes_per_second == 0 {
            return Err(VsndError::config_invalid(
                "geometry needs a non-zero alignment and byte rate",
            ));
        }
        if self.period_size == 0 || self.period_size > self.buffer_size {
            return Err(VsndError::config_invalid(format!(
                "period of {} bytes does not fit a buffer of {} bytes",
                self.period_size, self.buffer_size
            )));
        }
        if self.buffer_size % self.sample_alignment != 0
            || self.period_size % self.sample_alignment != 0
        {
            return Err(VsndError::config_invalid(format!(
                "buffer and period must be whole {}-byte frames",
                self.sample_alignment
            )));
        }
        Ok(())
    }

    pub fn bytes_to_frames(&self, bytes: usize) -> usize {
        bytes / self.sample_alignment
    }

    pub fn frames_to_bytes(&self, frames: usize) -> usize {
        frames * self.sample_alignment
    }

    /// Number of whole periods in the buffer.
    pub fn periods(&self) -> usize {
        self.buffer_size / self.period_size
    }

    pub fn buffer_frames(&self) -> usize {
        self.bytes_to_frames(self.buffer_size)
    }

    pub fn period_frames(&self) -> usize {
        self.bytes_to_frames(self.period_size)
    }
}

/// Buffer limits a device advertises to producers.
///
/// `prepare` does not enforce these; producers that want to behave like a
/// real card check their parameters against them first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareLimits {
    pub buffer_bytes_max: usize,
    pub period_bytes_min: usize,
    pub period_bytes_max: usize,
    pub periods_min: usize,
    pub periods_max: usize,
}

impl Default for HardwareLimits {
    fn default() -> Self {
        Self {
            buffer_bytes_max: defaults::BUFFER_BYTES_MAX,
            period_bytes_min: defaults::PERIOD_BYTES_MIN,
            period_bytes_max: defaults::PERIOD_BYTES_MAX,
            periods_min: defaults::PERIODS_MIN,
            periods_max: defaults::PERIODS_MAX,
        }
    }
}

impl HardwareLimits {
    /// Check a geometry against the limits. The buffer must hold an integer
    /// number of periods.
    pub fn check(&self, geometry: &RingBufferGeometry) -> Result<()> {
        geometry.validate()?;
        if geometry.buffer_size > self.buffer_bytes_max {
            return Err(VsndError::config_invalid(format!(
                "buffer of {} bytes exceeds the {} byte maximum",
                geometry.buffer_size, self.buffer_bytes_max
            )));
        }
        if !(self.period_bytes_min..=self.period_bytes_max).contains(&geometry.period_size) {
            return Err(VsndError::config_invalid(format!(
                "period of {} bytes outside {}..={}",
                geometry.period_size, self.period_bytes_min, self.period_bytes_max
            )));
        }
        if geometry.buffer_size % geometry.period_size != 0 {
            return Err(VsndError::config_invalid(
                "buffer must hold an integer number of periods",
            ));
        }
        let periods = geometry.periods();
        if !(self.periods_min..=self.periods_max).contains(&periods) {
            return Err(VsndError::config_invalid(format!(
                "{} periods outside {}..={}",
                periods, self.periods_min, self.periods_max
            )));
        }
        Ok(())
    }
}
