//! Producer loop: keeps a stream's ring buffer filled from a clip.
//!
//! The whole buffer is filled before `Start`. After that each period-elapsed
//! event frees one period behind the cursor, which is refilled with the next
//! slice of the clip, or with silence once the clip runs out.

use crate::audio::wav::PcmClip;
use crate::error::{Result, VsndError};
use crate::stream::geometry::{HardwareLimits, RingBufferGeometry};
use crate::stream::{Stream, StreamEvent, StreamStats, TriggerCommand};
use crossbeam_channel::RecvTimeoutError;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Summary of one playback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybackReport {
    pub clip_bytes: usize,
    pub periods: u64,
    pub geometry: RingBufferGeometry,
    pub stats: StreamStats,
}

pub struct Playback<'a> {
    stream: &'a Stream,
    limits: Option<HardwareLimits>,
    stall_timeout: Duration,
}

impl<'a> Playback<'a> {
    pub fn new(stream: &'a Stream) -> Self {
        Self {
            stream,
            limits: None,
            stall_timeout: Duration::from_secs(2),
        }
    }

    /// Reject buffering the device would not accept.
    pub fn with_limits(mut self, limits: HardwareLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Give up if no period completes within this long past its due time.
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Prepare the stream for `clip`, play it to the end, and stop.
    pub fn run(&self, clip: &PcmClip, buffer_frames: u32, period_frames: u32) -> Result<PlaybackReport> {
        let params = clip.params(buffer_frames, period_frames);
        if let Some(limits) = &self.limits {
            limits.check(&RingBufferGeometry::from_params(&params)?)?;
        }
        let geometry = self.stream.prepare(params)?;

        let data = clip.data();
        let mut feeder = Feeder {
            stream: self.stream,
            data,
            written: 0,
            silence: vec![0; geometry.period_size],
        };
        feeder.fill(0, geometry.buffer_size)?;

        let periods = data.len().div_ceil(geometry.period_size) as u64;
        let period_time = Duration::from_nanos(
            (geometry.period_size as u128 * 1_000_000_000 / geometry.bytes_per_second as u128)
                .try_into()
                .unwrap_or(u64::MAX),
        );
        info!(
            bytes = data.len(),
            duration = ?clip.duration(),
            periods,
            rate = params.rate,
            format = %params.format,
            "playing"
        );

        self.stream.trigger(TriggerCommand::Start)?;
        let result = self.pump(&mut feeder, &geometry, periods, period_time);
        self.stream.trigger(TriggerCommand::Stop)?;
        result?;

        let stats = self.stream.stats();
        debug!(?stats, "playback finished");
        Ok(PlaybackReport {
            clip_bytes: data.len(),
            periods,
            geometry,
            stats,
        })
    }

    fn pump(
        &self,
        feeder: &mut Feeder<'_>,
        geometry: &RingBufferGeometry,
        periods: u64,
        period_time: Duration,
    ) -> Result<()> {
        let mut refilled = 0u64;
        while refilled < periods {
            let event = match self.stream.events().recv_timeout(period_time + self.stall_timeout) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(VsndError::Other(format!(
                        "no period completed within {:?}",
                        period_time + self.stall_timeout
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => return Err(VsndError::StreamClosed),
            };
            let StreamEvent::PeriodElapsed { sequence } = event;
            // Catch up if notifications were dropped.
            while refilled < sequence {
                let offset = (refilled as usize * geometry.period_size) % geometry.buffer_size;
                feeder.fill(offset, geometry.period_size)?;
                refilled += 1;
            }
        }
        Ok(())
    }
}

/// Tracks how much of the clip has gone into the ring.
struct Feeder<'a> {
    stream: &'a Stream,
    data: &'a [u8],
    written: usize,
    silence: Vec<u8>,
}

impl Feeder<'_> {
    /// Write the next `len` bytes of the clip at `offset`, padding with
    /// silence past its end.
    fn fill(&mut self, offset: usize, len: usize) -> Result<()> {
        let end = (self.written + len).min(self.data.len());
        let chunk = &self.data[self.written.min(end)..end];
        self.stream.write_at(offset, chunk)?;
        self.written = end;

        let mut padded = chunk.len();
        while padded < len {
            let n = (len - padded).min(self.silence.len());
            self.stream.write_at(offset + padded, &self.silence[..n])?;
            padded += n;
        }
        Ok(())
    }
}
