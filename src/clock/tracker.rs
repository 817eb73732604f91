//! Fixed-point position tracking for the software clock.
//!
//! Position is kept in "scaled" units of `byte × tick_rate`, so every tick adds
//! an exact integer (`elapsed_ticks × bytes_per_second`) and the fractional
//! byte left over after rounding stays in the accumulator instead of being
//! lost. Only the part below one period is kept; each wrap is one period
//! boundary crossed.
//!
//! The tracker is pure arithmetic. It never touches the ring buffer or the
//! sink: [`PositionTracker::advance`] returns a [`DrainPlan`], the caller moves
//! the bytes, then hands the plan back to [`PositionTracker::commit`].

use crate::error::Result;
use crate::stream::geometry::RingBufferGeometry;
use serde::Serialize;

/// Snapshot of the hot-path clock fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClockState {
    /// Byte offset into the ring buffer up to which data counts as delivered.
    pub cursor: usize,
    /// Position within the current period, in `byte × tick_rate` units.
    pub scaled_position: u64,
    /// Tick count observed by the previous tick.
    pub last_tick: u64,
    /// Period boundaries crossed but not yet surfaced to the producer.
    pub periods_pending: u32,
}

/// Bytes one tick must move from the ring buffer to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainPlan {
    /// Ring buffer offset of the first byte.
    pub start: usize,
    /// Byte count; may exceed the buffer size after a very late tick.
    pub len: usize,
    generation: u64,
}

impl DrainPlan {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Contiguous `(offset, len)` runs covering the plan, wrapping at
    /// `buffer_size`. A plan no longer than the buffer yields at most two.
    pub fn segments(&self, buffer_size: usize) -> Segments {
        Segments {
            offset: if buffer_size == 0 { 0 } else { self.start % buffer_size },
            remaining: if buffer_size == 0 { 0 } else { self.len },
            buffer_size,
        }
    }
}

/// Iterator returned by [`DrainPlan::segments`].
#[derive(Debug, Clone)]
pub struct Segments {
    offset: usize,
    remaining: usize,
    buffer_size: usize,
}

impl Iterator for Segments {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let len = self.remaining.min(self.buffer_size - self.offset);
        let segment = (self.offset, len);
        self.remaining -= len;
        self.offset = (self.offset + len) % self.buffer_size;
        Some(segment)
    }
}

/// Software clock for one prepared stream.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    geometry: RingBufferGeometry,
    tick_rate: u64,
    state: ClockState,
    /// Bumped by every reset; plans from an older generation are stale.
    generation: u64,
}

impl PositionTracker {
    /// Fails with `ConfigInvalid` for a geometry the clock cannot pace, such
    /// as a hand-built one with a zero period or alignment.
    pub fn new(geometry: RingBufferGeometry, tick_rate: u32) -> Result<Self> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            tick_rate: tick_rate.max(1) as u64,
            state: ClockState::default(),
            generation: 0,
        })
    }

    pub fn geometry(&self) -> &RingBufferGeometry {
        &self.geometry
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Zero the clock and take `now_tick` as the new time base.
    pub fn reset(&mut self, now_tick: u64) {
        self.state = ClockState {
            last_tick: now_tick,
            ..ClockState::default()
        };
        self.generation += 1;
    }

    /// Take `now_tick` as the time base without touching position, so the
    /// interval since the last tick is never counted.
    pub fn rebase(&mut self, now_tick: u64) {
        self.state.last_tick = now_tick;
    }

    /// Scaled length of one period.
    fn period_scaled(&self) -> u64 {
        self.geometry.period_size as u64 * self.tick_rate
    }

    /// Whole, frame-aligned bytes represented by a scaled position.
    fn aligned_bytes(&self, scaled: u64) -> u64 {
        let bytes = scaled / self.tick_rate;
        bytes - bytes % self.geometry.sample_alignment as u64
    }

    /// Account for the ticks elapsed up to `now_tick` and return the bytes to
    /// drain. The cursor does not move until the plan is committed.
    pub fn advance(&mut self, now_tick: u64) -> DrainPlan {
        let elapsed = now_tick.saturating_sub(self.state.last_tick);
        self.state.last_tick = self.state.last_tick.max(now_tick);

        let mut plan = DrainPlan {
            start: self.state.cursor,
            len: 0,
            generation: self.generation,
        };
        if elapsed == 0 {
            return plan;
        }

        let before = self.aligned_bytes(self.state.scaled_position);
        self.state.scaled_position += elapsed * self.geometry.bytes_per_second;
        let after = self.aligned_bytes(self.state.scaled_position);

        let period = self.period_scaled();
        if self.state.scaled_position >= period {
            let crossed = self.state.scaled_position / period;
            self.state.scaled_position %= period;
            self.state.periods_pending = self
                .state
                .periods_pending
                .saturating_add(u32::try_from(crossed).unwrap_or(u32::MAX));
        }

        plan.len = (after - before) as usize;
        plan
    }

    /// Whether `plan` was made since the last reset.
    pub fn is_current(&self, plan: &DrainPlan) -> bool {
        plan.generation == self.generation
    }

    /// Move the cursor past a drained plan. Returns `false` (and changes
    /// nothing) if the tracker was reset after the plan was made.
    pub fn commit(&mut self, plan: &DrainPlan) -> bool {
        if !self.is_current(plan) {
            return false;
        }
        self.state.cursor = (self.state.cursor + plan.len % self.geometry.buffer_size)
            % self.geometry.buffer_size;
        true
    }

    /// Ticks until the accumulator reaches the next period boundary, rounded
    /// up. Always at least one.
    pub fn next_delay_ticks(&self) -> u64 {
        let remaining = self.period_scaled() - self.state.scaled_position;
        remaining.div_ceil(self.geometry.bytes_per_second).max(1)
    }

    /// Surface pending period crossings, clearing them.
    pub fn take_periods_elapsed(&mut self) -> u32 {
        std::mem::take(&mut self.state.periods_pending)
    }

    /// Cursor expressed in frames.
    pub fn pointer_frames(&self) -> usize {
        self.geometry.bytes_to_frames(self.state.cursor)
    }
}
