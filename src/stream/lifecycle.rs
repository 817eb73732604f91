//! An open PCM stream: prepare, trigger, pointer queries and close.
//!
//! Locking, outermost first:
//! - the device's coarse lock serializes open, prepare, trigger and close;
//! - the hot lock guards the trigger state and the position tracker and is
//!   what the clock thread takes on every tick;
//! - the ring lock guards buffer memory.
//!
//! A tick never holds the hot lock while it touches the ring or the sink. It
//! plans under the hot lock, copies and writes with the hot lock released,
//! then commits the plan under the hot lock again. A plan made stale by a
//! restart is dropped before it reaches the sink.

use crate::clock::{Clock, ClockState, DrainPlan, PositionTracker, TickBase, TickTimer};
use crate::defaults;
use crate::device::Device;
use crate::device::sink::SinkSlot;
use crate::error::{Result, VsndError};
use crate::stream::geometry::{RingBufferGeometry, StreamParams};
use crate::stream::ring::RingBuffer;
use crate::stream::trigger::{Action, TriggerCommand, TriggerState, TriggerStateMachine};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Notifications delivered to the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// A period boundary was crossed. Sequence numbers count from 1 after
    /// each prepare and never skip, even when several periods pass in one
    /// tick.
    PeriodElapsed { sequence: u64 },
}

/// Counters since the last prepare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub ticks: u64,
    pub bytes_delivered: u64,
    pub bytes_dropped: u64,
    pub periods_elapsed: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    ticks: AtomicU64,
    bytes_delivered: AtomicU64,
    bytes_dropped: AtomicU64,
    periods_elapsed: AtomicU64,
}

impl StatCounters {
    fn snapshot(&self) -> StreamStats {
        StreamStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            periods_elapsed: self.periods_elapsed.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.bytes_delivered.store(0, Ordering::Relaxed);
        self.bytes_dropped.store(0, Ordering::Relaxed);
        self.periods_elapsed.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct HotState {
    trigger: TriggerStateMachine,
    /// `None` until the first successful prepare.
    tracker: Option<PositionTracker>,
    params: Option<StreamParams>,
    period_sequence: u64,
}

/// State shared between the stream handle and its clock thread.
struct StreamShared {
    hot: Mutex<HotState>,
    ring: Mutex<RingBuffer>,
    sink: Arc<SinkSlot>,
    clock: Arc<dyn Clock>,
    ticks: TickBase,
    events: Sender<StreamEvent>,
    stats: StatCounters,
}

impl StreamShared {
    fn new(device: &Device) -> (Self, Receiver<StreamEvent>) {
        let (tx, rx) = bounded(defaults::EVENT_CHANNEL_CAPACITY);
        let clock = device.clock();
        let shared = Self {
            hot: Mutex::new(HotState::default()),
            ring: Mutex::new(RingBuffer::new()),
            sink: device.sink_slot(),
            ticks: TickBase::new(clock.now(), device.tick_rate()),
            clock,
            events: tx,
            stats: StatCounters::default(),
        };
        (shared, rx)
    }

    fn lock_hot(&self) -> MutexGuard<'_, HotState> {
        self.hot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_ring(&self) -> MutexGuard<'_, RingBuffer> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now_tick(&self) -> u64 {
        self.ticks.ticks_at(self.clock.now())
    }

    fn delay_for(&self, tracker: &PositionTracker) -> Duration {
        self.ticks.duration_of(tracker.next_delay_ticks())
    }

    /// One clock tick. Returns the delay until the next one, or `None` once
    /// the stream is no longer running.
    fn on_tick(&self, scratch: &mut Vec<u8>) -> Option<Duration> {
        let plan = self.plan_tick()?;
        if !plan.is_empty() && !self.drain_current(&plan, scratch) {
            // Restarted mid-tick; the restart armed its own first tick.
            trace!("discarding stale drain plan before writing");
            return None;
        }
        self.finish_tick(&plan)
    }

    /// Advance the tracker to now. `None` unless running and prepared.
    fn plan_tick(&self) -> Option<DrainPlan> {
        let now = self.now_tick();
        let mut hot = self.lock_hot();
        if !hot.trigger.is_running() {
            return None;
        }
        hot.tracker.as_mut().map(|tracker| tracker.advance(now))
    }

    /// Drain `plan` unless a reset has made it stale. Returns whether it ran.
    fn drain_current(&self, plan: &DrainPlan, scratch: &mut Vec<u8>) -> bool {
        let current = self
            .lock_hot()
            .tracker
            .as_ref()
            .is_some_and(|tracker| tracker.is_current(plan));
        if current {
            self.drain(plan, scratch);
        }
        current
    }

    /// Commit `plan`, publish the periods it crossed and schedule the next tick.
    fn finish_tick(&self, plan: &DrainPlan) -> Option<Duration> {
        let mut hot = self.lock_hot();
        let running = hot.trigger.is_running();
        let HotState {
            tracker,
            period_sequence,
            ..
        } = &mut *hot;
        let tracker = tracker.as_mut()?;
        if !tracker.commit(plan) {
            trace!("discarding stale drain plan");
            return None;
        }
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);
        let periods = tracker.take_periods_elapsed() as u64;
        let next = running.then(|| self.delay_for(tracker));
        let first = *period_sequence + 1;
        *period_sequence += periods;
        drop(hot);

        if periods > 0 {
            self.stats
                .periods_elapsed
                .fetch_add(periods, Ordering::Relaxed);
            for sequence in first..first + periods {
                self.notify(StreamEvent::PeriodElapsed { sequence });
            }
        }
        next
    }

    /// Copy the planned bytes out of the ring and hand them to the sink.
    /// Whatever the sink does not take is counted and dropped.
    fn drain(&self, plan: &DrainPlan, scratch: &mut Vec<u8>) {
        scratch.clear();
        {
            let ring = self.lock_ring();
            let bytes = ring.as_bytes();
            for (offset, len) in plan.segments(bytes.len()) {
                scratch.extend_from_slice(&bytes[offset..offset + len]);
            }
        }

        let Some(sink) = self.sink.get() else {
            self.stats
                .bytes_dropped
                .fetch_add(plan.len as u64, Ordering::Relaxed);
            return;
        };

        let delivered = match sink.write(scratch) {
            Ok(n) => n,
            Err(e) => {
                trace!(sink = sink.name(), error = %e, "sink write failed");
                0
            }
        };
        let dropped = scratch.len().saturating_sub(delivered);
        if dropped > 0 {
            trace!(sink = sink.name(), dropped, "short write to sink");
        }
        self.stats
            .bytes_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats
            .bytes_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
    }

    fn notify(&self, event: StreamEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "event queue full; producer is not keeping up");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Handle to an open stream. Dropping it closes the stream.
pub struct Stream {
    device: Arc<Device>,
    shared: Arc<StreamShared>,
    /// `None` once closed.
    timer: Option<TickTimer>,
    events: Receiver<StreamEvent>,
}

impl Stream {
    /// Build the stream and spawn its clock thread. Called by
    /// [`Device::open`] with the device's coarse lock held.
    pub(crate) fn new(device: Arc<Device>) -> Result<Self> {
        let (shared, rx) = StreamShared::new(&device);
        let shared = Arc::new(shared);

        let tick_shared = Arc::clone(&shared);
        let mut scratch = Vec::new();
        let timer = TickTimer::spawn(format!("{}-clock", device.name()), move || {
            tick_shared.on_tick(&mut scratch)
        })?;

        Ok(Self {
            device,
            shared,
            timer: Some(timer),
            events: rx,
        })
    }

    pub fn device_id(&self) -> u32 {
        self.device.id()
    }

    fn timer(&self) -> Result<&TickTimer> {
        self.timer.as_ref().ok_or(VsndError::StreamClosed)
    }

    /// Size the ring buffer for `params` and reset the clock.
    ///
    /// Stops the stream first and waits for any running tick. Invalid
    /// parameters are rejected before anything changes.
    pub fn prepare(&self, params: StreamParams) -> Result<RingBufferGeometry> {
        let geometry = RingBufferGeometry::from_params(&params)?;
        let mut tracker = PositionTracker::new(geometry, self.shared.ticks.tick_rate())?;
        let _device = self.device.lock_state();
        let timer = self.timer()?;

        self.shared.lock_hot().trigger.force_stop();
        timer.disarm_sync();

        self.shared.lock_ring().resize(geometry.buffer_size)?;

        tracker.reset(self.shared.now_tick());
        {
            let mut hot = self.shared.lock_hot();
            hot.tracker = Some(tracker);
            hot.params = Some(params);
            hot.period_sequence = 0;
        }
        self.shared.stats.reset();
        while self.events.try_recv().is_ok() {}

        debug!(
            device = self.device.id(),
            buffer_size = geometry.buffer_size,
            period_size = geometry.period_size,
            bytes_per_second = geometry.bytes_per_second,
            "stream prepared"
        );
        Ok(geometry)
    }

    /// Apply a trigger command.
    pub fn trigger(&self, command: TriggerCommand) -> Result<()> {
        let _device = self.device.lock_state();
        let timer = self.timer()?;
        let mut hot = self.shared.lock_hot();
        if hot.tracker.is_none() && command == TriggerCommand::Start {
            return Err(VsndError::NotPrepared);
        }

        let before = hot.trigger.state();
        let action = hot.trigger.apply(command);
        let now = self.shared.now_tick();
        match (action, hot.tracker.as_mut()) {
            (Action::ResetAndArm, Some(tracker)) => {
                tracker.reset(now);
                timer.arm(self.shared.delay_for(tracker));
            }
            (Action::RebaseAndArm, Some(tracker)) => {
                tracker.rebase(now);
                timer.arm(self.shared.delay_for(tracker));
            }
            (Action::Disarm, _) => timer.disarm(),
            _ => {}
        }

        let after = hot.trigger.state();
        if before != after {
            info!(device = self.device.id(), ?command, "{before} -> {after}");
        }
        Ok(())
    }

    /// Apply a trigger command given as its raw numeric code.
    pub fn trigger_code(&self, code: i32) -> Result<()> {
        self.trigger(TriggerCommand::try_from(code)?)
    }

    /// Playback position in frames. Zero before the first prepare.
    pub fn pointer(&self) -> usize {
        self.shared
            .lock_hot()
            .tracker
            .as_ref()
            .map_or(0, PositionTracker::pointer_frames)
    }

    /// Copy `data` into the ring buffer at `byte_offset`, wrapping. Returns
    /// the bytes written.
    pub fn write_at(&self, byte_offset: usize, data: &[u8]) -> Result<usize> {
        if self.timer.is_none() {
            return Err(VsndError::StreamClosed);
        }
        if self.shared.lock_hot().tracker.is_none() {
            return Err(VsndError::NotPrepared);
        }
        Ok(self.shared.lock_ring().write_at(byte_offset, data))
    }

    /// Period notifications, in order.
    pub fn events(&self) -> &Receiver<StreamEvent> {
        &self.events
    }

    pub fn stats(&self) -> StreamStats {
        self.shared.stats.snapshot()
    }

    pub fn state(&self) -> TriggerState {
        self.shared.lock_hot().trigger.state()
    }

    pub fn geometry(&self) -> Option<RingBufferGeometry> {
        self.shared
            .lock_hot()
            .tracker
            .as_ref()
            .map(|tracker| *tracker.geometry())
    }

    pub fn params(&self) -> Option<StreamParams> {
        self.shared.lock_hot().params
    }

    pub fn clock_state(&self) -> Option<ClockState> {
        self.shared
            .lock_hot()
            .tracker
            .as_ref()
            .map(PositionTracker::state)
    }

    pub fn is_closed(&self) -> bool {
        self.timer.is_none()
    }

    /// Stop, wait for the clock thread to exit, and release the device.
    /// Idempotent; also runs on drop.
    pub fn close(&mut self) {
        let Some(mut timer) = self.timer.take() else {
            return;
        };
        self.shared.lock_hot().trigger.force_stop();
        timer.disarm_and_join();
        self.device.release_stream();
        debug!(device = self.device.id(), "stream closed");
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("device", &self.device.id())
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::device::sink::CollectorSink;
    use std::time::Instant;

    fn device(clock: Arc<ManualClock>, sink: CollectorSink) -> Arc<Device> {
        Arc::new(
            Device::new(0, "/dev/null", 22050)
                .with_clock(clock)
                .with_opener(Arc::new(sink)),
        )
    }

    fn params() -> StreamParams {
        StreamParams {
            rate: 22050,
            buffer_frames: 8,
            period_frames: 4,
            ..StreamParams::default()
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn start_before_prepare_is_rejected() {
        let dev = device(Arc::new(ManualClock::new()), CollectorSink::new());
        let stream = dev.open().unwrap();
        assert!(matches!(
            stream.trigger(TriggerCommand::Start),
            Err(VsndError::NotPrepared)
        ));
        assert_eq!(stream.pointer(), 0);
    }

    #[test]
    fn tick_advances_pointer_by_elapsed_bytes() {
        let clock = Arc::new(ManualClock::new());
        let sink = CollectorSink::new();
        let dev = device(clock.clone(), sink.clone());
        let stream = dev.open().unwrap();
        stream.prepare(params()).unwrap();
        stream.write_at(0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        stream.trigger(TriggerCommand::Start).unwrap();

        // 2 ticks at 22050 Hz of 44100 B/s: 4 bytes, 2 frames.
        clock.advance(Duration::from_nanos(90_703));
        assert!(wait_for(|| stream.pointer() == 2));
        assert_eq!(sink.contents(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn period_events_are_numbered_without_gaps() {
        let clock = Arc::new(ManualClock::new());
        let dev = device(clock.clone(), CollectorSink::new());
        let stream = dev.open().unwrap();
        stream.prepare(params()).unwrap();
        stream.trigger(TriggerCommand::Start).unwrap();

        // 8 ticks: 16 bytes, two periods of 8 bytes.
        clock.advance(Duration::from_nanos(362_812));
        let mut seen = Vec::new();
        assert!(wait_for(|| {
            while let Ok(StreamEvent::PeriodElapsed { sequence }) = stream.events().try_recv() {
                seen.push(sequence);
            }
            seen.len() == 2
        }));
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(stream.stats().periods_elapsed, 2);
    }

    #[test]
    fn restart_between_plan_and_write_skips_the_sink() {
        let clock = Arc::new(ManualClock::new());
        let sink = CollectorSink::new();
        let dev = device(clock.clone(), sink.clone());
        dev.sink_slot().install(Arc::new(sink.clone()));
        let (shared, _events) = StreamShared::new(&dev);
        shared.lock_ring().resize(16).unwrap();
        shared.lock_ring().write_at(0, &[7; 16]);
        {
            let geometry = RingBufferGeometry::from_params(&params()).unwrap();
            let mut tracker = PositionTracker::new(geometry, 22050).unwrap();
            tracker.reset(shared.now_tick());
            let mut hot = shared.lock_hot();
            hot.trigger.apply(TriggerCommand::Start);
            hot.tracker = Some(tracker);
        }

        clock.advance(Duration::from_nanos(90_703));
        let plan = shared.plan_tick().unwrap();
        assert_eq!(plan.len, 4);

        // Start lands after planning, before the write.
        let now = shared.now_tick();
        shared.lock_hot().tracker.as_mut().unwrap().reset(now);

        let mut scratch = Vec::new();
        assert!(!shared.drain_current(&plan, &mut scratch));
        assert!(shared.finish_tick(&plan).is_none());
        assert!(sink.is_empty());
        assert_eq!(shared.stats.snapshot(), StreamStats::default());
        assert_eq!(shared.lock_hot().tracker.as_ref().unwrap().state().cursor, 0);

        // The next plan belongs to the restarted clock and is written.
        clock.advance(Duration::from_nanos(90_703));
        let plan = shared.plan_tick().unwrap();
        assert!(shared.drain_current(&plan, &mut scratch));
        assert!(shared.finish_tick(&plan).is_some());
        assert_eq!(sink.contents(), vec![7, 7, 7, 7]);
        assert_eq!(shared.stats.snapshot().ticks, 1);
    }

    #[test]
    fn closed_stream_rejects_operations() {
        let dev = device(Arc::new(ManualClock::new()), CollectorSink::new());
        let mut stream = dev.open().unwrap();
        stream.close();
        assert!(stream.is_closed());
        assert!(matches!(stream.prepare(params()), Err(VsndError::StreamClosed)));
        assert!(matches!(
            stream.trigger(TriggerCommand::Stop),
            Err(VsndError::StreamClosed)
        ));
        assert!(matches!(stream.write_at(0, &[0]), Err(VsndError::StreamClosed)));
        stream.close();
    }
}
