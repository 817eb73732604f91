//! A virtual playback device: one output path, at most one open stream.

use crate::clock::{Clock, SystemClock};
use crate::defaults;
use crate::device::sink::{FifoOpener, SinkOpener, SinkSlot};
use crate::error::{Result, VsndError};
use crate::stream::Stream;
use crate::stream::geometry::{HardwareLimits, StreamParams};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

pub type DeviceId = u32;

/// Fields guarded by the device's coarse lock.
#[derive(Debug, Default)]
pub(crate) struct DeviceState {
    stream_open: bool,
}

pub struct Device {
    id: DeviceId,
    name: String,
    output: PathBuf,
    default_params: StreamParams,
    limits: HardwareLimits,
    tick_rate: u32,
    clock: Arc<dyn Clock>,
    opener: Arc<dyn SinkOpener>,
    state: Mutex<DeviceState>,
    sink: Arc<SinkSlot>,
}

/// What `vsnd devices` prints.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub output: PathBuf,
    pub default_params: StreamParams,
    pub limits: HardwareLimits,
    pub tick_rate: u32,
    pub busy: bool,
}

impl Device {
    /// A device writing to the FIFO at `output`, paced by the system clock.
    pub fn new(id: DeviceId, output: impl Into<PathBuf>, tick_rate: u32) -> Self {
        Self {
            id,
            name: format!("{}{}", defaults::DRIVER_NAME, id),
            output: output.into(),
            default_params: StreamParams::default(),
            limits: HardwareLimits::default(),
            tick_rate: tick_rate.max(1),
            clock: Arc::new(SystemClock),
            opener: Arc::new(FifoOpener),
            state: Mutex::new(DeviceState::default()),
            sink: Arc::new(SinkSlot::new()),
        }
    }

    /// Override the `vsnd<N>` name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn SinkOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_default_params(mut self, params: StreamParams) -> Self {
        self.default_params = params;
        self
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn default_params(&self) -> StreamParams {
        self.default_params
    }

    pub fn limits(&self) -> HardwareLimits {
        self.limits
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub(crate) fn sink_slot(&self) -> Arc<SinkSlot> {
        Arc::clone(&self.sink)
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_busy(&self) -> bool {
        self.lock_state().stream_open
    }

    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            id: self.id,
            name: self.name.clone(),
            output: self.output.clone(),
            default_params: self.default_params,
            limits: self.limits,
            tick_rate: self.tick_rate,
            busy: self.is_busy(),
        }
    }

    /// Open the device's single stream and its sink.
    ///
    /// Fails with [`VsndError::DeviceBusy`] while another stream is open and
    /// with [`VsndError::SinkUnavailable`] if the output cannot be opened. On
    /// failure nothing stays open.
    pub fn open(self: &Arc<Self>) -> Result<Stream> {
        let mut state = self.lock_state();
        if state.stream_open {
            return Err(VsndError::DeviceBusy { id: self.id });
        }

        let sink = self
            .opener
            .open(&self.output)
            .map_err(|e| VsndError::SinkUnavailable {
                path: self.output.display().to_string(),
                message: e.to_string(),
            })?;
        let stream = Stream::new(Arc::clone(self))?;

        self.sink.install(sink);
        state.stream_open = true;
        info!(
            device = self.id,
            output = %self.output.display(),
            "stream opened"
        );
        Ok(stream)
    }

    /// Drop the sink and free the stream slot.
    pub(crate) fn release_stream(&self) {
        let mut state = self.lock_state();
        self.sink.release();
        state.stream_open = false;
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("output", &self.output)
            .field("tick_rate", &self.tick_rate)
            .finish_non_exhaustive()
    }
}
