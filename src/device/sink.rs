//! Byte sinks the clock drains audio into.
//!
//! A sink only has to accept bytes. Writes happen from the clock thread and
//! are best effort: short writes and errors are reported back to the caller
//! but never retried.

use crate::sys;
use std::fs::File;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Pluggable byte output for a device.
pub trait Sink: Send + Sync {
    /// Write as much of `bytes` as the sink accepts right now.
    fn write(&self, bytes: &[u8]) -> io::Result<usize>;

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Opens the sink for a device's output path.
pub trait SinkOpener: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<Arc<dyn Sink>>;
}

/// Decides whether an output path is usable before a device is registered.
pub trait SinkValidator: Send + Sync {
    fn validate(&self, path: &Path) -> bool;
}

/// Named pipe opened for non-blocking writes.
///
/// Opened read-write even though nothing is ever read: a write-only,
/// non-blocking open of a FIFO fails with `ENXIO` while no reader is attached.
#[derive(Debug)]
pub struct FifoSink {
    file: File,
}

impl FifoSink {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        Ok(Self { file })
    }
}

impl Sink for FifoSink {
    fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        (&self.file).write(bytes)
    }

    fn name(&self) -> &'static str {
        "fifo"
    }
}

/// Opener for [`FifoSink`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoOpener;

impl SinkOpener for FifoOpener {
    fn open(&self, path: &Path) -> io::Result<Arc<dyn Sink>> {
        Ok(Arc::new(FifoSink::open(path)?))
    }
}

/// Accepts a path only if it names an existing FIFO.
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoValidator;

impl SinkValidator for FifoValidator {
    fn validate(&self, path: &Path) -> bool {
        sys::is_fifo(path)
    }
}

/// Sink that collects everything written to it (for testing).
///
/// Clones share the same storage, so a test can keep one handle while the
/// device owns another.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    bytes: Arc<Mutex<Vec<u8>>>,
    capacity: Option<usize>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept at most `capacity` bytes in total; later writes come up short.
    pub fn with_capacity_limit(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for CollectorSink {
    fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        let mut stored = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        let room = self
            .capacity
            .map_or(bytes.len(), |cap| cap.saturating_sub(stored.len()));
        let accepted = bytes.len().min(room);
        stored.extend_from_slice(&bytes[..accepted]);
        Ok(accepted)
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

impl SinkOpener for CollectorSink {
    fn open(&self, _path: &Path) -> io::Result<Arc<dyn Sink>> {
        Ok(Arc::new(self.clone()))
    }
}

/// A device's current sink, if any.
///
/// The device installs and releases it under its coarse lock; the clock
/// thread only takes a clone of the handle for the duration of one write.
#[derive(Default)]
pub struct SinkSlot {
    sink: RwLock<Option<Arc<dyn Sink>>>,
}

impl SinkSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<dyn Sink>> {
        self.sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn install(&self, sink: Arc<dyn Sink>) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    /// Take the sink out; dropping the last handle closes it.
    pub fn release(&self) -> Option<Arc<dyn Sink>> {
        self.sink
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_open(&self) -> bool {
        self.sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
