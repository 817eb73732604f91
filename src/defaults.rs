//! Default configuration constants for vsnd.
//!
//! Shared by the configuration layer, the device bootstrap and the CLI so the
//! fixed stream format of a device is described in exactly one place.

use crate::audio::format::SampleFormat;

/// Driver name, used for device short names and log targets.
pub const DRIVER_NAME: &str = "vsnd";

/// Maximum number of devices a registry will hold.
pub const MAX_DEVICES: usize = 8;

/// Default PCM sample format for every device.
pub const PCM_FORMAT: SampleFormat = SampleFormat::S16Le;

/// Default PCM rate in Hz.
///
/// 22.05 kHz mono keeps the FIFO bandwidth low (44100 B/s) while still being a
/// rate every player can produce.
pub const PCM_RATE: u32 = 22050;

/// Default channel count.
pub const PCM_CHANNELS: u32 = 1;

/// Default ring buffer length in frames.
pub const BUFFER_FRAMES: u32 = 8192;

/// Default period length in frames.
pub const PERIOD_FRAMES: u32 = 2048;

/// Default software clock rate, in ticks per real second.
///
/// 250 ticks/s is a common kernel timer frequency. It is deliberately not a
/// divisor of the default byte rate so the fixed-point accumulator carries a
/// remainder between ticks.
pub const TICK_RATE: u32 = 250;

/// Capacity of the period-elapsed notification channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Largest ring buffer a device accepts, in bytes.
pub const BUFFER_BYTES_MAX: usize = 2 * 1024 * 1024;

/// Smallest period a device accepts, in bytes.
pub const PERIOD_BYTES_MIN: usize = 4096;

/// Largest period a device accepts, in bytes.
pub const PERIOD_BYTES_MAX: usize = 1024 * 1024;

/// Fewest periods per ring buffer.
pub const PERIODS_MIN: usize = 1;

/// Most periods per ring buffer.
pub const PERIODS_MAX: usize = 1024;
