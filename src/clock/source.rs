//! Time sources for the software clock.
//!
//! The tracker never looks at wall-clock time directly. It counts integer
//! ticks since an epoch, and the [`Clock`] trait decides what "now" is so tests
//! can step time by hand.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Trait for time sources (allows injecting a manual clock in tests).
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
///
/// Used by deterministic tests and simulations. Time never goes backwards.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Converts instants into a monotonically increasing tick count.
///
/// Ticks are counted from a fixed epoch rather than accumulated per callback,
/// so a late callback simply observes a larger count.
#[derive(Debug, Clone, Copy)]
pub struct TickBase {
    epoch: Instant,
    tick_rate: u32,
}

impl TickBase {
    /// `tick_rate` must be non-zero; configuration validation guarantees it.
    pub fn new(epoch: Instant, tick_rate: u32) -> Self {
        Self {
            epoch,
            tick_rate: tick_rate.max(1),
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Whole ticks elapsed between the epoch and `now`. Instants before the
    /// epoch count as tick zero.
    pub fn ticks_at(&self, now: Instant) -> u64 {
        let nanos = now.saturating_duration_since(self.epoch).as_nanos();
        (nanos * self.tick_rate as u128 / NANOS_PER_SEC) as u64
    }

    /// Shortest duration that spans `ticks` whole ticks (rounded up).
    pub fn duration_of(&self, ticks: u64) -> Duration {
        let rate = self.tick_rate as u128;
        let nanos = (ticks as u128 * NANOS_PER_SEC).div_ceil(rate);
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_millis(40));
        assert_eq!(clock.now() - start, Duration::from_millis(40));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn ticks_count_whole_periods_since_epoch() {
        let epoch = Instant::now();
        let base = TickBase::new(epoch, 250);
        assert_eq!(base.ticks_at(epoch), 0);
        assert_eq!(base.ticks_at(epoch + Duration::from_millis(3)), 0);
        assert_eq!(base.ticks_at(epoch + Duration::from_millis(4)), 1);
        assert_eq!(base.ticks_at(epoch + Duration::from_secs(2)), 500);
    }

    #[test]
    fn instants_before_epoch_are_tick_zero() {
        let early = Instant::now();
        let base = TickBase::new(early + Duration::from_secs(1), 1000);
        assert_eq!(base.ticks_at(early), 0);
    }

    #[test]
    fn duration_of_rounds_up_so_ticks_are_reached() {
        let epoch = Instant::now();
        let base = TickBase::new(epoch, 22050);
        for ticks in [1u64, 7, 1024, 22050, 100_003] {
            let at = epoch + base.duration_of(ticks);
            assert_eq!(base.ticks_at(at), ticks, "ticks={ticks}");
        }
    }

    #[test]
    fn zero_tick_rate_is_clamped() {
        let base = TickBase::new(Instant::now(), 0);
        assert_eq!(base.tick_rate(), 1);
    }
}
