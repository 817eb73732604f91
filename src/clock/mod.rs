//! Software clock: time sources, fixed-point position tracking, and the
//! timer thread that stands in for a playback interrupt.

pub mod source;
pub mod timer;
pub mod tracker;

pub use source::{Clock, ManualClock, SystemClock, TickBase};
pub use timer::TickTimer;
pub use tracker::{ClockState, DrainPlan, PositionTracker};
