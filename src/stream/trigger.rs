//! Trigger state machine: whether a stream's clock is armed.
//!
//! The machine only decides. It returns an [`Action`] telling the stream what
//! to do with the clock and the timer, and the stream carries it out while
//! holding its locks.

use crate::error::VsndError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TriggerState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Trigger commands, numbered like the ALSA trigger codes they stand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TriggerCommand {
    Stop = 0,
    Start = 1,
    Pause = 3,
    /// Pause release.
    Resume = 4,
    /// System suspend; handled like `Pause`.
    Suspend = 5,
    /// System resume; handled like `Resume`.
    Wake = 6,
}

impl TryFrom<i32> for TriggerCommand {
    type Error = VsndError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Stop),
            1 => Ok(Self::Start),
            3 => Ok(Self::Pause),
            4 => Ok(Self::Resume),
            5 => Ok(Self::Suspend),
            6 => Ok(Self::Wake),
            _ => Err(VsndError::InvalidCommand {
                command: code.to_string(),
            }),
        }
    }
}

/// What the stream must do to its clock after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Zero the clock, take "now" as its base, and arm the timer.
    ResetAndArm,
    /// Take "now" as the clock base, keep position, and arm the timer.
    RebaseAndArm,
    /// Cancel further ticks without waiting.
    Disarm,
    /// Nothing changes.
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerStateMachine {
    state: TriggerState,
}

impl TriggerStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TriggerState::Running
    }

    /// Apply `command`, returning the clock action it requires.
    ///
    /// `Start` restarts from zero in any state. Pause only affects a running
    /// stream and resume only a paused one; otherwise they are no-ops.
    pub fn apply(&mut self, command: TriggerCommand) -> Action {
        use TriggerCommand as C;
        use TriggerState as S;

        let (next, action) = match (self.state, command) {
            (_, C::Start) => (S::Running, Action::ResetAndArm),
            (S::Stopped, C::Stop) => (S::Stopped, Action::None),
            (_, C::Stop) => (S::Stopped, Action::Disarm),
            (S::Running, C::Pause | C::Suspend) => (S::Paused, Action::Disarm),
            (S::Paused, C::Resume | C::Wake) => (S::Running, Action::RebaseAndArm),
            (state, _) => (state, Action::None),
        };
        self.state = next;
        action
    }

    /// Drop to `Stopped` regardless of state (prepare and close).
    pub fn force_stop(&mut self) -> Action {
        self.apply(TriggerCommand::Stop)
    }
}
