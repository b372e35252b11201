//! Polling of asynchronous StackSet operations.
//!
//! The decision of what to do after each status observation is a pure
//! function, kept apart from the describe call and the sleep in
//! [`crate::stackset::StackSetClient::poll_operation`].

use std::time::Duration;

use crate::api::OperationStatus;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 25;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollState::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: PollState,
    pub should_sleep: bool,
}

/// Next state after observing `status`, with `attempts_remaining` polls left
/// in the budget (the observation itself already consumed). Success only
/// counts while budget remains, so the last allowed observation can only
/// time out or fail.
pub fn transition(status: &OperationStatus, attempts_remaining: u32) -> Transition {
    match status {
        OperationStatus::Succeeded if attempts_remaining > 0 => Transition {
            state: PollState::Succeeded,
            should_sleep: false,
        },
        OperationStatus::Succeeded => Transition {
            state: PollState::TimedOut,
            should_sleep: false,
        },
        OperationStatus::Running | OperationStatus::Queued if attempts_remaining > 0 => {
            Transition {
                state: PollState::Running,
                should_sleep: true,
            }
        }
        OperationStatus::Running | OperationStatus::Queued => Transition {
            state: PollState::TimedOut,
            should_sleep: false,
        },
        OperationStatus::Failed
        | OperationStatus::Stopping
        | OperationStatus::Stopped
        | OperationStatus::Unknown(_) => Transition {
            state: PollState::Failed,
            should_sleep: false,
        },
    }
}
