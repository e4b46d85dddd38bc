//! Poll loop state machine and per-message dispositions.

use serde::{Deserialize, Serialize};

use super::Rejection;

/// Poll loop state.
///
/// State transitions:
/// - Idle -> Idle (nothing received)
/// - Idle -> Received -> Validating -> Dispatching -> Idle
/// - Idle -> Received -> Validating -> Discarding -> Idle
///
/// There is no terminal state; the loop only stops on an external stop signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollState {
    /// Waiting in `receive_one`.
    Idle,

    /// Holding a message that has not been looked at yet.
    Received,

    /// Running the validator and staleness filter.
    Validating,

    /// Launching the external command, then acknowledging.
    Dispatching,

    /// Acknowledging (or deliberately skipping) a rejected message.
    Discarding,
}

impl PollState {
    pub fn can_transition_to(self, next: PollState) -> bool {
        use PollState::*;
        matches!(
            (self, next),
            (Idle, Idle)
                | (Idle, Received)
                | (Received, Validating)
                | (Validating, Dispatching)
                | (Validating, Discarding)
                | (Dispatching, Idle)
                | (Discarding, Idle)
        )
    }
}

/// What happened to one received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Command launched and message deleted.
    Dispatched { pid: Option<u32> },

    /// Command could not be started; message deleted anyway.
    DispatchFailed { error: String },

    /// Rejected and deleted.
    Discarded(Rejection),

    /// Rejected but left on the queue to reappear after its lease expires.
    LeftForRedelivery(Rejection),
}

impl Disposition {
    /// Did the loop attempt to delete the message?
    pub fn acknowledged(&self) -> bool {
        !matches!(self, Disposition::LeftForRedelivery(_))
    }

    pub fn dispatched(&self) -> bool {
        matches!(self, Disposition::Dispatched { .. })
    }
}
