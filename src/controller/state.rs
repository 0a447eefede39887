//! Run state machine
//!
//! ```text
//! Init -> Phase1Loading -> Phase1Verifying -> Phase1Shutdown
//!      -> Phase2Restart -> Phase2Verifying -> Done
//! ```
//!
//! Any non-terminal state may move to `Aborted`.

use std::fmt;

use serde::Serialize;

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Init,
    Phase1Loading,
    Phase1Verifying,
    Phase1Shutdown,
    Phase2Restart,
    Phase2Verifying,
    Done,
    Aborted,
}

impl RunState {
    /// The only forward successor of this state
    pub fn next(&self) -> Option<RunState> {
        match self {
            RunState::Init => Some(RunState::Phase1Loading),
            RunState::Phase1Loading => Some(RunState::Phase1Verifying),
            RunState::Phase1Verifying => Some(RunState::Phase1Shutdown),
            RunState::Phase1Shutdown => Some(RunState::Phase2Restart),
            RunState::Phase2Restart => Some(RunState::Phase2Verifying),
            RunState::Phase2Verifying => Some(RunState::Done),
            RunState::Done | RunState::Aborted => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }

    /// Forward by exactly one step, or abort from anywhere not yet terminal
    pub fn can_transition_to(&self, target: RunState) -> bool {
        if target == RunState::Aborted {
            return !self.is_terminal();
        }
        self.next() == Some(target)
    }

    /// Phase number this state belongs to, if any
    pub fn phase(&self) -> Option<u8> {
        match self {
            RunState::Phase1Loading | RunState::Phase1Verifying | RunState::Phase1Shutdown => {
                Some(1)
            }
            RunState::Phase2Restart | RunState::Phase2Verifying => Some(2),
            RunState::Init | RunState::Done | RunState::Aborted => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Init => "INIT",
            RunState::Phase1Loading => "PHASE1_LOADING",
            RunState::Phase1Verifying => "PHASE1_VERIFYING",
            RunState::Phase1Shutdown => "PHASE1_SHUTDOWN",
            RunState::Phase2Restart => "PHASE2_RESTART",
            RunState::Phase2Verifying => "PHASE2_VERIFYING",
            RunState::Done => "DONE",
            RunState::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
