use thiserror::Error;

use super::types::SessionPhase;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },
    #[error("cannot transition from terminal phase {phase:?}")]
    FromTerminalPhase { phase: SessionPhase },
}

pub fn validate(from: SessionPhase, to: SessionPhase) -> Result<(), TransitionError> {
    if is_terminal(from) {
        return Err(TransitionError::FromTerminalPhase { phase: from });
    }

    let ok = match (from, to) {
        // Hook installation.
        (SessionPhase::Idle, SessionPhase::Wrapped) => true,

        // First step callback; further steps stay in Stepping.
        (SessionPhase::Wrapped, SessionPhase::Stepping) => true,
        (SessionPhase::Stepping, SessionPhase::Stepping) => true,

        // Original callback put back. A zero-step run restores straight
        // from Wrapped.
        (SessionPhase::Wrapped, SessionPhase::Restored) => true,
        (SessionPhase::Stepping, SessionPhase::Restored) => true,

        // Wrapper failure: unwrapped re-invocation.
        (SessionPhase::Wrapped, SessionPhase::Fallback) => true,

        (SessionPhase::Restored, SessionPhase::Done) => true,
        (SessionPhase::Fallback, SessionPhase::Done) => true,

        _ => false,
    };

    if ok {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition { from, to })
    }
}

pub fn is_terminal(phase: SessionPhase) -> bool {
    matches!(phase, SessionPhase::Done)
}

pub fn next_phase(current: SessionPhase) -> Option<SessionPhase> {
    match current {
        SessionPhase::Idle => Some(SessionPhase::Wrapped),
        SessionPhase::Wrapped => Some(SessionPhase::Stepping),
        SessionPhase::Stepping => Some(SessionPhase::Restored),
        SessionPhase::Restored => Some(SessionPhase::Done),
        SessionPhase::Fallback => Some(SessionPhase::Done),
        SessionPhase::Done => None,
    }
}
