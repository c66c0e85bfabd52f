use std::time::Instant;

use super::transitions::{validate, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No hook installed yet.
    Idle,
    /// Chained step hook installed on the request.
    Wrapped,
    /// At least one step callback has fired.
    Stepping,
    /// Original callback reference put back on the request.
    Restored,
    /// Wrapper installation failed; the unwrapped backend call is in flight.
    Fallback,
    /// Terminal.
    Done,
}

#[derive(Debug)]
pub struct GenerationSession {
    run_id: String,
    phase: SessionPhase,
    started_at: Instant,
    steps_observed: usize,
}

impl GenerationSession {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            phase: SessionPhase::Idle,
            started_at: Instant::now(),
            steps_observed: 0,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn steps_observed(&self) -> usize {
        self.steps_observed
    }

    pub fn note_steps(&mut self, steps: usize) {
        self.steps_observed = steps;
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Validated phase change. Rejects transitions the machine does not allow.
    pub fn transition(&mut self, to: SessionPhase) -> Result<(), TransitionError> {
        validate(self.phase, to)?;
        self.phase = to;
        Ok(())
    }

    /// Unconditional phase change, used only on the error exits where the
    /// session record must reach `Done` even if the run died mid-phase.
    pub fn force(&mut self, to: SessionPhase) {
        self.phase = to;
    }

    pub fn is_terminal(&self) -> bool {
        super::transitions::is_terminal(self.phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_idle() {
        let s = GenerationSession::new("run-1");
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert_eq!(s.steps_observed(), 0);
        assert!(!s.is_terminal());
    }

    #[test]
    fn happy_path_reaches_done() {
        let mut s = GenerationSession::new("run-1");
        s.transition(SessionPhase::Wrapped).unwrap();
        s.transition(SessionPhase::Stepping).unwrap();
        s.transition(SessionPhase::Restored).unwrap();
        s.transition(SessionPhase::Done).unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn done_rejects_further_transitions() {
        let mut s = GenerationSession::new("run-1");
        s.force(SessionPhase::Done);
        assert!(s.transition(SessionPhase::Wrapped).is_err());
    }
}
